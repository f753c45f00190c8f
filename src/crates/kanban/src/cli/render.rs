//! Terminal rendering for boards and tasks

use crate::board_view::{is_overdue, BoardView, TaskFilter};
use crate::models::{Board, Task, TaskPriority, TaskStatus};
use chrono::NaiveDate;
use colored::{ColoredString, Colorize};

const TITLE_WIDTH: usize = 48;

pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

pub fn priority_label(priority: TaskPriority) -> ColoredString {
    match priority {
        TaskPriority::High => priority.as_str().red().bold(),
        TaskPriority::Medium => priority.as_str().yellow(),
        TaskPriority::Low => priority.as_str().green(),
    }
}

pub fn status_label(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Todo => status.label().blue().bold(),
        TaskStatus::InProgress => status.label().yellow().bold(),
        TaskStatus::Done => status.label().green().bold(),
    }
}

fn due_label(task: &Task, today: NaiveDate) -> ColoredString {
    match task.due_date {
        None => "".normal(),
        Some(due) if is_overdue(due, today) && task.status != TaskStatus::Done => {
            format!("due {}", due).red()
        }
        Some(due) => format!("due {}", due).dimmed(),
    }
}

/// One line per task: id, priority, title, due date.
pub fn task_line(task: &Task, today: NaiveDate) -> String {
    format!(
        "  {:>5}  {:<8} {:<width$} {}",
        format!("#{}", task.id),
        priority_label(task.priority),
        truncate(&task.title, TITLE_WIDTH),
        due_label(task, today),
        width = TITLE_WIDTH
    )
}

pub fn print_board(view: &BoardView, filter: &TaskFilter, today: NaiveDate) {
    if filter.has_active_filters() {
        println!("{}", describe_filter(filter).dimmed());
    }

    for (status, count) in view.counts() {
        println!();
        println!("{} ({})", status_label(status), count);
        println!("{}", "-".repeat(72));
        let column = view.column(status);
        if column.is_empty() {
            println!("  {}", "No tasks".dimmed());
        }
        for task in column {
            println!("{}", task_line(task, today));
        }
    }
}

pub fn describe_filter(filter: &TaskFilter) -> String {
    let mut parts = Vec::new();
    if let Some(priority) = filter.priority {
        parts.push(format!("priority={}", priority));
    }
    if filter.due != Default::default() {
        parts.push(format!("due={}", filter.due.as_str()));
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        parts.push(format!("search=\"{}\"", search.trim()));
    }
    format!("Filters: {}", parts.join(", "))
}

pub fn print_task(task: &Task) {
    println!("Task #{}", task.id);
    println!("  Title:       {}", task.title);
    if let Some(description) = &task.description {
        println!("  Description: {}", description);
    }
    println!("  Status:      {}", status_label(task.status));
    println!("  Priority:    {}", priority_label(task.priority));
    if let Some(due) = task.due_date {
        println!("  Due:         {}", due);
    }
    println!("  Board:       {}", task.board_id);
}

pub fn print_boards(boards: &[Board]) {
    if boards.is_empty() {
        println!("{}", "No boards found".yellow());
        return;
    }

    println!("{:<8} {:<50} {:>6}", "ID", "Name", "Tasks");
    println!("{}", "-".repeat(66));
    for board in boards {
        println!(
            "{:<8} {:<50} {:>6}",
            board.id,
            truncate(&board.name, 50),
            board.task_count()
        );
    }
}

pub fn success(message: &str) {
    println!("{}", format!("✓ {}", message).green().bold());
}
