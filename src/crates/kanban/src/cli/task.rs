//! Task command handlers

use crate::cache::QueryKey;
use crate::cli::{render, AppContext};
use crate::error::MutationError;
use crate::models::{TaskId, TaskInput, TaskPatch, TaskStatus};
use anyhow::{anyhow, Result};
use chrono::Local;
use colored::Colorize;
use tracing::info;

fn surfaced(err: MutationError) -> anyhow::Error {
    anyhow!(err.user_message())
}

/// Handle task create command
pub async fn handle_create(ctx: &AppContext, input: TaskInput) -> Result<()> {
    let task = ctx.coordinator.create_task(input).await.map_err(surfaced)?;

    render::success("Task created successfully");
    println!("  ID: {}", task.id);
    println!("  Title: {}", task.title);
    println!("  Status: {}", render::status_label(task.status));
    Ok(())
}

/// Handle task update command
pub async fn handle_update(ctx: &AppContext, id: i64, patch: TaskPatch) -> Result<()> {
    if patch.is_empty() {
        println!("{}", "Nothing to update".yellow());
        return Ok(());
    }

    let task = ctx
        .coordinator
        .update_task(TaskId(id), patch)
        .await
        .map_err(surfaced)?;

    render::success("Task updated successfully");
    render::print_task(&task);
    Ok(())
}

/// Handle task move command (a drop onto a column)
pub async fn handle_move(ctx: &AppContext, id: i64, status: TaskStatus) -> Result<()> {
    let controller = ctx.controller();
    controller.load().await?;

    let id = TaskId(id);
    if ctx.cache.find_task(id).is_none() {
        return Err(anyhow!("Task {} not found", id));
    }

    match controller.drop_on(id, status).await.map_err(surfaced)? {
        Some(task) => {
            info!(task_id = %id, status = %task.status, "Task moved");
            render::success(&format!("Task #{} moved to {}", id, task.status.label()));
        }
        None => println!("{}", format!("Task #{} is already in {}", id, status.label()).yellow()),
    }
    Ok(())
}

/// Handle task advance command
pub async fn handle_advance(ctx: &AppContext, id: i64) -> Result<()> {
    let controller = ctx.controller();
    controller.load().await?;

    match controller.advance(TaskId(id)).await.map_err(surfaced)? {
        Some(task) => render::success(&format!("Task #{} moved to {}", id, task.status.label())),
        None => println!("{}", format!("Task #{} is already done", id).yellow()),
    }
    Ok(())
}

/// Handle task delete command
pub async fn handle_delete(ctx: &AppContext, id: i64) -> Result<()> {
    ctx.coordinator
        .delete_task(TaskId(id))
        .await
        .map_err(surfaced)?;

    render::success("Task deleted successfully");
    Ok(())
}

/// Handle task show command
pub async fn handle_show(ctx: &AppContext, id: i64) -> Result<()> {
    let value = ctx.cache.fetch(QueryKey::Task(TaskId(id))).await?;
    let task = value
        .as_task()
        .ok_or_else(|| anyhow!("Unexpected cache value for task {}", id))?;

    render::print_task(task);
    if let Some(due) = task.due_date {
        let today = Local::now().date_naive();
        if due < today && task.status != TaskStatus::Done {
            println!("{}", "  Overdue".red().bold());
        }
    }
    Ok(())
}
