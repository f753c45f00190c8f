//! Board view controller
//!
//! Derives the three status columns from the cached task list, applying
//! the active filters, and turns drops onto a column into status updates.
//! The controller never writes the cache itself.

use crate::cache::{QueryKey, Subscription, TaskCache};
use crate::error::{KanbanError, MutationError, Result};
use crate::events::MutationKind;
use crate::models::{Task, TaskId, TaskPatch, TaskPriority, TaskStatus};
use crate::mutation::MutationCoordinator;
use chrono::{Datelike, Duration, NaiveDate};
use std::str::FromStr;
use tracing::debug;

/// Due-date bucket filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DueFilter {
    #[default]
    All,
    Today,
    ThisWeek,
    Overdue,
}

impl DueFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            DueFilter::All => "all",
            DueFilter::Today => "today",
            DueFilter::ThisWeek => "this-week",
            DueFilter::Overdue => "overdue",
        }
    }

    /// Whether a task due on `due` falls in this bucket. Tasks without a
    /// due date only match `All`.
    pub fn matches(&self, due: Option<NaiveDate>, today: NaiveDate) -> bool {
        match (self, due) {
            (DueFilter::All, _) => true,
            (_, None) => false,
            (DueFilter::Today, Some(date)) => is_due_today(date, today),
            (DueFilter::ThisWeek, Some(date)) => is_due_this_week(date, today),
            (DueFilter::Overdue, Some(date)) => is_overdue(date, today),
        }
    }
}

impl FromStr for DueFilter {
    type Err = KanbanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "all" => Ok(DueFilter::All),
            "today" => Ok(DueFilter::Today),
            "this-week" | "week" | "thisweek" => Ok(DueFilter::ThisWeek),
            "overdue" => Ok(DueFilter::Overdue),
            other => Err(KanbanError::Validation(format!(
                "Invalid due filter '{}': expected all, today, this-week or overdue",
                other
            ))),
        }
    }
}

pub fn is_due_today(due: NaiveDate, today: NaiveDate) -> bool {
    due == today
}

/// Sunday through Saturday of the week containing `today`, inclusive.
pub fn is_due_this_week(due: NaiveDate, today: NaiveDate) -> bool {
    let start = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
    let end = start + Duration::days(6);
    due >= start && due <= end
}

/// Strictly before today.
pub fn is_overdue(due: NaiveDate, today: NaiveDate) -> bool {
    due < today
}

/// Active filters. All predicates must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub priority: Option<TaskPriority>,
    pub due: DueFilter,
    pub search: Option<String>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_due(mut self, due: DueFilter) -> Self {
        self.due = due;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn has_active_filters(&self) -> bool {
        self.priority.is_some()
            || self.due != DueFilter::All
            || self
                .search
                .as_deref()
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if !self.due.matches(task.due_date, today) {
            return false;
        }
        match self.search.as_deref() {
            Some(needle) => task.matches_text(needle),
            None => true,
        }
    }
}

/// Tasks grouped by status, in cache order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardView {
    pub todo: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub done: Vec<Task>,
}

impl BoardView {
    pub fn derive(tasks: &[Task], filter: &TaskFilter, today: NaiveDate) -> Self {
        let mut view = Self::default();
        for task in tasks.iter().filter(|t| filter.matches(t, today)) {
            view.column_mut(task.status).push(task.clone());
        }
        view
    }

    pub fn column(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::Todo => &self.todo,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Done => &self.done,
        }
    }

    fn column_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        match status {
            TaskStatus::Todo => &mut self.todo,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Done => &mut self.done,
        }
    }

    /// Task count per column, in column order.
    pub fn counts(&self) -> [(TaskStatus, usize); 3] {
        TaskStatus::ALL.map(|status| (status, self.column(status).len()))
    }

    pub fn total(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Reads the cache, holds the filter, and issues moves.
#[derive(Clone)]
pub struct BoardController {
    cache: TaskCache,
    coordinator: MutationCoordinator,
    filter: TaskFilter,
}

impl BoardController {
    pub fn new(coordinator: MutationCoordinator) -> Self {
        Self {
            cache: coordinator.cache().clone(),
            coordinator,
            filter: TaskFilter::default(),
        }
    }

    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
    }

    /// Load the task list if needed (stale data is served and refreshed).
    pub async fn load(&self) -> Result<()> {
        self.cache.ensure(QueryKey::Tasks).await.map(|_| ())
    }

    /// Subscribe to the task list; the view should re-derive on each event.
    pub fn subscribe(&self) -> Subscription {
        self.cache.subscribe(QueryKey::Tasks)
    }

    /// Current view, bucketed against the local calendar date.
    pub fn view(&self) -> BoardView {
        self.view_at(chrono::Local::now().date_naive())
    }

    pub fn view_at(&self, today: NaiveDate) -> BoardView {
        let tasks = self.cache.read_tasks().unwrap_or_default();
        BoardView::derive(&tasks, &self.filter, today)
    }

    /// Handle a drop of `task_id` onto the `target` column.
    ///
    /// Sends a status-only update with every other field taken from the
    /// cache. Returns `Ok(None)` without calling the service when the task
    /// is unknown or already in `target`.
    pub async fn drop_on(
        &self,
        task_id: TaskId,
        target: TaskStatus,
    ) -> std::result::Result<Option<Task>, MutationError> {
        let Some(task) = self.cache.find_task(task_id) else {
            debug!(task_id = %task_id, "Dropped task not in cache, ignoring");
            return Ok(None);
        };
        if task.status == target {
            debug!(task_id = %task_id, status = %target, "Dropped on its own column");
            return Ok(None);
        }

        self.coordinator
            .update_task(task_id, TaskPatch::status(target))
            .await
            .map(Some)
    }

    /// Move a task one column to the right. Done stays done.
    pub async fn advance(&self, task_id: TaskId) -> std::result::Result<Option<Task>, MutationError> {
        let Some(task) = self.cache.find_task(task_id) else {
            return Err(MutationError::new(
                MutationKind::UpdateTask,
                KanbanError::NotFound(format!("Task {} not found", task_id)),
            ));
        };
        self.drop_on(task_id, task.status.next()).await
    }
}
