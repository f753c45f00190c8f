//! Task model
//!
//! Tasks as exchanged with the task service, plus the create body
//! ([`TaskInput`]) and the partial update ([`TaskPatch`]) the client builds.

use crate::error::{KanbanError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

/// Task identifier.
///
/// Server-assigned ids are positive. Ids handed out by
/// [`TaskId::next_optimistic`] are negative, so the two never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

static NEXT_OPTIMISTIC_ID: AtomicI64 = AtomicI64::new(-1);

impl TaskId {
    /// Allocate a fresh temporary id for a task the server has not seen yet.
    pub fn next_optimistic() -> Self {
        Self(NEXT_OPTIMISTIC_ID.fetch_sub(1, Ordering::SeqCst))
    }

    /// True for ids allocated client-side.
    pub fn is_optimistic(&self) -> bool {
        self.0 < 0
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Task status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started
    #[default]
    Todo,
    /// Being worked on
    InProgress,
    /// Finished
    Done,
}

impl TaskStatus {
    /// All statuses in column order.
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "Todo",
            Self::InProgress => "InProgress",
            Self::Done => "Done",
        }
    }

    /// Column heading.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }

    /// The status a task moves to when advanced one column.
    pub fn next(&self) -> Self {
        match self {
            Self::Todo => Self::InProgress,
            Self::InProgress => Self::Done,
            Self::Done => Self::Done,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = KanbanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" | "to do" | "to-do" => Ok(Self::Todo),
            "inprogress" | "in_progress" | "in-progress" | "in progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(KanbanError::Validation(format!(
                "Invalid status '{}': expected Todo, InProgress or Done",
                s
            ))),
        }
    }
}

/// Task priority enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    /// Sort weight, higher is more urgent.
    pub fn weight(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = KanbanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(KanbanError::Validation(format!(
                "Invalid priority '{}': expected Low, Medium or High",
                s
            ))),
        }
    }
}

/// A task on a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Server id, or a negative temporary id while a create is in flight
    pub id: TaskId,

    /// Task title (never empty once accepted by the service)
    pub title: String,

    /// Optional free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Column the task sits in
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: TaskPriority,

    /// Calendar due date
    #[serde(default, skip_serializing_if = "Option::is_none", with = "due_date")]
    pub due_date: Option<NaiveDate>,

    /// Owning board
    pub board_id: i64,
}

impl Task {
    /// Build the record shown while a create is in flight.
    pub fn optimistic(id: TaskId, input: &TaskInput) -> Self {
        Self {
            id,
            title: input.title.clone(),
            description: input.description.clone(),
            status: input.status,
            priority: input.priority,
            due_date: input.due_date,
            board_id: input.board_id,
        }
    }

    /// Case-insensitive substring match over title and description.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}

/// Sort tasks by priority, most urgent first. Ties keep their order.
pub fn sort_by_priority(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.priority.weight().cmp(&a.priority.weight()));
}

/// Body of a create or update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: TaskPriority,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "due_date")]
    pub due_date: Option<NaiveDate>,

    pub board_id: i64,
}

impl TaskInput {
    /// New input with status `Todo` and priority `Medium`.
    pub fn new(title: impl Into<String>, board_id: i64) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            due_date: None,
            board_id,
        }
    }

    /// Builder: Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder: Set status
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder: Set priority
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: Set due date
    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// The rules the task service enforces on every create and update.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.title.trim().is_empty() {
            problems.push("Title is required");
        }
        if self.board_id <= 0 {
            problems.push("BoardId must be a positive integer");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(KanbanError::Validation(problems.join(", ")))
        }
    }
}

impl From<&Task> for TaskInput {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            board_id: task.board_id,
        }
    }
}

/// Partial update of a task. Unset fields keep their current value.
///
/// `description` and `due_date` are doubly optional: `Some(None)` clears
/// the field, `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub board_id: Option<i64>,
}

impl TaskPatch {
    /// Patch that only moves the task to another column.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_board_id(mut self, board_id: i64) -> Self {
        self.board_id = Some(board_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the patch over `task`. The id never changes.
    pub fn apply_to(&self, task: &Task) -> Task {
        Task {
            id: task.id,
            title: self.title.clone().unwrap_or_else(|| task.title.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| task.description.clone()),
            status: self.status.unwrap_or(task.status),
            priority: self.priority.unwrap_or(task.priority),
            due_date: self.due_date.unwrap_or(task.due_date),
            board_id: self.board_id.unwrap_or(task.board_id),
        }
    }
}

/// Serde adapter for `dueDate`.
///
/// Written as `YYYY-MM-DD`. Read from either a date or an ISO date-time
/// (the service stores a timestamp), keeping the calendar date.
pub mod due_date {
    use chrono::{NaiveDate, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) if !s.trim().is_empty() => parse(&s).map(Some).map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }

    /// Parse a due date from `YYYY-MM-DD` or an ISO-8601 date-time.
    pub fn parse(raw: &str) -> Result<NaiveDate, String> {
        let raw = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, FORMAT) {
            return Ok(date);
        }
        if let Ok(dt) = raw.parse::<NaiveDateTime>() {
            return Ok(dt.date());
        }
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.date_naive());
        }
        Err(format!("invalid due date '{}': expected YYYY-MM-DD", raw))
    }
}
