//! Board model

use crate::error::{KanbanError, Result};
use crate::models::task::Task;
use serde::{Deserialize, Serialize};

/// Longest board name the service stores.
pub const MAX_BOARD_NAME_LEN: usize = 200;

/// Board used when the caller does not name one.
pub const DEFAULT_BOARD_ID: i64 = 1;

/// A board owning a set of tasks.
///
/// Deleting a board deletes its tasks on the service side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: i64,

    pub name: String,

    /// Owned tasks, present when the service embeds them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
}

impl Board {
    /// Number of embedded tasks (0 when the service did not embed them).
    pub fn task_count(&self) -> usize {
        self.tasks.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// Body of a board create or rename request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardInput {
    pub name: String,
}

impl BoardInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Name must be non-empty and at most [`MAX_BOARD_NAME_LEN`] characters.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(KanbanError::Validation("Name is required".to_string()));
        }
        if self.name.chars().count() > MAX_BOARD_NAME_LEN {
            return Err(KanbanError::Validation(format!(
                "Name must be at most {} characters",
                MAX_BOARD_NAME_LEN
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_board_without_tasks_omits_field() {
        let board = Board {
            id: 1,
            name: "Sprint".to_string(),
            tasks: None,
        };
        assert_eq!(serde_json::to_value(&board).unwrap(), json!({"id": 1, "name": "Sprint"}));
        assert_eq!(board.task_count(), 0);
    }

    #[test]
    fn test_board_with_embedded_tasks() {
        let board: Board = serde_json::from_value(json!({
            "id": 3,
            "name": "Home",
            "tasks": [
                {"id": 10, "title": "Paint", "status": "Todo", "priority": "Low", "boardId": 3}
            ]
        }))
        .unwrap();
        assert_eq!(board.task_count(), 1);
    }

    #[test]
    fn test_board_name_validation() {
        assert!(BoardInput::new("Roadmap").validate().is_ok());
        assert!(BoardInput::new("").validate().is_err());
        assert!(BoardInput::new("x".repeat(MAX_BOARD_NAME_LEN)).validate().is_ok());
        assert!(BoardInput::new("x".repeat(MAX_BOARD_NAME_LEN + 1)).validate().is_err());
    }
}
