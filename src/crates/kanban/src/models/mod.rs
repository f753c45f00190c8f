//! Data models for boards and tasks

pub mod board;
pub mod task;

pub use board::{Board, BoardInput, DEFAULT_BOARD_ID, MAX_BOARD_NAME_LEN};
pub use task::{sort_by_priority, Task, TaskId, TaskInput, TaskPatch, TaskPriority, TaskStatus};
