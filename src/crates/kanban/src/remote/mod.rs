//! Remote task service seam
//!
//! The client only talks to the service through [`RemoteTaskService`].
//! [`HttpTaskService`] is the production implementation; an in-process
//! implementation lives in [`crate::testing`].

pub mod http;

use crate::error::Result;
use crate::models::{Board, BoardInput, Task, TaskId, TaskInput};
use async_trait::async_trait;

pub use http::HttpTaskService;

/// Operations exposed by the task service.
///
/// Implementations return the service's canonical representation.
#[async_trait]
pub trait RemoteTaskService: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>>;

    /// Fails with `NotFound` for unknown ids.
    async fn get_task(&self, id: TaskId) -> Result<Task>;

    /// Fails with `Validation` for an empty title or non-positive board id.
    async fn create_task(&self, input: &TaskInput) -> Result<Task>;

    /// Replace all fields of a task.
    ///
    /// Returns `None` when the service acknowledged without a body.
    async fn update_task(&self, id: TaskId, input: &TaskInput) -> Result<Option<Task>>;

    async fn delete_task(&self, id: TaskId) -> Result<()>;

    async fn list_boards(&self) -> Result<Vec<Board>>;

    async fn get_board(&self, id: i64) -> Result<Board>;

    async fn create_board(&self, input: &BoardInput) -> Result<Board>;

    async fn update_board(&self, id: i64, input: &BoardInput) -> Result<Option<Board>>;

    /// Deletes the board and every task it owns.
    async fn delete_board(&self, id: i64) -> Result<()>;
}
