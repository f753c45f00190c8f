//! # Kanban - task board client
//!
//! Client core for a kanban board backed by a REST task service. Task
//! creates, updates and deletes are applied to a local cache immediately,
//! reconciled with the service's answer, and rolled back exactly when the
//! service rejects them.
//!
//! ## Features
//!
//! - **Task Cache** - keyed store with subscriptions, staleness and
//!   cancellable background refetches
//! - **Mutation Coordinator** - optimistic apply, commit, exact rollback
//! - **Board View** - status columns with priority, due-date and text filters
//! - **Dual-Location Config** - user-level and project-level configuration
//! - **CLI** - `kanban board`, `kanban task ...`, `kanban watch`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kanban::{
//!     BoardController, CacheConfig, HttpTaskService, MutationCoordinator, TaskCache,
//!     TaskInput, TaskStatus,
//! };
//! use std::sync::Arc;
//! use utils::ClientConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let remote = Arc::new(HttpTaskService::new(ClientConfig::new("http://localhost:5147"))?);
//! let cache = TaskCache::new(remote, CacheConfig::default());
//! let coordinator = MutationCoordinator::new(cache.clone());
//! let controller = BoardController::new(coordinator.clone());
//!
//! controller.load().await?;
//! let task = coordinator.create_task(TaskInput::new("Write release notes", 1)).await?;
//! controller.drop_on(task.id, TaskStatus::InProgress).await?;
//! println!("{} in progress", controller.view().in_progress.len());
//!
//! cache.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod board_view;
pub mod cache;
pub mod cli;
pub mod config;
pub mod events;
pub mod models;
pub mod mutation;
pub mod remote;
pub mod retry;
pub mod shutdown;
pub mod testing;

// Error types and utilities
mod error;

// Error types
pub use error::{KanbanError, MutationError, Result, NETWORK_ERROR_MESSAGE};

// Re-export the core
pub use board_view::{BoardController, BoardView, DueFilter, TaskFilter};
pub use cache::{
    CacheConfig, CacheEvent, CacheEventKind, CachedValue, PendingMutation, QueryKey, Subscription,
    TaskCache,
};
pub use mutation::MutationCoordinator;
pub use remote::{HttpTaskService, RemoteTaskService};

// Re-export models
pub use models::{
    Board, BoardInput, Task, TaskId, TaskInput, TaskPatch, TaskPriority, TaskStatus,
    DEFAULT_BOARD_ID,
};

// Re-export config and events
pub use config::{ConfigLoader, KanbanConfig};
pub use events::{MutationEvent, MutationKind};
pub use retry::RetryConfig;
pub use shutdown::ShutdownCoordinator;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version banner for the CLI
pub fn version_info() -> String {
    format!("Kanban v{}", VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert!(info.contains("Kanban"));
        assert!(info.contains(VERSION));
    }
}
