//! CLI command implementations
//!
//! Provides command handlers for the kanban CLI binary. Every handler goes
//! through the same cache and mutation coordinator a graphical front end
//! would use.

pub mod board;
pub mod render;
pub mod task;

use crate::board_view::BoardController;
use crate::cache::TaskCache;
use crate::config::KanbanConfig;
use crate::error::Result;
use crate::mutation::MutationCoordinator;
use crate::remote::{HttpTaskService, RemoteTaskService};
use std::sync::Arc;

/// Everything a command handler needs.
#[derive(Clone)]
pub struct AppContext {
    pub config: KanbanConfig,
    pub cache: TaskCache,
    pub coordinator: MutationCoordinator,
}

impl AppContext {
    /// Context talking HTTP to the configured service.
    pub fn connect(config: KanbanConfig) -> Result<Self> {
        let remote = HttpTaskService::new(config.client_config())?;
        Ok(Self::with_remote(config, Arc::new(remote)))
    }

    /// Context over any service implementation.
    pub fn with_remote(config: KanbanConfig, remote: Arc<dyn RemoteTaskService>) -> Self {
        let cache = TaskCache::new(remote, config.cache_config());
        let coordinator = MutationCoordinator::new(cache.clone());
        Self {
            config,
            cache,
            coordinator,
        }
    }

    pub fn controller(&self) -> BoardController {
        BoardController::new(self.coordinator.clone())
    }

    pub fn default_board_id(&self) -> i64 {
        self.config.board.default_board_id
    }
}
