//! Common test utilities for integration tests

#![allow(dead_code)]

use kanban::testing::{fixtures, InMemoryTaskService};
use kanban::{
    BoardController, CacheConfig, CacheEvent, CacheEventKind, MutationCoordinator, QueryKey,
    RetryConfig, Subscription, Task, TaskCache, TaskInput,
};
use std::sync::Arc;
use std::time::Duration;

/// Service, cache and coordinator wired together.
pub struct Harness {
    pub service: Arc<InMemoryTaskService>,
    pub cache: TaskCache,
    pub coordinator: MutationCoordinator,
}

impl Harness {
    pub fn controller(&self) -> BoardController {
        BoardController::new(self.coordinator.clone())
    }

    /// Cached task list ordered by id.
    pub fn cached_tasks(&self) -> Vec<Task> {
        let mut tasks = self.cache.read_tasks().expect("task list cached");
        tasks.sort_by_key(|t| t.id);
        tasks
    }
}

/// Cache config with no read retries.
pub fn test_cache_config() -> CacheConfig {
    CacheConfig {
        retry: RetryConfig::none(),
        ..CacheConfig::default()
    }
}

/// Harness over an empty default board.
pub fn setup() -> Harness {
    let service = Arc::new(InMemoryTaskService::with_default_board());
    let cache = TaskCache::new(service.clone(), test_cache_config());
    let coordinator = MutationCoordinator::new(cache.clone());
    Harness {
        service,
        cache,
        coordinator,
    }
}

/// Harness with the given tasks seeded (ids 1, 2, ...) and the list loaded.
pub async fn setup_with(inputs: Vec<TaskInput>) -> Harness {
    let harness = setup();
    for input in inputs {
        harness.service.seed_task(input);
    }
    harness
        .cache
        .fetch(QueryKey::Tasks)
        .await
        .expect("initial load");
    harness
}

/// Harness with one Todo task per title.
pub async fn setup_with_titles(titles: &[&str]) -> Harness {
    setup_with(titles.iter().map(|t| fixtures::task_input(t)).collect()).await
}

/// Wait for the next write to the subscribed key that satisfies `done`.
pub async fn wait_for_write<F>(subscription: &mut Subscription, mut done: F) -> CacheEvent
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = subscription.changed().await.expect("cache open");
            if event.kind == CacheEventKind::Written && done() {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for cache write")
}
