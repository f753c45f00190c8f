//! Mutation coordinator
//!
//! Every task create, update and delete follows the same protocol:
//!
//! 1. cancel the in-flight refetch of each affected key
//! 2. snapshot the affected keys
//! 3. write the optimistic value, synchronously
//! 4. call the remote service (the only await)
//! 5. on success, store server data and invalidate the keys
//! 6. on failure, restore the snapshots exactly
//! 7. release the keys so deferred refetches can run
//!
//! Steps 1-3 happen inside [`TaskCache::begin_mutation`]; step 7 is the
//! drop of the returned [`PendingMutation`], so it runs on every exit path.
//! Mutations are sent once and never retried.
//!
//! One exception to step 4: updating a task that is in neither the list
//! nor its own entry first awaits `get_task` for the merge base. That read
//! happens before step 1, so nothing is held or written while it runs.
//! A mutation refused before step 1 emits [`MutationEvent::Failed`]
//! instead of `RolledBack`.

use crate::cache::{CachedValue, PendingMutation, QueryKey, TaskCache};
use crate::error::{KanbanError, MutationError};
use crate::events::{MutationEvent, MutationKind};
use crate::models::{Board, BoardInput, Task, TaskId, TaskInput, TaskPatch};
use crate::remote::RemoteTaskService;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

type MutationResult<T> = std::result::Result<T, MutationError>;

/// Runs mutations against the remote service, keeping the cache in sync.
#[derive(Clone)]
pub struct MutationCoordinator {
    cache: TaskCache,
    remote: Arc<dyn RemoteTaskService>,
    events: broadcast::Sender<MutationEvent>,
}

impl MutationCoordinator {
    /// Coordinator over the cache's own remote service.
    pub fn new(cache: TaskCache) -> Self {
        let remote = cache.remote();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            cache,
            remote,
            events,
        }
    }

    pub fn cache(&self) -> &TaskCache {
        &self.cache
    }

    /// Notification stream: one event per applied, committed, rolled back
    /// or refused mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.events.subscribe()
    }

    /// Create a task. It shows up in the cached list under a temporary id
    /// at once and is swapped for the server record when the call settles.
    pub async fn create_task(&self, input: TaskInput) -> MutationResult<Task> {
        let kind = MutationKind::CreateTask;
        let temp_id = TaskId::next_optimistic();
        let optimistic = Task::optimistic(temp_id, &input);

        let list = self.cache.begin_mutation(QueryKey::Tasks, |current| {
            let mut tasks = current.as_tasks()?.to_vec();
            tasks.push(optimistic);
            Some(CachedValue::TaskList(tasks))
        });
        debug!(temp_id = %temp_id, title = %input.title, "Optimistic create applied");
        self.emit(MutationEvent::applied(kind, temp_id.value()));

        match self.remote.create_task(&input).await {
            Ok(created) => {
                list.commit(|current| {
                    let mut tasks = current.as_tasks()?.to_vec();
                    match tasks.iter().position(|t| t.id == temp_id) {
                        Some(index) => tasks[index] = created.clone(),
                        None if tasks.iter().all(|t| t.id != created.id) => {
                            tasks.push(created.clone())
                        }
                        None => return None,
                    }
                    Some(CachedValue::TaskList(tasks))
                });
                self.cache.invalidate(QueryKey::Tasks);

                info!(task_id = %created.id, temp_id = %temp_id, "Task created");
                self.emit(MutationEvent::committed(kind, created.id.value()));
                Ok(created)
            }
            Err(e) => Err(self.roll_back(
                kind,
                Some(temp_id.value()),
                e,
                vec![list],
                &[QueryKey::Tasks],
            )),
        }
    }

    /// Update a task. Unset patch fields keep their cached values; the
    /// service receives the full merged task.
    ///
    /// A task that is in neither the list nor its own cache entry is read
    /// from the service first. That read is a second await, taken before
    /// the snapshot; if it fails the update is refused without touching
    /// the cache.
    pub async fn update_task(&self, id: TaskId, patch: TaskPatch) -> MutationResult<Task> {
        let kind = MutationKind::UpdateTask;
        let keys = [QueryKey::Tasks, QueryKey::Task(id)];
        if id.is_optimistic() {
            return Err(self.reject(kind, Some(id.value()), still_creating(id), &[]));
        }

        let base = match self.cache.find_task(id) {
            Some(task) => task,
            None => {
                debug!(task_id = %id, "Task not cached, reading it before update");
                self.remote
                    .get_task(id)
                    .await
                    .map_err(|e| self.reject(kind, Some(id.value()), e, &keys))?
            }
        };

        let mut merged = patch.apply_to(&base);
        let list = self.cache.begin_mutation(QueryKey::Tasks, |current| {
            let mut tasks = current.as_tasks()?.to_vec();
            let slot = tasks.iter_mut().find(|t| t.id == id)?;
            let next = patch.apply_to(slot);
            *slot = next.clone();
            merged = next;
            Some(CachedValue::TaskList(tasks))
        });
        let item = self.cache.begin_mutation(QueryKey::Task(id), |current| {
            current.as_task().map(|_| CachedValue::Task(merged.clone()))
        });
        debug!(task_id = %id, status = %merged.status, "Optimistic update applied");
        self.emit(MutationEvent::applied(kind, id.value()));

        let body = TaskInput::from(&merged);
        match self.remote.update_task(id, &body).await {
            Ok(response) => {
                let canonical = response.unwrap_or(merged);
                list.commit(|current| {
                    let mut tasks = current.as_tasks()?.to_vec();
                    let slot = tasks.iter_mut().find(|t| t.id == id)?;
                    *slot = canonical.clone();
                    Some(CachedValue::TaskList(tasks))
                });
                item.commit(|current| {
                    current.as_task().map(|_| CachedValue::Task(canonical.clone()))
                });
                for key in keys {
                    self.cache.invalidate(key);
                }

                info!(task_id = %id, status = %canonical.status, "Task updated");
                self.emit(MutationEvent::committed(kind, id.value()));
                Ok(canonical)
            }
            Err(e) => Err(self.roll_back(kind, Some(id.value()), e, vec![list, item], &keys)),
        }
    }

    /// Delete a task. It disappears from the cached list at once.
    pub async fn delete_task(&self, id: TaskId) -> MutationResult<()> {
        let kind = MutationKind::DeleteTask;
        let keys = [QueryKey::Tasks, QueryKey::Task(id)];
        if id.is_optimistic() {
            return Err(self.reject(kind, Some(id.value()), still_creating(id), &[]));
        }

        let list = self.cache.begin_mutation(QueryKey::Tasks, |current| {
            without_task(current, id)
        });
        let item = self.cache.begin_mutation(QueryKey::Task(id), |_| None);
        debug!(task_id = %id, "Optimistic delete applied");
        self.emit(MutationEvent::applied(kind, id.value()));

        match self.remote.delete_task(id).await {
            Ok(()) => {
                list.commit(|current| without_task(current, id));
                item.commit_removal();
                self.cache.invalidate(QueryKey::Tasks);

                info!(task_id = %id, "Task deleted");
                self.emit(MutationEvent::committed(kind, id.value()));
                Ok(())
            }
            Err(e) => Err(self.roll_back(kind, Some(id.value()), e, vec![list, item], &keys)),
        }
    }

    /// Create a board. Boards are not applied optimistically.
    pub async fn create_board(&self, input: BoardInput) -> MutationResult<Board> {
        let kind = MutationKind::CreateBoard;
        input
            .validate()
            .map_err(|e| self.reject(kind, None, e, &[]))?;

        let board = self
            .remote
            .create_board(&input)
            .await
            .map_err(|e| self.reject(kind, None, e, &[QueryKey::Boards]))?;
        self.cache.invalidate(QueryKey::Boards);

        info!(board_id = board.id, name = %board.name, "Board created");
        self.emit(MutationEvent::committed(kind, board.id));
        Ok(board)
    }

    /// Rename a board.
    pub async fn update_board(&self, id: i64, input: BoardInput) -> MutationResult<Board> {
        let kind = MutationKind::UpdateBoard;
        let keys = [QueryKey::Boards, QueryKey::Board(id)];
        input
            .validate()
            .map_err(|e| self.reject(kind, Some(id), e, &[]))?;

        let response = self
            .remote
            .update_board(id, &input)
            .await
            .map_err(|e| self.reject(kind, Some(id), e, &keys))?;
        for key in keys {
            self.cache.invalidate(key);
        }

        info!(board_id = id, name = %input.name, "Board updated");
        self.emit(MutationEvent::committed(kind, id));
        Ok(response.unwrap_or(Board {
            id,
            name: input.name,
            tasks: None,
        }))
    }

    /// Delete a board and, on the service side, all of its tasks.
    pub async fn delete_board(&self, id: i64) -> MutationResult<()> {
        let kind = MutationKind::DeleteBoard;
        let keys = [QueryKey::Boards, QueryKey::Board(id)];

        self.remote
            .delete_board(id)
            .await
            .map_err(|e| self.reject(kind, Some(id), e, &keys))?;
        self.cache.remove(QueryKey::Board(id));
        self.cache.invalidate(QueryKey::Boards);
        self.cache.invalidate(QueryKey::Tasks);

        info!(board_id = id, "Board deleted");
        self.emit(MutationEvent::committed(kind, id));
        Ok(())
    }

    /// Restore every snapshot, newest hold first, then report.
    fn roll_back(
        &self,
        kind: MutationKind,
        id: Option<i64>,
        error: KanbanError,
        pending: Vec<PendingMutation>,
        keys: &[QueryKey],
    ) -> MutationError {
        for mutation in pending.into_iter().rev() {
            mutation.rollback();
        }
        let failure = self.fail(kind, id, error, keys);
        self.emit(MutationEvent::rolled_back(kind, id, failure.source.user_message()));
        failure
    }

    /// Report a mutation refused before anything was written to the cache.
    fn reject(
        &self,
        kind: MutationKind,
        id: Option<i64>,
        error: KanbanError,
        keys: &[QueryKey],
    ) -> MutationError {
        let failure = self.fail(kind, id, error, keys);
        self.emit(MutationEvent::failed(kind, id, failure.source.user_message()));
        failure
    }

    /// Log a failed mutation. A not-found target also invalidates `keys`
    /// so views resync with its absence.
    fn fail(
        &self,
        kind: MutationKind,
        id: Option<i64>,
        error: KanbanError,
        keys: &[QueryKey],
    ) -> MutationError {
        if error.is_not_found() {
            for key in keys {
                self.cache.invalidate(*key);
            }
        }

        let failure = MutationError::new(kind, error);
        warn!(operation = %kind, id = ?id, error = %failure.source, "Mutation failed");
        failure
    }

    fn emit(&self, event: MutationEvent) {
        let _ = self.events.send(event);
    }
}

fn still_creating(id: TaskId) -> KanbanError {
    KanbanError::Validation(format!("Task {} is still being created", id))
}

fn without_task(current: &CachedValue, id: TaskId) -> Option<CachedValue> {
    let tasks = current.as_tasks()?;
    if tasks.iter().all(|t| t.id != id) {
        return None;
    }
    Some(CachedValue::TaskList(
        tasks.iter().filter(|t| t.id != id).cloned().collect(),
    ))
}
