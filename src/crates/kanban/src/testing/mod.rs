//! Test infrastructure and helpers for the kanban crate
//!
//! This module provides:
//! - [`InMemoryTaskService`], an in-process task service with the same
//!   validation, not-found and cascade rules as the real one
//! - Failure injection and call gating for exercising races
//! - Test fixtures and sample data

use crate::error::{KanbanError, Result};
use crate::models::{Board, BoardInput, Task, TaskId, TaskInput};
use crate::remote::RemoteTaskService;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Service operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListTasks,
    GetTask,
    CreateTask,
    UpdateTask,
    DeleteTask,
    ListBoards,
    GetBoard,
    CreateBoard,
    UpdateBoard,
    DeleteBoard,
}

impl Operation {
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::ListTasks | Self::GetTask | Self::ListBoards | Self::GetBoard
        )
    }
}

/// A failure to inject into the next call of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// No response at all
    Network,
    /// Service rejected the input with this message
    Validation(String),
    /// Target does not exist
    NotFound,
    /// Service answered with this 5xx status
    Server(u16),
}

impl Failure {
    fn into_error(self, op: Operation) -> KanbanError {
        match self {
            Failure::Network => KanbanError::Network(format!("{:?}: connection refused", op)),
            Failure::Validation(msg) => KanbanError::Validation(msg),
            Failure::NotFound => KanbanError::NotFound("API Error: 404 Not Found".to_string()),
            Failure::Server(status) => KanbanError::Server {
                status,
                message: "Internal Server Error".to_string(),
            },
        }
    }
}

/// Holds one service call open until the test releases it.
#[derive(Clone)]
pub struct Gate {
    inner: Arc<GateInner>,
}

struct GateInner {
    entered: Semaphore,
    open: Semaphore,
}

impl Gate {
    fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                entered: Semaphore::new(0),
                open: Semaphore::new(0),
            }),
        }
    }

    async fn pass(&self) {
        self.inner.entered.add_permits(1);
        if let Ok(permit) = self.inner.open.acquire().await {
            permit.forget();
        }
    }

    /// Wait until the gated call has reached the service.
    pub async fn entered(&self) {
        if let Ok(permit) = self.inner.entered.acquire().await {
            permit.forget();
        }
    }

    /// Let the gated call proceed.
    pub fn open(&self) {
        self.inner.open.add_permits(1);
    }
}

struct Store {
    tasks: BTreeMap<i64, Task>,
    boards: BTreeMap<i64, String>,
    next_task_id: i64,
    next_board_id: i64,
}

/// In-process task service.
///
/// Reads take their snapshot when the call arrives, before any gate, so a
/// gated read returns data as of its start. That is the shape of a slow
/// refetch racing a mutation.
pub struct InMemoryTaskService {
    store: Mutex<Store>,
    failures: Mutex<HashMap<Operation, VecDeque<Failure>>>,
    gates: Mutex<HashMap<Operation, Gate>>,
    calls: Mutex<HashMap<Operation, usize>>,
    offline: AtomicBool,
    no_content_updates: AtomicBool,
}

impl InMemoryTaskService {
    /// Empty service with no boards.
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                tasks: BTreeMap::new(),
                boards: BTreeMap::new(),
                next_task_id: 1,
                next_board_id: 1,
            }),
            failures: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            no_content_updates: AtomicBool::new(false),
        }
    }

    /// Service with board 1 ("Default") already present.
    pub fn with_default_board() -> Self {
        let service = Self::new();
        service.seed_board("Default");
        service
    }

    /// Insert a board directly, bypassing gates and failures.
    pub fn seed_board(&self, name: &str) -> Board {
        let mut store = self.store.lock();
        let id = store.next_board_id;
        store.next_board_id += 1;
        store.boards.insert(id, name.to_string());
        Board {
            id,
            name: name.to_string(),
            tasks: None,
        }
    }

    /// Insert a task directly, bypassing gates, failures and validation.
    pub fn seed_task(&self, input: TaskInput) -> Task {
        let mut store = self.store.lock();
        let id = store.next_task_id;
        store.next_task_id += 1;
        let task = Task::optimistic(TaskId(id), &input);
        store.tasks.insert(id, task.clone());
        task
    }

    /// Everything `list_tasks` would return, ordered by id.
    pub fn tasks(&self) -> Vec<Task> {
        self.store.lock().tasks.values().cloned().collect()
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.store.lock().tasks.get(&id.0).cloned()
    }

    /// Make the next call of `op` fail. Failures queue up per operation.
    pub fn fail_next(&self, op: Operation, failure: Failure) {
        self.failures.lock().entry(op).or_default().push_back(failure);
    }

    /// Fail every call with a network error while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Answer updates without a body, as the production service does.
    pub fn respond_without_body_on_update(&self, enabled: bool) {
        self.no_content_updates.store(enabled, Ordering::SeqCst);
    }

    /// Hold the next call of `op` until [`Gate::open`].
    pub fn gate(&self, op: Operation) -> Gate {
        let gate = Gate::new();
        self.gates.lock().insert(op, gate.clone());
        gate
    }

    /// Number of calls made to `op`, including failed ones.
    pub fn calls(&self, op: Operation) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Total calls to mutating operations.
    pub fn mutation_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(op, _)| op.is_mutation())
            .map(|(_, count)| *count)
            .sum()
    }

    async fn checkpoint(&self, op: Operation) -> Result<()> {
        *self.calls.lock().entry(op).or_default() += 1;

        let gate = self.gates.lock().remove(&op);
        if let Some(gate) = gate {
            debug!(operation = ?op, "Call held at gate");
            gate.pass().await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(Failure::Network.into_error(op));
        }

        let failure = self.failures.lock().get_mut(&op).and_then(VecDeque::pop_front);
        match failure {
            Some(failure) => Err(failure.into_error(op)),
            None => Ok(()),
        }
    }

    fn board_with_tasks(store: &Store, id: i64, name: &str) -> Board {
        Board {
            id,
            name: name.to_string(),
            tasks: Some(
                store
                    .tasks
                    .values()
                    .filter(|t| t.board_id == id)
                    .cloned()
                    .collect(),
            ),
        }
    }
}

impl Default for InMemoryTaskService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteTaskService for InMemoryTaskService {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let snapshot = self.tasks();
        self.checkpoint(Operation::ListTasks).await?;
        Ok(snapshot)
    }

    async fn get_task(&self, id: TaskId) -> Result<Task> {
        let snapshot = self.task(id);
        self.checkpoint(Operation::GetTask).await?;
        snapshot.ok_or_else(|| KanbanError::NotFound(format!("Task {} not found", id)))
    }

    async fn create_task(&self, input: &TaskInput) -> Result<Task> {
        self.checkpoint(Operation::CreateTask).await?;
        input.validate()?;

        let mut store = self.store.lock();
        let id = store.next_task_id;
        store.next_task_id += 1;
        let task = Task::optimistic(TaskId(id), input);
        store.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: TaskId, input: &TaskInput) -> Result<Option<Task>> {
        self.checkpoint(Operation::UpdateTask).await?;
        input.validate()?;

        let mut store = self.store.lock();
        let task = store
            .tasks
            .get_mut(&id.0)
            .ok_or_else(|| KanbanError::NotFound(format!("Task {} not found", id)))?;
        *task = Task::optimistic(id, input);

        if self.no_content_updates.load(Ordering::SeqCst) {
            Ok(None)
        } else {
            Ok(Some(task.clone()))
        }
    }

    async fn delete_task(&self, id: TaskId) -> Result<()> {
        self.checkpoint(Operation::DeleteTask).await?;
        self.store
            .lock()
            .tasks
            .remove(&id.0)
            .map(|_| ())
            .ok_or_else(|| KanbanError::NotFound(format!("Task {} not found", id)))
    }

    async fn list_boards(&self) -> Result<Vec<Board>> {
        let snapshot: Vec<Board> = {
            let store = self.store.lock();
            store
                .boards
                .iter()
                .map(|(id, name)| Self::board_with_tasks(&store, *id, name))
                .collect()
        };
        self.checkpoint(Operation::ListBoards).await?;
        Ok(snapshot)
    }

    async fn get_board(&self, id: i64) -> Result<Board> {
        let snapshot = {
            let store = self.store.lock();
            store
                .boards
                .get(&id)
                .map(|name| Self::board_with_tasks(&store, id, name))
        };
        self.checkpoint(Operation::GetBoard).await?;
        snapshot.ok_or_else(|| KanbanError::NotFound(format!("Board {} not found", id)))
    }

    async fn create_board(&self, input: &BoardInput) -> Result<Board> {
        self.checkpoint(Operation::CreateBoard).await?;
        input.validate()?;
        Ok(self.seed_board(&input.name))
    }

    async fn update_board(&self, id: i64, input: &BoardInput) -> Result<Option<Board>> {
        self.checkpoint(Operation::UpdateBoard).await?;
        input.validate()?;
        let mut store = self.store.lock();
        let name = store
            .boards
            .get_mut(&id)
            .ok_or_else(|| KanbanError::NotFound(format!("Board {} not found", id)))?;
        *name = input.name.clone();
        Ok(None)
    }

    async fn delete_board(&self, id: i64) -> Result<()> {
        self.checkpoint(Operation::DeleteBoard).await?;
        let mut store = self.store.lock();
        if store.boards.remove(&id).is_none() {
            return Err(KanbanError::NotFound(format!("Board {} not found", id)));
        }
        store.tasks.retain(|_, task| task.board_id != id);
        Ok(())
    }
}

/// Test fixtures for common test scenarios
pub mod fixtures {
    use crate::models::{Task, TaskId, TaskInput, TaskPriority, TaskStatus};
    use chrono::NaiveDate;

    /// Create input for board 1 with default status and priority.
    pub fn task_input(title: &str) -> TaskInput {
        TaskInput::new(title, 1)
    }

    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
    }

    /// A server-side task on board 1.
    pub fn task(id: i64, title: &str, status: TaskStatus) -> Task {
        Task {
            id: TaskId(id),
            title: title.to_string(),
            description: None,
            status,
            priority: TaskPriority::Medium,
            due_date: None,
            board_id: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    #[tokio::test]
    async fn test_create_assigns_increasing_positive_ids() {
        let service = InMemoryTaskService::with_default_board();
        let a = service.create_task(&fixtures::task_input("a")).await.unwrap();
        let b = service.create_task(&fixtures::task_input("b")).await.unwrap();
        assert!(a.id.0 > 0);
        assert!(b.id.0 > a.id.0);
        assert_eq!(service.tasks().len(), 2);
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let service = InMemoryTaskService::new();
        let err = service
            .create_task(&TaskInput::new("", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, KanbanError::Validation(_)));

        let err = service
            .create_task(&TaskInput::new("ok", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, KanbanError::Validation(_)));
        assert!(service.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_ids_are_not_found() {
        let service = InMemoryTaskService::new();
        let input = fixtures::task_input("x");
        assert!(service.update_task(TaskId(99), &input).await.unwrap_err().is_not_found());
        assert!(service.delete_task(TaskId(99)).await.unwrap_err().is_not_found());
        assert!(service.get_task(TaskId(99)).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_without_body() {
        let service = InMemoryTaskService::new();
        let task = service.seed_task(fixtures::task_input("x"));
        service.respond_without_body_on_update(true);

        let input = TaskInput::from(&task).with_status(TaskStatus::Done);
        let response = service.update_task(task.id, &input).await.unwrap();
        assert!(response.is_none());
        assert_eq!(service.task(task.id).unwrap().status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_delete_board_cascades_to_tasks() {
        let service = InMemoryTaskService::with_default_board();
        let other = service.seed_board("Other");
        service.seed_task(fixtures::task_input("on default"));
        service.seed_task(TaskInput::new("on other", other.id));

        service.delete_board(1).await.unwrap();

        let remaining = service.tasks();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].board_id, other.id);
        assert_eq!(service.list_boards().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let service = InMemoryTaskService::new();
        service.fail_next(Operation::ListTasks, Failure::Server(503));

        assert!(service.list_tasks().await.is_err());
        assert!(service.list_tasks().await.is_ok());
        assert_eq!(service.calls(Operation::ListTasks), 2);
    }

    #[tokio::test]
    async fn test_offline_fails_everything_with_network_errors() {
        let service = InMemoryTaskService::new();
        service.set_offline(true);
        let err = service.create_task(&fixtures::task_input("x")).await.unwrap_err();
        assert!(matches!(err, KanbanError::Network(_)));
        assert_eq!(service.mutation_calls(), 1);

        service.set_offline(false);
        assert!(service.create_task(&fixtures::task_input("x")).await.is_ok());
    }

    #[tokio::test]
    async fn test_gated_read_returns_snapshot_from_call_start() {
        let service = Arc::new(InMemoryTaskService::new());
        let task = service.seed_task(fixtures::task_input("x"));
        let gate = service.gate(Operation::ListTasks);

        let reader = {
            let service = service.clone();
            tokio::spawn(async move { service.list_tasks().await })
        };
        gate.entered().await;

        let input = TaskInput::from(&task).with_status(TaskStatus::Done);
        service.update_task(task.id, &input).await.unwrap();
        gate.open();

        let listed = reader.await.unwrap().unwrap();
        assert_eq!(listed[0].status, TaskStatus::Todo);
        assert_eq!(service.task(task.id).unwrap().status, TaskStatus::Done);
    }
}
