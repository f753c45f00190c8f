//! Task cache
//!
//! An in-memory keyed store of the last known server data. Views read it
//! without blocking and subscribe to changes; the mutation coordinator is
//! the only writer of optimistic state.
//!
//! Background refetches are tracked per key with an epoch. Cancelling a
//! refetch bumps the epoch and aborts the task, and any fetch result
//! carrying an older epoch is dropped instead of written. A key held by an
//! in-flight mutation never accepts a fetch result; an invalidation that
//! arrives while the key is held is deferred until the last hold is
//! released.

use crate::error::{KanbanError, Result};
use crate::models::{Board, Task, TaskId};
use crate::remote::RemoteTaskService;
use crate::retry::{with_retry, RetryConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Cache key. Root keys hold lists; item keys hold single records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Tasks,
    Task(TaskId),
    Boards,
    Board(i64),
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Tasks => write!(f, "[\"tasks\"]"),
            QueryKey::Task(id) => write!(f, "[\"tasks\", {}]", id),
            QueryKey::Boards => write!(f, "[\"boards\"]"),
            QueryKey::Board(id) => write!(f, "[\"boards\", {}]", id),
        }
    }
}

/// A cached value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    TaskList(Vec<Task>),
    Task(Task),
    BoardList(Vec<Board>),
    Board(Board),
}

impl CachedValue {
    pub fn as_tasks(&self) -> Option<&[Task]> {
        match self {
            CachedValue::TaskList(tasks) => Some(tasks),
            _ => None,
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            CachedValue::Task(task) => Some(task),
            _ => None,
        }
    }

    pub fn as_boards(&self) -> Option<&[Board]> {
        match self {
            CachedValue::BoardList(boards) => Some(boards),
            _ => None,
        }
    }

    pub fn as_board(&self) -> Option<&Board> {
        match self {
            CachedValue::Board(board) => Some(board),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    /// New value stored (fetch, optimistic apply, commit or rollback)
    Written,
    /// Marked stale; data kept
    Invalidated,
    /// Entry dropped
    Removed,
}

/// Change notification for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEvent {
    pub key: QueryKey,
    pub kind: CacheEventKind,
}

/// Cache tuning.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Age after which an entry counts as stale
    pub stale_time: Duration,
    /// Polling period used by long-running views
    pub refetch_interval: Duration,
    /// Retry policy for reads
    pub retry: RetryConfig,
    /// Broadcast buffer size for change events
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(30),
            refetch_interval: Duration::from_secs(15),
            retry: RetryConfig::default(),
            event_capacity: 256,
        }
    }
}

struct CacheEntry {
    value: CachedValue,
    updated_at: Instant,
    invalidated: bool,
}

#[derive(Default)]
struct KeyState {
    subscribers: usize,
    holds: usize,
    epoch: u64,
    generation: u64,
    refetch: Option<JoinHandle<()>>,
    refetch_pending: bool,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, CacheEntry>,
    keys: HashMap<QueryKey, KeyState>,
    polling: Vec<JoinHandle<()>>,
    closed: bool,
}

struct CacheInner {
    state: Mutex<CacheState>,
    events: broadcast::Sender<CacheEvent>,
    remote: Arc<dyn RemoteTaskService>,
    config: CacheConfig,
}

/// Shared handle to the task cache. Clones share the same store.
#[derive(Clone)]
pub struct TaskCache {
    inner: Arc<CacheInner>,
}

impl TaskCache {
    pub fn new(remote: Arc<dyn RemoteTaskService>, config: CacheConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
                events,
                remote,
                config,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// The service this cache loads from.
    pub fn remote(&self) -> Arc<dyn RemoteTaskService> {
        self.inner.remote.clone()
    }

    /// Last known value for `key`, stale or not.
    pub fn read(&self, key: QueryKey) -> Option<CachedValue> {
        self.inner
            .state
            .lock()
            .entries
            .get(&key)
            .map(|entry| entry.value.clone())
    }

    /// Last known task list.
    pub fn read_tasks(&self) -> Option<Vec<Task>> {
        match self.read(QueryKey::Tasks)? {
            CachedValue::TaskList(tasks) => Some(tasks),
            _ => None,
        }
    }

    /// Find a task in the cached list, falling back to its own entry.
    pub fn find_task(&self, id: TaskId) -> Option<Task> {
        let state = self.inner.state.lock();
        let from_list = state
            .entries
            .get(&QueryKey::Tasks)
            .and_then(|entry| entry.value.as_tasks())
            .and_then(|tasks| tasks.iter().find(|t| t.id == id))
            .cloned();
        from_list.or_else(|| {
            state
                .entries
                .get(&QueryKey::Task(id))
                .and_then(|entry| entry.value.as_task())
                .cloned()
        })
    }

    pub fn contains(&self, key: QueryKey) -> bool {
        self.inner.state.lock().entries.contains_key(&key)
    }

    /// True when absent, invalidated, or older than the stale time.
    pub fn is_stale(&self, key: QueryKey) -> bool {
        match self.inner.state.lock().entries.get(&key) {
            None => true,
            Some(entry) => {
                entry.invalidated || entry.updated_at.elapsed() >= self.inner.config.stale_time
            }
        }
    }

    /// Replace the value for `key` and mark it fresh.
    pub fn write(&self, key: QueryKey, value: CachedValue) {
        Self::store(&mut self.inner.state.lock(), key, value);
        self.notify(key, CacheEventKind::Written);
    }

    /// Drop the entry for `key`.
    pub fn remove(&self, key: QueryKey) {
        let removed = {
            let mut state = self.inner.state.lock();
            state.keys.entry(key).or_default().generation += 1;
            state.entries.remove(&key).is_some()
        };
        if removed {
            self.notify(key, CacheEventKind::Removed);
        }
    }

    /// Mark `key` stale, keeping its data. Refetches in the background if
    /// anyone is subscribed to the key.
    pub fn invalidate(&self, key: QueryKey) {
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if let Some(entry) = state.entries.get_mut(&key) {
                entry.invalidated = true;
            }
            let watched = state
                .keys
                .get(&key)
                .map(|ks| ks.subscribers > 0)
                .unwrap_or(false);
            if watched {
                self.request_refetch(state, key);
            }
        }
        debug!(key = %key, "Invalidated");
        self.notify(key, CacheEventKind::Invalidated);
    }

    /// Start a background refetch of `key` unless one is already running.
    pub fn refresh(&self, key: QueryKey) {
        let mut guard = self.inner.state.lock();
        let in_flight = guard
            .keys
            .get(&key)
            .and_then(|ks| ks.refetch.as_ref())
            .map(|handle| !handle.is_finished())
            .unwrap_or(false);
        if !in_flight {
            self.request_refetch(&mut guard, key);
        }
    }

    /// Cancel any in-flight refetch of `key`. A result that still arrives
    /// is discarded.
    pub fn cancel_refetch(&self, key: QueryKey) {
        let mut guard = self.inner.state.lock();
        Self::cancel_locked(guard.keys.entry(key).or_default(), key);
    }

    /// Subscribe to changes of `key`. The subscription counts as an active
    /// view of the key until dropped.
    pub fn subscribe(&self, key: QueryKey) -> Subscription {
        let receiver = self.inner.events.subscribe();
        self.inner.state.lock().keys.entry(key).or_default().subscribers += 1;
        Subscription {
            cache: self.clone(),
            key,
            receiver,
        }
    }

    /// Raw event stream for every key. Does not count as a subscriber.
    pub fn events(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    pub fn subscriber_count(&self, key: QueryKey) -> usize {
        self.inner
            .state
            .lock()
            .keys
            .get(&key)
            .map(|ks| ks.subscribers)
            .unwrap_or(0)
    }

    /// Load `key` from the service now, retrying transient failures.
    ///
    /// If the key was cancelled or taken by a mutation while loading, the
    /// result is not stored and the current cached value is returned.
    pub async fn fetch(&self, key: QueryKey) -> Result<CachedValue> {
        let epoch = self.current_epoch(key);
        let value = self.load(key).await?;
        if self.commit_fetch(key, epoch, value.clone()) {
            Ok(value)
        } else {
            Ok(self.read(key).unwrap_or(value))
        }
    }

    /// Stale-while-revalidate read: cached data is returned at once and
    /// refreshed in the background when stale; absent data is fetched.
    pub async fn ensure(&self, key: QueryKey) -> Result<CachedValue> {
        if let Some(value) = self.read(key) {
            if self.is_stale(key) {
                self.refresh(key);
            }
            return Ok(value);
        }
        self.fetch(key).await
    }

    /// Start an optimistic mutation on `key`.
    ///
    /// In one critical section: takes a hold on the key, cancels its
    /// refetch, snapshots the current value and writes `apply`'s result.
    /// `apply` is not called for an absent entry; returning `None` leaves
    /// the entry untouched.
    pub fn begin_mutation<F>(&self, key: QueryKey, apply: F) -> PendingMutation
    where
        F: FnOnce(&CachedValue) -> Option<CachedValue>,
    {
        let (snapshot, applied, generation) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let ks = state.keys.entry(key).or_default();
            ks.holds += 1;
            Self::cancel_locked(ks, key);

            let snapshot = state.entries.get(&key).map(|entry| entry.value.clone());
            let next = snapshot.as_ref().and_then(apply);
            let applied = next.is_some();
            if let Some(value) = next {
                Self::store(state, key, value);
            }
            (snapshot, applied, Self::generation_locked(state, key))
        };

        debug!(key = %key, applied, "Snapshot taken");
        if applied {
            self.notify(key, CacheEventKind::Written);
        }

        PendingMutation {
            cache: self.clone(),
            key,
            snapshot,
            generation,
            settled: false,
        }
    }

    /// Put `key` back to exactly `snapshot`. Restoring twice is the same as
    /// restoring once.
    pub fn restore(&self, key: QueryKey, snapshot: Option<CachedValue>) {
        match snapshot {
            Some(value) => self.write(key, value),
            None => self.remove(key),
        }
    }

    /// Invalidate `key` every `interval` until the returned handle is
    /// aborted or the cache shuts down. Must be called inside a runtime.
    pub fn spawn_polling(&self, key: QueryKey, interval: Duration) -> Option<AbortHandle> {
        if interval.is_zero() || self.is_closed() {
            return None;
        }

        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                TaskCache { inner }.invalidate(key);
            }
        });

        debug!(key = %key, interval_ms = interval.as_millis() as u64, "Polling started");
        let abort = handle.abort_handle();
        self.inner.state.lock().polling.push(handle);
        Some(abort)
    }

    /// End of the cache lifecycle: abort every refetch and poller. Cached
    /// data stays readable.
    pub fn shutdown(&self) {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        if state.closed {
            return;
        }
        state.closed = true;

        for (key, ks) in state.keys.iter_mut() {
            ks.refetch_pending = false;
            Self::cancel_locked(ks, *key);
        }
        for handle in state.polling.drain(..) {
            handle.abort();
        }
        info!("Task cache shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    fn store(state: &mut CacheState, key: QueryKey, value: CachedValue) {
        state.keys.entry(key).or_default().generation += 1;
        state.entries.insert(
            key,
            CacheEntry {
                value,
                updated_at: Instant::now(),
                invalidated: false,
            },
        );
    }

    fn notify(&self, key: QueryKey, kind: CacheEventKind) {
        // No receivers is fine
        let _ = self.inner.events.send(CacheEvent { key, kind });
    }

    fn generation_locked(state: &CacheState, key: QueryKey) -> u64 {
        state.keys.get(&key).map(|ks| ks.generation).unwrap_or(0)
    }

    fn generation(&self, key: QueryKey) -> u64 {
        Self::generation_locked(&self.inner.state.lock(), key)
    }

    fn current_epoch(&self, key: QueryKey) -> u64 {
        self.inner
            .state
            .lock()
            .keys
            .get(&key)
            .map(|ks| ks.epoch)
            .unwrap_or(0)
    }

    fn cancel_locked(ks: &mut KeyState, key: QueryKey) {
        ks.epoch += 1;
        if let Some(handle) = ks.refetch.take() {
            handle.abort();
            debug!(key = %key, epoch = ks.epoch, "Cancelled in-flight refetch");
        }
    }

    fn request_refetch(&self, state: &mut CacheState, key: QueryKey) {
        if state.closed {
            return;
        }
        let ks = state.keys.entry(key).or_default();
        if ks.holds > 0 {
            ks.refetch_pending = true;
            debug!(key = %key, holds = ks.holds, "Refetch deferred until mutations settle");
            return;
        }
        self.spawn_refetch(ks, key);
    }

    fn spawn_refetch(&self, ks: &mut KeyState, key: QueryKey) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                debug!(key = %key, "No runtime, refetch skipped");
                return;
            }
        };

        ks.refetch_pending = false;
        if let Some(handle) = ks.refetch.take() {
            handle.abort();
        }
        ks.epoch += 1;
        let epoch = ks.epoch;

        let cache = self.clone();
        ks.refetch = Some(runtime.spawn(async move {
            cache.run_refetch(key, epoch).await;
        }));
        debug!(key = %key, epoch, "Background refetch started");
    }

    async fn run_refetch(self, key: QueryKey, epoch: u64) {
        match self.load(key).await {
            Ok(value) => {
                self.commit_fetch(key, epoch, value);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Background refetch failed, keeping cached data");
                if let Some(ks) = self.inner.state.lock().keys.get_mut(&key) {
                    if ks.epoch == epoch {
                        ks.refetch = None;
                    }
                }
            }
        }
    }

    /// Store a fetch result unless it has been superseded.
    fn commit_fetch(&self, key: QueryKey, epoch: u64, value: CachedValue) -> bool {
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let ks = state.keys.entry(key).or_default();
            if ks.epoch != epoch || ks.holds > 0 {
                debug!(
                    key = %key,
                    epoch,
                    current_epoch = ks.epoch,
                    holds = ks.holds,
                    "Discarding superseded fetch result"
                );
                return false;
            }
            ks.refetch = None;
            Self::store(state, key, value);
        }
        self.notify(key, CacheEventKind::Written);
        true
    }

    async fn load(&self, key: QueryKey) -> Result<CachedValue> {
        let remote = self.inner.remote.clone();
        let label = key.to_string();
        let result = with_retry(
            &self.inner.config.retry,
            &label,
            KanbanError::is_retryable,
            || {
                let remote = remote.clone();
                async move { load_once(remote.as_ref(), key).await }
            },
        )
        .await;

        result.map_err(|e| {
            if e.last_error.is_retryable() {
                KanbanError::TransientRead {
                    attempts: e.attempts,
                    message: e.last_error.user_message(),
                }
            } else {
                e.last_error
            }
        })
    }

    /// Apply `reconcile` to the current value of `key` and store the result.
    fn reconcile<F>(&self, key: QueryKey, reconcile: F)
    where
        F: FnOnce(&CachedValue) -> Option<CachedValue>,
    {
        let changed = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            match state.entries.get(&key).and_then(|entry| reconcile(&entry.value)) {
                Some(value) => {
                    Self::store(state, key, value);
                    true
                }
                None => false,
            }
        };
        if changed {
            self.notify(key, CacheEventKind::Written);
        }
    }

    fn release(&self, key: QueryKey) {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let closed = state.closed;
        if let Some(ks) = state.keys.get_mut(&key) {
            ks.holds = ks.holds.saturating_sub(1);
            if ks.holds == 0 && ks.refetch_pending && !closed {
                self.spawn_refetch(ks, key);
            }
        }
    }

    fn unsubscribe(&self, key: QueryKey) {
        if let Some(ks) = self.inner.state.lock().keys.get_mut(&key) {
            ks.subscribers = ks.subscribers.saturating_sub(1);
        }
    }
}

impl fmt::Debug for TaskCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TaskCache")
            .field("entries", &state.entries.len())
            .field("closed", &state.closed)
            .finish()
    }
}

async fn load_once(remote: &dyn RemoteTaskService, key: QueryKey) -> Result<CachedValue> {
    Ok(match key {
        QueryKey::Tasks => CachedValue::TaskList(remote.list_tasks().await?),
        QueryKey::Task(id) => CachedValue::Task(remote.get_task(id).await?),
        QueryKey::Boards => CachedValue::BoardList(remote.list_boards().await?),
        QueryKey::Board(id) => CachedValue::Board(remote.get_board(id).await?),
    })
}

/// Active view of one key. Dropping it unsubscribes.
pub struct Subscription {
    cache: TaskCache,
    key: QueryKey,
    receiver: broadcast::Receiver<CacheEvent>,
}

impl Subscription {
    pub fn key(&self) -> QueryKey {
        self.key
    }

    /// Current value of the subscribed key.
    pub fn current(&self) -> Option<CachedValue> {
        self.cache.read(self.key)
    }

    /// Wait for the next change to the subscribed key.
    ///
    /// If events were dropped because this subscriber lagged, reports a
    /// write so the caller re-reads.
    pub async fn changed(&mut self) -> Option<CacheEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.key == self.key => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(key = %self.key, skipped, "Subscriber lagged");
                    return Some(CacheEvent {
                        key: self.key,
                        kind: CacheEventKind::Written,
                    });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cache.unsubscribe(self.key);
    }
}

/// A mutation in flight on one key.
///
/// Holds the key (no fetch result is accepted) and the rollback snapshot
/// until settled with [`commit`](Self::commit),
/// [`commit_removal`](Self::commit_removal) or
/// [`rollback`](Self::rollback). Dropping it unsettled rolls back and
/// invalidates the key.
#[must_use = "a pending mutation must be committed or rolled back"]
pub struct PendingMutation {
    cache: TaskCache,
    key: QueryKey,
    snapshot: Option<CachedValue>,
    generation: u64,
    settled: bool,
}

impl PendingMutation {
    pub fn key(&self) -> QueryKey {
        self.key
    }

    /// Value of the key before the optimistic apply.
    pub fn snapshot(&self) -> Option<&CachedValue> {
        self.snapshot.as_ref()
    }

    /// Settle with server data. `reconcile` maps the key's current value
    /// (which may include later optimistic writes) to the committed one.
    pub fn commit<F>(mut self, reconcile: F)
    where
        F: FnOnce(&CachedValue) -> Option<CachedValue>,
    {
        self.cache.reconcile(self.key, reconcile);
        self.settled = true;
    }

    /// Settle by dropping the key's entry.
    pub fn commit_removal(mut self) {
        self.cache.remove(self.key);
        self.settled = true;
    }

    /// Restore the snapshot.
    ///
    /// If another writer touched the key after the optimistic apply, its
    /// changes are lost with the restore, so the key is also invalidated
    /// and refetched whether or not anyone is subscribed. The refetch
    /// starts once the last hold on the key is released.
    pub fn rollback(mut self) {
        let interleaved = self.cache.generation(self.key) != self.generation;
        debug!(key = %self.key, interleaved, "Restoring snapshot");
        self.cache.restore(self.key, self.snapshot.take());
        if interleaved {
            self.cache.invalidate(self.key);
            self.cache.refresh(self.key);
        }
        self.settled = true;
    }
}

impl Drop for PendingMutation {
    fn drop(&mut self) {
        if self.settled {
            self.cache.release(self.key);
            return;
        }

        warn!(key = %self.key, "Mutation dropped before settlement, restoring snapshot");
        self.cache.restore(self.key, self.snapshot.take());
        self.cache.release(self.key);
        self.cache.invalidate(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::testing::{fixtures, Failure, InMemoryTaskService, Operation};

    fn config() -> CacheConfig {
        CacheConfig {
            retry: RetryConfig::new(2, Duration::ZERO, Duration::ZERO, 2.0),
            ..CacheConfig::default()
        }
    }

    fn setup() -> (Arc<InMemoryTaskService>, TaskCache) {
        let service = Arc::new(InMemoryTaskService::with_default_board());
        let cache = TaskCache::new(service.clone(), config());
        (service, cache)
    }

    fn list(tasks: &[Task]) -> CachedValue {
        CachedValue::TaskList(tasks.to_vec())
    }

    async fn wait_for(sub: &mut Subscription, kind: CacheEventKind) {
        loop {
            let event = sub.changed().await.expect("cache alive");
            if event.kind == kind {
                return;
            }
        }
    }

    #[test]
    fn test_query_key_display() {
        assert_eq!(QueryKey::Tasks.to_string(), r#"["tasks"]"#);
        assert_eq!(QueryKey::Task(TaskId(5)).to_string(), r#"["tasks", 5]"#);
        assert_eq!(QueryKey::Board(2).to_string(), r#"["boards", 2]"#);
    }

    #[tokio::test]
    async fn test_write_notifies_subscribers() {
        let (_, cache) = setup();
        let mut sub = cache.subscribe(QueryKey::Tasks);
        assert_eq!(cache.subscriber_count(QueryKey::Tasks), 1);

        let task = fixtures::task(1, "a", TaskStatus::Todo);
        cache.write(QueryKey::Tasks, list(&[task.clone()]));

        let event = sub.changed().await.unwrap();
        assert_eq!(event.kind, CacheEventKind::Written);
        assert_eq!(cache.read_tasks().unwrap(), vec![task]);
        assert!(!cache.is_stale(QueryKey::Tasks));

        drop(sub);
        assert_eq!(cache.subscriber_count(QueryKey::Tasks), 0);
    }

    #[tokio::test]
    async fn test_invalidate_without_subscribers_keeps_data() {
        let (service, cache) = setup();
        let task = fixtures::task(1, "a", TaskStatus::Todo);
        cache.write(QueryKey::Tasks, list(&[task.clone()]));

        cache.invalidate(QueryKey::Tasks);
        tokio::task::yield_now().await;

        assert!(cache.is_stale(QueryKey::Tasks));
        assert_eq!(cache.read_tasks().unwrap(), vec![task]);
        assert_eq!(service.calls(Operation::ListTasks), 0);
    }

    #[tokio::test]
    async fn test_invalidate_refetches_for_subscribers() {
        let (service, cache) = setup();
        let seeded = service.seed_task(fixtures::task_input("from server"));
        cache.write(QueryKey::Tasks, list(&[]));

        let mut sub = cache.subscribe(QueryKey::Tasks);
        cache.invalidate(QueryKey::Tasks);
        wait_for(&mut sub, CacheEventKind::Written).await;

        assert_eq!(cache.read_tasks().unwrap(), vec![seeded]);
        assert!(!cache.is_stale(QueryKey::Tasks));
    }

    #[tokio::test]
    async fn test_root_and_item_keys_are_independent() {
        let (_, cache) = setup();
        let task = fixtures::task(1, "a", TaskStatus::Todo);
        cache.write(QueryKey::Tasks, list(&[task.clone()]));
        cache.write(QueryKey::Task(task.id), CachedValue::Task(task.clone()));

        cache.invalidate(QueryKey::Tasks);
        assert!(cache.is_stale(QueryKey::Tasks));
        assert!(!cache.is_stale(QueryKey::Task(task.id)));

        cache.write(QueryKey::Tasks, list(&[task.clone()]));
        cache.invalidate(QueryKey::Task(task.id));
        assert!(!cache.is_stale(QueryKey::Tasks));
        assert!(cache.is_stale(QueryKey::Task(task.id)));
    }

    #[tokio::test]
    async fn test_rollback_restores_exact_snapshot() {
        let (_, cache) = setup();
        let original = list(&[fixtures::task(1, "a", TaskStatus::Todo)]);
        cache.write(QueryKey::Tasks, original.clone());

        let pending = cache.begin_mutation(QueryKey::Tasks, |current| {
            let mut tasks = current.as_tasks()?.to_vec();
            tasks.push(fixtures::task(-1, "b", TaskStatus::Todo));
            Some(CachedValue::TaskList(tasks))
        });
        assert_eq!(cache.read_tasks().unwrap().len(), 2);
        assert_eq!(pending.snapshot(), Some(&original));

        pending.rollback();
        assert_eq!(cache.read(QueryKey::Tasks), Some(original.clone()));

        cache.restore(QueryKey::Tasks, Some(original.clone()));
        cache.restore(QueryKey::Tasks, Some(original.clone()));
        assert_eq!(cache.read(QueryKey::Tasks), Some(original));
    }

    #[tokio::test]
    async fn test_rollback_after_interleaved_write_invalidates() {
        let (_, cache) = setup();
        let original = list(&[fixtures::task(1, "a", TaskStatus::Todo)]);
        cache.write(QueryKey::Tasks, original.clone());

        let first = cache.begin_mutation(QueryKey::Tasks, |_| Some(list(&[])));
        let second = cache.begin_mutation(QueryKey::Tasks, |_| {
            Some(list(&[fixtures::task(1, "a", TaskStatus::Done)]))
        });
        second.commit(|current| Some(current.clone()));
        assert!(!cache.is_stale(QueryKey::Tasks));

        first.rollback();
        assert_eq!(cache.read(QueryKey::Tasks), Some(original));
        assert!(cache.is_stale(QueryKey::Tasks));
    }

    #[tokio::test]
    async fn test_rollback_after_interleaved_write_refetches_unwatched_key() {
        let (service, cache) = setup();
        let seeded = service.seed_task(fixtures::task_input("on server"));
        cache.write(QueryKey::Tasks, list(&[]));
        assert_eq!(cache.subscriber_count(QueryKey::Tasks), 0);

        let first = cache.begin_mutation(QueryKey::Tasks, |_| Some(list(&[])));
        let second = cache.begin_mutation(QueryKey::Tasks, |_| Some(list(&[seeded.clone()])));
        second.commit(|current| Some(current.clone()));

        let mut events = cache.events();
        first.rollback();
        assert_eq!(cache.read_tasks(), Some(vec![]));

        tokio::time::timeout(Duration::from_secs(5), async {
            while cache.read_tasks() != Some(vec![seeded.clone()]) {
                events.recv().await.expect("cache alive");
            }
        })
        .await
        .expect("refetch after interleaved rollback");
        assert!(!cache.is_stale(QueryKey::Tasks));
    }

    #[tokio::test]
    async fn test_mutation_on_absent_key_applies_nothing() {
        let (_, cache) = setup();
        let pending = cache.begin_mutation(QueryKey::Tasks, |_| {
            panic!("apply must not run for an absent entry")
        });
        assert!(pending.snapshot().is_none());
        pending.rollback();
        assert!(cache.read(QueryKey::Tasks).is_none());
    }

    #[tokio::test]
    async fn test_dropped_mutation_rolls_back() {
        let (_, cache) = setup();
        let original = list(&[fixtures::task(1, "a", TaskStatus::Todo)]);
        cache.write(QueryKey::Tasks, original.clone());

        let pending = cache.begin_mutation(QueryKey::Tasks, |_| Some(CachedValue::TaskList(vec![])));
        drop(pending);

        assert_eq!(cache.read(QueryKey::Tasks), Some(original));
        assert!(cache.is_stale(QueryKey::Tasks));
    }

    #[tokio::test]
    async fn test_hold_defers_refetch_until_release() {
        let (service, cache) = setup();
        service.seed_task(fixtures::task_input("server"));
        cache.write(QueryKey::Tasks, list(&[]));
        let mut sub = cache.subscribe(QueryKey::Tasks);

        let pending = cache.begin_mutation(QueryKey::Tasks, |_| None);
        cache.invalidate(QueryKey::Tasks);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(service.calls(Operation::ListTasks), 0);

        pending.commit(|_| None);
        wait_for(&mut sub, CacheEventKind::Written).await;
        assert_eq!(service.calls(Operation::ListTasks), 1);
        assert_eq!(cache.read_tasks().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_result_is_discarded() {
        let (service, cache) = setup();
        service.seed_task(fixtures::task_input("stale server copy"));
        let gate = service.gate(Operation::ListTasks);

        let fetcher = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.fetch(QueryKey::Tasks).await })
        };
        gate.entered().await;

        let newer = list(&[fixtures::task(1, "newer", TaskStatus::Done)]);
        cache.write(QueryKey::Tasks, newer.clone());
        cache.cancel_refetch(QueryKey::Tasks);
        gate.open();

        let returned = fetcher.await.unwrap().unwrap();
        assert_eq!(returned, newer);
        assert_eq!(cache.read(QueryKey::Tasks), Some(newer));
    }

    #[tokio::test]
    async fn test_fetch_retries_transient_failures() {
        let (service, cache) = setup();
        service.fail_next(Operation::ListTasks, Failure::Network);
        service.fail_next(Operation::ListTasks, Failure::Server(503));

        let value = cache.fetch(QueryKey::Tasks).await.unwrap();
        assert_eq!(value, CachedValue::TaskList(vec![]));
        assert_eq!(service.calls(Operation::ListTasks), 3);
    }

    #[tokio::test]
    async fn test_fetch_gives_up_with_transient_read_error() {
        let (service, cache) = setup();
        for _ in 0..3 {
            service.fail_next(Operation::ListTasks, Failure::Network);
        }

        let err = cache.fetch(QueryKey::Tasks).await.unwrap_err();
        assert!(matches!(err, KanbanError::TransientRead { attempts: 3, .. }));
        assert!(cache.read(QueryKey::Tasks).is_none());
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_not_retried() {
        let (service, cache) = setup();
        let err = cache.fetch(QueryKey::Task(TaskId(42))).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(service.calls(Operation::GetTask), 1);
    }

    #[tokio::test]
    async fn test_ensure_serves_fresh_data_without_fetching() {
        let (service, cache) = setup();
        cache.write(QueryKey::Tasks, list(&[]));
        cache.ensure(QueryKey::Tasks).await.unwrap();
        assert_eq!(service.calls(Operation::ListTasks), 0);

        cache.write(QueryKey::Boards, CachedValue::BoardList(vec![]));
        cache.remove(QueryKey::Boards);
        let boards = cache.ensure(QueryKey::Boards).await.unwrap();
        assert_eq!(boards.as_boards().unwrap().len(), 1);
        assert_eq!(service.calls(Operation::ListBoards), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_polling() {
        let (service, cache) = setup();
        cache.write(QueryKey::Tasks, list(&[]));
        let mut sub = cache.subscribe(QueryKey::Tasks);

        assert!(cache.spawn_polling(QueryKey::Tasks, Duration::from_secs(1)).is_some());
        wait_for(&mut sub, CacheEventKind::Invalidated).await;

        cache.shutdown();
        assert!(cache.is_closed());
        let before = service.calls(Operation::ListTasks);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(service.calls(Operation::ListTasks), before);
        assert!(cache.spawn_polling(QueryKey::Tasks, Duration::from_secs(1)).is_none());
    }
}
