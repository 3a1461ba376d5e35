//! Polling reconciliation between the local store and the server.
//!
//! There is no push channel and no operation log: each sync fetches the whole
//! collection and, if it differs from what we hold, replaces ours with it.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, info, warn};

use crate::error::BoardError;
use crate::model::{Task, TaskId};
use crate::store::TaskStore;
use crate::worker::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Disabled,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Disabled => "disabled",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Timer,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    /// Caller should fetch now and hand the result to [`SyncCoordinator::complete`].
    Started,
    /// A fetch is already in flight; a manual request was queued behind it.
    Coalesced,
    /// Nothing to do (timer tick while disabled or mid-fetch).
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Server state differed; the store now holds exactly what was fetched.
    Replaced { tasks: usize },
    Unchanged,
    Failed(String),
}

#[derive(Debug)]
pub struct SyncCoordinator {
    state: SyncState,
    interval: Duration,
    next_due: Option<Instant>,
    follow_up: bool,
    last_error: Option<String>,
}

impl SyncCoordinator {
    /// A zero interval starts the coordinator disabled.
    pub fn new(interval: Duration, now: Instant) -> Self {
        let mut sync = Self {
            state: SyncState::Idle,
            interval,
            next_due: None,
            follow_up: false,
            last_error: None,
        };
        sync.rest(now);
        sync
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Change the polling interval. Zero disables polling; anything else
    /// (re)starts the timer from `now`. A fetch in flight is left alone and
    /// picks up the new interval when it completes.
    pub fn set_interval(&mut self, interval: Duration, now: Instant) {
        self.interval = interval;
        if self.state != SyncState::Syncing {
            self.rest(now);
        }
    }

    /// Ask for a sync as soon as possible, e.g. after a failed write.
    pub fn request(&mut self) {
        self.follow_up = true;
    }

    /// The trigger to fire at `now`, if any.
    pub fn due(&self, now: Instant) -> Option<Trigger> {
        match self.state {
            SyncState::Syncing => None,
            _ if self.follow_up => Some(Trigger::Manual),
            SyncState::Idle if self.next_due.is_some_and(|due| now >= due) => Some(Trigger::Timer),
            _ => None,
        }
    }

    pub fn begin(&mut self, trigger: Trigger) -> Begin {
        match (self.state, trigger) {
            (SyncState::Syncing, Trigger::Manual) => {
                self.follow_up = true;
                Begin::Coalesced
            }
            (SyncState::Syncing, Trigger::Timer) | (SyncState::Disabled, Trigger::Timer) => {
                Begin::Skipped
            }
            (SyncState::Idle, _) | (SyncState::Disabled, Trigger::Manual) => {
                self.state = SyncState::Syncing;
                self.follow_up = false;
                Begin::Started
            }
        }
    }

    /// Finish the fetch started by [`begin`](Self::begin).
    ///
    /// On success the store is replaced only if the fetched collection differs
    /// by value from what it holds. On failure the store is left untouched.
    pub fn complete(
        &mut self,
        fetched: Result<Vec<Task>>,
        store: &mut TaskStore,
        now: Instant,
    ) -> SyncEvent {
        self.rest(now);
        match fetched {
            Ok(tasks) => {
                self.last_error = None;
                if same_collection(store.snapshot(), &tasks) {
                    debug!("sync: {} tasks, no changes", tasks.len());
                    SyncEvent::Unchanged
                } else {
                    let count = tasks.len();
                    store.load(tasks);
                    info!("sync: replaced local board with {count} tasks from server");
                    SyncEvent::Replaced { tasks: count }
                }
            }
            Err(e) => {
                let msg = format!("{e:#}");
                warn!("sync failed: {msg}");
                self.last_error = Some(msg.clone());
                SyncEvent::Failed(msg)
            }
        }
    }

    /// Throw away a fetch that is already outdated (writes were queued
    /// behind it) and ask for a fresh one.
    pub fn defer(&mut self, now: Instant) {
        self.rest(now);
        self.follow_up = true;
    }

    fn rest(&mut self, now: Instant) {
        if self.interval.is_zero() {
            self.state = SyncState::Disabled;
            self.next_due = None;
        } else {
            self.state = SyncState::Idle;
            self.next_due = Some(now + self.interval);
        }
    }
}

/// Value equality regardless of the order the tasks arrive in.
fn same_collection(local: &[Task], fetched: &[Task]) -> bool {
    if local.len() != fetched.len() {
        return false;
    }
    let mut local: Vec<&Task> = local.iter().collect();
    let mut fetched: Vec<&Task> = fetched.iter().collect();
    local.sort_by_key(|t| t.id);
    fetched.sort_by_key(|t| t.id);
    local == fetched
}

/// Tasks with a write outstanding. A second write touching any of them is
/// refused until the first is answered, so a slow response can't overwrite a
/// newer position with stale data.
///
/// Creates hold their column instead: the server numbers a new task from the
/// column's current size, so the column must not be renumbered meanwhile.
#[derive(Debug, Default)]
pub struct PendingWrites {
    held: HashMap<JobId, Lock>,
}

/// What one outstanding write holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lock {
    pub tasks: Vec<TaskId>,
    pub columns: Vec<String>,
}

impl Lock {
    pub fn tasks(tasks: Vec<TaskId>) -> Self {
        Self {
            tasks,
            columns: Vec::new(),
        }
    }

    pub fn column(column: impl Into<String>) -> Self {
        Self {
            tasks: Vec::new(),
            columns: vec![column.into()],
        }
    }
}

impl PendingWrites {
    /// Fails if a write in flight holds any of `tasks` or `columns`.
    pub fn check(&self, tasks: &[TaskId], columns: &[String]) -> Result<(), BoardError> {
        for lock in self.held.values() {
            if let Some(id) = tasks.iter().find(|id| lock.tasks.contains(id)) {
                return Err(BoardError::WriteInFlight(*id));
            }
            if let Some(column) = columns.iter().find(|c| lock.columns.contains(c)) {
                return Err(BoardError::ColumnBusy(column.clone()));
            }
        }
        Ok(())
    }

    pub fn hold(&mut self, job: JobId, lock: Lock) {
        self.held.insert(job, lock);
    }

    pub fn release(&mut self, job: JobId) {
        self.held.remove(&job);
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.held.values().any(|lock| lock.tasks.contains(&id))
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::task;

    const SECS: Duration = Duration::from_secs(5);

    #[test]
    fn timer_fires_after_interval() {
        let t0 = Instant::now();
        let sync = SyncCoordinator::new(SECS, t0);
        assert_eq!(sync.state(), SyncState::Idle);
        assert_eq!(sync.due(t0), None);
        assert_eq!(sync.due(t0 + SECS), Some(Trigger::Timer));
    }

    #[test]
    fn zero_interval_disables_and_positive_restarts() {
        let t0 = Instant::now();
        let mut sync = SyncCoordinator::new(SECS, t0);
        sync.set_interval(Duration::ZERO, t0);
        assert_eq!(sync.state(), SyncState::Disabled);
        assert_eq!(sync.due(t0 + SECS * 100), None);
        assert_eq!(sync.begin(Trigger::Timer), Begin::Skipped);

        let t1 = t0 + SECS * 3;
        sync.set_interval(SECS, t1);
        assert_eq!(sync.state(), SyncState::Idle);
        // The timer restarts from the moment polling is switched back on.
        assert_eq!(sync.due(t1), None);
        assert_eq!(sync.due(t1 + SECS), Some(Trigger::Timer));
    }

    #[test]
    fn manual_sync_while_disabled_returns_to_disabled() {
        let t0 = Instant::now();
        let mut sync = SyncCoordinator::new(Duration::ZERO, t0);
        let mut store = TaskStore::new();

        assert_eq!(sync.begin(Trigger::Manual), Begin::Started);
        let event = sync.complete(Ok(vec![task(1, "planned", 0)]), &mut store, t0);
        assert_eq!(event, SyncEvent::Replaced { tasks: 1 });
        assert_eq!(sync.state(), SyncState::Disabled);
    }

    #[test]
    fn manual_trigger_during_fetch_is_coalesced() {
        let t0 = Instant::now();
        let mut sync = SyncCoordinator::new(SECS, t0);
        let mut store = TaskStore::new();

        assert_eq!(sync.begin(Trigger::Manual), Begin::Started);
        assert_eq!(sync.state(), SyncState::Syncing);
        assert_eq!(sync.begin(Trigger::Manual), Begin::Coalesced);
        assert_eq!(sync.begin(Trigger::Manual), Begin::Coalesced);
        assert_eq!(sync.begin(Trigger::Timer), Begin::Skipped);
        assert_eq!(sync.due(t0), None);

        sync.complete(Ok(Vec::new()), &mut store, t0);
        assert_eq!(sync.state(), SyncState::Idle);
        // Exactly one follow-up is queued.
        assert_eq!(sync.due(t0), Some(Trigger::Manual));
        assert_eq!(sync.begin(Trigger::Manual), Begin::Started);
        sync.complete(Ok(Vec::new()), &mut store, t0);
        assert_eq!(sync.due(t0), None);
    }

    #[test]
    fn identical_fetch_does_not_replace() {
        let t0 = Instant::now();
        let mut sync = SyncCoordinator::new(SECS, t0);
        let mut store = TaskStore::new();
        store.load(vec![task(1, "planned", 0), task(2, "planned", 1)]);

        sync.begin(Trigger::Timer);
        // Same values, different arrival order.
        let event = sync.complete(
            Ok(vec![task(2, "planned", 1), task(1, "planned", 0)]),
            &mut store,
            t0,
        );
        assert_eq!(event, SyncEvent::Unchanged);
        assert_eq!(store.snapshot()[0].id, 1);
    }

    #[test]
    fn different_fetch_replaces_wholesale() {
        let t0 = Instant::now();
        let mut sync = SyncCoordinator::new(SECS, t0);
        let mut store = TaskStore::new();
        store.load(vec![task(1, "planned", 0), task(2, "planned", 1)]);

        sync.begin(Trigger::Timer);
        let event = sync.complete(
            Ok(vec![task(1, "planned", 1), task(2, "planned", 0), task(3, "done", 0)]),
            &mut store,
            t0,
        );
        assert_eq!(event, SyncEvent::Replaced { tasks: 3 });
        assert_eq!(store.len(), 3);
        assert_eq!(store.tasks_in_column("planned")[0].id, 2);
    }

    #[test]
    fn failure_leaves_store_and_returns_to_idle() {
        let t0 = Instant::now();
        let mut sync = SyncCoordinator::new(SECS, t0);
        let mut store = TaskStore::new();
        store.load(vec![task(1, "planned", 0)]);

        sync.begin(Trigger::Manual);
        let event = sync.complete(Err(anyhow::anyhow!("connection refused")), &mut store, t0);
        assert!(matches!(event, SyncEvent::Failed(ref msg) if msg.contains("connection refused")));
        assert_eq!(sync.state(), SyncState::Idle);
        assert_eq!(store.len(), 1);
        assert!(sync.last_error().is_some());

        // The next success clears the error.
        sync.begin(Trigger::Manual);
        sync.complete(Ok(vec![task(1, "planned", 0)]), &mut store, t0);
        assert!(sync.last_error().is_none());
    }

    #[test]
    fn requested_sync_fires_immediately() {
        let t0 = Instant::now();
        let mut sync = SyncCoordinator::new(SECS, t0);
        sync.request();
        assert_eq!(sync.due(t0), Some(Trigger::Manual));
    }

    #[test]
    fn deferred_fetch_leaves_syncing_and_asks_again() {
        let t0 = Instant::now();
        let mut sync = SyncCoordinator::new(SECS, t0);
        sync.begin(Trigger::Timer);
        sync.defer(t0);
        assert_eq!(sync.state(), SyncState::Idle);
        assert_eq!(sync.due(t0), Some(Trigger::Manual));
    }

    #[test]
    fn pending_writes_block_overlapping_tasks() {
        let mut pending = PendingWrites::default();
        pending.hold(1, Lock::tasks(vec![1, 2]));
        assert!(pending.is_pending(2));
        assert_eq!(pending.check(&[3, 2], &[]), Err(BoardError::WriteInFlight(2)));
        assert!(pending.check(&[3], &[]).is_ok());

        pending.hold(2, Lock::tasks(vec![3]));
        pending.release(1);
        assert!(!pending.is_pending(2));
        pending.release(2);
        assert!(pending.is_empty());
    }

    #[test]
    fn pending_create_holds_its_column() {
        let mut pending = PendingWrites::default();
        pending.hold(1, Lock::column("planned"));
        assert!(!pending.is_pending(1));
        assert_eq!(
            pending.check(&[5], &["completed".into(), "planned".into()]),
            Err(BoardError::ColumnBusy("planned".into()))
        );
        assert!(pending.check(&[5], &["completed".into()]).is_ok());
    }
}
