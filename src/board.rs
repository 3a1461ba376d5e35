//! One board session: the task store, its sync coordinator, the drag in
//! progress, and the worker thread every server call goes through.
//!
//! Local mutations are applied to the store first and then queued for the
//! server. Nothing here waits on the network: replies are picked up by
//! [`Board::tick`] (or [`Board::settle`] when the caller can afford to block).
//! A failed write is not rolled back; the board is marked stale and the next
//! tick pulls the server state back in.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};

use crate::api::TaskApi;
use crate::bulk;
use crate::drag::{DragSession, DropTarget};
use crate::error::BoardError;
use crate::model::{ordered_columns, Direction, NewTask, Task, TaskId, TaskPatch, DEFAULT_COLUMN};
use crate::ordering::{self, ChangeSet, Slot, SwapOutcome};
use crate::store::TaskStore;
use crate::sync::{Begin, Lock, PendingWrites, SyncCoordinator, SyncEvent, SyncState, Trigger};
use crate::transfer::{Export, ImportMode};
use crate::worker::{Job, JobId, Outcome, Reply, Worker};

/// Something the caller may want to show after a reply came back.
#[derive(Debug)]
pub enum Notice {
    Created(Task),
    Updated(Task),
    /// A reorder or delete was accepted.
    Saved,
    Synced { event: SyncEvent, manual: bool },
    WriteFailed(anyhow::Error),
}

enum Request {
    Fetch { manual: bool },
    Write { action: String },
}

pub struct Board {
    worker: Worker,
    store: TaskStore,
    sync: SyncCoordinator,
    drag: DragSession,
    pending: PendingWrites,
    in_flight: HashMap<JobId, Request>,
    /// A manual sync whose fetch was discarded; the follow-up answers for it.
    manual_owed: bool,
    stale: bool,
}

impl Board {
    /// Fetch the initial collection, then hand `api` to a worker thread and
    /// start polling every `interval` (zero disables polling).
    pub fn connect<A: TaskApi + Send + 'static>(api: A, interval: Duration, now: Instant) -> Result<Self> {
        let tasks = api.list_tasks().context("failed to load tasks")?;
        let mut store = TaskStore::new();
        store.load(tasks);
        Ok(Self {
            worker: Worker::spawn(api)?,
            store,
            sync: SyncCoordinator::new(interval, now),
            drag: DragSession::new(),
            pending: PendingWrites::default(),
            in_flight: HashMap::new(),
            manual_owed: false,
            stale: false,
        })
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn tasks_in_column(&self, column: &str) -> Vec<&Task> {
        self.store.tasks_in_column(column)
    }

    /// Every column worth showing: the defaults plus any the server knows about.
    pub fn columns(&self) -> Vec<String> {
        ordered_columns(self.store.columns())
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn sync_interval(&self) -> Duration {
        self.sync.interval()
    }

    pub fn last_sync_error(&self) -> Option<&str> {
        self.sync.last_error()
    }

    /// Set after a failed write; cleared by the next successful sync.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Whether a write touching `id` is still waiting for the server.
    pub fn is_pending(&self, id: TaskId) -> bool {
        self.pending.is_pending(id)
    }

    pub fn is_saving(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Queue a create. The task shows up as [`Notice::Created`] once the
    /// server has assigned its id and position.
    pub fn add_task(&mut self, new: NewTask) -> Result<()> {
        if new.title.trim().is_empty() {
            return Err(BoardError::EmptyTitle.into());
        }
        let column = new.column_id.clone().unwrap_or_else(|| DEFAULT_COLUMN.to_string());
        let action = format!("create task '{}'", new.title.trim());
        self.submit_write(Job::Create(new), Lock::column(column), action)
    }

    /// Queue one create per line of pasted text, appended to `column` in
    /// order. Returns how many were queued.
    pub fn add_many(&mut self, column: &str, text: &str) -> Result<usize> {
        let titles = bulk::parse_titles(text);
        if titles.is_empty() {
            anyhow::bail!("no task titles found in pasted text");
        }
        let count = titles.len();
        for title in titles {
            self.add_task(NewTask::new(title).in_column(column))?;
        }
        Ok(count)
    }

    /// Change title, description or follow-up. Column and position in
    /// `patch` are ignored; moves go through [`move_task`](Self::move_task).
    pub fn edit_task(&mut self, id: TaskId, patch: TaskPatch) -> Result<()> {
        let mut task = self.store.require(id)?.clone();
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(BoardError::EmptyTitle.into());
        }
        self.pending.check(&[id], &[])?;

        let patch = TaskPatch {
            title: patch.title.map(|t| t.trim().to_string()),
            description: patch.description,
            followup: patch.followup,
            ..TaskPatch::default()
        };
        if patch.is_empty() {
            return Ok(());
        }
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = description.clone();
        }
        if let Some(followup) = &patch.followup {
            task.followup = followup.clone();
        }
        self.store.upsert(task);
        self.submit_write(Job::Update(id, patch), Lock::tasks(vec![id]), format!("update task {id}"))
    }

    /// Move a task to `index` of `column` (its own column or another one).
    pub fn move_task(&mut self, id: TaskId, column: &str, index: usize) -> Result<ChangeSet> {
        self.apply_move(id, |store| ordering::move_between_columns(store, id, column, index))
    }

    /// Nudge one step up or down. `None` at the boundary; nothing is written.
    pub fn nudge(&mut self, id: TaskId, direction: Direction) -> Result<Option<ChangeSet>> {
        let changes = self.apply_move(id, |store| {
            Ok(match ordering::swap_adjacent(store, id, direction)? {
                SwapOutcome::Boundary => ChangeSet::default(),
                SwapOutcome::Moved(changes) => changes,
            })
        })?;
        Ok((!changes.is_empty()).then_some(changes))
    }

    pub fn archive(&mut self, id: TaskId) -> Result<ChangeSet> {
        self.apply_move(id, |store| ordering::archive(store, id))
    }

    pub fn restore(&mut self, id: TaskId, column: &str) -> Result<ChangeSet> {
        self.apply_move(id, |store| ordering::restore(store, id, column))
    }

    /// Hard delete. The siblings left behind are renumbered and written back.
    pub fn delete_task(&mut self, id: TaskId) -> Result<Task> {
        let column = self.store.require(id)?.column_id.clone();
        self.pending.check(&[id], &[column])?;

        let before = self.store.snapshot().to_vec();
        let (removed, changes) = ordering::remove(&mut self.store, id)?;
        if let Err(e) = self.pending.check(&changes.ids(), &[]) {
            self.store.load(before);
            return Err(e.into());
        }
        self.submit_write(Job::Delete(id), Lock::tasks(vec![id]), format!("delete task {id}"))?;
        if !changes.is_empty() {
            self.submit_reorder(&changes)?;
        }
        Ok(removed)
    }

    pub fn begin_drag(&mut self, id: TaskId) -> Result<(), BoardError> {
        if self.pending.is_pending(id) {
            return Err(BoardError::WriteInFlight(id));
        }
        self.drag.begin(&self.store, id)
    }

    /// Returns whether the drop target changed.
    pub fn drag_over(&mut self, column: &str, pointer_y: f64, slots: &[Slot]) -> Result<bool> {
        Ok(self.drag.update_target(column, pointer_y, slots)?)
    }

    pub fn drag_leave(&mut self) -> bool {
        self.drag.clear_target()
    }

    pub fn dragged(&self) -> Option<TaskId> {
        self.drag.dragged()
    }

    pub fn drop_target(&self) -> Option<&DropTarget> {
        self.drag.target()
    }

    /// Commit the drag. `None` when it ended outside any column.
    pub fn drop_drag(&mut self) -> Result<Option<(TaskId, ChangeSet)>> {
        let id = self.drag.dragged().ok_or(BoardError::NoActiveDrag)?;
        if self.drag.target().is_none() {
            self.drag.cancel();
            return Ok(None);
        }
        let mut drag = std::mem::take(&mut self.drag);
        let changes = self.apply_move(id, |store| {
            Ok(drag.end(store)?.map(|(_, changes)| changes).unwrap_or_default())
        })?;
        Ok(Some((id, changes)))
    }

    pub fn cancel_drag(&mut self) -> Option<TaskId> {
        self.drag.cancel()
    }

    /// Pick up whatever replies have arrived and start a sync if one is due.
    /// Never blocks.
    pub fn tick(&mut self, now: Instant) -> Result<Vec<Notice>> {
        let mut notices = Vec::new();
        while let Some(reply) = self.worker.try_recv()? {
            notices.extend(self.finish(reply, now));
        }
        if let Some(trigger) = self.sync.due(now) {
            self.start_sync(trigger, false, now)?;
        }
        Ok(notices)
    }

    /// Sync immediately regardless of the timer. The result arrives as
    /// [`Notice::Synced`] with `manual` set.
    pub fn sync_now(&mut self, now: Instant) -> Result<()> {
        self.start_sync(Trigger::Manual, true, now)
    }

    /// Have the next [`tick`](Self::tick) sync regardless of the timer, e.g.
    /// because the database file changed underneath us.
    pub fn request_sync(&mut self) {
        self.sync.request();
    }

    pub fn set_sync_interval(&mut self, interval: Duration, now: Instant) {
        self.sync.set_interval(interval, now);
    }

    /// Block until every queued call has been answered.
    ///
    /// The first failed write comes back as the error; any later ones are
    /// only logged. Either way the board has already been marked stale.
    pub fn settle(&mut self) -> Result<Vec<Notice>> {
        let mut notices = Vec::new();
        let mut failure = None;
        while !self.in_flight.is_empty() {
            let reply = self.worker.recv()?;
            match self.finish(reply, Instant::now()) {
                Some(Notice::WriteFailed(e)) if failure.is_none() => failure = Some(e),
                Some(Notice::WriteFailed(e)) => warn!("{e:#}"),
                Some(notice) => notices.push(notice),
                None => {}
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(notices),
        }
    }

    pub fn export(&self) -> Export {
        Export::from_tasks(self.store.snapshot())
    }

    /// Import a validated export. Returns the number of tasks created.
    ///
    /// Waits for earlier writes first and then runs each call to completion,
    /// so a half-finished import leaves the server in a known prefix state.
    pub fn import(&mut self, export: &Export, mode: ImportMode) -> Result<usize> {
        self.settle()?;
        let result = self.import_inner(export, mode);
        if result.is_err() {
            self.mark_stale();
        }
        result
    }

    fn import_inner(&mut self, export: &Export, mode: ImportMode) -> Result<usize> {
        if mode == ImportMode::Replace {
            // The store can lag the server; delete what the server holds.
            let existing = self
                .call(Job::List)
                .and_then(Outcome::into_tasks)
                .context("failed to list tasks before import")?;
            for task in existing {
                self.call(Job::Delete(task.id))
                    .with_context(|| format!("failed to delete task {} before import", task.id))?;
            }
            self.store.load(Vec::new());
        }
        let mut created = 0;
        for task in export.creation_order() {
            self.call(Job::Create(task.to_new_task()))
                .with_context(|| format!("failed to import task '{}'", task.title))?;
            created += 1;
        }
        let tasks = self
            .call(Job::List)
            .and_then(Outcome::into_tasks)
            .context("failed to reload after import")?;
        self.store.load(tasks);
        info!("imported {created} tasks ({mode:?})");
        Ok(created)
    }

    /// Run one job and wait for its answer.
    fn call(&mut self, job: Job) -> Result<Outcome> {
        let id = self.worker.submit(job)?;
        loop {
            let reply = self.worker.recv()?;
            if reply.id == id {
                return reply.result;
            }
            if let Some(Notice::WriteFailed(e)) = self.finish(reply, Instant::now()) {
                warn!("{e:#}");
            }
        }
    }

    fn start_sync(&mut self, trigger: Trigger, manual: bool, now: Instant) -> Result<()> {
        let manual = manual || std::mem::take(&mut self.manual_owed);
        match self.sync.begin(trigger) {
            Begin::Started => {}
            Begin::Coalesced => {
                if manual {
                    self.manual_owed = true;
                }
                return Ok(());
            }
            Begin::Skipped => return Ok(()),
        }
        match self.worker.submit(Job::List) {
            Ok(job) => {
                self.in_flight.insert(job, Request::Fetch { manual });
                Ok(())
            }
            Err(e) => {
                self.sync.complete(Err(anyhow!("{e:#}")), &mut self.store, now);
                Err(e)
            }
        }
    }

    fn finish(&mut self, reply: Reply, now: Instant) -> Option<Notice> {
        let Some(request) = self.in_flight.remove(&reply.id) else {
            warn!("reply for unknown job {}", reply.id);
            return None;
        };
        match request {
            Request::Fetch { manual } => {
                if reply.result.is_ok() && !self.pending.is_empty() {
                    // Writes queued behind this fetch have already changed the store.
                    debug!("sync: fetch predates queued writes, asking again");
                    self.sync.defer(now);
                    self.manual_owed |= manual;
                    return None;
                }
                let fetched = reply.result.and_then(Outcome::into_tasks);
                let event = self.sync.complete(fetched, &mut self.store, now);
                if !matches!(event, SyncEvent::Failed(_)) {
                    self.stale = false;
                }
                Some(Notice::Synced { event, manual })
            }
            Request::Write { action } => {
                self.pending.release(reply.id);
                match reply.result {
                    Ok(Outcome::Created(task)) => {
                        self.store.upsert(task.clone());
                        Some(Notice::Created(task))
                    }
                    Ok(Outcome::Updated(task)) => {
                        self.store.upsert(task.clone());
                        Some(Notice::Updated(task))
                    }
                    Ok(_) => Some(Notice::Saved),
                    Err(e) => {
                        self.mark_stale();
                        Some(Notice::WriteFailed(e.context(format!(
                            "failed to {action}; board may be out of date until the next sync"
                        ))))
                    }
                }
            }
        }
    }

    /// Run a position change against the store, then queue it. A change that
    /// overlaps a write still in flight is undone and refused.
    fn apply_move<F>(&mut self, id: TaskId, op: F) -> Result<ChangeSet>
    where
        F: FnOnce(&mut TaskStore) -> Result<ChangeSet, BoardError>,
    {
        let source = self.store.require(id)?.column_id.clone();
        let before = self.store.snapshot().to_vec();
        let changes = op(&mut self.store)?;
        if changes.is_empty() {
            return Ok(changes);
        }

        let mut ids = vec![id];
        ids.extend(changes.ids().into_iter().filter(|other| *other != id));
        let mut columns = vec![source];
        for placement in changes.placements() {
            if !columns.contains(&placement.column_id) {
                columns.push(placement.column_id.clone());
            }
        }
        if let Err(e) = self.pending.check(&ids, &columns) {
            self.store.load(before);
            return Err(e.into());
        }
        self.submit_reorder(&changes)?;
        Ok(changes)
    }

    /// Empty change-sets never reach the worker.
    fn submit_reorder(&mut self, changes: &ChangeSet) -> Result<()> {
        self.submit_write(
            Job::Reorder(changes.placements().to_vec()),
            Lock::tasks(changes.ids()),
            "save new order".to_string(),
        )
    }

    fn submit_write(&mut self, job: Job, lock: Lock, action: String) -> Result<()> {
        let id = match self.worker.submit(job) {
            Ok(id) => id,
            Err(e) => {
                self.mark_stale();
                return Err(e);
            }
        };
        self.pending.hold(id, lock);
        self.in_flight.insert(id, Request::Write { action });
        Ok(())
    }

    fn mark_stale(&mut self) {
        warn!("local board diverged from server; scheduling resync");
        self.stale = true;
        self.sync.request();
    }
}
