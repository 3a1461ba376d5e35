//! Transient state of a single pointer drag.
//!
//! The session never touches the store until the drop. Pointer geometry comes
//! in as plain [`Slot`]s so it works with any front end.

use crate::error::BoardError;
use crate::model::TaskId;
use crate::ordering::{self, insertion_index, ChangeSet, Slot};
use crate::store::TaskStore;

/// Where the dragged task would land if dropped now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    pub column: String,
    pub index: usize,
    /// Task the dragged one would be inserted before; `None` means the end.
    pub before: Option<TaskId>,
}

#[derive(Debug, Clone)]
struct ActiveDrag {
    task_id: TaskId,
    target: Option<DropTarget>,
}

#[derive(Debug, Default)]
pub struct DragSession {
    active: Option<ActiveDrag>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, store: &TaskStore, task_id: TaskId) -> Result<(), BoardError> {
        if let Some(active) = &self.active {
            return Err(BoardError::DragAlreadyActive(active.task_id));
        }
        store.require(task_id)?;
        self.active = Some(ActiveDrag {
            task_id,
            target: None,
        });
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn dragged(&self) -> Option<TaskId> {
        self.active.as_ref().map(|a| a.task_id)
    }

    pub fn target(&self) -> Option<&DropTarget> {
        self.active.as_ref().and_then(|a| a.target.as_ref())
    }

    /// Recompute the drop target for a pointer over `column`.
    ///
    /// `slots` are the rendered tasks of that column in document order. Returns
    /// `true` only when the target moved to a different column or neighbour,
    /// so callers can skip redraws while the pointer wiggles inside one gap.
    pub fn update_target(
        &mut self,
        column: &str,
        pointer_y: f64,
        slots: &[Slot],
    ) -> Result<bool, BoardError> {
        let active = self.active.as_mut().ok_or(BoardError::NoActiveDrag)?;
        let index = insertion_index(slots, Some(active.task_id), pointer_y);
        let before = slots
            .iter()
            .filter(|s| s.task_id != active.task_id)
            .nth(index)
            .map(|s| s.task_id);

        let changed = active
            .target
            .as_ref()
            .map_or(true, |current| current.column != column || current.before != before);
        active.target = Some(DropTarget {
            column: column.to_string(),
            index,
            before,
        });
        Ok(changed)
    }

    /// Pointer left every column: keep the drag but forget the target.
    pub fn clear_target(&mut self) -> bool {
        match self.active.as_mut() {
            Some(active) => active.target.take().is_some(),
            None => false,
        }
    }

    /// Drop. Applies the move to `store` and returns what changed, or `None`
    /// when there was no target (which behaves like a cancel).
    pub fn end(&mut self, store: &mut TaskStore) -> Result<Option<(TaskId, ChangeSet)>, BoardError> {
        let active = self.active.take().ok_or(BoardError::NoActiveDrag)?;
        let Some(target) = active.target else {
            return Ok(None);
        };
        let current_column = store.require(active.task_id)?.column_id.clone();
        let index = resolve_index(store, active.task_id, &target);
        let changes = if current_column == target.column {
            ordering::move_within_column(store, active.task_id, index)?
        } else {
            ordering::move_between_columns(store, active.task_id, &target.column, index)?
        };
        Ok(Some((active.task_id, changes)))
    }

    /// Abort without touching the store.
    pub fn cancel(&mut self) -> Option<TaskId> {
        self.active.take().map(|a| a.task_id)
    }
}

/// Index of `target` in its column as the store holds it now. The neighbour
/// decides, since a sync may have reloaded the column after the pointer last
/// moved; the recorded index is only the fallback when that neighbour is gone.
fn resolve_index(store: &TaskStore, dragged: TaskId, target: &DropTarget) -> usize {
    let others: Vec<TaskId> = store
        .tasks_in_column(&target.column)
        .iter()
        .map(|t| t.id)
        .filter(|id| *id != dragged)
        .collect();
    match target.before {
        None => others.len(),
        Some(before) => others
            .iter()
            .position(|id| *id == before)
            .unwrap_or(target.index.min(others.len())),
    }
}
