//! Position bookkeeping for moves between and within columns.
//!
//! Every operation leaves the positions of each touched column as the dense
//! sequence `0..n` and reports only the tasks whose column or position changed.

use serde::Serialize;

use crate::error::BoardError;
use crate::model::{Direction, Placement, Task, TaskId, ARCHIVE_COLUMN};
use crate::store::TaskStore;

/// The tasks a mutation actually changed, in the order they were renumbered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    placements: Vec<Placement>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.placements.iter().map(|p| p.id).collect()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.placements.iter().any(|p| p.id == id)
    }

    fn record(&mut self, placement: Placement) {
        match self.placements.iter_mut().find(|p| p.id == placement.id) {
            Some(existing) => *existing = placement,
            None => self.placements.push(placement),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    Moved(ChangeSet),
    /// Already first (moving up) or last (moving down); nothing changed.
    Boundary,
}

/// Vertical extent of a rendered task, in whatever units the UI uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub task_id: TaskId,
    pub top: f64,
    pub height: f64,
}

impl Slot {
    pub fn midpoint(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// Where a drop at `pointer_y` lands among `slots` (document order).
///
/// The dragged task is skipped. The first remaining slot whose midpoint lies
/// below the pointer is the insertion point; if none does, the end.
pub fn insertion_index(slots: &[Slot], dragged: Option<TaskId>, pointer_y: f64) -> usize {
    slots
        .iter()
        .filter(|s| Some(s.task_id) != dragged)
        .position(|s| s.midpoint() > pointer_y)
        .unwrap_or_else(|| slots.iter().filter(|s| Some(s.task_id) != dragged).count())
}

/// Position a newly created task receives in `column`.
pub fn next_position(store: &TaskStore, column: &str) -> usize {
    store.column_len(column)
}

fn column_order(store: &TaskStore, column: &str) -> Vec<TaskId> {
    store.tasks_in_column(column).iter().map(|t| t.id).collect()
}

/// Assign `column` and positions `0..order.len()` following `order`.
fn renumber(store: &mut TaskStore, column: &str, order: &[TaskId], changes: &mut ChangeSet) {
    for (position, id) in order.iter().enumerate() {
        let Some(task) = store.get_mut(*id) else {
            continue;
        };
        if task.column_id != column || task.position != position {
            task.column_id = column.to_string();
            task.position = position;
            changes.record(task.placement());
        }
    }
}

pub fn move_within_column(
    store: &mut TaskStore,
    task_id: TaskId,
    target_index: usize,
) -> Result<ChangeSet, BoardError> {
    let column = store.require(task_id)?.column_id.clone();
    let mut order = column_order(store, &column);
    order.retain(|id| *id != task_id);
    order.insert(target_index.min(order.len()), task_id);

    let mut changes = ChangeSet::default();
    renumber(store, &column, &order, &mut changes);
    Ok(changes)
}

pub fn move_between_columns(
    store: &mut TaskStore,
    task_id: TaskId,
    target_column: &str,
    target_index: usize,
) -> Result<ChangeSet, BoardError> {
    let source = store.require(task_id)?.column_id.clone();
    if source == target_column {
        return move_within_column(store, task_id, target_index);
    }

    let mut changes = ChangeSet::default();

    let mut source_order = column_order(store, &source);
    source_order.retain(|id| *id != task_id);
    renumber(store, &source, &source_order, &mut changes);

    let mut target_order = column_order(store, target_column);
    target_order.insert(target_index.min(target_order.len()), task_id);
    renumber(store, target_column, &target_order, &mut changes);

    Ok(changes)
}

pub fn swap_adjacent(
    store: &mut TaskStore,
    task_id: TaskId,
    direction: Direction,
) -> Result<SwapOutcome, BoardError> {
    let column = store.require(task_id)?.column_id.clone();
    let mut order = column_order(store, &column);
    let Some(idx) = order.iter().position(|id| *id == task_id) else {
        return Err(BoardError::TaskNotFound(task_id));
    };
    let neighbour = match direction {
        Direction::Up if idx > 0 => idx - 1,
        Direction::Down if idx + 1 < order.len() => idx + 1,
        _ => return Ok(SwapOutcome::Boundary),
    };
    order.swap(idx, neighbour);

    let mut changes = ChangeSet::default();
    renumber(store, &column, &order, &mut changes);
    Ok(SwapOutcome::Moved(changes))
}

/// Soft delete: move to the end of the archive column.
pub fn archive(store: &mut TaskStore, task_id: TaskId) -> Result<ChangeSet, BoardError> {
    if store.require(task_id)?.column_id == ARCHIVE_COLUMN {
        return Ok(ChangeSet::default());
    }
    move_between_columns(store, task_id, ARCHIVE_COLUMN, usize::MAX)
}

/// Move an archived task to the end of `column`. Tasks outside the archive
/// are left alone.
pub fn restore(
    store: &mut TaskStore,
    task_id: TaskId,
    column: &str,
) -> Result<ChangeSet, BoardError> {
    if store.require(task_id)?.column_id != ARCHIVE_COLUMN {
        return Ok(ChangeSet::default());
    }
    move_between_columns(store, task_id, column, usize::MAX)
}

/// Hard delete: drop the task and close the gap it leaves in its column.
pub fn remove(store: &mut TaskStore, task_id: TaskId) -> Result<(Task, ChangeSet), BoardError> {
    let removed = store.remove(task_id).ok_or(BoardError::TaskNotFound(task_id))?;
    let order = column_order(store, &removed.column_id);
    let mut changes = ChangeSet::default();
    renumber(store, &removed.column_id, &order, &mut changes);
    Ok((removed, changes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::task;

    fn board(tasks: Vec<Task>) -> TaskStore {
        let mut store = TaskStore::new();
        store.load(tasks);
        store
    }

    fn order(store: &TaskStore, column: &str) -> Vec<(TaskId, usize)> {
        store
            .tasks_in_column(column)
            .iter()
            .map(|t| (t.id, t.position))
            .collect()
    }

    fn assert_dense(store: &TaskStore) {
        for column in store.columns() {
            let positions: Vec<usize> =
                store.tasks_in_column(column).iter().map(|t| t.position).collect();
            let expected: Vec<usize> = (0..positions.len()).collect();
            assert_eq!(positions, expected, "column {column} is not dense");
        }
    }

    const A: TaskId = 1;
    const B: TaskId = 2;
    const C: TaskId = 3;

    fn planned_abc() -> TaskStore {
        board(vec![task(A, "planned", 0), task(B, "planned", 1), task(C, "planned", 2)])
    }

    #[test]
    fn drag_last_to_front_within_column() {
        let mut store = planned_abc();
        let changes = move_within_column(&mut store, C, 0).unwrap();
        assert_eq!(order(&store, "planned"), vec![(C, 0), (A, 1), (B, 2)]);
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn drag_to_empty_column() {
        let mut store = planned_abc();
        let changes = move_between_columns(&mut store, A, "completed", 0).unwrap();
        assert_eq!(order(&store, "planned"), vec![(B, 0), (C, 1)]);
        assert_eq!(order(&store, "completed"), vec![(A, 0)]);
        assert_eq!(
            changes.placements(),
            &[
                Placement { id: B, column_id: "planned".into(), position: 0 },
                Placement { id: C, column_id: "planned".into(), position: 1 },
                Placement { id: A, column_id: "completed".into(), position: 0 },
            ]
        );
    }

    #[test]
    fn unaffected_tasks_are_not_reported() {
        let mut store = board(vec![
            task(1, "p", 0),
            task(2, "p", 1),
            task(3, "p", 2),
            task(4, "p", 3),
            task(9, "other", 0),
        ]);
        let changes = move_within_column(&mut store, 4, 2).unwrap();
        assert_eq!(changes.ids(), vec![4, 3]);
        assert!(!changes.contains(9));
    }

    #[test]
    fn moving_to_the_same_slot_changes_nothing() {
        let mut store = planned_abc();
        let changes = move_within_column(&mut store, B, 1).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn within_column_index_is_clamped() {
        let mut store = planned_abc();
        move_within_column(&mut store, A, 99).unwrap();
        assert_eq!(order(&store, "planned"), vec![(B, 0), (C, 1), (A, 2)]);
    }

    #[test]
    fn between_columns_conserves_tasks() {
        let mut store = board(vec![
            task(1, "a", 0),
            task(2, "a", 1),
            task(3, "a", 2),
            task(4, "b", 0),
            task(5, "b", 1),
        ]);
        move_between_columns(&mut store, 2, "b", 1).unwrap();
        assert_eq!(order(&store, "a"), vec![(1, 0), (3, 1)]);
        assert_eq!(order(&store, "b"), vec![(4, 0), (2, 1), (5, 2)]);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn between_columns_index_is_clamped_to_end() {
        let mut store = board(vec![task(1, "a", 0), task(4, "b", 0), task(5, "b", 1)]);
        move_between_columns(&mut store, 1, "b", 10).unwrap();
        assert_eq!(order(&store, "b"), vec![(4, 0), (5, 1), (1, 2)]);
    }

    #[test]
    fn same_column_target_delegates_to_within() {
        let mut store = planned_abc();
        move_between_columns(&mut store, A, "planned", 2).unwrap();
        assert_eq!(order(&store, "planned"), vec![(B, 0), (C, 1), (A, 2)]);
    }

    #[test]
    fn swap_first_up_is_boundary() {
        let mut store = planned_abc();
        let outcome = swap_adjacent(&mut store, A, Direction::Up).unwrap();
        assert_eq!(outcome, SwapOutcome::Boundary);
        assert_eq!(order(&store, "planned"), vec![(A, 0), (B, 1), (C, 2)]);
    }

    #[test]
    fn swap_last_down_is_boundary() {
        let mut store = planned_abc();
        assert_eq!(
            swap_adjacent(&mut store, C, Direction::Down).unwrap(),
            SwapOutcome::Boundary
        );
    }

    #[test]
    fn swap_exchanges_with_neighbour() {
        let mut store = planned_abc();
        let SwapOutcome::Moved(changes) = swap_adjacent(&mut store, B, Direction::Up).unwrap()
        else {
            panic!("expected a move");
        };
        assert_eq!(order(&store, "planned"), vec![(B, 0), (A, 1), (C, 2)]);
        assert_eq!(changes.ids(), vec![B, A]);
    }

    #[test]
    fn unknown_task_is_reported() {
        let mut store = planned_abc();
        assert_eq!(
            move_within_column(&mut store, 77, 0).unwrap_err(),
            BoardError::TaskNotFound(77)
        );
        assert_eq!(
            swap_adjacent(&mut store, 77, Direction::Up).unwrap_err(),
            BoardError::TaskNotFound(77)
        );
        assert!(remove(&mut store, 77).is_err());
    }

    #[test]
    fn archive_and_restore_append() {
        let mut store = board(vec![
            task(1, "planned", 0),
            task(2, "planned", 1),
            task(3, "archives", 0),
        ]);
        archive(&mut store, 1).unwrap();
        assert_eq!(order(&store, "archives"), vec![(3, 0), (1, 1)]);
        assert_eq!(order(&store, "planned"), vec![(2, 0)]);

        assert!(archive(&mut store, 1).unwrap().is_empty());

        restore(&mut store, 3, "planned").unwrap();
        assert_eq!(order(&store, "planned"), vec![(2, 0), (3, 1)]);
        assert_eq!(order(&store, "archives"), vec![(1, 0)]);

        assert!(restore(&mut store, 2, "completed").unwrap().is_empty());
    }

    #[test]
    fn remove_closes_gap() {
        let mut store = planned_abc();
        let (removed, changes) = remove(&mut store, A).unwrap();
        assert_eq!(removed.id, A);
        assert_eq!(order(&store, "planned"), vec![(B, 0), (C, 1)]);
        assert_eq!(changes.ids(), vec![B, C]);
    }

    #[test]
    fn insertion_index_uses_midpoints() {
        let slots = [
            Slot { task_id: 1, top: 0.0, height: 3.0 },
            Slot { task_id: 2, top: 3.0, height: 3.0 },
            Slot { task_id: 3, top: 6.0, height: 3.0 },
        ];
        assert_eq!(insertion_index(&slots, None, 0.0), 0);
        assert_eq!(insertion_index(&slots, None, 1.4), 0);
        // Exactly on a midpoint is not "below" it.
        assert_eq!(insertion_index(&slots, None, 1.5), 1);
        assert_eq!(insertion_index(&slots, None, 5.0), 2);
        assert_eq!(insertion_index(&slots, None, 50.0), 3);
        assert_eq!(insertion_index(&[], None, 3.0), 0);
    }

    #[test]
    fn insertion_index_skips_dragged_task() {
        let slots = [
            Slot { task_id: 1, top: 0.0, height: 3.0 },
            Slot { task_id: 2, top: 3.0, height: 3.0 },
            Slot { task_id: 3, top: 6.0, height: 3.0 },
        ];
        assert_eq!(insertion_index(&slots, Some(1), 0.0), 0);
        assert_eq!(insertion_index(&slots, Some(1), 5.0), 1);
        assert_eq!(insertion_index(&slots, Some(3), 50.0), 2);
    }

    #[test]
    fn positions_stay_dense_under_mixed_operations() {
        let columns = ["a", "b", "c"];
        let mut store = board(
            (0..12)
                .map(|i| task(i, columns[(i % 3) as usize], (i / 3) as usize))
                .collect(),
        );
        let mut seed: u64 = 0x2545_f491;
        let mut next = |bound: u64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % bound
        };
        for _ in 0..300 {
            let id = next(12) as TaskId;
            match next(5) {
                0 => {
                    move_within_column(&mut store, id, next(6) as usize).unwrap();
                }
                1 => {
                    let column = columns[next(3) as usize];
                    move_between_columns(&mut store, id, column, next(8) as usize).unwrap();
                }
                2 => {
                    let direction = if next(2) == 0 { Direction::Up } else { Direction::Down };
                    swap_adjacent(&mut store, id, direction).unwrap();
                }
                3 => {
                    archive(&mut store, id).unwrap();
                }
                _ => {
                    restore(&mut store, id, columns[next(3) as usize]).unwrap();
                }
            }
            assert_dense(&store);
        }
        assert_eq!(store.len(), 12);
    }

    #[test]
    fn next_position_is_column_count() {
        let store = planned_abc();
        assert_eq!(next_position(&store, "planned"), 3);
        assert_eq!(next_position(&store, "completed"), 0);
    }
}
