//! In-memory task collection for one board session.

use crate::error::BoardError;
use crate::model::{Task, TaskId};

/// Owns the session's tasks. Insertion order is preserved so that sorting by
/// position is stable with respect to the order the server sent.
#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection. The server is trusted; nothing is validated.
    pub fn load(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn require(&self, id: TaskId) -> Result<&Task, BoardError> {
        self.get(id).ok_or(BoardError::TaskNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Tasks of `column` sorted by position; equal positions keep store order.
    pub fn tasks_in_column(&self, column: &str) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().filter(|t| t.column_id == column).collect();
        tasks.sort_by_key(|t| t.position);
        tasks
    }

    pub fn column_len(&self, column: &str) -> usize {
        self.tasks.iter().filter(|t| t.column_id == column).count()
    }

    /// Insert if the id is new, otherwise replace in place.
    pub fn upsert(&mut self, task: Task) {
        match self.get_mut(task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    /// Remove a task. Siblings are not renumbered.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let idx = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(idx))
    }

    pub fn snapshot(&self) -> &[Task] {
        &self.tasks
    }

    /// Distinct column ids in order of first appearance.
    pub fn columns(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for task in &self.tasks {
            if !seen.contains(&task.column_id.as_str()) {
                seen.push(&task.column_id);
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn task(id: TaskId, column: &str, position: usize) -> Task {
        Task {
            id,
            title: format!("task-{id}"),
            description: String::new(),
            followup: String::new(),
            column_id: column.into(),
            position,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn ids(tasks: &[&Task]) -> Vec<TaskId> {
        tasks.iter().map(|t| t.id).collect()
    }

    #[test]
    fn tasks_in_column_sorts_by_position() {
        let mut store = TaskStore::new();
        store.load(vec![
            task(1, "planned", 2),
            task(2, "done", 0),
            task(3, "planned", 0),
            task(4, "planned", 1),
        ]);
        assert_eq!(ids(&store.tasks_in_column("planned")), vec![3, 4, 1]);
        assert_eq!(ids(&store.tasks_in_column("done")), vec![2]);
        assert!(store.tasks_in_column("missing").is_empty());
    }

    #[test]
    fn equal_positions_keep_original_order() {
        let mut store = TaskStore::new();
        store.load(vec![
            task(7, "planned", 1),
            task(5, "planned", 1),
            task(9, "planned", 0),
            task(6, "planned", 1),
        ]);
        assert_eq!(ids(&store.tasks_in_column("planned")), vec![9, 7, 5, 6]);
    }

    #[test]
    fn upsert_inserts_then_replaces() {
        let mut store = TaskStore::new();
        store.upsert(task(1, "planned", 0));
        assert_eq!(store.len(), 1);

        let mut edited = task(1, "planned", 0);
        edited.title = "renamed".into();
        store.upsert(edited);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).unwrap().title, "renamed");
    }

    #[test]
    fn remove_leaves_gap() {
        let mut store = TaskStore::new();
        store.load(vec![task(1, "p", 0), task(2, "p", 1), task(3, "p", 2)]);
        assert!(store.remove(2).is_some());
        assert!(store.remove(2).is_none());
        let positions: Vec<usize> = store.tasks_in_column("p").iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 2]);
    }

    #[test]
    fn require_reports_unknown_id() {
        let store = TaskStore::new();
        assert_eq!(store.require(42).unwrap_err(), BoardError::TaskNotFound(42));
    }

    #[test]
    fn columns_in_first_appearance_order() {
        let mut store = TaskStore::new();
        store.load(vec![task(1, "b", 0), task(2, "a", 0), task(3, "b", 1)]);
        assert_eq!(store.columns(), vec!["b", "a"]);
        assert_eq!(store.column_len("b"), 2);
    }
}
