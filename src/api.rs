//! The persistence contract the board depends on, and its in-process
//! implementation over SQLite.

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::model::{NewTask, Placement, Task, TaskId, TaskPatch};
use crate::ops;

/// What the board needs from whoever owns the tasks across sessions.
pub trait TaskApi {
    /// All tasks, ordered by position, columns intermixed.
    fn list_tasks(&self) -> Result<Vec<Task>>;
    fn create_task(&self, new: &NewTask) -> Result<Task>;
    /// Fails with [`BoardError::TaskNotFound`](crate::error::BoardError) for an unknown id.
    fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task>;
    fn delete_task(&self, id: TaskId) -> Result<()>;
    /// Apply every triple of the batch as one unit.
    fn reorder(&self, batch: &[Placement]) -> Result<()>;
}

impl<T: TaskApi + ?Sized> TaskApi for Box<T> {
    fn list_tasks(&self) -> Result<Vec<Task>> {
        (**self).list_tasks()
    }

    fn create_task(&self, new: &NewTask) -> Result<Task> {
        (**self).create_task(new)
    }

    fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task> {
        (**self).update_task(id, patch)
    }

    fn delete_task(&self, id: TaskId) -> Result<()> {
        (**self).delete_task(id)
    }

    fn reorder(&self, batch: &[Placement]) -> Result<()> {
        (**self).reorder(batch)
    }
}

/// Body of `POST /api/tasks/reorder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub tasks: Vec<Placement>,
}

/// Acknowledgement returned by delete and reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

/// Talks to a SQLite file directly, without a server in between.
pub struct LocalApi {
    conn: Connection,
}

impl LocalApi {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: &str) -> Result<Self> {
        let conn = db::open(path)?;
        db::init(&conn)?;
        Ok(Self::new(conn))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(db::open_memory()?))
    }
}

impl TaskApi for LocalApi {
    fn list_tasks(&self) -> Result<Vec<Task>> {
        ops::list_tasks(&self.conn)
    }

    fn create_task(&self, new: &NewTask) -> Result<Task> {
        ops::add_task(&self.conn, new)
    }

    fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task> {
        ops::update_task(&self.conn, id, patch)
    }

    fn delete_task(&self, id: TaskId) -> Result<()> {
        ops::delete_task(&self.conn, id)?;
        Ok(())
    }

    fn reorder(&self, batch: &[Placement]) -> Result<()> {
        ops::reorder(&self.conn, batch)?;
        Ok(())
    }
}
