use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::BoardError;
use crate::model::{NewTask, Placement, Task, TaskId, TaskPatch, DEFAULT_COLUMN};

const TASK_COLUMNS: &str =
    "id, title, description, followup, column_id, position, created_at, updated_at";

fn read_task_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        followup: row.get(3)?,
        column_id: row.get(4)?,
        position: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn find_task(conn: &Connection, id: TaskId) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            [id],
            read_task_row,
        )
        .optional()?;
    Ok(task)
}

pub fn get_task(conn: &Connection, id: TaskId) -> Result<Task> {
    find_task(conn, id)?.ok_or_else(|| BoardError::TaskNotFound(id).into())
}

/// Every task, ordered by position (columns intermixed).
pub fn list_tasks(conn: &Connection) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks ORDER BY position ASC, id ASC"
    ))?;
    let tasks = stmt
        .query_map([], read_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

fn column_count(conn: &Connection, column: &str) -> Result<usize> {
    let count: usize = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE column_id = ?1",
        [column],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Insert a task at the end of its column.
pub fn add_task(conn: &Connection, new: &NewTask) -> Result<Task> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(BoardError::EmptyTitle.into());
    }
    let column = new
        .column_id
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COLUMN);
    let position = column_count(conn, column)?;
    conn.execute(
        "INSERT INTO tasks (title, description, followup, column_id, position)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            title,
            new.description.as_deref().unwrap_or(""),
            new.followup.as_deref().unwrap_or(""),
            column,
            position
        ],
    )
    .with_context(|| format!("failed to insert task '{title}'"))?;
    get_task(conn, conn.last_insert_rowid())
}

/// Apply the fields present in `patch`; absent ones keep their value.
pub fn update_task(conn: &Connection, id: TaskId, patch: &TaskPatch) -> Result<Task> {
    if find_task(conn, id)?.is_none() {
        return Err(BoardError::TaskNotFound(id).into());
    }
    let title = patch.title.as_deref().map(str::trim);
    if title == Some("") {
        return Err(BoardError::EmptyTitle.into());
    }
    conn.execute(
        "UPDATE tasks SET
             title = COALESCE(?1, title),
             description = COALESCE(?2, description),
             followup = COALESCE(?3, followup),
             column_id = COALESCE(?4, column_id),
             position = COALESCE(?5, position),
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?6",
        params![
            title,
            patch.description,
            patch.followup,
            patch.column_id,
            patch.position,
            id
        ],
    )?;
    get_task(conn, id)
}

/// Returns whether a row was removed. Deleting an unknown id is not an error.
pub fn delete_task(conn: &Connection, id: TaskId) -> Result<bool> {
    let removed = conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
    Ok(removed > 0)
}

/// Apply a reorder batch as one transaction. Unknown ids are skipped.
pub fn reorder(conn: &Connection, batch: &[Placement]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut applied = 0;
    {
        let mut stmt =
            tx.prepare_cached("UPDATE tasks SET column_id = ?1, position = ?2 WHERE id = ?3")?;
        for item in batch {
            applied += stmt.execute(params![item.column_id, item.position, item.id])?;
        }
    }
    tx.commit()?;
    Ok(applied)
}
