//! Errors the board core reports to its immediate caller.
//!
//! Everything else travels as `anyhow::Error`; these variants exist so callers
//! (the HTTP layer in particular) can tell precondition failures apart.

use thiserror::Error;

use crate::model::TaskId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("a drag of task {0} is already in progress")]
    DragAlreadyActive(TaskId),

    #[error("no drag in progress")]
    NoActiveDrag,

    #[error("task {0} has a write in flight; try again once it settles")]
    WriteInFlight(TaskId),

    #[error("tasks are still being added to {0}; try again once they land")]
    ColumnBusy(String),

    #[error("task title must not be empty")]
    EmptyTitle,

    #[error("invalid import data: {0}")]
    InvalidImport(String),
}
