use std::fmt;

use serde::{Deserialize, Serialize};

pub type TaskId = i64;

/// Columns every board starts with, in display order.
pub const DEFAULT_COLUMNS: [&str; 5] = [
    "future-plans",
    "planned",
    "in-progress",
    "completed",
    "archives",
];

/// Column a task lands in when created without one.
pub const DEFAULT_COLUMN: &str = "in-progress";

pub const ARCHIVE_COLUMN: &str = "archives";

/// Column an archived task returns to unless told otherwise.
pub const RESTORE_COLUMN: &str = "planned";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub followup: String,
    pub column_id: String,
    pub position: usize,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Task {
    pub fn placement(&self) -> Placement {
        Placement {
            id: self.id,
            column_id: self.column_id.clone(),
            position: self.position,
        }
    }
}

/// One `(id, column, position)` triple of a reorder batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub id: TaskId,
    pub column_id: String,
    pub position: usize,
}

/// Payload for creating a task. The server assigns id, position and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn in_column(mut self, column: impl Into<String>) -> Self {
        self.column_id = Some(column.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_followup(mut self, followup: impl Into<String>) -> Self {
        self.followup = Some(followup.into());
        self
    }
}

/// Partial update. Fields left as `None` keep their previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.followup.is_none()
            && self.column_id.is_none()
            && self.position.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            _ => anyhow::bail!("invalid direction '{s}': must be up or down"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display order: the default columns first, then any others in the order given.
pub fn ordered_columns<'a>(seen: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut columns: Vec<String> = DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect();
    for column in seen {
        if !columns.iter().any(|c| c == column) {
            columns.push(column.to_string());
        }
    }
    columns
}
