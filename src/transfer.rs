//! JSON export and import of a whole board.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::BoardError;
use crate::model::{ordered_columns, NewTask, Task};

pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub followup: String,
    pub column_id: String,
    #[serde(default)]
    pub position: usize,
}

impl ExportedTask {
    pub fn to_new_task(&self) -> NewTask {
        NewTask {
            title: self.title.clone(),
            description: Some(self.description.clone()).filter(|d| !d.is_empty()),
            followup: Some(self.followup.clone()).filter(|f| !f.is_empty()),
            column_id: Some(self.column_id.clone()),
        }
    }
}

impl From<&Task> for ExportedTask {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            followup: task.followup.clone(),
            column_id: task.column_id.clone(),
            position: task.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Export {
    pub version: u32,
    pub tasks: Vec<ExportedTask>,
}

/// Accepted import shapes: our own envelope, or a bare array of tasks.
/// Unknown fields (ids, timestamps) are ignored.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportDoc {
    Envelope {
        #[serde(default)]
        version: Option<u32>,
        tasks: Vec<ExportedTask>,
    },
    Bare(Vec<ExportedTask>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Delete every existing task first.
    Replace,
    /// Keep existing tasks; imported ones go after them in each column.
    Append,
}

impl ImportMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "replace" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            _ => anyhow::bail!("invalid import mode '{s}': must be replace or append"),
        }
    }
}

impl Export {
    /// Snapshot of `tasks`, grouped by column in display order and sorted by
    /// position within each column.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let columns = ordered_columns(tasks.iter().map(|t| t.column_id.as_str()));
        let mut sorted: Vec<&Task> = tasks.iter().collect();
        sorted.sort_by_key(|t| {
            let column_rank = columns.iter().position(|c| *c == t.column_id);
            (column_rank, t.position)
        });
        Self {
            version: EXPORT_VERSION,
            tasks: sorted.into_iter().map(ExportedTask::from).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate. Nothing is mutated by a failed parse, so callers can
    /// reject bad files before touching the board.
    pub fn parse(json: &str) -> Result<Self, BoardError> {
        let doc: ImportDoc =
            serde_json::from_str(json).map_err(|e| BoardError::InvalidImport(e.to_string()))?;
        let (version, tasks) = match doc {
            ImportDoc::Envelope { version, tasks } => (version.unwrap_or(EXPORT_VERSION), tasks),
            ImportDoc::Bare(tasks) => (EXPORT_VERSION, tasks),
        };
        if version > EXPORT_VERSION {
            return Err(BoardError::InvalidImport(format!(
                "unsupported export version {version}"
            )));
        }
        for (i, task) in tasks.iter().enumerate() {
            if task.title.trim().is_empty() {
                return Err(BoardError::InvalidImport(format!("task {i} has an empty title")));
            }
            if task.column_id.trim().is_empty() {
                return Err(BoardError::InvalidImport(format!(
                    "task {i} ('{}') has an empty column_id",
                    task.title
                )));
            }
        }
        Ok(Self { version, tasks })
    }

    /// Tasks in the order they should be created so that appending each one
    /// reproduces the exported order within every column.
    pub fn creation_order(&self) -> Vec<&ExportedTask> {
        let mut ordered: Vec<&ExportedTask> = self.tasks.iter().collect();
        ordered.sort_by_key(|t| t.position);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::task;

    #[test]
    fn export_groups_by_column_order() {
        let mut tasks = vec![
            task(1, "completed", 0),
            task(2, "planned", 1),
            task(3, "planned", 0),
            task(4, "custom", 0),
        ];
        tasks[0].followup = "check".into();
        let export = Export::from_tasks(&tasks);
        let order: Vec<(&str, usize)> = export
            .tasks
            .iter()
            .map(|t| (t.column_id.as_str(), t.position))
            .collect();
        assert_eq!(
            order,
            vec![("planned", 0), ("planned", 1), ("completed", 0), ("custom", 0)]
        );
        assert_eq!(export.tasks[2].followup, "check");
    }

    #[test]
    fn parse_envelope_and_bare_array() {
        let wrapped = r#"{"version":1,"tasks":[{"title":"a","column_id":"planned","position":0}]}"#;
        assert_eq!(Export::parse(wrapped).unwrap().tasks.len(), 1);

        let bare = r#"[{"id":7,"title":"a","description":"d","column_id":"planned",
                        "position":0,"created_at":"2024-01-01","updated_at":"2024-01-01"}]"#;
        let export = Export::parse(bare).unwrap();
        assert_eq!(export.tasks[0].description, "d");
        assert_eq!(export.version, EXPORT_VERSION);
    }

    #[test]
    fn malformed_input_rejected() {
        assert!(matches!(
            Export::parse("{not json"),
            Err(BoardError::InvalidImport(_))
        ));
        assert!(matches!(
            Export::parse(r#"{"tasks":[{"column_id":"planned"}]}"#),
            Err(BoardError::InvalidImport(_))
        ));
        assert!(matches!(
            Export::parse(r#"[{"title":"  ","column_id":"planned"}]"#),
            Err(BoardError::InvalidImport(_))
        ));
        assert!(matches!(
            Export::parse(r#"[{"title":"t","column_id":""}]"#),
            Err(BoardError::InvalidImport(_))
        ));
        assert!(matches!(
            Export::parse(r#"{"version":9,"tasks":[]}"#),
            Err(BoardError::InvalidImport(_))
        ));
    }

    #[test]
    fn json_roundtrip() {
        let export = Export::from_tasks(&[task(1, "planned", 0), task(2, "archives", 0)]);
        let parsed = Export::parse(&export.to_json().unwrap()).unwrap();
        assert_eq!(parsed, export);
    }

    #[test]
    fn creation_order_sorts_by_position_stably() {
        let export = Export::parse(
            r#"[{"title":"b1","column_id":"b","position":1},
                {"title":"a1","column_id":"a","position":1},
                {"title":"b0","column_id":"b","position":0},
                {"title":"a0","column_id":"a","position":0}]"#,
        )
        .unwrap();
        let titles: Vec<&str> = export.creation_order().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["b0", "a0", "b1", "a1"]);
    }

    #[test]
    fn empty_text_becomes_absent_on_create() {
        let new = ExportedTask::from(&task(1, "planned", 0)).to_new_task();
        assert_eq!(new.description, None);
        assert_eq!(new.column_id.as_deref(), Some("planned"));
    }

    #[test]
    fn import_mode_parse() {
        assert_eq!(ImportMode::parse("replace").unwrap(), ImportMode::Replace);
        assert_eq!(ImportMode::parse("append").unwrap(), ImportMode::Append);
        assert!(ImportMode::parse("merge").is_err());
    }
}
