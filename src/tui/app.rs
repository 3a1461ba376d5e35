use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::board::{Board, Notice};
use crate::config::ClientConfig;
use crate::error::BoardError;
use crate::model::{Direction, NewTask, Task, TaskId, TaskPatch, RESTORE_COLUMN};
use crate::sync::SyncEvent;

use super::layout::BoardLayout;

const TOAST_TTL: Duration = Duration::from_secs(4);

/// Sync interval presets cycled with `+`/`-`, in seconds. `0` is off.
const INTERVAL_STEPS: [u64; 7] = [0, 5, 10, 30, 60, 300, 900];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    Add { column: String },
    Edit { id: TaskId },
    /// Pasted text, one task per line.
    Bulk { column: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub text: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Help,
    ConfirmDelete(TaskId),
    Prompt(Prompt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Description,
    Followup,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub is_error: bool,
    expires: Instant,
}

/// Everything the event loop asks the board to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Nudge(Direction),
    /// Move the selected task one visible column left (-1) or right (+1).
    Shift(isize),
    Archive,
    Restore,
    Delete(TaskId),
    Sync,
    ToggleColumn,
    ShowAllColumns,
    SlowerSync,
    FasterSync,
    Submit,
}

pub struct App {
    pub board: Board,
    pub config: ClientConfig,
    config_path: Option<PathBuf>,
    pub mode: Mode,
    pub column: usize,
    pub row: usize,
    pub toast: Option<Toast>,
    /// Geometry of the last frame, for mouse hit tests.
    pub layout: BoardLayout,
}

impl App {
    /// `config_path` is where preference changes are written; `None` keeps
    /// them in memory.
    pub fn new(board: Board, config: ClientConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            board,
            config,
            config_path,
            mode: Mode::Normal,
            column: 0,
            row: 0,
            toast: None,
            layout: BoardLayout::default(),
        }
    }

    pub fn visible_columns(&self) -> Vec<String> {
        self.config.visible_columns(&self.board.columns())
    }

    pub fn hidden_count(&self) -> usize {
        self.board.columns().len() - self.visible_columns().len()
    }

    pub fn focused_column(&self) -> Option<String> {
        self.visible_columns().into_iter().nth(self.column)
    }

    pub fn selected_task(&self) -> Option<&Task> {
        let column = self.focused_column()?;
        self.board.tasks_in_column(&column).get(self.row).copied()
    }

    pub fn selected_id(&self) -> Option<TaskId> {
        self.selected_task().map(|t| t.id)
    }

    pub fn clamp_cursor(&mut self) {
        let columns = self.visible_columns();
        self.column = self.column.min(columns.len().saturating_sub(1));
        let len = columns
            .get(self.column)
            .map(|c| self.board.tasks_in_column(c).len())
            .unwrap_or(0);
        self.row = self.row.min(len.saturating_sub(1));
    }

    pub fn move_column(&mut self, delta: isize) {
        let count = self.visible_columns().len();
        if count == 0 {
            return;
        }
        self.column = self.column.saturating_add_signed(delta).min(count - 1);
        self.clamp_cursor();
    }

    pub fn move_row(&mut self, delta: isize) {
        self.row = self.row.saturating_add_signed(delta);
        self.clamp_cursor();
    }

    /// Put the cursor on `id`, if its column is visible.
    pub fn focus(&mut self, id: TaskId) {
        let Some(task) = self.board.store().get(id) else {
            return;
        };
        let (column_id, position) = (task.column_id.clone(), task.position);
        if let Some(idx) = self.visible_columns().iter().position(|c| *c == column_id) {
            self.column = idx;
            self.row = position;
            self.clamp_cursor();
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.toast(message.into(), false);
    }

    pub fn error(&mut self, err: &anyhow::Error) {
        self.toast(format!("{err:#}"), true);
    }

    fn toast(&mut self, message: String, is_error: bool) {
        self.toast = Some(Toast {
            message,
            is_error,
            expires: Instant::now() + TOAST_TTL,
        });
    }

    pub fn open_prompt(&mut self, kind: PromptKind, text: String) {
        self.mode = Mode::Prompt(Prompt {
            kind,
            text,
            error: None,
        });
    }

    pub fn prompt_mut(&mut self) -> Option<&mut Prompt> {
        match &mut self.mode {
            Mode::Prompt(p) => Some(p),
            _ => None,
        }
    }

    /// Bracketed paste: multi-line text opens the bulk prompt, a single line
    /// goes into whatever prompt is open.
    pub fn on_paste(&mut self, text: &str) {
        if let Some(prompt) = self.prompt_mut() {
            if !text.contains('\n') || matches!(prompt.kind, PromptKind::Bulk { .. }) {
                prompt.text.push_str(text);
                prompt.error = None;
                return;
            }
        }
        if !matches!(self.mode, Mode::Normal | Mode::Prompt(_)) {
            return;
        }
        let Some(column) = self.focused_column() else {
            return;
        };
        let kind = if text.trim().contains('\n') {
            PromptKind::Bulk { column }
        } else {
            PromptKind::Add { column }
        };
        self.open_prompt(kind, text.trim().to_string());
    }

    /// Drive background work: server replies, the sync timer and toast expiry.
    pub fn tick(&mut self, now: Instant) {
        match self.board.tick(now) {
            Ok(notices) => {
                for notice in notices {
                    self.on_notice(notice);
                }
            }
            Err(e) => self.error(&e),
        }
        if self.toast.as_ref().is_some_and(|t| now >= t.expires) {
            self.toast = None;
        }
    }

    pub fn on_notice(&mut self, notice: Notice) {
        match notice {
            Notice::Created(task) => {
                self.focus(task.id);
                self.info(format!("Added '{}'", task.title));
            }
            Notice::Updated(_) | Notice::Saved => {}
            Notice::Synced { event, manual } => {
                let failed = matches!(event, SyncEvent::Failed(_));
                self.on_sync(event);
                if manual && !failed {
                    self.info("Synced");
                }
            }
            Notice::WriteFailed(e) => {
                self.error(&e);
                self.clamp_cursor();
            }
        }
    }

    fn on_sync(&mut self, event: SyncEvent) {
        if let SyncEvent::Replaced { .. } = event {
            let selected = self.selected_id();
            match selected {
                Some(id) if self.board.store().get(id).is_some() => self.focus(id),
                _ => self.clamp_cursor(),
            }
        }
    }

    pub fn perform(&mut self, command: Command, now: Instant) {
        match command {
            Command::Nudge(direction) => self.nudge(direction),
            Command::Shift(delta) => self.shift(delta),
            Command::Archive => self.with_selected(|app, id| {
                let changes = app.board.archive(id)?;
                Ok((!changes.is_empty()).then(|| "Archived".to_string()))
            }),
            Command::Restore => self.with_selected(|app, id| {
                let changes = app.board.restore(id, RESTORE_COLUMN)?;
                if changes.is_empty() {
                    return Ok(Some("Only archived tasks can be restored".to_string()));
                }
                app.focus(id);
                Ok(Some(format!("Restored to {RESTORE_COLUMN}")))
            }),
            Command::Delete(id) => {
                self.mode = Mode::Normal;
                match self.board.delete_task(id) {
                    Ok(task) => self.info(format!("Deleted '{}'", task.title)),
                    Err(e) => self.error(&e),
                }
                self.clamp_cursor();
            }
            Command::Sync => {
                if let Err(e) = self.board.sync_now(now) {
                    self.error(&e);
                }
            }
            Command::ToggleColumn => self.toggle_column(),
            Command::ShowAllColumns => {
                self.config.columns.clear();
                self.save_config();
                self.clamp_cursor();
            }
            Command::SlowerSync => self.step_interval(true, now),
            Command::FasterSync => self.step_interval(false, now),
            Command::Submit => self.submit_prompt(),
        }
    }

    /// Run `op` on the selected task, toasting its message or error.
    fn with_selected(&mut self, op: impl FnOnce(&mut Self, TaskId) -> Result<Option<String>>) {
        let Some(id) = self.selected_id() else {
            return;
        };
        match op(self, id) {
            Ok(Some(message)) => self.info(message),
            Ok(None) => {}
            Err(e) => self.error(&e),
        }
        self.clamp_cursor();
    }

    fn nudge(&mut self, direction: Direction) {
        let Some(id) = self.selected_id() else {
            return;
        };
        match self.board.nudge(id, direction) {
            Ok(Some(_)) => {
                self.focus(id);
                self.info(format!("Moved {direction}"));
            }
            Ok(None) => {}
            Err(e) => self.error(&e),
        }
    }

    fn shift(&mut self, delta: isize) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let columns = self.visible_columns();
        let target = self.column.saturating_add_signed(delta);
        if target == self.column || target >= columns.len() {
            return;
        }
        let index = self.row.min(self.board.tasks_in_column(&columns[target]).len());
        match self.board.move_task(id, &columns[target], index) {
            Ok(_) => {
                self.focus(id);
                self.info(format!("Moved to {}", columns[target]));
            }
            Err(e) => self.error(&e),
        }
    }

    fn toggle_column(&mut self) {
        let Some(column) = self.focused_column() else {
            return;
        };
        self.config.set_visible(&column, false);
        self.save_config();
        self.clamp_cursor();
        self.info(format!("Hid {column} (V shows all)"));
    }

    fn step_interval(&mut self, slower: bool, now: Instant) {
        let current = self.board.sync_interval().as_secs();
        let next = if slower {
            INTERVAL_STEPS.iter().copied().find(|s| *s > current)
        } else {
            INTERVAL_STEPS.iter().rev().copied().find(|s| *s < current)
        };
        let Some(next) = next else {
            return;
        };
        let interval = Duration::from_secs(next);
        self.board.set_sync_interval(interval, now);
        self.config.set_sync_interval(interval);
        self.save_config();
        if next == 0 {
            self.info("Auto-sync off");
        } else {
            self.info(format!("Auto-sync every {next}s"));
        }
    }

    fn save_config(&mut self) {
        let Some(path) = &self.config_path else {
            return;
        };
        if let Err(e) = self.config.save_to(path) {
            self.error(&e);
        }
    }

    fn submit_prompt(&mut self) {
        let Mode::Prompt(prompt) = &self.mode else {
            return;
        };
        let prompt = prompt.clone();
        let result = match &prompt.kind {
            PromptKind::Add { column } => self
                .board
                .add_task(NewTask::new(prompt.text.trim()).in_column(column.as_str()))
                .map(|()| (format!("Adding '{}'", prompt.text.trim()), None)),
            PromptKind::Edit { id } => self
                .board
                .edit_task(
                    *id,
                    TaskPatch {
                        title: Some(prompt.text.trim().to_string()),
                        ..TaskPatch::default()
                    },
                )
                .map(|()| ("Saved".to_string(), Some(*id))),
            PromptKind::Bulk { column } => self
                .board
                .add_many(column, &prompt.text)
                .map(|count| (format!("Adding {count} tasks"), None)),
        };
        match result {
            Ok((message, focus)) => {
                self.mode = Mode::Normal;
                if let Some(id) = focus {
                    self.focus(id);
                }
                self.info(message);
            }
            Err(e) if e.downcast_ref::<BoardError>() == Some(&BoardError::EmptyTitle) => {
                if let Some(p) = self.prompt_mut() {
                    p.error = Some("Title must not be empty".into());
                }
            }
            Err(e) => {
                self.mode = Mode::Normal;
                self.error(&e);
            }
        }
    }

    /// Save text written in `$EDITOR` back to the task.
    pub fn save_text(&mut self, id: TaskId, field: TextField, content: &str) {
        let content = content.trim_end().to_string();
        let patch = match field {
            TextField::Description => TaskPatch {
                description: Some(content),
                ..TaskPatch::default()
            },
            TextField::Followup => TaskPatch {
                followup: Some(content),
                ..TaskPatch::default()
            },
        };
        match self.board.edit_task(id, patch) {
            Ok(_) => self.info("Saved"),
            Err(e) => self.error(&e),
        }
    }

    pub fn mouse_down(&mut self, x: u16, y: u16) {
        if self.mode != Mode::Normal {
            return;
        }
        let Some(id) = self.layout.card_at(x, y) else {
            return;
        };
        self.focus(id);
        self.board.cancel_drag();
        if let Err(e) = self.board.begin_drag(id) {
            self.error(&e.into());
        }
    }

    pub fn mouse_drag(&mut self, x: u16, y: u16) {
        if self.board.dragged().is_none() {
            return;
        }
        // Pointer sits in the middle of the cell row.
        let pointer_y = f64::from(y) + 0.5;
        let result = match self.layout.column_at(x, y) {
            Some(area) => self.board.drag_over(&area.column, pointer_y, &area.slots()),
            None => Ok(self.board.drag_leave()),
        };
        if let Err(e) = result {
            self.error(&e);
        }
    }

    pub fn mouse_up(&mut self, x: u16, y: u16) {
        if self.board.dragged().is_none() {
            return;
        }
        self.mouse_drag(x, y);
        match self.board.drop_drag() {
            Ok(Some((id, changes))) => {
                self.focus(id);
                if !changes.is_empty() {
                    self.info("Moved");
                }
            }
            Ok(None) => {}
            Err(e) => {
                self.error(&e);
                self.clamp_cursor();
            }
        }
    }

    pub fn cancel_drag(&mut self) -> bool {
        self.board.cancel_drag().is_some()
    }
}
