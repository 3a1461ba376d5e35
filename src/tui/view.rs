use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use super::app::{App, Mode, PromptKind};
use super::layout::{capacity, scroll_offset, BoardLayout, ColumnArea};
use crate::model::{TaskId, ARCHIVE_COLUMN};
use crate::sync::SyncState;

pub fn render(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());
    let (board_area, status_area) = (chunks[0], chunks[1]);

    app.layout = compute_layout(app, board_area);
    if app.layout.columns.is_empty() {
        frame.render_widget(
            Paragraph::new("All columns are hidden. Press V to show them again.")
                .block(Block::default().borders(Borders::ALL).title(" workplan ")),
            board_area,
        );
    }
    for (idx, area) in app.layout.columns.iter().enumerate() {
        render_column(frame, app, area, idx == app.column);
    }
    render_status(frame, app, status_area);

    match &app.mode {
        Mode::Normal => {}
        Mode::Help => render_help(frame),
        Mode::ConfirmDelete(id) => render_confirm_delete(frame, app, *id),
        Mode::Prompt(_) => render_prompt(frame, app),
    }
}

fn compute_layout(app: &App, area: Rect) -> BoardLayout {
    let cap = capacity(area.height);
    let columns: Vec<(String, Vec<TaskId>, usize)> = app
        .visible_columns()
        .into_iter()
        .enumerate()
        .map(|(idx, column)| {
            let ids = app.board.tasks_in_column(&column).iter().map(|t| t.id).collect();
            let offset = if idx == app.column {
                scroll_offset(app.row, cap)
            } else {
                0
            };
            (column, ids, offset)
        })
        .collect();
    BoardLayout::compute(area, &columns)
}

fn render_column(frame: &mut Frame, app: &App, area: &ColumnArea, focused: bool) {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let title = format!(" {} ({}) ", area.column, area.cards.len());
    frame.render_widget(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border),
        area.rect,
    );

    let selected = if focused { app.selected_id() } else { None };
    let dragged = app.board.dragged();
    for card in &area.cards {
        let Some(rect) = card.rect else { continue };
        let Some(task) = app.board.store().get(card.task_id) else {
            continue;
        };
        let mut style = Style::default();
        if area.column == ARCHIVE_COLUMN {
            style = style.fg(Color::DarkGray);
        }
        if Some(task.id) == selected {
            style = style.bg(Color::DarkGray).fg(Color::White);
        }
        if Some(task.id) == dragged {
            style = style.add_modifier(Modifier::DIM | Modifier::ITALIC);
        }
        let mut markers = String::new();
        if !task.description.is_empty() {
            markers.push_str(" ≡");
        }
        if !task.followup.is_empty() {
            markers.push_str(" ↻");
        }
        if app.board.is_pending(task.id) {
            markers.push_str(" …");
        }
        frame.render_widget(
            Paragraph::new(format!("{}{markers}", task.title))
                .style(style)
                .block(Block::default().borders(Borders::ALL).border_style(style)),
            rect,
        );
    }

    if let Some(row) = drop_marker_row(app, area) {
        let marker = Rect::new(area.rect.x + 1, row, area.rect.width.saturating_sub(2), 1);
        frame.render_widget(
            Paragraph::new("─".repeat(marker.width as usize))
                .style(Style::default().fg(Color::Yellow).bold()),
            marker,
        );
    }
}

/// Screen row for the insertion line of the current drop target, if it is in
/// this column and on screen.
fn drop_marker_row(app: &App, area: &ColumnArea) -> Option<u16> {
    let target = app.board.drop_target()?;
    if target.column != area.column {
        return None;
    }
    let dragged = app.board.dragged();
    let row = match target.before {
        Some(before) => area.cards.iter().find(|c| c.task_id == before)?.rect?.y,
        None => {
            let last = area.cards.iter().rev().find(|c| Some(c.task_id) != dragged);
            match last {
                Some(card) => {
                    let rect = card.rect?;
                    rect.y + rect.height
                }
                None => area.rect.y + 1,
            }
        }
    };
    (row < area.rect.y + area.rect.height.saturating_sub(1)).then_some(row)
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(toast) = &app.toast {
        let color = if toast.is_error { Color::Red } else { Color::Green };
        frame.render_widget(
            Paragraph::new(toast.message.as_str()).style(Style::default().fg(color)),
            area,
        );
        return;
    }

    let mut spans = Vec::new();
    let sync = match app.board.sync_state() {
        SyncState::Disabled => "auto-sync off".to_string(),
        state => format!("sync {state} every {}s", app.board.sync_interval().as_secs()),
    };
    spans.push(Span::styled(sync, Style::default().fg(Color::DarkGray)));
    if app.board.is_saving() {
        spans.push(Span::styled("  saving…", Style::default().fg(Color::Yellow)));
    }
    if app.board.is_stale() {
        spans.push(Span::styled(
            "  board may be out of date",
            Style::default().fg(Color::Yellow),
        ));
    } else if let Some(err) = app.board.last_sync_error() {
        spans.push(Span::styled(
            format!("  last sync failed: {err}"),
            Style::default().fg(Color::Red),
        ));
    }
    let hidden = app.hidden_count();
    if hidden > 0 {
        spans.push(Span::styled(
            format!("  {hidden} hidden"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    spans.push(Span::styled("  ?: help", Style::default().fg(Color::DarkGray)));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

fn dialog(frame: &mut Frame, title: &str, width: u16, height: u16, color: Color) -> Rect {
    let term = frame.area();
    let width = width.min(term.width.saturating_sub(4));
    let height = height.min(term.height.saturating_sub(2));
    let area = centered_rect(width, height, term);
    frame.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {title} "))
        .border_style(Style::default().fg(color));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    inner
}

fn render_prompt(frame: &mut Frame, app: &App) {
    let Mode::Prompt(prompt) = &app.mode else {
        return;
    };
    let (title, height) = match &prompt.kind {
        PromptKind::Add { column } => (format!("Add to {column}"), 6),
        PromptKind::Edit { .. } => ("Edit title".to_string(), 6),
        PromptKind::Bulk { column } => (format!("Add many to {column}"), 14),
    };
    let inner = dialog(frame, &title, 70, height, Color::Cyan);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    frame.render_widget(
        Paragraph::new(format!("{}_", prompt.text)).wrap(Wrap { trim: false }),
        chunks[0],
    );
    if let Some(err) = &prompt.error {
        frame.render_widget(
            Paragraph::new(err.as_str()).style(Style::default().fg(Color::Red)),
            chunks[1],
        );
    } else if let PromptKind::Bulk { .. } = prompt.kind {
        let count = crate::bulk::parse_titles(&prompt.text).len();
        frame.render_widget(
            Paragraph::new(format!("{count} tasks")).style(Style::default().fg(Color::DarkGray)),
            chunks[1],
        );
    }
    frame.render_widget(
        Paragraph::new("Enter: save  Esc: cancel  C-u: clear")
            .style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );
}

fn render_confirm_delete(frame: &mut Frame, app: &App, id: TaskId) {
    let title = app
        .board
        .store()
        .get(id)
        .map(|t| t.title.clone())
        .unwrap_or_default();
    let inner = dialog(frame, "Delete", 50, 5, Color::Yellow);
    let text = vec![
        Line::from(vec![
            Span::raw("Delete "),
            Span::styled(title, Style::default().bold()),
            Span::raw(" permanently?"),
        ]),
        Line::raw(""),
        Line::from(Span::styled(
            "y: delete  any other key: cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(Paragraph::new(text), inner);
}

fn render_help(frame: &mut Frame) {
    let inner = dialog(frame, "Help", 52, 22, Color::Cyan);
    let keys: &[(&str, &str)] = &[
        ("h/j/k/l  ", "Move cursor (arrows too)"),
        ("K/J      ", "Nudge task up/down"),
        ("H/L      ", "Move task to previous/next column"),
        ("a        ", "Add task to this column"),
        ("e        ", "Edit title"),
        ("E        ", "Edit description in $EDITOR"),
        ("f        ", "Edit follow-up in $EDITOR"),
        ("A        ", "Archive task"),
        ("R        ", "Restore archived task"),
        ("D        ", "Delete task"),
        ("r        ", "Sync now"),
        ("v / V    ", "Hide column / show all"),
        ("+ / -    ", "Sync less / more often"),
        ("?        ", "Toggle help"),
        ("q        ", "Quit"),
    ];
    let mut lines: Vec<Line> = keys
        .iter()
        .map(|(key, what)| {
            Line::from(vec![
                Span::styled(*key, Style::default().fg(Color::Cyan)),
                Span::raw(*what),
            ])
        })
        .collect();
    lines.push(Line::raw(""));
    lines.push(Line::from(Span::styled("Mouse:", Style::default().bold())));
    lines.push(Line::raw("  drag a card to move it; drop outside to cancel"));
    lines.push(Line::from(Span::styled("Paste:", Style::default().bold())));
    lines.push(Line::raw("  a multi-line paste adds one task per line"));
    frame.render_widget(Paragraph::new(lines), inner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use ratatui::backend::TestBackend;

    use crate::api::{LocalApi, TaskApi};
    use crate::board::Board;
    use crate::config::ClientConfig;
    use crate::model::NewTask;

    fn app() -> App {
        let api = LocalApi::in_memory().unwrap();
        api.create_task(&NewTask::new("write docs").in_column("planned")).unwrap();
        let board = Board::connect(api, Duration::from_secs(10), Instant::now()).unwrap();
        App::new(board, ClientConfig::default(), None)
    }

    fn screen(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn draws_columns_cards_and_status() {
        let mut app = app();
        let text = screen(&mut app);
        assert!(text.contains("planned (1)"));
        assert!(text.contains("write docs"));
        assert!(text.contains("sync idle every 10s"));
        // Layout is recorded for hit testing.
        assert_eq!(app.layout.columns.len(), 5);
    }

    #[test]
    fn unsaved_cards_are_marked_until_the_write_lands() {
        let mut app = app();
        let id = app.board.store().snapshot()[0].id;
        app.board.move_task(id, "completed", 0).unwrap();
        let text = screen(&mut app);
        assert!(text.contains("write docs …"));
        assert!(text.contains("saving…"));

        app.board.settle().unwrap();
        let text = screen(&mut app);
        assert!(!text.contains("write docs …"));
        assert!(!text.contains("saving…"));
    }

    #[test]
    fn help_overlay() {
        let mut app = app();
        app.mode = Mode::Help;
        assert!(screen(&mut app).contains("Nudge task up/down"));
    }

    #[test]
    fn drop_marker_shows_during_drag() {
        let mut app = app();
        screen(&mut app);
        let id = app.board.store().snapshot()[0].id;
        app.board.begin_drag(id).unwrap();
        app.board.drag_over("in-progress", 1.5, &[]).unwrap();
        let in_progress = app.layout.column("in-progress").unwrap().clone();
        assert_eq!(drop_marker_row(&app, &in_progress), Some(in_progress.rect.y + 1));
    }

    #[test]
    fn centered_rect_clamps_to_area() {
        let r = centered_rect(40, 20, Rect::new(0, 0, 20, 10));
        assert_eq!((r.width, r.height), (20, 10));
    }
}
