mod app;
mod editor;
mod event;
mod layout;
mod view;

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    self as ct_event, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste,
    EnableMouseCapture, Event, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use log::info;
use ratatui::prelude::*;

use crate::board::Board;
use crate::config::ClientConfig;
use crate::watch;
use app::{App, TextField};
use event::KeyAction;

/// How long to wait for input before driving timers.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Run the interactive board until the user quits.
///
/// `db_path` is set in local mode: changes to that file from other processes
/// trigger a sync.
pub fn run(
    board: Board,
    config: ClientConfig,
    config_path: PathBuf,
    db_path: Option<&str>,
) -> Result<()> {
    let mut app = App::new(board, config, Some(config_path));
    // Keep the watcher alive for the whole session.
    let watcher = db_path.map(watch::watch_db).transpose()?;

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, watcher.as_ref().map(|(_, rx)| rx));

    terminal::disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    // The worker goes away with the board; let queued writes land first.
    let saved = app.board.settle();
    result.and(saved.map(|_| ()))
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    changes: Option<&Receiver<()>>,
) -> Result<()> {
    info!("board opened with {} tasks", app.board.store().len());
    loop {
        terminal.draw(|frame| view::render(frame, app))?;

        if ct_event::poll(POLL_INTERVAL)? {
            match ct_event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    match event::handle_key(app, key) {
                        KeyAction::Quit => return Ok(()),
                        KeyAction::Run(command) => app.perform(command, Instant::now()),
                        KeyAction::EditText(field) => edit_text(terminal, app, field),
                        KeyAction::Continue => {}
                    }
                }
                Event::Mouse(mouse) => event::handle_mouse(app, mouse),
                Event::Paste(text) => app.on_paste(&text),
                _ => {}
            }
        }

        // Another process wrote the database file.
        if changes.is_some_and(watch::drain_events) {
            app.board.request_sync();
        }
        app.tick(Instant::now());
    }
}

fn edit_text(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    field: TextField,
) {
    let Some(task) = app.selected_task() else {
        return;
    };
    let id = task.id;
    let initial = match field {
        TextField::Description => task.description.clone(),
        TextField::Followup => task.followup.clone(),
    };
    match editor::open_editor(terminal, &initial) {
        Ok(content) if content.trim_end() == initial.trim_end() => {}
        Ok(content) => app.save_text(id, field, &content),
        Err(e) => app.error(&e),
    }
}
