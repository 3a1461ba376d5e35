use std::io::{self, Write as _};
use std::process::Command;

use anyhow::{bail, Context, Result};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::prelude::*;

/// Split `$EDITOR` the way a shell would, so `code --wait` works.
fn editor_command() -> Result<Vec<String>> {
    let editor = std::env::var("EDITOR").context("$EDITOR is not set")?;
    match shlex::split(&editor) {
        Some(argv) if !argv.is_empty() => Ok(argv),
        _ => bail!("cannot parse $EDITOR '{editor}'"),
    }
}

/// Suspends the board, opens `$EDITOR` with `initial_content` in a temp file,
/// waits for the editor to exit, reads the result, and restores the board.
pub fn open_editor(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    initial_content: &str,
) -> Result<String> {
    let argv = editor_command()?;

    let mut tmp = tempfile::Builder::new()
        .prefix("workplan-")
        .suffix(".md")
        .tempfile()
        .context("failed to create temp file")?;
    tmp.write_all(initial_content.as_bytes())
        .context("failed to write to temp file")?;
    tmp.flush()?;

    let path = tmp.path().to_path_buf();

    // Suspend TUI
    terminal::disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;

    let status_result = Command::new(&argv[0])
        .args(&argv[1..])
        .arg(&path)
        .status()
        .with_context(|| format!("failed to run editor '{}'", argv[0]));

    // Restore TUI (always, even if the editor failed to launch)
    execute!(
        terminal.backend_mut(),
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )?;
    terminal::enable_raw_mode()?;
    terminal.clear()?;

    let status = status_result?;
    if !status.success() {
        bail!("editor exited with status {status}");
    }

    let content = std::fs::read_to_string(&path)
        .context("failed to read temp file after editor closed")?;

    Ok(content)
}
