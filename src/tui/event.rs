use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use super::app::{App, Command, Mode, PromptKind, TextField};
use crate::model::Direction;

/// Result of handling a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Run(Command),
    /// Open `$EDITOR` on a text field of the selected task.
    EditText(TextField),
    Continue,
}

/// Handle a key press. Cursor and mode changes are applied directly; anything
/// that touches the board comes back as an action for the event loop.
pub fn handle_key(app: &mut App, key: KeyEvent) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }
    match &app.mode {
        Mode::Prompt(_) => handle_prompt(app, key),
        Mode::Help => {
            app.mode = Mode::Normal;
            KeyAction::Continue
        }
        Mode::ConfirmDelete(id) => {
            let id = *id;
            app.mode = Mode::Normal;
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => KeyAction::Run(Command::Delete(id)),
                _ => KeyAction::Continue,
            }
        }
        Mode::Normal => handle_normal(app, key),
    }
}

fn handle_normal(app: &mut App, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('q') => KeyAction::Quit,
        KeyCode::Esc => {
            app.cancel_drag();
            KeyAction::Continue
        }
        KeyCode::Char('h') | KeyCode::Left => {
            app.move_column(-1);
            KeyAction::Continue
        }
        KeyCode::Char('l') | KeyCode::Right => {
            app.move_column(1);
            KeyAction::Continue
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.move_row(-1);
            KeyAction::Continue
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.move_row(1);
            KeyAction::Continue
        }
        KeyCode::Char('K') => KeyAction::Run(Command::Nudge(Direction::Up)),
        KeyCode::Char('J') => KeyAction::Run(Command::Nudge(Direction::Down)),
        KeyCode::Char('H') => KeyAction::Run(Command::Shift(-1)),
        KeyCode::Char('L') => KeyAction::Run(Command::Shift(1)),
        KeyCode::Char('a') => {
            if let Some(column) = app.focused_column() {
                app.open_prompt(PromptKind::Add { column }, String::new());
            }
            KeyAction::Continue
        }
        KeyCode::Char('e') => {
            if let Some(task) = app.selected_task() {
                let (id, title) = (task.id, task.title.clone());
                app.open_prompt(PromptKind::Edit { id }, title);
            }
            KeyAction::Continue
        }
        KeyCode::Char('E') => KeyAction::EditText(TextField::Description),
        KeyCode::Char('f') => KeyAction::EditText(TextField::Followup),
        KeyCode::Char('A') => KeyAction::Run(Command::Archive),
        KeyCode::Char('R') => KeyAction::Run(Command::Restore),
        KeyCode::Char('D') => {
            if let Some(id) = app.selected_id() {
                app.mode = Mode::ConfirmDelete(id);
            }
            KeyAction::Continue
        }
        KeyCode::Char('r') => KeyAction::Run(Command::Sync),
        KeyCode::Char('v') => KeyAction::Run(Command::ToggleColumn),
        KeyCode::Char('V') => KeyAction::Run(Command::ShowAllColumns),
        KeyCode::Char('+') | KeyCode::Char('=') => KeyAction::Run(Command::SlowerSync),
        KeyCode::Char('-') => KeyAction::Run(Command::FasterSync),
        KeyCode::Char('?') => {
            app.mode = Mode::Help;
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}

fn handle_prompt(app: &mut App, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Esc => {
            app.mode = Mode::Normal;
            KeyAction::Continue
        }
        KeyCode::Enter => KeyAction::Run(Command::Submit),
        KeyCode::Backspace => {
            if let Some(prompt) = app.prompt_mut() {
                prompt.text.pop();
                prompt.error = None;
            }
            KeyAction::Continue
        }
        KeyCode::Char(c) => {
            if let Some(prompt) = app.prompt_mut() {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    if c == 'u' {
                        prompt.text.clear();
                    }
                } else {
                    prompt.text.push(c);
                }
                prompt.error = None;
            }
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}

/// Left button press, drag and release drive the drag session; everything
/// else is ignored.
pub fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => app.mouse_down(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.mouse_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.mouse_up(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.move_row(1),
        MouseEventKind::ScrollUp => app.move_row(-1),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crate::api::{LocalApi, TaskApi};
    use crate::board::Board;
    use crate::config::ClientConfig;
    use crate::model::NewTask;

    fn app() -> App {
        let api = LocalApi::in_memory().unwrap();
        api.create_task(&NewTask::new("a").in_column("future-plans")).unwrap();
        api.create_task(&NewTask::new("b").in_column("future-plans")).unwrap();
        let board = Board::connect(api, Duration::from_secs(10), Instant::now()).unwrap();
        App::new(board, ClientConfig::default(), None)
    }

    fn press(app: &mut App, code: KeyCode) -> KeyAction {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn navigation_keys_move_cursor() {
        let mut app = app();
        assert_eq!(press(&mut app, KeyCode::Char('j')), KeyAction::Continue);
        assert_eq!(app.row, 1);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.row, 0);
        press(&mut app, KeyCode::Char('l'));
        assert_eq!(app.column, 1);
    }

    #[test]
    fn board_keys_become_commands() {
        let mut app = app();
        assert_eq!(
            press(&mut app, KeyCode::Char('J')),
            KeyAction::Run(Command::Nudge(Direction::Down))
        );
        assert_eq!(press(&mut app, KeyCode::Char('L')), KeyAction::Run(Command::Shift(1)));
        assert_eq!(press(&mut app, KeyCode::Char('r')), KeyAction::Run(Command::Sync));
        assert_eq!(
            press(&mut app, KeyCode::Char('f')),
            KeyAction::EditText(TextField::Followup)
        );
        assert_eq!(press(&mut app, KeyCode::Char('q')), KeyAction::Quit);
    }

    #[test]
    fn delete_needs_confirmation() {
        let mut app = app();
        let id = app.selected_id().unwrap();
        assert_eq!(press(&mut app, KeyCode::Char('D')), KeyAction::Continue);
        assert_eq!(app.mode, Mode::ConfirmDelete(id));
        assert_eq!(press(&mut app, KeyCode::Char('n')), KeyAction::Continue);
        assert_eq!(app.mode, Mode::Normal);

        press(&mut app, KeyCode::Char('D'));
        assert_eq!(press(&mut app, KeyCode::Char('y')), KeyAction::Run(Command::Delete(id)));
    }

    #[test]
    fn prompt_captures_typing() {
        let mut app = app();
        press(&mut app, KeyCode::Char('e'));
        // Edit starts from the current title.
        assert_eq!(app.prompt_mut().unwrap().text, "a");
        press(&mut app, KeyCode::Char('q'));
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Char('!'));
        assert_eq!(app.prompt_mut().unwrap().text, "a!");
        handle_key(&mut app, KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert_eq!(app.prompt_mut().unwrap().text, "");
        assert_eq!(press(&mut app, KeyCode::Enter), KeyAction::Run(Command::Submit));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Normal);
    }

    #[test]
    fn any_key_closes_help() {
        let mut app = app();
        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.mode, Mode::Help);
        assert_eq!(press(&mut app, KeyCode::Char('q')), KeyAction::Continue);
        assert_eq!(app.mode, Mode::Normal);
    }
}
