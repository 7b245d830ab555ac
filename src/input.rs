use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::machine::{GameStatus, Intent};
use crate::snake::Direction;
use crate::term::Area;

/// Maps a raw terminal event to an intent. `button` is the clickable area
/// of the overlay currently on screen, if any.
pub fn translate(ev: &Event, status: GameStatus, button: Option<Area>) -> Option<Intent> {
    match ev {
        Event::Key(key) if key.kind != KeyEventKind::Release => translate_key(key, status),
        Event::Mouse(MouseEvent { kind: MouseEventKind::Down(MouseButton::Left), column, row, .. }) => {
            match button {
                Some(area) if area.contains((*column, *row)) => confirm(status),
                _ => None,
            }
        }
        _ => None,
    }
}

fn translate_key(key: &KeyEvent, status: GameStatus) -> Option<Intent> {
    if is_ctrl_c(key) {
        return Some(Intent::Quit);
    }

    match key.code {
        KeyCode::Char('w') | KeyCode::Up => Some(Intent::Turn(Direction::Up)),
        KeyCode::Char('a') | KeyCode::Left => Some(Intent::Turn(Direction::Left)),
        KeyCode::Char('s') | KeyCode::Down => Some(Intent::Turn(Direction::Down)),
        KeyCode::Char('d') | KeyCode::Right => Some(Intent::Turn(Direction::Right)),
        KeyCode::Char(' ') | KeyCode::Enter => confirm(status),
        KeyCode::Esc | KeyCode::Char('q') => Some(Intent::Quit),
        _ => None,
    }
}

/// Space, Enter and the on-screen button all mean "go" for whichever screen
/// is showing.
fn confirm(status: GameStatus) -> Option<Intent> {
    match status {
        GameStatus::NotStarted => Some(Intent::Start),
        GameStatus::GameOver => Some(Intent::Restart),
        GameStatus::Running => None,
    }
}

fn is_ctrl_c(ev: &KeyEvent) -> bool {
    ev.code == KeyCode::Char('c') && ev.modifiers.contains(KeyModifiers::CONTROL)
}
