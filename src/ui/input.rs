/// Input collector.
///
/// The game is turn-based: every action is one key press. Each frame drains
/// the terminal's pending events and keeps only presses (and auto-repeats,
/// so holding a direction keeps walking at the move cooldown).
///
/// Pulling is "move while shift is held". Terminals report shift+w either as
/// `W` or as `w` with the SHIFT modifier; both count.

use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::{MoveDir, MoveInput};

pub struct InputState {
    /// Key presses collected during the most recent `drain_events()`.
    presses: Vec<KeyEvent>,
}

impl InputState {
    pub fn new() -> Self {
        InputState { presses: Vec::with_capacity(8) }
    }

    /// Drain all pending terminal events. Call once per frame.
    pub fn drain_events(&mut self) {
        self.presses.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                if key.kind != KeyEventKind::Release {
                    self.presses.push(key);
                }
            }
        }
    }

    pub fn presses(&self) -> &[KeyEvent] {
        &self.presses
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.presses.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }
}

/// WASD or arrows; shift turns the step into a pull.
pub fn move_input(key: &KeyEvent) -> Option<MoveInput> {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let (dir, upper) = match key.code {
        KeyCode::Char(c) => (wasd(c.to_ascii_lowercase())?, c.is_ascii_uppercase()),
        KeyCode::Up => (MoveDir::Up, false),
        KeyCode::Down => (MoveDir::Down, false),
        KeyCode::Left => (MoveDir::Left, false),
        KeyCode::Right => (MoveDir::Right, false),
        _ => return None,
    };
    Some(MoveInput { dir, pull: shift || upper })
}

pub fn wasd(c: char) -> Option<MoveDir> {
    match c {
        'w' => Some(MoveDir::Up),
        'a' => Some(MoveDir::Left),
        's' => Some(MoveDir::Down),
        'd' => Some(MoveDir::Right),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn plain_keys_push() {
        assert_eq!(
            move_input(&key(KeyCode::Char('w'), KeyModifiers::NONE)),
            Some(MoveInput::push(MoveDir::Up))
        );
        assert_eq!(
            move_input(&key(KeyCode::Left, KeyModifiers::NONE)),
            Some(MoveInput::push(MoveDir::Left))
        );
    }

    #[test]
    fn shift_pulls() {
        assert_eq!(
            move_input(&key(KeyCode::Char('D'), KeyModifiers::NONE)),
            Some(MoveInput::pull(MoveDir::Right))
        );
        assert_eq!(
            move_input(&key(KeyCode::Char('s'), KeyModifiers::SHIFT)),
            Some(MoveInput::pull(MoveDir::Down))
        );
        assert_eq!(
            move_input(&key(KeyCode::Up, KeyModifiers::SHIFT)),
            Some(MoveInput::pull(MoveDir::Up))
        );
    }

    #[test]
    fn other_keys_ignored() {
        assert_eq!(move_input(&key(KeyCode::Char('q'), KeyModifiers::NONE)), None);
        assert_eq!(move_input(&key(KeyCode::Enter, KeyModifiers::NONE)), None);
    }
}
