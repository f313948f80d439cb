//! Key mapping for the monitor
//!
//! Converts key events into monitor actions. Printable keys edit the input
//! line; function keys drive the line events a real caller would produce.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// What a key press asks the monitor to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    /// Append to the input line
    Insert(char),
    Backspace,
    /// Clear the input line
    ClearLine,
    /// Run the input line
    Submit,
    ToggleCarrier,
    TogglePause,
    ToggleAbort,
    /// Reset the session to its initial state
    Restart,
    Quit,
}

/// Key mapper for converting key events to monitor actions
pub struct KeyMapper;

impl KeyMapper {
    pub fn map(event: &KeyEvent) -> Option<MonitorAction> {
        // Windows reports releases too
        if event.kind == KeyEventKind::Release {
            return None;
        }
        let mods = Modifiers::from(event.modifiers);

        match event.code {
            KeyCode::Char(ch) if mods.contains(Modifiers::CTRL) => match ch.to_ascii_lowercase() {
                'c' | 'q' => Some(MonitorAction::Quit),
                'u' => Some(MonitorAction::ClearLine),
                _ => None,
            },
            KeyCode::Char(_) if mods.contains(Modifiers::ALT) => None,
            KeyCode::Char(ch) if ch.is_ascii() && !ch.is_ascii_control() => {
                Some(MonitorAction::Insert(ch))
            }
            KeyCode::Enter => Some(MonitorAction::Submit),
            KeyCode::Backspace => Some(MonitorAction::Backspace),
            KeyCode::Esc => Some(MonitorAction::Quit),
            KeyCode::F(1) => Some(MonitorAction::ToggleCarrier),
            KeyCode::F(2) => Some(MonitorAction::TogglePause),
            KeyCode::F(3) => Some(MonitorAction::ToggleAbort),
            KeyCode::F(5) => Some(MonitorAction::Restart),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key_event(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn test_char_keys() {
        let event = key_event(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(MonitorAction::Insert('a')));

        let event = key_event(KeyCode::Char('&'), KeyModifiers::SHIFT);
        assert_eq!(KeyMapper::map(&event), Some(MonitorAction::Insert('&')));

        // Outside the glyph set
        let event = key_event(KeyCode::Char('é'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), None);

        let event = key_event(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(KeyMapper::map(&event), None);
    }

    #[test]
    fn test_control_keys() {
        let event = key_event(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), Some(MonitorAction::Quit));

        let event = key_event(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), Some(MonitorAction::ClearLine));

        let event = key_event(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(MonitorAction::Quit));

        let event = key_event(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(MonitorAction::Submit));
    }

    #[test]
    fn test_function_keys() {
        let event = key_event(KeyCode::F(1), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(MonitorAction::ToggleCarrier));

        let event = key_event(KeyCode::F(3), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(MonitorAction::ToggleAbort));

        let event = key_event(KeyCode::F(12), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), None);
    }

    #[test]
    fn test_release_ignored() {
        let event = KeyEvent {
            code: KeyCode::Char('a'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(KeyMapper::map(&event), None);
    }

    #[test]
    fn test_modifiers_conversion() {
        let mods = Modifiers::from(KeyModifiers::CONTROL | KeyModifiers::SHIFT);
        assert_eq!(mods, Modifiers::CTRL | Modifiers::SHIFT);
    }
}
