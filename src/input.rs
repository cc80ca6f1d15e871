//! Key bindings: the single spin trigger plus quit.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Spin,
    Quit,
    None,
}

/// Map key event to action. Space, Enter and `s` all spin.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod && modifiers != KeyModifiers::CONTROL {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc if no_mod => Action::Quit,
        KeyCode::Char('c') if modifiers == KeyModifiers::CONTROL => Action::Quit,
        KeyCode::Char(' ' | 's') | KeyCode::Enter if no_mod => Action::Spin,
        _ => Action::None,
    }
}
