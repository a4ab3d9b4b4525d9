//! Message types for the TUI
//!
//! Messages describe what the user did, not how to handle it. Turning a key
//! into a message is a pure function of the key and a small [`KeyContext`];
//! all state changes happen in `App::update`.

use crossterm::event::{KeyCode, KeyModifiers, MouseEvent};

use crate::tree_view::NavKey;

/// All possible messages/actions in the TUI
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    // === Goal picker ===
    PickerUp,
    PickerDown,
    OpenSelected,
    NewGoal,

    // === Tree: focused node ===
    /// Arrow keys and Space, handed to the navigator
    Nav(NavKey),
    /// Toggle the focused node's stub state (connector control)
    MinimizeSelf,
    MinimizeChildren,
    AddChild,
    EditNode,
    ToggleDone,
    DeleteNode,
    Generate,
    Enhance,

    // === Tree: global ===
    /// Arrow keys with nothing focused
    Pan(i32, i32),
    ZoomIn,
    ZoomOut,
    Fit,
    ToggleCompleted,
    FocusRoot,
    ClearFocus,
    /// Leave the tree view for the picker
    Back,

    // === Dialogs ===
    Input(char),
    Backspace,
    NextField,
    Submit,
    Cancel,

    // === Lifecycle ===
    Quit,
    Tick,
    Resize(u16, u16),
    Mouse(MouseEvent),

    /// Unhandled key
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Picker,
    Tree,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Input,
    Confirm,
}

/// What the key mapping needs to know about the app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyContext {
    pub screen: ScreenKind,
    pub dialog: Option<DialogKind>,
    pub focused: bool,
}

const PAN_STEP: i32 = 40;

/// Convert a key event to a message
pub fn key_to_msg(code: KeyCode, modifiers: KeyModifiers, ctx: KeyContext) -> Msg {
    if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return Msg::Quit;
    }

    match ctx.dialog {
        Some(DialogKind::Input) => {
            return match code {
                KeyCode::Enter => Msg::Submit,
                KeyCode::Esc => Msg::Cancel,
                KeyCode::Tab | KeyCode::BackTab => Msg::NextField,
                KeyCode::Backspace => Msg::Backspace,
                KeyCode::Char(c) => Msg::Input(c),
                _ => Msg::Noop,
            };
        }
        Some(DialogKind::Confirm) => {
            return match code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Msg::Submit,
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Msg::Cancel,
                _ => Msg::Noop,
            };
        }
        None => {}
    }

    match ctx.screen {
        ScreenKind::Picker => match code {
            KeyCode::Char('q') | KeyCode::Esc => Msg::Quit,
            KeyCode::Char('j') | KeyCode::Down => Msg::PickerDown,
            KeyCode::Char('k') | KeyCode::Up => Msg::PickerUp,
            KeyCode::Enter => Msg::OpenSelected,
            KeyCode::Char('n') => Msg::NewGoal,
            _ => Msg::Noop,
        },
        ScreenKind::NotFound => match code {
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter | KeyCode::Backspace => Msg::Back,
            _ => Msg::Noop,
        },
        ScreenKind::Tree => tree_key(code, ctx.focused),
    }
}

fn tree_key(code: KeyCode, focused: bool) -> Msg {
    match code {
        KeyCode::Char('+') | KeyCode::Char('=') => return Msg::ZoomIn,
        KeyCode::Char('-') => return Msg::ZoomOut,
        KeyCode::Char('f') => return Msg::Fit,
        KeyCode::Char('c') => return Msg::ToggleCompleted,
        KeyCode::Tab => return Msg::FocusRoot,
        KeyCode::Char('q') => return Msg::Back,
        _ => {}
    }

    if !focused {
        return match code {
            KeyCode::Esc => Msg::Back,
            KeyCode::Left | KeyCode::Char('h') => Msg::Pan(PAN_STEP, 0),
            KeyCode::Right | KeyCode::Char('l') => Msg::Pan(-PAN_STEP, 0),
            KeyCode::Up | KeyCode::Char('k') => Msg::Pan(0, PAN_STEP),
            KeyCode::Down | KeyCode::Char('j') => Msg::Pan(0, -PAN_STEP),
            _ => Msg::Noop,
        };
    }

    match code {
        KeyCode::Esc => Msg::ClearFocus,
        KeyCode::Up => Msg::Nav(NavKey::Up),
        KeyCode::Down => Msg::Nav(NavKey::Down),
        KeyCode::Left => Msg::Nav(NavKey::Left),
        KeyCode::Right => Msg::Nav(NavKey::Right),
        KeyCode::Char(' ') => Msg::Nav(NavKey::Space),
        KeyCode::Char('m') => Msg::MinimizeSelf,
        KeyCode::Char('M') => Msg::MinimizeChildren,
        KeyCode::Char('a') => Msg::AddChild,
        KeyCode::Char('e') => Msg::EditNode,
        KeyCode::Char('d') => Msg::ToggleDone,
        KeyCode::Char('x') | KeyCode::Delete => Msg::DeleteNode,
        KeyCode::Char('g') => Msg::Generate,
        KeyCode::Char('E') => Msg::Enhance,
        _ => Msg::Noop,
    }
}

/// Check if a message should cause the app to quit
pub fn is_quit(msg: &Msg) -> bool {
    matches!(msg, Msg::Quit)
}
