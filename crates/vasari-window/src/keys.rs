//! Physical key codes to the key names the runtime understands.

use vasari_surface::KeyInput;
use winit::event::ElementState;
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};

/// Lower-case key name for a physical key, or `None` for keys the runtime
/// has no use for.
pub fn key_name(code: KeyCode) -> Option<&'static str> {
    use KeyCode::*;
    Some(match code {
        KeyA => "a",
        KeyB => "b",
        KeyC => "c",
        KeyD => "d",
        KeyE => "e",
        KeyF => "f",
        KeyG => "g",
        KeyH => "h",
        KeyI => "i",
        KeyJ => "j",
        KeyK => "k",
        KeyL => "l",
        KeyM => "m",
        KeyN => "n",
        KeyO => "o",
        KeyP => "p",
        KeyQ => "q",
        KeyR => "r",
        KeyS => "s",
        KeyT => "t",
        KeyU => "u",
        KeyV => "v",
        KeyW => "w",
        KeyX => "x",
        KeyY => "y",
        KeyZ => "z",
        Digit0 | Numpad0 => "0",
        Digit1 | Numpad1 => "1",
        Digit2 | Numpad2 => "2",
        Digit3 | Numpad3 => "3",
        Digit4 | Numpad4 => "4",
        Digit5 | Numpad5 => "5",
        Digit6 | Numpad6 => "6",
        Digit7 | Numpad7 => "7",
        Digit8 | Numpad8 => "8",
        Digit9 | Numpad9 => "9",
        Backquote => "`",
        BracketLeft => "[",
        BracketRight => "]",
        Minus | NumpadSubtract => "-",
        Equal => "=",
        Semicolon => ";",
        Quote => "'",
        Comma => ",",
        Period | NumpadDecimal => ".",
        Slash | NumpadDivide => "/",
        Backslash => "\\",
        Enter | NumpadEnter => "return",
        Space => "space",
        Tab => "tab",
        Backspace => "backspace",
        ShiftLeft | ShiftRight => "shift",
        ControlLeft | ControlRight => "ctrl",
        AltLeft | AltRight => "alt",
        SuperLeft | SuperRight => "meta",
        CapsLock => "capslock",
        Fn => "fn",
        Escape => "escape",
        ArrowLeft => "arrowleft",
        ArrowRight => "arrowright",
        ArrowUp => "arrowup",
        ArrowDown => "arrowdown",
        _ => return None,
    })
}

/// Modifier and lock state tracked across keyboard events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardState {
    pub shift: bool,
    pub ctrl: bool,
    pub capslock: bool,
}

impl KeyboardState {
    pub fn set_modifiers(&mut self, modifiers: ModifiersState) {
        self.shift = modifiers.shift_key();
        self.ctrl = modifiers.control_key() || modifiers.super_key();
    }

    /// Translate one key transition. Only presses produce input; pressing
    /// caps lock also toggles the lock.
    pub fn key_event(&mut self, key: PhysicalKey, state: ElementState) -> Option<KeyInput> {
        if state != ElementState::Pressed {
            return None;
        }
        let PhysicalKey::Code(code) = key else {
            return None;
        };
        if code == KeyCode::CapsLock {
            self.capslock = !self.capslock;
        }
        let name = key_name(code)?;
        Some(KeyInput {
            key: name.to_string(),
            shift: self.shift,
            ctrl: self.ctrl,
            capslock: self.capslock,
        })
    }
}
