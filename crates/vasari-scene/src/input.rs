//! Text input editing: per-input buffers driven by key-down events.

use std::collections::HashMap;
use vasari_surface::KeyInput;

/// Characters an input accepts (compared after lower-casing).
const PRINTABLE: &str = "1234567890qwertyuiopasdfghjklzxcvbnm`~!@#$%^&*()[{]}-_=+;:'\",<.>/?\\|";

const MODIFIERS: &[&str] = &["capslock", "shift", "alt", "ctrl", "option", "cmd", "meta", "fn"];

/// Shifted form of a key on a US layout, when it has one.
pub fn shift_char(key: &str) -> Option<char> {
    let shifted = match key {
        "`" => '~',
        "1" => '!',
        "2" => '@',
        "3" => '#',
        "4" => '$',
        "5" => '%',
        "6" => '^',
        "7" => '&',
        "8" => '*',
        "9" => '(',
        "0" => ')',
        "[" => '{',
        "]" => '}',
        "-" => '_',
        "=" => '+',
        ";" => ':',
        "'" => '"',
        "," => '<',
        "." => '>',
        "/" => '?',
        "\\" => '|',
        _ => return None,
    };
    Some(shifted)
}

pub fn is_printable(ch: char) -> bool {
    ch.to_lowercase().all(|lower| PRINTABLE.contains(lower))
}

/// What a key press did to a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Nothing changed.
    Ignored,
    /// The buffer was mutated.
    Edited,
    /// `return` on a non-empty buffer: navigate to its contents.
    Submit(String),
}

/// Buffers for every input seen in the current document, keyed by id.
#[derive(Debug, Default)]
pub struct InputBuffers {
    buffers: HashMap<String, String>,
}

impl InputBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a buffer from the node's `value` the first time an id is seen.
    pub fn seed(&mut self, id: &str, value: &str) -> &str {
        self.buffers.entry(id.to_string()).or_insert_with(|| value.to_string())
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.buffers.get(id).map(String::as_str)
    }

    /// Drop every buffer (on document change).
    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    /// Apply one key press to the buffer for `id`.
    pub fn apply_key(&mut self, id: &str, input: &KeyInput) -> KeyOutcome {
        let buffer = self.buffers.entry(id.to_string()).or_default();
        apply_key(buffer, input)
    }
}

/// The editing state machine over a single buffer.
pub fn apply_key(buffer: &mut String, input: &KeyInput) -> KeyOutcome {
    let key = input.key.to_lowercase();
    match key.as_str() {
        "" => KeyOutcome::Ignored,
        "return" | "enter" => {
            if buffer.is_empty() {
                KeyOutcome::Ignored
            } else {
                KeyOutcome::Submit(buffer.clone())
            }
        }
        k if MODIFIERS.contains(&k) => KeyOutcome::Ignored,
        "space" => {
            buffer.push(' ');
            KeyOutcome::Edited
        }
        "tab" => {
            buffer.push_str("  ");
            KeyOutcome::Edited
        }
        "backspace" => {
            if input.ctrl {
                buffer.clear();
            } else {
                buffer.pop();
            }
            KeyOutcome::Edited
        }
        _ if input.ctrl => KeyOutcome::Ignored,
        _ => {
            let mut chars = key.chars();
            let (Some(ch), None) = (chars.next(), chars.next()) else {
                return KeyOutcome::Ignored;
            };
            let typed = match shift_char(&key).filter(|_| input.shift) {
                Some(shifted) => shifted,
                None if input.shift != input.capslock => ch.to_uppercase().next().unwrap_or(ch),
                None => ch,
            };
            if is_printable(typed) {
                buffer.push(typed);
                KeyOutcome::Edited
            } else {
                KeyOutcome::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(keys: &[KeyInput]) -> String {
        let mut buffer = String::new();
        for key in keys {
            apply_key(&mut buffer, key);
        }
        buffer
    }

    fn keys(names: &[&str]) -> Vec<KeyInput> {
        names.iter().map(|k| KeyInput::new(*k)).collect()
    }

    #[test]
    fn typing_words_with_space() {
        let seq = keys(&["h", "e", "l", "l", "o", "space", "w", "o", "r", "l", "d"]);
        assert_eq!(typed(&seq), "hello world");
    }

    #[test]
    fn shift_uses_the_shift_table_then_case() {
        assert_eq!(typed(&[KeyInput::new("1").shifted()]), "!");
        assert_eq!(typed(&[KeyInput::new("0").shifted()]), ")");
        assert_eq!(typed(&[KeyInput::new("/").shifted()]), "?");
        assert_eq!(typed(&[KeyInput::new("a").shifted()]), "A");
    }

    #[test]
    fn capslock_and_shift_cancel_out() {
        assert_eq!(typed(&[KeyInput::new("a").with_capslock()]), "A");
        assert_eq!(typed(&[KeyInput::new("a").with_capslock().shifted()]), "a");
        // digits are unaffected by capslock
        assert_eq!(typed(&[KeyInput::new("1").with_capslock()]), "1");
    }

    #[test]
    fn backspace_and_ctrl_backspace() {
        let mut buffer = "abc".to_string();
        assert_eq!(apply_key(&mut buffer, &KeyInput::new("Backspace")), KeyOutcome::Edited);
        assert_eq!(buffer, "ab");
        apply_key(&mut buffer, &KeyInput::new("backspace").with_ctrl());
        assert_eq!(buffer, "");
        apply_key(&mut buffer, &KeyInput::new("backspace"));
        assert_eq!(buffer, "");
    }

    #[test]
    fn tab_inserts_two_spaces() {
        assert_eq!(typed(&keys(&["a", "tab", "b"])), "a  b");
    }

    #[test]
    fn modifiers_ctrl_chords_and_unknown_keys_are_ignored() {
        let mut buffer = "x".to_string();
        for key in ["Shift", "capslock", "Meta", "fn", "ArrowLeft", "F5", "é"] {
            assert_eq!(apply_key(&mut buffer, &KeyInput::new(key)), KeyOutcome::Ignored);
        }
        assert_eq!(apply_key(&mut buffer, &KeyInput::new("c").with_ctrl()), KeyOutcome::Ignored);
        assert_eq!(buffer, "x");
    }

    #[test]
    fn return_submits_without_mutating() {
        let mut buffer = "@peer:page:home".to_string();
        assert_eq!(
            apply_key(&mut buffer, &KeyInput::new("Return")),
            KeyOutcome::Submit("@peer:page:home".into())
        );
        assert_eq!(buffer, "@peer:page:home");
        assert_eq!(apply_key(&mut String::new(), &KeyInput::new("return")), KeyOutcome::Ignored);
    }

    #[test]
    fn buffers_are_seeded_once() {
        let mut buffers = InputBuffers::new();
        assert_eq!(buffers.seed("search", "abc"), "abc");
        buffers.apply_key("search", &KeyInput::new("d"));
        assert_eq!(buffers.seed("search", "zzz"), "abcd");
        buffers.clear();
        assert_eq!(buffers.get("search"), None);
    }
}
