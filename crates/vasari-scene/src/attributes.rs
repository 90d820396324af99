//! Attribute extraction from raw element source.
//!
//! `x={10} fill style="#fff" click=goBack` becomes
//! `{x: "10", fill: true, style: "#fff", click: "goBack"}`. Whitespace inside
//! `"…"`, `'…'` and `{…}` does not split tokens. Extraction never fails.

use std::fmt;

/// An attribute value: a bare flag or a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Flag,
    Text(String),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            AttributeValue::Flag => None,
        }
    }
}

/// Ordered attribute map. Re-inserting a key overwrites its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, AttributeValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// String value of `key`; flags have none.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttributeValue::as_text)
    }

    /// Whether `key` is present at all (flag or value).
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Attributes {
    /// Re-serialize as raw attribute source (`key="value"` or bare `key`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match value {
                AttributeValue::Flag => f.write_str(key)?,
                AttributeValue::Text(text) => write!(f, "{key}=\"{}\"", escape(text))?,
            }
        }
        Ok(())
    }
}

/// Extract the attribute map from a raw attribute string.
pub fn extract(raw: &str) -> Attributes {
    let mut attributes = Attributes::new();
    for token in tokens(raw) {
        match token.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                if value.trim().is_empty() {
                    // `key=` with nothing after it reads as a flag.
                    attributes.insert(key, AttributeValue::Flag);
                    continue;
                }
                let value = if key == "path" && value.trim_matches('"').starts_with("data:") {
                    // Keep data URIs whole, including `=` padding.
                    value.trim_matches('"').to_string()
                } else {
                    unescape(unwrap_value(value))
                };
                attributes.insert(key, AttributeValue::Text(value));
            }
            None => attributes.insert(token, AttributeValue::Flag),
        }
    }
    attributes
}

/// Escape a value for a double-quoted attribute. `&` and `"` become
/// entities so the value never closes the quote early.
fn escape(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Reverse of [`escape`].
fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value.replace("&quot;", "\"").replace("&amp;", "&")
}

/// Split on whitespace outside quotes and brace groups.
fn tokens(raw: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for (i, ch) in raw.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                c if c.is_whitespace() && depth == 0 => {
                    if let Some(s) = start.take() {
                        out.push(&raw[s..i]);
                    }
                    continue;
                }
                _ => {}
            },
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(&raw[s..]);
    }
    out
}

/// Strip one layer of surrounding braces, then one layer of quotes when they
/// enclose the whole value.
fn unwrap_value(value: &str) -> &str {
    let mut value = value.trim();
    if value.len() >= 2 && value.starts_with('{') && value.ends_with('}') {
        value = value[1..value.len() - 1].trim();
    }
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            let inner = &value[1..value.len() - 1];
            if !inner.contains(q) {
                return inner;
            }
        }
    }
    value
}
