//! Identifier tokenization and camelCase key normalization.
//!
//! `tailscaled` is inconsistent about response key casing: status payloads are
//! `PascalCase`, some nested structures are `snake_case`, and a few fields are
//! raw acronyms. [`normalize_keys`] rewrites every mapping key in a JSON tree
//! to camelCase so callers see one convention.

use serde_json::Value;

/// True for characters that end a word and are themselves discarded.
///
/// Covers hyphen, underscore, every `White_Space` code point (tab through the
/// Unicode space-separator block and line/paragraph separators), and the BOM,
/// which is not `White_Space` but shows up in keys often enough to matter.
fn is_separator(c: char) -> bool {
    c == '-' || c == '_' || c == '\u{FEFF}' || c.is_whitespace()
}

fn flush(buf: &mut Vec<char>, words: &mut Vec<String>) {
    if !buf.is_empty() {
        words.push(buf.drain(..).collect());
    }
}

/// Split an identifier into word segments.
///
/// Words break on separator characters, on a lowercase-to-uppercase
/// transition, at the end of an uppercase run followed by lowercase (the run's
/// final letter starts the next word: `"IPAddress"` → `["IP", "Address"]`),
/// and on digit/non-digit boundaries in either direction. The output never
/// contains empty segments.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut buf: Vec<char> = Vec::new();

    for c in input.chars() {
        if is_separator(c) {
            flush(&mut buf, &mut words);
            continue;
        }
        let last = buf.last().copied();
        let prev = buf.len().checked_sub(2).and_then(|i| buf.get(i)).copied();
        if let Some(last) = last {
            if last.is_lowercase() && c.is_uppercase() {
                flush(&mut buf, &mut words);
            } else if c.is_lowercase()
                && last.is_uppercase()
                && prev.is_some_and(char::is_uppercase)
            {
                // The run's last uppercase letter belongs to the next word.
                buf.pop();
                flush(&mut buf, &mut words);
                buf.push(last);
            } else if last.is_numeric() != c.is_numeric() {
                flush(&mut buf, &mut words);
            }
        }
        buf.push(c);
    }
    flush(&mut buf, &mut words);
    words
}

/// Convert a single key to camelCase.
///
/// A key with no lowercase letter anywhere (`"HELLO_WORLD"`, `"ID"`) is
/// lowercased wholesale before tokenizing, so all-caps keys form a single case
/// domain. Otherwise the original casing drives segmentation, and only each
/// word's leading character is recased: first word lowercased, the rest
/// uppercased. A key that tokenizes to nothing yields the empty string.
pub fn to_camel_case(key: &str) -> String {
    let lowered;
    let source = if key.chars().any(char::is_lowercase) {
        key
    } else {
        lowered = key.to_lowercase();
        &lowered
    };

    let mut out = String::with_capacity(key.len());
    for (i, word) in tokenize(source).iter().enumerate() {
        let mut chars = word.chars();
        let Some(first) = chars.next() else { continue };
        if i == 0 {
            out.extend(first.to_lowercase());
        } else {
            out.extend(first.to_uppercase());
        }
        out.push_str(chars.as_str());
    }
    out
}

/// Recursively rewrite every mapping key in a JSON tree to camelCase.
///
/// Arrays are mapped element-wise, preserving order and length; scalars pass
/// through unchanged. The input is never mutated. Two distinct keys that
/// normalize to the same name collapse to one entry, last write wins in
/// iteration order.
#[must_use]
pub fn normalize_keys(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(normalize_keys).collect()),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (to_camel_case(k), normalize_keys(v)))
            .collect::<serde_json::Map<_, _>>()
            .into(),
        scalar => scalar.clone(),
    }
}
