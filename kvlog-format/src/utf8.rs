//! UTF-8 validation and JSON-style string escaping.
//!
//! Shared by the value decoding path (plain strings must arrive as valid
//! UTF-8) and by log event JSON rendering.

use kvlog_common::{Error, Result};

/// Validates that `bytes` is well-formed UTF-8 and converts it to a
/// `String` without copying. `element` names the wire element being decoded
/// for error reporting.
pub fn into_utf8_string(bytes: Vec<u8>, element: &str) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| Error::protocol(element, format!("invalid UTF-8 at byte {}", e.utf8_error().valid_up_to())))
}

/// Appends `s` to `out` with JSON string escaping applied: quotes,
/// backslashes, and control characters below U+0020.
pub fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}

/// Returns `s` with JSON string escaping applied.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    escape_into(s, &mut out);
    out
}
