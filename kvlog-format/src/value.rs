//! The scalar value model of log event pairs.

use crate::encoded_text::{EightByteEncodedTextAst, FourByteEncodedTextAst};

/// A single decoded value of a log event pair.
///
/// Immutable after construction. The two encoded text variants carry a
/// compressed representation of a text value; `decode_text` expands them on
/// demand.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A plain string, validated as UTF-8 when decoded from the wire.
    Str(String),
    /// Text encoded with eight-byte encoded variables.
    EncodedText8(EightByteEncodedTextAst),
    /// Text encoded with four-byte encoded variables.
    EncodedText4(FourByteEncodedTextAst),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the value as a `bool` if it is representable as one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the plain string payload. Encoded text values are not
    /// covered here; use `decode_text` to expand any textual value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value is textual, either plain or encoded.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Value::Str(_) | Value::EncodedText8(_) | Value::EncodedText4(_)
        )
    }

    /// Expands any textual value into an owned string: plain strings are
    /// cloned, encoded texts are decoded. Non-text values yield `None`.
    pub fn decode_text(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::EncodedText8(ast) => Some(ast.decode()),
            Value::EncodedText4(ast) => Some(ast.decode()),
            _ => None,
        }
    }
}
