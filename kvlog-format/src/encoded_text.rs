//! Compressed text values: a logtype template plus extracted variables.
//!
//! A free-text message is stored as its *logtype* (the message with every
//! variable replaced by a placeholder byte) together with the variables
//! themselves, split into dictionary variables (kept as strings) and
//! encoded variables (packed into integers). Two encodings exist, differing
//! only in the width of the encoded variables: eight-byte (`i64`) and
//! four-byte (`i32`).
//!
//! `decode` re-expands the template deterministically; it is the only thing
//! the filter evaluator needs from this module.

use kvlog_common::{Error, Result};

/// Placeholder bytes appearing inside a logtype template.
pub mod placeholder {
    /// Replaced by the next encoded variable, rendered as an integer.
    pub const INT_VAR: char = '\u{11}';
    /// Replaced by the next dictionary variable.
    pub const DICT_VAR: char = '\u{12}';
    /// Replaced by the next encoded variable, rendered as a float.
    pub const FLOAT_VAR: char = '\u{13}';
    /// Escapes a literal occurrence of a placeholder byte or backslash.
    pub const ESCAPE: char = '\\';
}

/// An integer-packed variable of an encoded text value.
pub trait EncodedVariable: Copy {
    fn write_int(self, out: &mut String);
    fn write_float(self, out: &mut String);
}

impl EncodedVariable for i64 {
    fn write_int(self, out: &mut String) {
        out.push_str(&self.to_string());
    }

    fn write_float(self, out: &mut String) {
        write_float_bits(f64::from_bits(self as u64), out);
    }
}

impl EncodedVariable for i32 {
    fn write_int(self, out: &mut String) {
        out.push_str(&self.to_string());
    }

    fn write_float(self, out: &mut String) {
        write_float_bits(f32::from_bits(self as u32) as f64, out);
    }
}

fn write_float_bits(value: f64, out: &mut String) {
    if value.is_finite() {
        // `Display` for floats is shortest-round-trip, hence deterministic.
        out.push_str(&value.to_string());
    } else if value.is_nan() {
        out.push_str("nan");
    } else if value > 0.0 {
        out.push_str("inf");
    } else {
        out.push_str("-inf");
    }
}

/// A compressed representation of a fully decodable text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTextAst<V> {
    logtype: String,
    dict_vars: Vec<String>,
    encoded_vars: Vec<V>,
}

/// Encoded text with eight-byte encoded variables.
pub type EightByteEncodedTextAst = EncodedTextAst<i64>;

/// Encoded text with four-byte encoded variables.
pub type FourByteEncodedTextAst = EncodedTextAst<i32>;

impl<V: EncodedVariable> EncodedTextAst<V> {
    pub fn new(
        logtype: impl Into<String>,
        dict_vars: Vec<String>,
        encoded_vars: Vec<V>,
    ) -> EncodedTextAst<V> {
        EncodedTextAst {
            logtype: logtype.into(),
            dict_vars,
            encoded_vars,
        }
    }

    pub fn logtype(&self) -> &str {
        &self.logtype
    }

    pub fn dict_vars(&self) -> &[String] {
        &self.dict_vars
    }

    pub fn encoded_vars(&self) -> &[V] {
        &self.encoded_vars
    }

    /// Checks that the logtype's placeholders agree with the number of
    /// variables carried. The wire decoder runs this once per value so that
    /// `decode` can stay infallible.
    pub fn validate(&self) -> Result<()> {
        let mut dict_count = 0usize;
        let mut encoded_count = 0usize;
        let mut chars = self.logtype.chars();
        while let Some(c) = chars.next() {
            match c {
                placeholder::ESCAPE => {
                    if chars.next().is_none() {
                        return Err(Error::protocol(
                            "encoded_text",
                            "logtype ends with a dangling escape",
                        ));
                    }
                }
                placeholder::INT_VAR | placeholder::FLOAT_VAR => encoded_count += 1,
                placeholder::DICT_VAR => dict_count += 1,
                _ => {}
            }
        }
        if dict_count != self.dict_vars.len() {
            return Err(Error::protocol(
                "encoded_text",
                format!(
                    "logtype references {} dictionary variables but {} are present",
                    dict_count,
                    self.dict_vars.len()
                ),
            ));
        }
        if encoded_count != self.encoded_vars.len() {
            return Err(Error::protocol(
                "encoded_text",
                format!(
                    "logtype references {} encoded variables but {} are present",
                    encoded_count,
                    self.encoded_vars.len()
                ),
            ));
        }
        Ok(())
    }

    /// Re-expands the logtype template into the original text.
    ///
    /// Deterministic: the same encoded value always decodes to the same
    /// string. Variables the logtype does not reference are ignored;
    /// placeholders beyond the carried variables expand to nothing (the
    /// wire decoder rejects such values up front via `validate`).
    pub fn decode(&self) -> String {
        let mut out = String::with_capacity(self.logtype.len());
        let mut dict_vars = self.dict_vars.iter();
        let mut encoded_vars = self.encoded_vars.iter();
        let mut chars = self.logtype.chars();
        while let Some(c) = chars.next() {
            match c {
                placeholder::ESCAPE => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                placeholder::INT_VAR => {
                    if let Some(var) = encoded_vars.next() {
                        var.write_int(&mut out);
                    }
                }
                placeholder::FLOAT_VAR => {
                    if let Some(var) = encoded_vars.next() {
                        var.write_float(&mut out);
                    }
                }
                placeholder::DICT_VAR => {
                    if let Some(var) = dict_vars.next() {
                        out.push_str(var);
                    }
                }
                c => out.push(c),
            }
        }
        out
    }
}
