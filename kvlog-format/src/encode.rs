//! Byte-level encoding of the stream preamble and framed units.
//!
//! The producer half of the codec, sharing every constant with `decode`.
//! Embedders use it to re-emit filtered streams; the test suites use it to
//! drive end-to-end decode scenarios.

use std::io::Write;

use kvlog_common::{verify_arg, Error, Result};

use crate::{
    encoded_text::{EncodedTextAst, EncodedVariable},
    protocol::{tag, EncodingType},
    schema::{Namespace, NodeId, NodeLocator},
    time::UtcOffset,
    value::Value,
};

/// Writes a unit stream into any `std::io::Write` sink.
pub struct StreamWriter<W> {
    sink: W,
    encoding: EncodingType,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(sink: W, encoding: EncodingType) -> StreamWriter<W> {
        StreamWriter { sink, encoding }
    }

    pub fn encoding(&self) -> EncodingType {
        self.encoding
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Writes the stream preamble: encoding tag, metadata type and the
    /// length-prefixed metadata JSON.
    pub fn write_preamble(&mut self, metadata: &serde_json::Value) -> Result<()> {
        verify_arg!(metadata, metadata.is_object());
        self.write_u8(self.encoding.to_tag())?;
        self.write_u8(tag::METADATA_JSON)?;
        let bytes = serde_json::to_vec(metadata)
            .map_err(|e| Error::invalid_arg("metadata", e.to_string()))?;
        self.write_varint(bytes.len() as u64)?;
        self.write_all(&bytes)
    }

    pub fn write_schema_tree_node(
        &mut self,
        namespace: Namespace,
        locator: &NodeLocator,
    ) -> Result<()> {
        self.write_u8(tag::UNIT_SCHEMA_TREE_NODE)?;
        self.write_u8(namespace.is_auto_generated() as u8)?;
        self.write_varint(u64::from(locator.parent_id.as_u32()))?;
        self.write_len_prefixed(locator.name.as_bytes())?;
        self.write_u8(locator.node_type.to_wire())
    }

    /// Writes a log event unit from explicit pair lists (auto-generated
    /// first), preserving the given pair order on the wire.
    pub fn write_log_event(
        &mut self,
        auto_pairs: &[(NodeId, Value)],
        user_pairs: &[(NodeId, Value)],
    ) -> Result<()> {
        self.write_u8(tag::UNIT_LOG_EVENT)?;
        self.write_pair_bag(auto_pairs)?;
        self.write_pair_bag(user_pairs)
    }

    pub fn write_utc_offset_change(&mut self, offset: UtcOffset) -> Result<()> {
        self.write_u8(tag::UNIT_UTC_OFFSET_CHANGE)?;
        self.write_signed_varint(offset.as_seconds())
    }

    pub fn write_end_of_stream(&mut self) -> Result<()> {
        self.write_u8(tag::UNIT_END_OF_STREAM)
    }

    fn write_pair_bag(&mut self, pairs: &[(NodeId, Value)]) -> Result<()> {
        self.write_varint(pairs.len() as u64)?;
        for (node_id, value) in pairs {
            self.write_varint(u64::from(node_id.as_u32()))?;
            self.write_value(value)?;
        }
        Ok(())
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.write_u8(tag::VALUE_NULL),
            Value::Bool(b) => {
                self.write_u8(tag::VALUE_BOOL)?;
                self.write_u8(*b as u8)
            }
            Value::Int(i) => {
                self.write_u8(tag::VALUE_INT)?;
                self.write_signed_varint(*i)
            }
            Value::Float(f) => {
                self.write_u8(tag::VALUE_FLOAT)?;
                self.write_all(&f.to_bits().to_le_bytes())
            }
            Value::Str(s) => {
                self.write_u8(tag::VALUE_STR)?;
                self.write_len_prefixed(s.as_bytes())
            }
            Value::EncodedText8(ast) => {
                if self.encoding != EncodingType::EightByte {
                    return Err(Error::invalid_arg(
                        "value",
                        "eight-byte encoded text in a four-byte stream",
                    ));
                }
                self.write_u8(tag::VALUE_ENCODED_TEXT_EIGHT_BYTE)?;
                self.write_encoded_text(ast, |var| var.to_le_bytes())
            }
            Value::EncodedText4(ast) => {
                if self.encoding != EncodingType::FourByte {
                    return Err(Error::invalid_arg(
                        "value",
                        "four-byte encoded text in an eight-byte stream",
                    ));
                }
                self.write_u8(tag::VALUE_ENCODED_TEXT_FOUR_BYTE)?;
                self.write_encoded_text(ast, |var| var.to_le_bytes())
            }
        }
    }

    fn write_encoded_text<V, B, F>(&mut self, ast: &EncodedTextAst<V>, to_bytes: F) -> Result<()>
    where
        V: EncodedVariable,
        B: AsRef<[u8]>,
        F: Fn(V) -> B,
    {
        self.write_len_prefixed(ast.logtype().as_bytes())?;
        self.write_varint(ast.dict_vars().len() as u64)?;
        for var in ast.dict_vars() {
            self.write_len_prefixed(var.as_bytes())?;
        }
        self.write_varint(ast.encoded_vars().len() as u64)?;
        for var in ast.encoded_vars() {
            self.write_all(to_bytes(*var).as_ref())?;
        }
        Ok(())
    }

    fn write_u8(&mut self, byte: u8) -> Result<()> {
        self.write_all(&[byte])
    }

    fn write_varint(&mut self, mut value: u64) -> Result<()> {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                return self.write_u8(byte);
            }
            self.write_u8(byte | 0x80)?;
        }
    }

    fn write_signed_varint(&mut self, value: i64) -> Result<()> {
        self.write_varint(((value << 1) ^ (value >> 63)) as u64)
    }

    fn write_len_prefixed(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_varint(bytes.len() as u64)?;
        self.write_all(bytes)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink
            .write_all(bytes)
            .map_err(|e| Error::io("stream_writer", e))
    }
}
