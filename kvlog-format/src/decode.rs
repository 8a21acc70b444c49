//! Byte-level decoding of the stream preamble and framed units.
//!
//! All functions consume from a `ByteReader` and surface three error
//! classes: `Truncated` when the stream ends inside a frame, `Protocol`
//! when the bytes violate the framing rules, and `NotSupported` for known
//! shapes this implementation does not handle. No partial unit is ever
//! returned.

use kvlog_io::ByteReader;

use kvlog_common::{verify_proto, Error, Result};

use crate::{
    encoded_text::{EightByteEncodedTextAst, FourByteEncodedTextAst},
    log_event::NodeIdValuePairs,
    protocol::{tag, EncodingType},
    schema::{Namespace, NodeId, NodeLocator, NodeType},
    time::UtcOffset,
    utf8,
    value::Value,
};

/// Upper bound for any single length-prefixed element. Streams are
/// incremental; a larger length indicates corruption, not a real payload.
const MAX_ELEMENT_LEN: u64 = 1 << 30;

/// A single decoded unit of the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Unit {
    SchemaTreeNodeInsertion {
        namespace: Namespace,
        locator: NodeLocator,
    },
    LogEvent {
        auto_pairs: NodeIdValuePairs,
        user_pairs: NodeIdValuePairs,
    },
    UtcOffsetChange(UtcOffset),
    EndOfStream,
}

/// The decoded stream preamble.
#[derive(Debug, Clone)]
pub struct Preamble {
    pub encoding: EncodingType,
    pub metadata: serde_json::Value,
}

fn map_io(e: std::io::Error, element: &str) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::truncated(element)
    } else {
        Error::io(element, e)
    }
}

pub fn read_u8<R: ByteReader>(reader: &mut R, element: &str) -> Result<u8> {
    reader.read_u8().map_err(|e| map_io(e, element))
}

fn read_bytes<R: ByteReader>(reader: &mut R, len: usize, element: &str) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(|e| map_io(e, element))?;
    Ok(buf)
}

fn read_array<const N: usize, R: ByteReader>(reader: &mut R, element: &str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader
        .read_exact(&mut buf)
        .map_err(|e| map_io(e, element))?;
    Ok(buf)
}

/// Reads an unsigned LEB128 varint.
pub fn read_varint<R: ByteReader>(reader: &mut R, element: &str) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = read_u8(reader, element)?;
        if shift == 63 && byte > 1 {
            return Err(Error::protocol(element, "varint exceeds 64 bits"));
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

/// Reads a zigzag-encoded signed varint.
pub fn read_signed_varint<R: ByteReader>(reader: &mut R, element: &str) -> Result<i64> {
    let zigzag = read_varint(reader, element)?;
    Ok((zigzag >> 1) as i64 ^ -((zigzag & 1) as i64))
}

fn read_len<R: ByteReader>(reader: &mut R, element: &str) -> Result<usize> {
    let len = read_varint(reader, element)?;
    if len > MAX_ELEMENT_LEN {
        return Err(Error::protocol(
            element,
            format!("declared length {len} exceeds the element size limit"),
        ));
    }
    Ok(len as usize)
}

fn read_len_prefixed_string<R: ByteReader>(reader: &mut R, element: &str) -> Result<String> {
    let len = read_len(reader, element)?;
    let bytes = read_bytes(reader, len, element)?;
    utf8::into_utf8_string(bytes, element)
}

fn read_node_id<R: ByteReader>(reader: &mut R, element: &str) -> Result<NodeId> {
    let raw = read_varint(reader, element)?;
    let id = u32::try_from(raw)
        .map_err(|_| Error::protocol(element, format!("node id {raw} exceeds u32")))?;
    Ok(NodeId::from(id))
}

/// Reads the stream preamble: encoding tag, metadata type, and the
/// length-prefixed metadata JSON. Metadata *content* validation (version,
/// user-defined metadata shape) is the deserializer's concern.
pub fn read_preamble<R: ByteReader>(reader: &mut R) -> Result<Preamble> {
    let encoding = EncodingType::from_tag(read_u8(reader, "encoding_tag")?)?;

    let metadata_type = read_u8(reader, "metadata_type")?;
    if metadata_type != tag::METADATA_JSON {
        return Err(Error::not_supported(
            "metadata_type",
            format!("unknown metadata encoding 0x{metadata_type:02x}"),
        ));
    }

    let len = read_len(reader, "metadata_length")?;
    let bytes = read_bytes(reader, len, "metadata")?;
    let metadata = serde_json::from_slice(&bytes)
        .map_err(|e| Error::protocol("metadata", format!("malformed JSON: {e}")))?;

    Ok(Preamble { encoding, metadata })
}

/// Reads the next framed unit from the stream.
///
/// Tags outside the known set are `NotSupported` (the frame boundary is
/// lost at that point, so the caller must abandon the stream either way).
pub fn read_unit<R: ByteReader>(reader: &mut R, encoding: EncodingType) -> Result<Unit> {
    let unit_tag = read_u8(reader, "unit_tag")?;
    match unit_tag {
        tag::UNIT_END_OF_STREAM => Ok(Unit::EndOfStream),
        tag::UNIT_SCHEMA_TREE_NODE => read_schema_tree_node_insertion(reader),
        tag::UNIT_LOG_EVENT => read_log_event(reader, encoding),
        tag::UNIT_UTC_OFFSET_CHANGE => {
            let seconds = read_signed_varint(reader, "utc_offset")?;
            Ok(Unit::UtcOffsetChange(UtcOffset::new(seconds)))
        }
        other => Err(Error::not_supported(
            "unit_tag",
            format!("unknown unit tag 0x{other:02x}"),
        )),
    }
}

fn read_schema_tree_node_insertion<R: ByteReader>(reader: &mut R) -> Result<Unit> {
    let namespace_byte = read_u8(reader, "schema_tree_node.namespace")?;
    verify_proto!(namespace_byte, namespace_byte <= 1);
    let is_auto = namespace_byte == 1;
    let parent_id = read_node_id(reader, "schema_tree_node.parent_id")?;
    let name = read_len_prefixed_string(reader, "schema_tree_node.name")?;
    let node_type = NodeType::from_wire(read_u8(reader, "schema_tree_node.type")?)?;
    Ok(Unit::SchemaTreeNodeInsertion {
        namespace: Namespace::from_is_auto_generated(is_auto),
        locator: NodeLocator::new(parent_id, name, node_type),
    })
}

fn read_log_event<R: ByteReader>(reader: &mut R, encoding: EncodingType) -> Result<Unit> {
    let auto_pairs = read_pair_bag(reader, encoding, "log_event.auto_pairs")?;
    let user_pairs = read_pair_bag(reader, encoding, "log_event.user_pairs")?;
    Ok(Unit::LogEvent {
        auto_pairs,
        user_pairs,
    })
}

fn read_pair_bag<R: ByteReader>(
    reader: &mut R,
    encoding: EncodingType,
    element: &str,
) -> Result<NodeIdValuePairs> {
    let count = read_len(reader, element)?;
    let mut pairs = NodeIdValuePairs::with_capacity(count);
    for _ in 0..count {
        let node_id = read_node_id(reader, element)?;
        let value = read_value(reader, encoding)?;
        if pairs.insert(node_id, value).is_some() {
            return Err(Error::protocol(
                element,
                format!("duplicate node id {node_id} within one log event"),
            ));
        }
    }
    Ok(pairs)
}

fn read_value<R: ByteReader>(reader: &mut R, encoding: EncodingType) -> Result<Value> {
    let value_tag = read_u8(reader, "value_tag")?;
    match value_tag {
        tag::VALUE_NULL => Ok(Value::Null),
        tag::VALUE_BOOL => {
            let bool_byte = read_u8(reader, "value.bool")?;
            verify_proto!(bool_byte, bool_byte <= 1);
            Ok(Value::Bool(bool_byte == 1))
        }
        tag::VALUE_INT => Ok(Value::Int(read_signed_varint(reader, "value.int")?)),
        tag::VALUE_FLOAT => {
            let bits = u64::from_le_bytes(read_array(reader, "value.float")?);
            Ok(Value::Float(f64::from_bits(bits)))
        }
        tag::VALUE_STR => Ok(Value::Str(read_len_prefixed_string(reader, "value.str")?)),
        tag::VALUE_ENCODED_TEXT_EIGHT_BYTE => {
            if encoding != EncodingType::EightByte {
                return Err(Error::protocol(
                    "value.encoded_text",
                    "eight-byte encoded text in a four-byte stream",
                ));
            }
            let (logtype, dict_vars) = read_encoded_text_prefix(reader)?;
            let count = read_len(reader, "value.encoded_text.encoded_vars")?;
            let mut encoded_vars = Vec::with_capacity(count);
            for _ in 0..count {
                encoded_vars.push(i64::from_le_bytes(read_array(
                    reader,
                    "value.encoded_text.encoded_vars",
                )?));
            }
            let ast = EightByteEncodedTextAst::new(logtype, dict_vars, encoded_vars);
            ast.validate()?;
            Ok(Value::EncodedText8(ast))
        }
        tag::VALUE_ENCODED_TEXT_FOUR_BYTE => {
            if encoding != EncodingType::FourByte {
                return Err(Error::protocol(
                    "value.encoded_text",
                    "four-byte encoded text in an eight-byte stream",
                ));
            }
            let (logtype, dict_vars) = read_encoded_text_prefix(reader)?;
            let count = read_len(reader, "value.encoded_text.encoded_vars")?;
            let mut encoded_vars = Vec::with_capacity(count);
            for _ in 0..count {
                encoded_vars.push(i32::from_le_bytes(read_array(
                    reader,
                    "value.encoded_text.encoded_vars",
                )?));
            }
            let ast = FourByteEncodedTextAst::new(logtype, dict_vars, encoded_vars);
            ast.validate()?;
            Ok(Value::EncodedText4(ast))
        }
        other => Err(Error::protocol(
            "value_tag",
            format!("unknown value tag 0x{other:02x}"),
        )),
    }
}

fn read_encoded_text_prefix<R: ByteReader>(reader: &mut R) -> Result<(String, Vec<String>)> {
    let logtype = read_len_prefixed_string(reader, "value.encoded_text.logtype")?;
    let dict_count = read_len(reader, "value.encoded_text.dict_vars")?;
    let mut dict_vars = Vec::with_capacity(dict_count);
    for _ in 0..dict_count {
        dict_vars.push(read_len_prefixed_string(
            reader,
            "value.encoded_text.dict_vars",
        )?);
    }
    Ok((logtype, dict_vars))
}
