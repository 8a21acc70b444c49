//! Wire protocol constants shared by the encoder and decoder.

use kvlog_common::{Error, Result};

use crate::schema::NodeType;

/// Width of the encoded variables carried by a stream's encoded text
/// values, declared once in the preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingType {
    EightByte,
    FourByte,
}

impl EncodingType {
    pub fn to_tag(self) -> u8 {
        match self {
            EncodingType::EightByte => tag::ENCODING_EIGHT_BYTE,
            EncodingType::FourByte => tag::ENCODING_FOUR_BYTE,
        }
    }

    pub fn from_tag(tag_byte: u8) -> Result<EncodingType> {
        match tag_byte {
            tag::ENCODING_EIGHT_BYTE => Ok(EncodingType::EightByte),
            tag::ENCODING_FOUR_BYTE => Ok(EncodingType::FourByte),
            other => Err(Error::protocol(
                "encoding_tag",
                format!("unknown encoding tag 0x{other:02x}"),
            )),
        }
    }
}

/// Single-byte tags identifying stream elements.
pub mod tag {
    pub const ENCODING_EIGHT_BYTE: u8 = 0x08;
    pub const ENCODING_FOUR_BYTE: u8 = 0x04;

    pub const METADATA_JSON: u8 = 0x01;

    pub const UNIT_END_OF_STREAM: u8 = 0x00;
    pub const UNIT_SCHEMA_TREE_NODE: u8 = 0x01;
    pub const UNIT_LOG_EVENT: u8 = 0x02;
    pub const UNIT_UTC_OFFSET_CHANGE: u8 = 0x03;

    pub const VALUE_NULL: u8 = 0x00;
    pub const VALUE_BOOL: u8 = 0x01;
    pub const VALUE_INT: u8 = 0x02;
    pub const VALUE_FLOAT: u8 = 0x03;
    pub const VALUE_STR: u8 = 0x04;
    pub const VALUE_ENCODED_TEXT_EIGHT_BYTE: u8 = 0x05;
    pub const VALUE_ENCODED_TEXT_FOUR_BYTE: u8 = 0x06;
}

/// Keys of the preamble metadata object.
pub mod metadata {
    pub const VERSION_KEY: &str = "version";
    pub const USER_DEFINED_METADATA_KEY: &str = "user_defined_metadata";
}

/// Stream versions this implementation accepts.
pub const SUPPORTED_VERSIONS: &[&str] = &["v0.1"];

pub fn is_version_supported(version: &str) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}

/// Validates the parsed preamble metadata: it must be a JSON object with a
/// supported `version` string; `user_defined_metadata`, when present, must
/// itself be an object.
pub fn validate_metadata(metadata: &serde_json::Value) -> Result<()> {
    let object = metadata.as_object().ok_or_else(|| {
        Error::not_supported("metadata", "preamble metadata is not a JSON object")
    })?;
    let version = object
        .get(metadata::VERSION_KEY)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            Error::protocol(
                "metadata",
                format!("missing or non-string '{}' key", metadata::VERSION_KEY),
            )
        })?;
    if !is_version_supported(version) {
        return Err(Error::not_supported(
            "metadata",
            format!("stream version '{version}' is not supported"),
        ));
    }
    if let Some(user_defined) = object.get(metadata::USER_DEFINED_METADATA_KEY) {
        if !user_defined.is_object() {
            return Err(Error::not_supported(
                "metadata",
                format!(
                    "'{}' is not a JSON object",
                    metadata::USER_DEFINED_METADATA_KEY
                ),
            ));
        }
    }
    Ok(())
}

impl NodeType {
    pub fn to_wire(self) -> u8 {
        match self {
            NodeType::Int => 0,
            NodeType::Float => 1,
            NodeType::Bool => 2,
            NodeType::Str => 3,
            NodeType::UnstructuredArray => 4,
            NodeType::Obj => 5,
        }
    }

    pub fn from_wire(byte: u8) -> Result<NodeType> {
        match byte {
            0 => Ok(NodeType::Int),
            1 => Ok(NodeType::Float),
            2 => Ok(NodeType::Bool),
            3 => Ok(NodeType::Str),
            4 => Ok(NodeType::UnstructuredArray),
            5 => Ok(NodeType::Obj),
            other => Err(Error::protocol(
                "node_type",
                format!("unknown node type byte 0x{other:02x}"),
            )),
        }
    }
}
