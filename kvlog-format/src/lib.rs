//! Wire format for self-describing key-value log streams.
//!
//! A stream is a preamble followed by a sequence of framed *units*: schema
//! tree node insertions, log events, UTC offset changes and an end-of-stream
//! marker. Log events do not carry key names; they reference nodes of the
//! two schema trees (auto-generated and user-generated) built up by earlier
//! insertion units, which is what makes the records self-describing.
//!
//! This crate owns the data model (schema trees, values, encoded text) and
//! both halves of the byte-level codec (`decode` and `encode`). Query
//! evaluation over decoded units lives in `kvlog-search`.

pub mod decode;
pub mod encode;
pub mod encoded_text;
pub mod log_event;
pub mod protocol;
pub mod schema;
pub mod time;
pub mod utf8;
pub mod value;

pub use log_event::{LogEvent, NodeIdValuePairs};
pub use schema::{Namespace, Node, NodeId, NodeLocator, NodeType, SchemaTree};
pub use time::UtcOffset;
pub use value::Value;
