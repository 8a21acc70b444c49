//! # kvlog: streaming search over self-describing key-value log streams
//!
//! kvlog decodes streams of incremental units (schema tree mutations,
//! key-value log events, timezone changes) and evaluates a typed Boolean
//! query against every record as it arrives, resolving hierarchical
//! column paths (wildcards included) incrementally against the growing
//! schema trees.
//!
//! This crate is a convenience entry point re-exporting the workspace
//! components:
//!
//! * [`common`] - shared error and result types
//! * [`io`] - the byte reader abstraction and simple implementations
//! * [`format`] - schema trees, values, and the wire codec
//! * [`search`] - query AST, rewrite passes, path resolution, evaluation
//!   and the stream deserializer
//!
//! ## Example
//!
//! ```
//! use kvlog::io::BytesReader;
//! use kvlog::format::{encode::StreamWriter, protocol::EncodingType};
//! use kvlog::search::{Deserializer, Expr, FilterOp, Literal, NoopHandler, QueryBuilder};
//! use serde_json::json;
//!
//! // A minimal stream: preamble plus end-of-stream.
//! let mut writer = StreamWriter::new(Vec::new(), EncodingType::EightByte);
//! writer.write_preamble(&json!({"version": "v0.1"})).unwrap();
//! writer.write_end_of_stream().unwrap();
//! let mut reader = BytesReader::new(writer.into_inner());
//!
//! let mut builder = QueryBuilder::new();
//! let level = builder.column("level").unwrap();
//! let query = builder.build(Expr::filter(
//!     level,
//!     FilterOp::Eq,
//!     Literal::VarString("error".into()),
//! ));
//!
//! let mut deserializer =
//!     Deserializer::new(&mut reader, NoopHandler, Some(query), &[]).unwrap();
//! deserializer.deserialize_next_unit(&mut reader).unwrap();
//! assert!(deserializer.is_stream_completed());
//! ```

pub use kvlog_common as common;
pub use kvlog_format as format;
pub use kvlog_io as io;
pub use kvlog_search as search;
