//! The stream deserializer: decodes units, maintains the schema trees and
//! resolution state, evaluates log events, and drives the unit handler.

use kvlog_common::{Error, Result};
use kvlog_format::{
    decode::{self, Unit},
    protocol::{self, EncodingType},
    LogEvent, Namespace, NodeIdValuePairs, SchemaTree, UtcOffset,
};
use kvlog_io::ByteReader;

use crate::ast::{Expr, Query};
use crate::column::{ColumnArena, ColumnDescriptor};
use crate::evaluate::{evaluate, EvalContext, EvaluatedValue};
use crate::handler::{HandlerError, UnitHandler};
use crate::preprocess::preprocess;
use crate::resolver::Resolver;

/// Outcome of one `deserialize_next_unit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    /// A log event matched the query and was handed to the handler.
    LogEvent,
    /// A log event was decoded but did not match the query; it was
    /// dropped without invoking the handler.
    FilteredLogEvent,
    SchemaTreeNodeInsertion,
    UtcOffsetChange,
    EndOfStream,
}

/// Streaming deserializer for one key-value log stream.
///
/// Owns the two schema trees and the query resolution state; forwards
/// accepted units to the caller-supplied handler. One instance consumes
/// exactly one stream, strictly in order; it holds no reference to the
/// reader, which the caller passes into every decoding call.
#[derive(Debug)]
pub struct Deserializer<H> {
    auto_tree: SchemaTree,
    user_tree: SchemaTree,
    metadata: serde_json::Value,
    encoding: EncodingType,
    utc_offset: UtcOffset,
    handler: H,
    complete: bool,

    // Search state.
    arena: ColumnArena,
    /// Preprocessed query root; `None` means "match everything".
    root: Option<Expr>,
    case_sensitive: bool,
    resolver: Resolver,
}

impl<H: UnitHandler> Deserializer<H> {
    /// Creates a deserializer by reading the stream preamble from
    /// `reader` and validating its metadata, then preparing the query and
    /// projection state.
    ///
    /// Projection paths must be fully qualified (no wildcards), non-empty
    /// and free of duplicates; violations are `InvalidArgument` errors.
    pub fn new<R: ByteReader>(
        reader: &mut R,
        handler: H,
        query: Option<Query>,
        projections: &[String],
    ) -> Result<Deserializer<H>> {
        let preamble = decode::read_preamble(reader)?;
        protocol::validate_metadata(&preamble.metadata)?;

        let (arena, root, case_sensitive) = match query {
            Some(query) => {
                let Query {
                    arena,
                    root,
                    case_sensitive,
                } = preprocess(query);
                (arena, Some(root), case_sensitive)
            }
            None => (ColumnArena::new(), None, true),
        };

        let mut deserializer = Deserializer {
            auto_tree: SchemaTree::new(),
            user_tree: SchemaTree::new(),
            metadata: preamble.metadata,
            encoding: preamble.encoding,
            utc_offset: UtcOffset::default(),
            handler,
            complete: false,
            arena,
            root,
            case_sensitive,
            resolver: Resolver::new(),
        };
        deserializer.install_query_columns();
        deserializer.install_projections(projections)?;
        Ok(deserializer)
    }

    fn install_query_columns(&mut self) {
        let Some(root) = &self.root else {
            return;
        };
        let resolver = &mut self.resolver;
        let arena = &self.arena;
        root.for_each_filter(&mut |filter| {
            resolver.add_query_column(arena, filter.column);
        });
    }

    fn install_projections(&mut self, projections: &[String]) -> Result<()> {
        let mut seen: Vec<ColumnDescriptor> = Vec::with_capacity(projections.len());
        for path in projections {
            let descriptor = ColumnDescriptor::parse(path)?;
            if descriptor.has_unresolved_tokens() {
                return Err(Error::invalid_arg(
                    "projection",
                    format!("projected path '{path}' contains unresolved wildcards"),
                ));
            }
            if seen.iter().any(|prior| {
                prior.namespace() == descriptor.namespace()
                    && prior.tokens() == descriptor.tokens()
            }) {
                return Err(Error::invalid_arg(
                    "projection",
                    format!("duplicate projected path '{path}'"),
                ));
            }
            seen.push(descriptor.clone());
            let column = self.arena.intern(descriptor);
            self.resolver
                .add_projection(&self.arena, column, path.clone());
        }
        Ok(())
    }

    /// Decodes the next unit from `reader`, applies it, and reports what
    /// it was. After end-of-stream has been accepted, further calls fail
    /// with `NotPermitted`.
    pub fn deserialize_next_unit<R: ByteReader>(&mut self, reader: &mut R) -> Result<UnitStatus> {
        if self.complete {
            return Err(Error::not_permitted(
                "deserialize_next_unit after end of stream",
            ));
        }

        match decode::read_unit(reader, self.encoding)? {
            Unit::LogEvent {
                auto_pairs,
                user_pairs,
            } => self.apply_log_event(auto_pairs, user_pairs),
            Unit::SchemaTreeNodeInsertion { namespace, locator } => {
                self.apply_schema_tree_node_insertion(namespace, locator)
            }
            Unit::UtcOffsetChange(new_offset) => {
                self.handler
                    .handle_utc_offset_change(self.utc_offset, new_offset)
                    .map_err(handler_error)?;
                self.utc_offset = new_offset;
                Ok(UnitStatus::UtcOffsetChange)
            }
            Unit::EndOfStream => {
                self.handler.handle_end_of_stream().map_err(handler_error)?;
                self.complete = true;
                Ok(UnitStatus::EndOfStream)
            }
        }
    }

    fn apply_log_event(
        &mut self,
        auto_pairs: NodeIdValuePairs,
        user_pairs: NodeIdValuePairs,
    ) -> Result<UnitStatus> {
        if self.evaluate_event(&auto_pairs, &user_pairs) != EvaluatedValue::True {
            return Ok(UnitStatus::FilteredLogEvent);
        }
        let event = LogEvent::new(
            &self.auto_tree,
            &self.user_tree,
            auto_pairs,
            user_pairs,
            self.utc_offset,
        )?;
        self.handler.handle_log_event(event).map_err(handler_error)?;
        Ok(UnitStatus::LogEvent)
    }

    fn apply_schema_tree_node_insertion(
        &mut self,
        namespace: Namespace,
        locator: kvlog_format::NodeLocator,
    ) -> Result<UnitStatus> {
        let tree = match namespace {
            Namespace::Auto => &mut self.auto_tree,
            Namespace::User => &mut self.user_tree,
        };
        if tree.contains(&locator) {
            return Err(Error::protocol(
                "schema_tree_node",
                format!(
                    "duplicate insertion of '{}' under parent {}",
                    locator.name, locator.parent_id
                ),
            ));
        }
        let node_id = tree.insert(locator.clone())?;

        // Advance resolution state before the handler observes the node,
        // so projection callbacks fire at the earliest point the node is
        // known.
        let handler = &mut self.handler;
        self.resolver.on_node_inserted(
            &self.arena,
            namespace,
            &locator,
            node_id,
            |namespace, node_id, path| {
                handler
                    .handle_projection_resolution(namespace, node_id, path)
                    .map_err(handler_error)
            },
        )?;

        let tree = match namespace {
            Namespace::Auto => &self.auto_tree,
            Namespace::User => &self.user_tree,
        };
        self.handler
            .handle_schema_tree_node_insertion(namespace, &locator, tree)
            .map_err(handler_error)?;
        Ok(UnitStatus::SchemaTreeNodeInsertion)
    }

    fn evaluate_event(
        &self,
        auto_pairs: &NodeIdValuePairs,
        user_pairs: &NodeIdValuePairs,
    ) -> EvaluatedValue {
        let Some(root) = &self.root else {
            return EvaluatedValue::True;
        };
        let ctx = EvalContext {
            arena: &self.arena,
            resolver: &self.resolver,
            auto_tree: &self.auto_tree,
            user_tree: &self.user_tree,
            auto_pairs,
            user_pairs,
            case_sensitive: self.case_sensitive,
        };
        evaluate(root, &ctx)
    }

    /// Whether an end-of-stream unit has been accepted.
    pub fn is_stream_completed(&self) -> bool {
        self.complete
    }

    /// The metadata object decoded from the stream preamble.
    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    pub fn encoding(&self) -> EncodingType {
        self.encoding
    }

    /// The UTC offset currently in effect.
    pub fn utc_offset(&self) -> UtcOffset {
        self.utc_offset
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }
}

fn handler_error(e: HandlerError) -> Error {
    Error::handler(e.code)
}
