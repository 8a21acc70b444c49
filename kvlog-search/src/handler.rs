//! The unit handler contract: callbacks invoked per accepted unit.

use kvlog_format::{LogEvent, Namespace, NodeId, NodeLocator, SchemaTree, UtcOffset};
use thiserror::Error;

/// A handler-specific failure code, propagated verbatim through the
/// deserializer as `ErrorKind::Handler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("handler failed with code {code}")]
pub struct HandlerError {
    pub code: u32,
}

impl HandlerError {
    pub fn new(code: u32) -> HandlerError {
        HandlerError { code }
    }
}

pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Receives every unit the deserializer accepts.
///
/// Schema tree references passed to the callbacks are snapshots of the
/// deserializer's trees, valid for the duration of the callback. Log
/// events that fail the query never reach `handle_log_event`.
pub trait UnitHandler {
    /// Called with every log event matching the query.
    fn handle_log_event(&mut self, event: LogEvent<'_>) -> HandlerResult;

    /// Called after a schema tree node insertion has been applied;
    /// `tree` already contains the new node.
    fn handle_schema_tree_node_insertion(
        &mut self,
        namespace: Namespace,
        locator: &NodeLocator,
        tree: &SchemaTree,
    ) -> HandlerResult;

    /// Called when the stream changes its UTC offset.
    fn handle_utc_offset_change(&mut self, old: UtcOffset, new: UtcOffset) -> HandlerResult;

    /// Called once when the end-of-stream unit is accepted.
    fn handle_end_of_stream(&mut self) -> HandlerResult;

    /// Called when a projected path resolves to a schema tree node.
    /// The default implementation accepts and ignores the resolution.
    fn handle_projection_resolution(
        &mut self,
        namespace: Namespace,
        node_id: NodeId,
        path: &str,
    ) -> HandlerResult {
        let _ = (namespace, node_id, path);
        Ok(())
    }
}

/// A handler that accepts everything and does nothing. Useful for
/// draining a stream for its side effects (validation, schema discovery).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl UnitHandler for NoopHandler {
    fn handle_log_event(&mut self, _event: LogEvent<'_>) -> HandlerResult {
        Ok(())
    }

    fn handle_schema_tree_node_insertion(
        &mut self,
        _namespace: Namespace,
        _locator: &NodeLocator,
        _tree: &SchemaTree,
    ) -> HandlerResult {
        Ok(())
    }

    fn handle_utc_offset_change(&mut self, _old: UtcOffset, _new: UtcOffset) -> HandlerResult {
        Ok(())
    }

    fn handle_end_of_stream(&mut self) -> HandlerResult {
        Ok(())
    }
}
