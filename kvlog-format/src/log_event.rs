//! A fully materialized log event: validated pair bags plus the schema
//! trees needed to interpret them.

use ahash::AHashMap;
use kvlog_common::{Error, Result};

use crate::{
    schema::{Namespace, Node, NodeId, NodeType, SchemaTree},
    time::UtcOffset,
    utf8,
    value::Value,
};

/// The `(node id, value)` pairs of one namespace of a log event.
pub type NodeIdValuePairs = AHashMap<NodeId, Value>;

/// A single record of the stream.
///
/// Borrows the deserializer's schema trees; the borrow is valid for the
/// duration of the handler callback receiving the event. Construction
/// validates the pairs against the trees, so accessors never fail.
#[derive(Debug)]
pub struct LogEvent<'a> {
    auto_tree: &'a SchemaTree,
    user_tree: &'a SchemaTree,
    auto_pairs: NodeIdValuePairs,
    user_pairs: NodeIdValuePairs,
    utc_offset: UtcOffset,
}

impl<'a> LogEvent<'a> {
    /// Builds a log event after validating both pair bags:
    /// - every referenced node id must exist in its tree,
    /// - values must agree with their node's type (`Obj` entries may only
    ///   carry `Null`, marking an empty object),
    /// - no entry may be an ancestor of another entry (a key path cannot
    ///   run through a value-carrying node).
    pub fn new(
        auto_tree: &'a SchemaTree,
        user_tree: &'a SchemaTree,
        auto_pairs: NodeIdValuePairs,
        user_pairs: NodeIdValuePairs,
        utc_offset: UtcOffset,
    ) -> Result<LogEvent<'a>> {
        validate_pairs(auto_tree, &auto_pairs, Namespace::Auto)?;
        validate_pairs(user_tree, &user_pairs, Namespace::User)?;
        Ok(LogEvent {
            auto_tree,
            user_tree,
            auto_pairs,
            user_pairs,
            utc_offset,
        })
    }

    pub fn auto_pairs(&self) -> &NodeIdValuePairs {
        &self.auto_pairs
    }

    pub fn user_pairs(&self) -> &NodeIdValuePairs {
        &self.user_pairs
    }

    pub fn pairs(&self, namespace: Namespace) -> &NodeIdValuePairs {
        match namespace {
            Namespace::Auto => &self.auto_pairs,
            Namespace::User => &self.user_pairs,
        }
    }

    pub fn schema_tree(&self, namespace: Namespace) -> &SchemaTree {
        match namespace {
            Namespace::Auto => self.auto_tree,
            Namespace::User => self.user_tree,
        }
    }

    /// The UTC offset in effect when this event was decoded.
    pub fn utc_offset(&self) -> UtcOffset {
        self.utc_offset
    }

    /// Renders one namespace of the event as a JSON object string.
    ///
    /// Keys appear in schema-node-id order, which is the order the keys
    /// first appeared on the stream; encoded text values are decoded.
    pub fn to_json(&self, namespace: Namespace) -> String {
        let tree = self.schema_tree(namespace);
        let pairs = self.pairs(namespace);

        let mut entries: Vec<(NodeId, &Value)> = pairs.iter().map(|(id, v)| (*id, v)).collect();
        entries.sort_by_key(|(id, _)| *id);

        let mut root = JsonObj::default();
        for (id, value) in entries {
            // Ids were validated at construction.
            let path = tree.path_of(id).unwrap_or_default();
            let is_empty_obj = tree
                .get(id)
                .map(|node| node.node_type().is_obj())
                .unwrap_or(false);
            root.insert(&path, value, is_empty_obj);
        }

        let mut out = String::new();
        root.render(&mut out);
        out
    }
}

/// Intermediate object tree preserving key insertion order for rendering.
#[derive(Default)]
struct JsonObj<'v> {
    entries: Vec<(String, JsonNode<'v>)>,
}

enum JsonNode<'v> {
    Obj(JsonObj<'v>),
    Leaf(&'v Value),
}

impl<'v> JsonObj<'v> {
    fn insert(&mut self, path: &[&str], value: &'v Value, is_empty_obj: bool) {
        let Some((head, rest)) = path.split_first() else {
            return;
        };
        if rest.is_empty() {
            let node = if is_empty_obj {
                JsonNode::Obj(JsonObj::default())
            } else {
                JsonNode::Leaf(value)
            };
            self.entries.push((head.to_string(), node));
            return;
        }
        let child = self
            .entries
            .iter_mut()
            .find(|(name, node)| name.as_str() == *head && matches!(node, JsonNode::Obj(_)));
        match child {
            Some((_, JsonNode::Obj(obj))) => obj.insert(rest, value, is_empty_obj),
            _ => {
                let mut obj = JsonObj::default();
                obj.insert(rest, value, is_empty_obj);
                self.entries.push((head.to_string(), JsonNode::Obj(obj)));
            }
        }
    }

    fn render(&self, out: &mut String) {
        out.push('{');
        for (i, (name, node)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('"');
            utf8::escape_into(name, out);
            out.push_str("\":");
            match node {
                JsonNode::Obj(obj) => obj.render(out),
                JsonNode::Leaf(value) => render_value(value, out),
            }
        }
        out.push('}');
    }
}

fn render_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) => {
            if f.is_finite() {
                out.push_str(&f.to_string());
            } else {
                // JSON has no representation for non-finite numbers.
                out.push_str("null");
            }
        }
        Value::Str(s) => {
            out.push('"');
            utf8::escape_into(s, out);
            out.push('"');
        }
        Value::EncodedText8(ast) => {
            out.push('"');
            utf8::escape_into(&ast.decode(), out);
            out.push('"');
        }
        Value::EncodedText4(ast) => {
            out.push('"');
            utf8::escape_into(&ast.decode(), out);
            out.push('"');
        }
    }
}

fn validate_pairs(
    tree: &SchemaTree,
    pairs: &NodeIdValuePairs,
    namespace: Namespace,
) -> Result<()> {
    for (&id, value) in pairs.iter() {
        let node = tree.get(id).ok_or_else(|| {
            Error::protocol(
                "log_event",
                format!("unknown {namespace} schema tree node id {id}"),
            )
        })?;
        if !value_fits_node(node, value) {
            return Err(Error::protocol(
                "log_event",
                format!(
                    "value of {namespace} node {id} does not fit node type '{}'",
                    node.node_type()
                ),
            ));
        }
        // Reject entries sitting on another entry's key path.
        let mut current = node;
        while !current.is_root() {
            let parent_id = current.parent_id();
            if pairs.contains_key(&parent_id) {
                return Err(Error::protocol(
                    "log_event",
                    format!(
                        "{namespace} node {id} lies beneath node {parent_id}, which also carries a value"
                    ),
                ));
            }
            current = tree.get(parent_id).ok_or_else(|| {
                Error::protocol("log_event", format!("broken parent chain at node {id}"))
            })?;
        }
    }
    Ok(())
}

fn value_fits_node(node: &Node, value: &Value) -> bool {
    match node.node_type() {
        NodeType::Int => matches!(value, Value::Int(_)),
        NodeType::Float => matches!(value, Value::Float(_)),
        NodeType::Bool => matches!(value, Value::Bool(_)),
        NodeType::Str => value.is_text(),
        // Arrays travel as their serialized text form.
        NodeType::UnstructuredArray => value.is_text(),
        NodeType::Obj => value.is_null(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoded_text::EightByteEncodedTextAst;
    use crate::schema::NodeLocator;

    fn test_trees() -> (SchemaTree, SchemaTree, NodeId, NodeId, NodeId) {
        let auto = SchemaTree::new();
        let mut user = SchemaTree::new();
        let obj = user
            .insert(NodeLocator::new(NodeId::ROOT, "ctx", NodeType::Obj))
            .unwrap();
        let num = user
            .insert(NodeLocator::new(obj, "attempt", NodeType::Int))
            .unwrap();
        let msg = user
            .insert(NodeLocator::new(NodeId::ROOT, "msg", NodeType::Str))
            .unwrap();
        (auto, user, obj, num, msg)
    }

    #[test]
    fn test_validation_accepts_well_formed_event() {
        let (auto, user, _, num, msg) = test_trees();
        let mut pairs = NodeIdValuePairs::new();
        pairs.insert(num, Value::Int(3));
        pairs.insert(msg, Value::Str("ok".into()));
        let event = LogEvent::new(
            &auto,
            &user,
            NodeIdValuePairs::new(),
            pairs,
            UtcOffset::new(0),
        )
        .unwrap();
        assert_eq!(event.user_pairs().len(), 2);
    }

    #[test]
    fn test_validation_rejects_unknown_id() {
        let (auto, user, ..) = test_trees();
        let mut pairs = NodeIdValuePairs::new();
        pairs.insert(NodeId::from(99), Value::Int(1));
        assert!(LogEvent::new(
            &auto,
            &user,
            NodeIdValuePairs::new(),
            pairs,
            UtcOffset::new(0)
        )
        .is_err());
    }

    #[test]
    fn test_validation_rejects_type_mismatch() {
        let (auto, user, _, num, _) = test_trees();
        let mut pairs = NodeIdValuePairs::new();
        pairs.insert(num, Value::Str("not an int".into()));
        assert!(LogEvent::new(
            &auto,
            &user,
            NodeIdValuePairs::new(),
            pairs,
            UtcOffset::new(0)
        )
        .is_err());
    }

    #[test]
    fn test_validation_rejects_value_on_key_path() {
        let (auto, user, obj, num, _) = test_trees();
        let mut pairs = NodeIdValuePairs::new();
        pairs.insert(obj, Value::Null);
        pairs.insert(num, Value::Int(1));
        assert!(LogEvent::new(
            &auto,
            &user,
            NodeIdValuePairs::new(),
            pairs,
            UtcOffset::new(0)
        )
        .is_err());
    }

    #[test]
    fn test_to_json_nested() {
        let (auto, user, _, num, msg) = test_trees();
        let mut pairs = NodeIdValuePairs::new();
        pairs.insert(num, Value::Int(3));
        pairs.insert(msg, Value::Str("done \"ok\"".into()));
        let event = LogEvent::new(
            &auto,
            &user,
            NodeIdValuePairs::new(),
            pairs,
            UtcOffset::new(0),
        )
        .unwrap();
        assert_eq!(
            event.to_json(Namespace::User),
            r#"{"ctx":{"attempt":3},"msg":"done \"ok\""}"#
        );
        assert_eq!(event.to_json(Namespace::Auto), "{}");
    }

    #[test]
    fn test_to_json_empty_object_and_encoded_text() {
        let auto = SchemaTree::new();
        let mut user = SchemaTree::new();
        let empty = user
            .insert(NodeLocator::new(NodeId::ROOT, "empty", NodeType::Obj))
            .unwrap();
        let text = user
            .insert(NodeLocator::new(NodeId::ROOT, "text", NodeType::Str))
            .unwrap();

        let mut pairs = NodeIdValuePairs::new();
        pairs.insert(empty, Value::Null);
        pairs.insert(
            text,
            Value::EncodedText8(EightByteEncodedTextAst::new(
                format!("v={}", crate::encoded_text::placeholder::INT_VAR),
                vec![],
                vec![8i64],
            )),
        );
        let event = LogEvent::new(
            &auto,
            &user,
            NodeIdValuePairs::new(),
            pairs,
            UtcOffset::new(0),
        )
        .unwrap();
        assert_eq!(
            event.to_json(Namespace::User),
            r#"{"empty":{},"text":"v=8"}"#
        );
    }
}
