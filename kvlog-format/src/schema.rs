//! Append-only schema trees describing the key structure of a stream.
//!
//! Every key path ever observed on a stream is interned as a chain of typed
//! nodes. Nodes are identified by a `NodeId` assigned in insertion order,
//! which lets log events refer to keys by id instead of repeating names.

use ahash::AHashMap;
use kvlog_common::{Error, Result};

/// Identifier of a schema tree node, assigned monotonically starting at 0
/// for the root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Id of the root node of every schema tree.
    pub const ROOT: NodeId = NodeId(0);

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> NodeId {
        NodeId(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The type of a schema tree node.
///
/// `Obj` nodes may have children; all other node types are leaves.
/// `UnstructuredArray` marks a key whose values are arrays serialized as
/// text rather than expanded into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Int,
    Float,
    Bool,
    Str,
    UnstructuredArray,
    Obj,
}

impl NodeType {
    pub fn is_obj(self) -> bool {
        matches!(self, NodeType::Obj)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            NodeType::Int => "int",
            NodeType::Float => "float",
            NodeType::Bool => "bool",
            NodeType::Str => "str",
            NodeType::UnstructuredArray => "array",
            NodeType::Obj => "obj",
        };
        f.write_str(name)
    }
}

/// Which of the two independent schema trees a node or pair bag belongs to.
///
/// Auto-generated keys are added by the log producer (timestamps, severity,
/// source attribution); user-generated keys come from the application's own
/// record fields. The trees share shape but never cross-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Auto,
    User,
}

impl Namespace {
    pub fn from_is_auto_generated(is_auto_generated: bool) -> Namespace {
        if is_auto_generated {
            Namespace::Auto
        } else {
            Namespace::User
        }
    }

    pub fn is_auto_generated(self) -> bool {
        matches!(self, Namespace::Auto)
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            Namespace::Auto => "auto",
            Namespace::User => "user",
        })
    }
}

/// Identifies a schema tree node prior to the assignment of its id.
///
/// The `(parent_id, name, node_type)` triple is unique within a tree:
/// re-inserting an existing locator is a stream-level protocol error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeLocator {
    pub parent_id: NodeId,
    pub name: String,
    pub node_type: NodeType,
}

impl NodeLocator {
    pub fn new(parent_id: NodeId, name: impl Into<String>, node_type: NodeType) -> NodeLocator {
        NodeLocator {
            parent_id,
            name: name.into(),
            node_type,
        }
    }
}

/// A single node of a schema tree.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    parent_id: NodeId,
    name: String,
    node_type: NodeType,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Parent of this node. The root is its own parent.
    pub fn parent_id(&self) -> NodeId {
        self.parent_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn is_root(&self) -> bool {
        self.id == self.parent_id
    }
}

/// An append-only trie of typed key nodes.
///
/// The tree starts with a nameless `Obj` root at `NodeId::ROOT`. Insertion
/// assigns ids in arrival order, so any id observed on the stream resolves
/// against the tree state at that point and stays valid forever.
#[derive(Debug, Clone)]
pub struct SchemaTree {
    nodes: Vec<Node>,
    locator_index: AHashMap<NodeLocator, NodeId>,
}

impl SchemaTree {
    pub fn new() -> SchemaTree {
        SchemaTree {
            nodes: vec![Node {
                id: NodeId::ROOT,
                parent_id: NodeId::ROOT,
                name: String::new(),
                node_type: NodeType::Obj,
            }],
            locator_index: AHashMap::new(),
        }
    }

    pub fn root_id(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Number of nodes in the tree, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no nodes besides the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Returns the node with the given id, or `None` if the id has not been
    /// assigned.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_usize())
    }

    pub fn contains(&self, locator: &NodeLocator) -> bool {
        self.locator_index.contains_key(locator)
    }

    /// Looks up the id assigned to `locator`, if any.
    pub fn find(&self, locator: &NodeLocator) -> Option<NodeId> {
        self.locator_index.get(locator).copied()
    }

    /// Inserts a new node and returns its assigned id.
    ///
    /// Fails if the locator already exists, if the parent id is unknown, or
    /// if the parent is not an `Obj` node. All three conditions indicate a
    /// corrupted stream rather than a caller bug, so they surface as
    /// protocol errors.
    pub fn insert(&mut self, locator: NodeLocator) -> Result<NodeId> {
        let parent = self.get(locator.parent_id).ok_or_else(|| {
            Error::protocol(
                "schema_tree",
                format!("parent node {} does not exist", locator.parent_id),
            )
        })?;
        if !parent.node_type().is_obj() {
            return Err(Error::protocol(
                "schema_tree",
                format!(
                    "parent node {} has type '{}' and cannot have children",
                    locator.parent_id,
                    parent.node_type()
                ),
            ));
        }
        if self.contains(&locator) {
            return Err(Error::protocol(
                "schema_tree",
                format!(
                    "node '{}' already exists under parent {}",
                    locator.name, locator.parent_id
                ),
            ));
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            parent_id: locator.parent_id,
            name: locator.name.clone(),
            node_type: locator.node_type,
        });
        self.locator_index.insert(locator, id);
        Ok(id)
    }

    /// Returns the key names on the path from the root to `id`, root-most
    /// first. The root's empty name is not included.
    pub fn path_of(&self, id: NodeId) -> Option<Vec<&str>> {
        let mut names = Vec::new();
        let mut node = self.get(id)?;
        while !node.is_root() {
            names.push(node.name());
            node = self.get(node.parent_id())?;
        }
        names.reverse();
        Some(names)
    }
}

impl Default for SchemaTree {
    fn default() -> SchemaTree {
        SchemaTree::new()
    }
}
