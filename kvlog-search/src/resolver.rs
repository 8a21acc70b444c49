//! Incremental column path resolution against the growing schema trees.
//!
//! For every non-pure-wildcard column of the query, and every projected
//! path, the resolver keeps *partial resolutions*: in-flight descents of
//! the column's token list anchored at a schema tree node. Each schema
//! tree insertion extends the partials anchored at the new node's parent;
//! a descent whose tokens are exhausted at a type-compatible node becomes
//! a *final resolution*.
//!
//! State is append-only: the schema trees only grow, so a partial
//! resolution installed once stays valid forever and is never removed.
//! Resolution work happens once per `(column, reached node)` prefix, not
//! per record.

use ahash::AHashMap;
use kvlog_common::Result;
use kvlog_format::{Namespace, NodeId, NodeLocator};

use crate::column::{ColumnArena, ColumnId};
use crate::literal::node_type_literal_set;

/// An in-flight descent: the column and the index of the token to match
/// next.
#[derive(Debug, Clone, Copy)]
struct PartialResolution {
    column: ColumnId,
    cursor: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Resolver {
    /// Descents anchored at `(node, namespace)`, waiting for children of
    /// that node to appear.
    partials: AHashMap<(NodeId, Namespace), Vec<PartialResolution>>,
    /// Node ids each column has fully resolved to.
    finals: AHashMap<ColumnId, Vec<NodeId>>,
    /// Columns that report resolutions to the handler instead of
    /// accumulating them, keyed to their original projection text.
    projections: AHashMap<ColumnId, String>,
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver::default()
    }

    /// Installs the initial partial resolutions for a query column.
    /// Pure-wildcard columns bypass resolution entirely and are skipped.
    pub fn add_query_column(&mut self, arena: &ColumnArena, column: ColumnId) {
        let descriptor = arena.get(column);
        if descriptor.is_pure_wildcard() || descriptor.tokens().is_empty() {
            return;
        }
        self.install_initial(arena, column);
    }

    /// Installs a projection target; resolutions of `column` will surface
    /// through the projection callback with `original` as the path text.
    pub fn add_projection(&mut self, arena: &ColumnArena, column: ColumnId, original: String) {
        self.projections.insert(column, original);
        self.install_initial(arena, column);
    }

    fn install_initial(&mut self, arena: &ColumnArena, column: ColumnId) {
        let descriptor = arena.get(column);
        let key = (NodeId::ROOT, descriptor.namespace());
        let anchored = self.partials.entry(key).or_default();
        anchored.push(PartialResolution { column, cursor: 0 });
        // A leading wildcard can match zero levels; anchor its successor
        // token at the root as well.
        if descriptor.tokens()[0].is_unresolved() && descriptor.tokens().len() > 1 {
            anchored.push(PartialResolution { column, cursor: 1 });
        }
    }

    /// Node ids the column has finally resolved to so far.
    pub fn final_resolutions(&self, column: ColumnId) -> &[NodeId] {
        self.finals.get(&column).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Advances resolution state for a newly inserted schema tree node.
    ///
    /// `on_projection` fires once per projection column that finally
    /// resolves to the new node. New partials produced by this step are
    /// buffered and flushed at the end, since they are keyed under the new
    /// node and must not perturb the iteration over its parent's entries.
    pub fn on_node_inserted(
        &mut self,
        arena: &ColumnArena,
        namespace: Namespace,
        locator: &NodeLocator,
        node_id: NodeId,
        mut on_projection: impl FnMut(Namespace, NodeId, &str) -> Result<()>,
    ) -> Result<()> {
        let node_set = node_type_literal_set(locator.node_type);
        let mut pending: Vec<PartialResolution> = Vec::new();

        if let Some(anchored) = self.partials.get(&(locator.parent_id, namespace)) {
            for partial in anchored {
                let descriptor = arena.get(partial.column);
                let tokens = descriptor.tokens();
                let token = &tokens[partial.cursor];
                let next = partial.cursor + 1;
                let is_last = next == tokens.len();
                let name_matches = token.matches_name(&locator.name);

                if locator.node_type.is_obj() && !is_last {
                    if token.is_unresolved() {
                        // The wildcard both consumes this level and stays
                        // anchored to consume deeper ones.
                        pending.push(PartialResolution {
                            column: partial.column,
                            cursor: partial.cursor,
                        });
                        pending.push(PartialResolution {
                            column: partial.column,
                            cursor: next,
                        });
                    } else if name_matches {
                        pending.push(PartialResolution {
                            column: partial.column,
                            cursor: next,
                        });
                        // A following non-final wildcard can match zero
                        // levels; anchor its successor here too.
                        if next + 1 < tokens.len() && tokens[next].is_unresolved() {
                            pending.push(PartialResolution {
                                column: partial.column,
                                cursor: next + 1,
                            });
                        }
                    }
                }

                // Terminal: the token list ends here, or only a trailing
                // wildcard (zero-width) remains after this token.
                let at_terminal =
                    is_last || (next + 1 == tokens.len() && tokens[next].is_unresolved());
                if at_terminal && name_matches && node_set.intersects(descriptor.type_mask()) {
                    if let Some(original) = self.projections.get(&partial.column) {
                        on_projection(namespace, node_id, original)?;
                    } else {
                        let resolved = self.finals.entry(partial.column).or_default();
                        if !resolved.contains(&node_id) {
                            resolved.push(node_id);
                        }
                    }
                }
            }
        }

        if !pending.is_empty() {
            self.partials
                .entry((node_id, namespace))
                .or_default()
                .extend(pending);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDescriptor;
    use kvlog_format::{NodeType, SchemaTree};

    struct Fixture {
        arena: ColumnArena,
        resolver: Resolver,
        tree: SchemaTree,
    }

    impl Fixture {
        fn new(paths: &[&str]) -> (Fixture, Vec<ColumnId>) {
            let mut arena = ColumnArena::new();
            let mut resolver = Resolver::new();
            let columns: Vec<ColumnId> = paths
                .iter()
                .map(|path| {
                    let id = arena.intern(ColumnDescriptor::parse(path).unwrap());
                    resolver.add_query_column(&arena, id);
                    id
                })
                .collect();
            (
                Fixture {
                    arena,
                    resolver,
                    tree: SchemaTree::new(),
                },
                columns,
            )
        }

        fn insert(&mut self, parent: NodeId, name: &str, node_type: NodeType) -> NodeId {
            let locator = NodeLocator::new(parent, name, node_type);
            let id = self.tree.insert(locator.clone()).unwrap();
            self.resolver
                .on_node_inserted(&self.arena, Namespace::User, &locator, id, |_, _, _| Ok(()))
                .unwrap();
            id
        }
    }

    #[test]
    fn test_literal_path_resolves() {
        let (mut fx, cols) = Fixture::new(&["a.b"]);
        let a = fx.insert(NodeId::ROOT, "a", NodeType::Obj);
        let b = fx.insert(a, "b", NodeType::Int);
        assert_eq!(fx.resolver.final_resolutions(cols[0]), &[b]);
    }

    #[test]
    fn test_name_mismatch_does_not_resolve() {
        let (mut fx, cols) = Fixture::new(&["a.b"]);
        let a = fx.insert(NodeId::ROOT, "a", NodeType::Obj);
        fx.insert(a, "c", NodeType::Int);
        fx.insert(NodeId::ROOT, "b", NodeType::Int);
        assert!(fx.resolver.final_resolutions(cols[0]).is_empty());
    }

    #[test]
    fn test_wildcard_matches_one_and_zero_levels() {
        let (mut fx, cols) = Fixture::new(&["x.*.z"]);
        let x = fx.insert(NodeId::ROOT, "x", NodeType::Obj);
        let y = fx.insert(x, "y", NodeType::Obj);
        let deep = fx.insert(y, "z", NodeType::Int);
        let shallow = fx.insert(x, "z", NodeType::Int);
        assert_eq!(fx.resolver.final_resolutions(cols[0]), &[deep, shallow]);
    }

    #[test]
    fn test_leading_wildcard_zero_width() {
        let (mut fx, cols) = Fixture::new(&["*.b"]);
        let top = fx.insert(NodeId::ROOT, "b", NodeType::Int);
        let a = fx.insert(NodeId::ROOT, "a", NodeType::Obj);
        let nested = fx.insert(a, "b", NodeType::Int);
        assert_eq!(fx.resolver.final_resolutions(cols[0]), &[top, nested]);
    }

    #[test]
    fn test_wildcard_spans_multiple_levels() {
        let (mut fx, cols) = Fixture::new(&["a.*.z"]);
        let a = fx.insert(NodeId::ROOT, "a", NodeType::Obj);
        let b = fx.insert(a, "b", NodeType::Obj);
        let c = fx.insert(b, "c", NodeType::Obj);
        let z = fx.insert(c, "z", NodeType::Int);
        assert_eq!(fx.resolver.final_resolutions(cols[0]), &[z]);
    }

    #[test]
    fn test_type_mask_gates_terminal_match() {
        let (mut fx, cols) = Fixture::new(&["a"]);
        fx.arena.get_mut(cols[0]).set_type_mask(
            crate::literal::LiteralTypeSet::of(&[crate::literal::LiteralType::Boolean]),
        );
        fx.insert(NodeId::ROOT, "a", NodeType::Int);
        assert!(fx.resolver.final_resolutions(cols[0]).is_empty());
        let flag = fx.insert(NodeId::ROOT, "a", NodeType::Bool);
        assert_eq!(fx.resolver.final_resolutions(cols[0]), &[flag]);
    }

    #[test]
    fn test_namespace_isolation() {
        let (mut fx, cols) = Fixture::new(&["auto:a"]);
        // The fixture inserts into the user namespace only.
        fx.insert(NodeId::ROOT, "a", NodeType::Int);
        assert!(fx.resolver.final_resolutions(cols[0]).is_empty());
    }

    #[test]
    fn test_pure_wildcard_installs_nothing() {
        let (mut fx, cols) = Fixture::new(&["*"]);
        fx.insert(NodeId::ROOT, "a", NodeType::Int);
        assert!(fx.resolver.final_resolutions(cols[0]).is_empty());
        assert!(fx.resolver.partials.is_empty());
    }

    #[test]
    fn test_projection_reports_instead_of_accumulating() {
        let mut arena = ColumnArena::new();
        let mut resolver = Resolver::new();
        let col = arena.intern(ColumnDescriptor::parse("user:a.b").unwrap());
        resolver.add_projection(&arena, col, "user:a.b".to_string());

        let mut tree = SchemaTree::new();
        let mut reported = Vec::new();

        let locator = NodeLocator::new(NodeId::ROOT, "a", NodeType::Obj);
        let a = tree.insert(locator.clone()).unwrap();
        resolver
            .on_node_inserted(&arena, Namespace::User, &locator, a, |_, _, _| {
                panic!("intermediate node must not report")
            })
            .unwrap();

        let locator = NodeLocator::new(a, "b", NodeType::Str);
        let b = tree.insert(locator.clone()).unwrap();
        resolver
            .on_node_inserted(&arena, Namespace::User, &locator, b, |ns, id, path| {
                reported.push((ns, id, path.to_string()));
                Ok(())
            })
            .unwrap();

        assert_eq!(reported, vec![(Namespace::User, b, "user:a.b".to_string())]);
        assert!(resolver.final_resolutions(col).is_empty());
    }

    #[test]
    fn test_append_only_growth() {
        let (mut fx, cols) = Fixture::new(&["a.*"]);
        let a = fx.insert(NodeId::ROOT, "a", NodeType::Obj);
        let mut previous = 0;
        for name in ["x", "y", "z"] {
            fx.insert(a, name, NodeType::Int);
            let count = fx.resolver.final_resolutions(cols[0]).len();
            assert!(count > previous);
            previous = count;
        }
    }

    #[test]
    fn test_no_duplicate_final_resolutions() {
        let (mut fx, cols) = Fixture::new(&["a.*.b", "a.*"]);
        let a = fx.insert(NodeId::ROOT, "a", NodeType::Obj);
        let x = fx.insert(a, "x", NodeType::Obj);
        fx.insert(x, "b", NodeType::Int);
        fx.insert(a, "b", NodeType::Int);
        for column in cols {
            let resolved = fx.resolver.final_resolutions(column);
            let mut deduped = resolved.to_vec();
            deduped.sort();
            deduped.dedup();
            assert_eq!(deduped.len(), resolved.len());
        }
    }
}
