//! The query expression tree.
//!
//! A query is a Boolean combination of typed filters over column paths.
//! Expressions are plain owned values; the rewrite passes in
//! [`crate::preprocess`] consume and rebuild them. Inversion is a flag on
//! each node rather than a wrapper, mirroring how the normalization pass
//! pushes `NOT` down to the filters.

use kvlog_common::Result;

use crate::column::{ColumnArena, ColumnDescriptor, ColumnId};
use crate::literal::Literal;

/// Comparison performed by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    /// The column resolves to a key present in the record.
    Exists,
    Nexists,
}

/// A conjunction of sub-expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct AndExpr {
    pub operands: Vec<Expr>,
    pub inverted: bool,
}

/// A disjunction of sub-expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct OrExpr {
    pub operands: Vec<Expr>,
    pub inverted: bool,
}

/// A single predicate over one column.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    pub column: ColumnId,
    pub op: FilterOp,
    /// `None` for `Exists`/`Nexists`.
    pub operand: Option<Literal>,
    pub inverted: bool,
}

/// A query expression.
///
/// `Empty` is the unsatisfiable sentinel produced by the rewrite passes;
/// evaluating it never matches a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(AndExpr),
    Or(OrExpr),
    Filter(FilterExpr),
    Empty,
}

impl Expr {
    pub fn and(operands: Vec<Expr>) -> Expr {
        Expr::And(AndExpr {
            operands,
            inverted: false,
        })
    }

    pub fn or(operands: Vec<Expr>) -> Expr {
        Expr::Or(OrExpr {
            operands,
            inverted: false,
        })
    }

    /// Logical negation: toggles the inversion flag of the node. Negating
    /// `Empty` keeps `Empty` (the sentinel is not a value).
    pub fn not(expr: Expr) -> Expr {
        match expr {
            Expr::And(mut e) => {
                e.inverted = !e.inverted;
                Expr::And(e)
            }
            Expr::Or(mut e) => {
                e.inverted = !e.inverted;
                Expr::Or(e)
            }
            Expr::Filter(mut e) => {
                e.inverted = !e.inverted;
                Expr::Filter(e)
            }
            Expr::Empty => Expr::Empty,
        }
    }

    pub fn filter(column: ColumnId, op: FilterOp, operand: Literal) -> Expr {
        Expr::Filter(FilterExpr {
            column,
            op,
            operand: Some(operand),
            inverted: false,
        })
    }

    pub fn exists(column: ColumnId) -> Expr {
        Expr::Filter(FilterExpr {
            column,
            op: FilterOp::Exists,
            operand: None,
            inverted: false,
        })
    }

    pub fn nexists(column: ColumnId) -> Expr {
        Expr::Filter(FilterExpr {
            column,
            op: FilterOp::Nexists,
            operand: None,
            inverted: false,
        })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Expr::Empty)
    }

    /// Visits every filter in the tree, depth-first.
    pub fn for_each_filter<'a>(&'a self, visit: &mut impl FnMut(&'a FilterExpr)) {
        match self {
            Expr::And(e) => e.operands.iter().for_each(|op| op.for_each_filter(visit)),
            Expr::Or(e) => e.operands.iter().for_each(|op| op.for_each_filter(visit)),
            Expr::Filter(f) => visit(f),
            Expr::Empty => {}
        }
    }
}

/// A complete query: the expression tree plus the arena owning its column
/// descriptors and the query-wide string matching mode.
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) arena: ColumnArena,
    pub(crate) root: Expr,
    pub(crate) case_sensitive: bool,
}

impl Query {
    pub fn root(&self) -> &Expr {
        &self.root
    }

    pub fn arena(&self) -> &ColumnArena {
        &self.arena
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

/// Builds a [`Query`], interning column descriptors as they are named.
///
/// ```
/// use kvlog_search::{Expr, FilterOp, Literal, QueryBuilder};
///
/// let mut builder = QueryBuilder::new();
/// let latency = builder.column("ctx.latency_ms").unwrap();
/// let level = builder.column("level").unwrap();
/// let query = builder.build(Expr::and(vec![
///     Expr::filter(latency, FilterOp::Gt, Literal::Int(250)),
///     Expr::filter(level, FilterOp::Eq, Literal::VarString("warn*".into())),
/// ]));
/// ```
#[derive(Debug, Default)]
pub struct QueryBuilder {
    arena: ColumnArena,
    case_insensitive: bool,
}

impl QueryBuilder {
    pub fn new() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// Makes string comparisons of the built query case-insensitive.
    pub fn case_insensitive(mut self) -> QueryBuilder {
        self.case_insensitive = true;
        self
    }

    /// Parses and interns a column path, returning its id for use in
    /// filters.
    pub fn column(&mut self, path: &str) -> Result<ColumnId> {
        Ok(self.arena.intern(ColumnDescriptor::parse(path)?))
    }

    /// Interns an already-built descriptor.
    pub fn column_descriptor(&mut self, descriptor: ColumnDescriptor) -> ColumnId {
        self.arena.intern(descriptor)
    }

    pub fn build(self, root: Expr) -> Query {
        Query {
            arena: self.arena,
            root,
            case_sensitive: !self.case_insensitive,
        }
    }
}
