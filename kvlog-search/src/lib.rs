//! Streaming query evaluation over self-describing key-value log streams.
//!
//! The entry point is [`Deserializer`]: it consumes a byte stream of
//! framed units (schema tree insertions, log events, UTC offset changes),
//! incrementally resolves the query's column paths against the growing
//! schema trees, evaluates every log event under a tri-valued logic, and
//! forwards surviving units to a caller-supplied [`UnitHandler`].
//!
//! Queries are Boolean trees of typed filter predicates over hierarchical
//! column paths ([`Expr`], built through [`QueryBuilder`]). Before
//! evaluation a query goes through three rewrite passes
//! ([`preprocess`]): normalization to an Or-of-And form, literal type
//! narrowing, and conversion of trivial string matches to existence
//! checks.

pub mod ast;
pub mod column;
pub mod deserializer;
pub mod evaluate;
pub mod handler;
pub mod literal;
pub mod preprocess;
pub mod wildcard;

mod resolver;

#[cfg(test)]
mod tests;

pub use ast::{AndExpr, Expr, FilterExpr, FilterOp, OrExpr, Query, QueryBuilder};
pub use column::{ColumnArena, ColumnDescriptor, ColumnId, DescriptorToken};
pub use deserializer::{Deserializer, UnitStatus};
pub use evaluate::EvaluatedValue;
pub use handler::{HandlerError, NoopHandler, UnitHandler};
pub use literal::{Literal, LiteralType, LiteralTypeSet};
pub use preprocess::preprocess;
