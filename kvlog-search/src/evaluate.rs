//! Tri-valued evaluation of a query against one log event.
//!
//! Alongside the classical `True`/`False`, evaluation distinguishes
//! [`EvaluatedValue::Prune`]: the predicate's column did not resolve to
//! any key present in the record, so the record was never a candidate at
//! this predicate. `Prune` dominates a conjunction (the whole branch is
//! speculative for this record) while a disjunction only prunes when
//! every alternative does. Inversion swaps `True` and `False` and leaves
//! `Prune` alone.

use kvlog_format::{Namespace, NodeIdValuePairs, SchemaTree, Value};

use crate::ast::{AndExpr, Expr, FilterExpr, FilterOp, OrExpr};
use crate::column::{ColumnArena, ColumnDescriptor};
use crate::literal::{value_literal_type, Literal, LiteralType};
use crate::resolver::Resolver;
use crate::wildcard::wildcard_match;

/// Result of evaluating an expression for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatedValue {
    True,
    False,
    /// The expression's column is absent from the record; the record is
    /// not a candidate at this predicate.
    Prune,
}

/// Everything filter evaluation needs for one record.
pub(crate) struct EvalContext<'a> {
    pub arena: &'a ColumnArena,
    pub resolver: &'a Resolver,
    pub auto_tree: &'a SchemaTree,
    pub user_tree: &'a SchemaTree,
    pub auto_pairs: &'a NodeIdValuePairs,
    pub user_pairs: &'a NodeIdValuePairs,
    pub case_sensitive: bool,
}

pub(crate) fn evaluate(expr: &Expr, ctx: &EvalContext) -> EvaluatedValue {
    match expr {
        Expr::And(and) => evaluate_and(and, ctx),
        Expr::Or(or) => evaluate_or(or, ctx),
        Expr::Filter(filter) => evaluate_filter(filter, ctx),
        Expr::Empty => EvaluatedValue::False,
    }
}

fn evaluate_and(and: &AndExpr, ctx: &EvalContext) -> EvaluatedValue {
    let mut saw_false = false;
    for operand in &and.operands {
        match evaluate(operand, ctx) {
            // Prune dominates the conjunction regardless of later
            // operands, so this is the only safe short-circuit.
            EvaluatedValue::Prune => return EvaluatedValue::Prune,
            EvaluatedValue::False => saw_false = true,
            EvaluatedValue::True => {}
        }
    }
    // An operand-less And is vacuously true.
    boolean(!saw_false, and.inverted)
}

fn evaluate_or(or: &OrExpr, ctx: &EvalContext) -> EvaluatedValue {
    if or.operands.is_empty() {
        return boolean(false, or.inverted);
    }
    let mut all_prune = true;
    for operand in &or.operands {
        match evaluate(operand, ctx) {
            EvaluatedValue::True => return boolean(true, or.inverted),
            EvaluatedValue::False => all_prune = false,
            EvaluatedValue::Prune => {}
        }
    }
    if all_prune {
        EvaluatedValue::Prune
    } else {
        boolean(false, or.inverted)
    }
}

fn boolean(value: bool, inverted: bool) -> EvaluatedValue {
    if value ^ inverted {
        EvaluatedValue::True
    } else {
        EvaluatedValue::False
    }
}

fn evaluate_filter(filter: &FilterExpr, ctx: &EvalContext) -> EvaluatedValue {
    let descriptor = ctx.arena.get(filter.column);
    if descriptor.is_pure_wildcard() {
        return evaluate_pure_wildcard(filter, descriptor, ctx);
    }

    let (pairs, tree) = match descriptor.namespace() {
        Namespace::Auto => (ctx.auto_pairs, ctx.auto_tree),
        Namespace::User => (ctx.user_pairs, ctx.user_tree),
    };

    let mut present = false;
    let mut satisfied = false;
    for node_id in ctx.resolver.final_resolutions(filter.column) {
        let Some(value) = pairs.get(node_id) else {
            continue;
        };
        present = true;
        let Some(node) = tree.get(*node_id) else {
            continue;
        };
        let literal_type = value_literal_type(node.node_type(), value);
        if filter_matches(filter, literal_type, value, ctx.case_sensitive) {
            satisfied = true;
            break;
        }
    }

    if !present {
        return EvaluatedValue::Prune;
    }
    boolean(satisfied, filter.inverted)
}

/// A pure-wildcard filter scans every pair of both namespaces: `True` if
/// any type-matching pair satisfies it, `False` if at least one pair
/// matched the column's types but none satisfied, `Prune` otherwise.
fn evaluate_pure_wildcard(
    filter: &FilterExpr,
    descriptor: &ColumnDescriptor,
    ctx: &EvalContext,
) -> EvaluatedValue {
    let mut matched_type = false;
    let mut satisfied = false;
    let bags = [
        (ctx.auto_pairs, ctx.auto_tree),
        (ctx.user_pairs, ctx.user_tree),
    ];
    'scan: for (pairs, tree) in bags {
        for (node_id, value) in pairs.iter() {
            let Some(node) = tree.get(*node_id) else {
                continue;
            };
            let literal_type = value_literal_type(node.node_type(), value);
            if !descriptor.type_mask().contains(literal_type) {
                continue;
            }
            matched_type = true;
            if filter_matches(filter, literal_type, value, ctx.case_sensitive) {
                satisfied = true;
                break 'scan;
            }
        }
    }
    if satisfied || matched_type {
        boolean(satisfied, filter.inverted)
    } else {
        EvaluatedValue::Prune
    }
}

/// Evaluates a single filter against one `(literal type, value)` pair.
/// Presence has already been established by the caller, so `Exists` is
/// trivially true and `Nexists` trivially false here.
fn filter_matches(
    filter: &FilterExpr,
    literal_type: LiteralType,
    value: &Value,
    case_sensitive: bool,
) -> bool {
    match filter.op {
        FilterOp::Exists => return true,
        FilterOp::Nexists => return false,
        _ => {}
    }
    let Some(operand) = filter.operand.as_ref() else {
        return false;
    };
    match literal_type {
        LiteralType::Integer => match (value.as_i64(), operand.as_i64()) {
            (Some(v), Some(o)) => ordered_op_matches(filter.op, v.cmp(&o)),
            // Mixed-type comparisons never match.
            _ => false,
        },
        LiteralType::Float => match (value.as_f64(), operand.as_f64()) {
            (Some(v), Some(o)) => float_op_matches(filter.op, v, o),
            _ => false,
        },
        LiteralType::Boolean => match (value.as_bool(), operand.as_bool()) {
            (Some(v), Some(o)) => match filter.op {
                FilterOp::Eq => v == o,
                FilterOp::Neq => v != o,
                _ => false,
            },
            _ => false,
        },
        LiteralType::VarString | LiteralType::ClpString => {
            string_op_matches(filter, operand, value, case_sensitive)
        }
        // Arrays, nulls, dates and unknowns support no comparison
        // operators (existence checks were handled above).
        LiteralType::Array
        | LiteralType::Null
        | LiteralType::EpochDate
        | LiteralType::Unknown => false,
    }
}

fn string_op_matches(
    filter: &FilterExpr,
    operand: &Literal,
    value: &Value,
    case_sensitive: bool,
) -> bool {
    let Some(pattern) = operand.as_str() else {
        return false;
    };
    // Encoded text values decode to their full string form first.
    let Some(subject) = value.decode_text() else {
        return false;
    };
    match filter.op {
        FilterOp::Eq => wildcard_match(&subject, pattern, case_sensitive),
        FilterOp::Neq => !wildcard_match(&subject, pattern, case_sensitive),
        _ => false,
    }
}

fn ordered_op_matches(op: FilterOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering;
    match op {
        FilterOp::Eq => ordering == Ordering::Equal,
        FilterOp::Neq => ordering != Ordering::Equal,
        FilterOp::Lt => ordering == Ordering::Less,
        FilterOp::Gt => ordering == Ordering::Greater,
        FilterOp::Lte => ordering != Ordering::Greater,
        FilterOp::Gte => ordering != Ordering::Less,
        FilterOp::Exists | FilterOp::Nexists => false,
    }
}

fn float_op_matches(op: FilterOp, v: f64, o: f64) -> bool {
    match op {
        FilterOp::Eq => v == o,
        FilterOp::Neq => v != o,
        FilterOp::Lt => v < o,
        FilterOp::Gt => v > o,
        FilterOp::Lte => v <= o,
        FilterOp::Gte => v >= o,
        FilterOp::Exists | FilterOp::Nexists => false,
    }
}
