//! Query rewrite passes.
//!
//! [`preprocess`] runs three idempotent passes over a query's expression
//! tree before evaluation begins:
//!
//! 1. [`normalize_to_or_of_and`] pushes inversions down to the filters and
//!    rebuilds the tree as a disjunction of conjunctions,
//! 2. [`narrow_types`] intersects each column's type mask with its
//!    operand's compatible types, folding away filters that can never
//!    match,
//! 3. [`convert_to_exists`] turns match-anything string filters into
//!    existence checks.
//!
//! Each pass may collapse the whole tree to [`Expr::Empty`], meaning the
//! query is unsatisfiable; later passes are skipped in that case.

use crate::ast::{AndExpr, Expr, FilterExpr, FilterOp, OrExpr, Query};
use crate::column::ColumnArena;
use crate::literal::{Literal, LiteralTypeSet};
use crate::wildcard::is_match_all;

/// Runs all rewrite passes over `query`, short-circuiting on an
/// unsatisfiable result.
pub fn preprocess(query: Query) -> Query {
    let Query {
        mut arena,
        root,
        case_sensitive,
    } = query;

    let mut root = normalize_to_or_of_and(root);
    if !root.is_empty() {
        root = narrow_types(root, &mut arena);
    }
    if !root.is_empty() {
        root = convert_to_exists(root, &mut arena);
    }

    Query {
        arena,
        root,
        case_sensitive,
    }
}

/// Rewrites the tree into a top-level Or of Ands of filters (degenerating
/// to a single And or a lone filter where the structure allows).
///
/// Inversions are pushed down to the filters via DeMorgan's laws, nested
/// conjunctions/disjunctions are flattened, and conjunction distributes
/// over disjunction. `Empty` operands annihilate their conjunction; a
/// disjunction with no satisfiable branch collapses to `Empty`.
pub fn normalize_to_or_of_and(expr: Expr) -> Expr {
    let expr = push_inversions(expr, false);
    let branches = disjunctive_branches(expr);
    rebuild(branches)
}

fn push_inversions(expr: Expr, inverted: bool) -> Expr {
    match expr {
        Expr::And(and) => {
            let flip = inverted ^ and.inverted;
            let operands = and
                .operands
                .into_iter()
                .map(|op| push_inversions(op, flip))
                .collect();
            if flip {
                Expr::Or(OrExpr {
                    operands,
                    inverted: false,
                })
            } else {
                Expr::And(AndExpr {
                    operands,
                    inverted: false,
                })
            }
        }
        Expr::Or(or) => {
            let flip = inverted ^ or.inverted;
            let operands = or
                .operands
                .into_iter()
                .map(|op| push_inversions(op, flip))
                .collect();
            if flip {
                Expr::And(AndExpr {
                    operands,
                    inverted: false,
                })
            } else {
                Expr::Or(OrExpr {
                    operands,
                    inverted: false,
                })
            }
        }
        Expr::Filter(mut filter) => {
            filter.inverted ^= inverted;
            Expr::Filter(filter)
        }
        Expr::Empty => Expr::Empty,
    }
}

/// Flattens an inversion-free tree into its disjunctive branches, each a
/// list of filters. An empty branch list is unsatisfiable; an empty branch
/// is vacuously true.
fn disjunctive_branches(expr: Expr) -> Vec<Vec<FilterExpr>> {
    match expr {
        Expr::Filter(filter) => vec![vec![filter]],
        Expr::Empty => vec![],
        Expr::Or(or) => or
            .operands
            .into_iter()
            .flat_map(disjunctive_branches)
            .collect(),
        Expr::And(and) => {
            let mut product: Vec<Vec<FilterExpr>> = vec![vec![]];
            for operand in and.operands {
                let operand_branches = disjunctive_branches(operand);
                let mut next = Vec::with_capacity(product.len() * operand_branches.len());
                for prefix in &product {
                    for branch in &operand_branches {
                        let mut combined = prefix.clone();
                        combined.extend(branch.iter().cloned());
                        next.push(combined);
                    }
                }
                product = next;
            }
            product
        }
    }
}

fn rebuild(branches: Vec<Vec<FilterExpr>>) -> Expr {
    if branches.is_empty() {
        return Expr::Empty;
    }
    if branches.iter().any(Vec::is_empty) {
        // Some branch is vacuously true, so the whole disjunction is.
        return Expr::And(AndExpr {
            operands: vec![],
            inverted: false,
        });
    }
    let mut exprs: Vec<Expr> = branches
        .into_iter()
        .map(|branch| {
            if branch.len() == 1 {
                Expr::Filter(branch.into_iter().next().expect("single filter"))
            } else {
                Expr::And(AndExpr {
                    operands: branch.into_iter().map(Expr::Filter).collect(),
                    inverted: false,
                })
            }
        })
        .collect();
    if exprs.len() == 1 {
        exprs.pop().expect("single branch")
    } else {
        Expr::Or(OrExpr {
            operands: exprs,
            inverted: false,
        })
    }
}

/// Constant-folding outcome of a narrowing step.
enum Folded {
    Keep(Expr),
    True,
    False,
}

/// Intersects each filter column's type mask with its operand literal's
/// compatible types. A filter whose intersection is empty can never match
/// and folds to a constant, which then short-circuits in its parent.
pub fn narrow_types(expr: Expr, arena: &mut ColumnArena) -> Expr {
    match narrow(expr, arena) {
        Folded::Keep(expr) => expr,
        // Vacuously true: an And with no operands.
        Folded::True => Expr::And(AndExpr {
            operands: vec![],
            inverted: false,
        }),
        Folded::False => Expr::Empty,
    }
}

fn narrow(expr: Expr, arena: &mut ColumnArena) -> Folded {
    match expr {
        Expr::Empty => Folded::False,
        Expr::Filter(filter) => narrow_filter(filter, arena),
        Expr::And(and) => {
            let mut kept = Vec::with_capacity(and.operands.len());
            let mut any_false = false;
            for operand in and.operands {
                match narrow(operand, arena) {
                    Folded::True => {}
                    Folded::False => any_false = true,
                    Folded::Keep(e) => kept.push(e),
                }
            }
            if any_false {
                return apply_constant_inversion(Folded::False, and.inverted);
            }
            if kept.is_empty() {
                return apply_constant_inversion(Folded::True, and.inverted);
            }
            if kept.len() == 1 && !and.inverted {
                return Folded::Keep(kept.remove(0));
            }
            Folded::Keep(Expr::And(AndExpr {
                operands: kept,
                inverted: and.inverted,
            }))
        }
        Expr::Or(or) => {
            let mut kept = Vec::with_capacity(or.operands.len());
            let mut any_true = false;
            for operand in or.operands {
                match narrow(operand, arena) {
                    Folded::True => any_true = true,
                    Folded::False => {}
                    Folded::Keep(e) => kept.push(e),
                }
            }
            if any_true {
                return apply_constant_inversion(Folded::True, or.inverted);
            }
            if kept.is_empty() {
                return apply_constant_inversion(Folded::False, or.inverted);
            }
            if kept.len() == 1 && !or.inverted {
                return Folded::Keep(kept.remove(0));
            }
            Folded::Keep(Expr::Or(OrExpr {
                operands: kept,
                inverted: or.inverted,
            }))
        }
    }
}

fn narrow_filter(filter: FilterExpr, arena: &mut ColumnArena) -> Folded {
    let Some(operand) = filter.operand.as_ref() else {
        // Exists/Nexists carry no operand and no type constraint.
        return Folded::Keep(Expr::Filter(filter));
    };
    let column = arena.get(filter.column);
    let narrowed = column.type_mask().intersect(operand.compatible_types());
    if narrowed.is_empty() {
        if filter.inverted {
            Folded::True
        } else {
            Folded::False
        }
    } else {
        arena.get_mut(filter.column).set_type_mask(narrowed);
        Folded::Keep(Expr::Filter(filter))
    }
}

fn apply_constant_inversion(folded: Folded, inverted: bool) -> Folded {
    if !inverted {
        return folded;
    }
    match folded {
        Folded::True => Folded::False,
        Folded::False => Folded::True,
        keep => keep,
    }
}

/// Converts Eq/Neq filters whose string operand matches everything (a
/// pattern of only `*`) into Exists/Nexists checks, folding the inversion
/// flag into the chosen operator and widening the column back to all
/// types.
pub fn convert_to_exists(expr: Expr, arena: &mut ColumnArena) -> Expr {
    match expr {
        Expr::And(mut and) => {
            and.operands = and
                .operands
                .into_iter()
                .map(|op| convert_to_exists(op, arena))
                .collect();
            Expr::And(and)
        }
        Expr::Or(mut or) => {
            or.operands = or
                .operands
                .into_iter()
                .map(|op| convert_to_exists(op, arena))
                .collect();
            Expr::Or(or)
        }
        Expr::Filter(filter) => Expr::Filter(convert_filter(filter, arena)),
        Expr::Empty => Expr::Empty,
    }
}

fn convert_filter(filter: FilterExpr, arena: &mut ColumnArena) -> FilterExpr {
    let convertible = matches!(filter.op, FilterOp::Eq | FilterOp::Neq)
        && matches!(
            filter.operand.as_ref(),
            Some(Literal::VarString(s) | Literal::ClpString(s)) if is_match_all(s)
        );
    if !convertible {
        return filter;
    }
    let negated = matches!(filter.op, FilterOp::Neq) ^ filter.inverted;
    let op = if negated {
        FilterOp::Nexists
    } else {
        FilterOp::Exists
    };
    arena
        .get_mut(filter.column)
        .set_type_mask(LiteralTypeSet::ALL);
    FilterExpr {
        column: filter.column,
        op,
        operand: None,
        inverted: false,
    }
}
