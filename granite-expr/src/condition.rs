//! Conservative monotone predicates over primary-key tuples.
//!
//! A [`KeyCondition`] is built once per query from the WHERE tree, restricted
//! to a sort description (an ordered list of key column names). It answers
//! "may any tuple in `[lo, hi]` satisfy the predicate" for the sparse-index
//! pruner. The answer may be a false positive but never a false negative, so
//! the pruner stays sound no matter how little of the tree it understands.
//!
//! Internal form is a tagged tree: column-range atoms under `And`/`Or`/`Not`
//! combinators, with an unconditional `True` leaf standing in for every
//! subtree the builder does not recognize. Evaluation is a recursive descent
//! producing a (`can_be_true`, `can_be_false`) pair, which is what keeps
//! `Not` over an unrecognized subtree conservative instead of inverted.

use std::fmt;

use crate::ast::{AstArena, Node, NodeId};
use crate::range::OrderKeyRange;

#[derive(Debug, Clone)]
enum ConditionNode {
    /// Unrecognized subtree; may be true and may be false for any tuple.
    True,
    Atom {
        key_pos: usize,
        column: String,
        range: OrderKeyRange,
    },
    And(Vec<ConditionNode>),
    Or(Vec<ConditionNode>),
    Not(Box<ConditionNode>),
}

/// Which truth values a subtree can take over a tuple segment.
#[derive(Clone, Copy, Debug)]
struct BoolMask {
    can_be_true: bool,
    can_be_false: bool,
}

impl BoolMask {
    const UNKNOWN: BoolMask = BoolMask {
        can_be_true: true,
        can_be_false: true,
    };
}

/// Monotone predicate over order-encoded primary-key tuples.
#[derive(Debug, Clone)]
pub struct KeyCondition {
    key_columns: Vec<String>,
    root: ConditionNode,
}

impl KeyCondition {
    /// Build a condition from the WHERE tree, restricted to `key_columns`.
    ///
    /// Comparisons on columns outside the sort description, and call shapes
    /// the builder does not recognize, degrade to always-may-be-true leaves.
    pub fn new(arena: &AstArena, where_expr: Option<NodeId>, key_columns: Vec<String>) -> Self {
        let root = match where_expr {
            Some(id) => build_node(arena, id, &key_columns),
            None => ConditionNode::True,
        };
        Self { key_columns, root }
    }

    /// May the predicate hold for some tuple in the closed segment
    /// `[lo, hi]`? Tuples are order-encoded, one value per key column.
    pub fn may_be_true_in_range(&self, lo: &[u64], hi: &[u64]) -> bool {
        debug_assert_eq!(lo.len(), self.key_columns.len());
        debug_assert_eq!(hi.len(), self.key_columns.len());
        evaluate(&self.root, lo, Some(hi)).can_be_true
    }

    /// May the predicate hold for some tuple in `[lo, +inf)`?
    pub fn may_be_true_after(&self, lo: &[u64]) -> bool {
        debug_assert_eq!(lo.len(), self.key_columns.len());
        evaluate(&self.root, lo, None).can_be_true
    }

    /// Does the condition accept every tuple, making the index useless?
    pub fn always_true(&self) -> bool {
        node_always_true(&self.root)
    }

    /// Conjoin an extra range atom on `column`.
    ///
    /// Returns `false` (and leaves the condition untouched) when the column
    /// is not part of the key. Used by the sampling planner to tighten the
    /// predicate before the index is consulted again.
    pub fn add_condition(&mut self, column: &str, range: OrderKeyRange) -> bool {
        let Some(key_pos) = self.key_columns.iter().position(|c| c == column) else {
            return false;
        };
        let atom = ConditionNode::Atom {
            key_pos,
            column: column.to_string(),
            range,
        };
        let old = std::mem::replace(&mut self.root, ConditionNode::True);
        self.root = match old {
            ConditionNode::And(mut children) => {
                children.push(atom);
                ConditionNode::And(children)
            }
            ConditionNode::True => atom,
            other => ConditionNode::And(vec![other, atom]),
        };
        true
    }
}

fn build_node(arena: &AstArena, id: NodeId, key_columns: &[String]) -> ConditionNode {
    let Node::Call { name, args } = arena.node(id) else {
        return ConditionNode::True;
    };

    match name.as_str() {
        "and" => ConditionNode::And(
            args.iter()
                .map(|a| build_node(arena, *a, key_columns))
                .collect(),
        ),
        "or" => ConditionNode::Or(
            args.iter()
                .map(|a| build_node(arena, *a, key_columns))
                .collect(),
        ),
        "not" if args.len() == 1 => {
            ConditionNode::Not(Box::new(build_node(arena, args[0], key_columns)))
        }
        "in_range" if args.len() == 3 => {
            let (Node::Column(column), Node::Literal(lo), Node::Literal(hi)) = (
                arena.node(args[0]),
                arena.node(args[1]),
                arena.node(args[2]),
            ) else {
                return ConditionNode::True;
            };
            atom_for(column, OrderKeyRange::closed(*lo, *hi), key_columns)
        }
        "equals" | "less" | "less_or_equals" | "greater" | "greater_or_equals"
            if args.len() == 2 =>
        {
            // Accept both `col op lit` and `lit op col`, flipping the
            // direction in the latter case.
            let (column, value, flipped) = match (arena.node(args[0]), arena.node(args[1])) {
                (Node::Column(c), Node::Literal(v)) => (c, *v, false),
                (Node::Literal(v), Node::Column(c)) => (c, *v, true),
                _ => return ConditionNode::True,
            };
            let range = match (name.as_str(), flipped) {
                ("equals", _) => OrderKeyRange::point(value),
                ("less", false) | ("greater", true) => OrderKeyRange::right_bounded(value, false),
                ("less", true) | ("greater", false) => OrderKeyRange::left_bounded(value, false),
                ("less_or_equals", false) | ("greater_or_equals", true) => {
                    OrderKeyRange::right_bounded(value, true)
                }
                ("less_or_equals", true) | ("greater_or_equals", false) => {
                    OrderKeyRange::left_bounded(value, true)
                }
                _ => unreachable!("guarded by the match arm"),
            };
            atom_for(column, range, key_columns)
        }
        _ => ConditionNode::True,
    }
}

fn atom_for(column: &str, range: OrderKeyRange, key_columns: &[String]) -> ConditionNode {
    match key_columns.iter().position(|c| c == column) {
        Some(key_pos) => ConditionNode::Atom {
            key_pos,
            column: column.to_string(),
            range,
        },
        None => ConditionNode::True,
    }
}

fn evaluate(node: &ConditionNode, lo: &[u64], hi: Option<&[u64]>) -> BoolMask {
    match node {
        ConditionNode::True => BoolMask::UNKNOWN,
        ConditionNode::Atom { key_pos, range, .. } => {
            let (seg_min, seg_max) = column_segment(*key_pos, lo, hi);
            BoolMask {
                can_be_true: range.overlaps_segment(seg_min, seg_max),
                can_be_false: !range.contains_segment(seg_min, seg_max),
            }
        }
        ConditionNode::And(children) => {
            let mut mask = BoolMask {
                can_be_true: true,
                can_be_false: false,
            };
            for child in children {
                let m = evaluate(child, lo, hi);
                mask.can_be_true &= m.can_be_true;
                mask.can_be_false |= m.can_be_false;
            }
            mask
        }
        ConditionNode::Or(children) => {
            let mut mask = BoolMask {
                can_be_true: false,
                can_be_false: true,
            };
            for child in children {
                let m = evaluate(child, lo, hi);
                mask.can_be_true |= m.can_be_true;
                mask.can_be_false &= m.can_be_false;
            }
            mask
        }
        ConditionNode::Not(inner) => {
            let m = evaluate(inner, lo, hi);
            BoolMask {
                can_be_true: m.can_be_false,
                can_be_false: m.can_be_true,
            }
        }
    }
}

/// Possible values of key column `key_pos` over the tuple segment
/// `[lo, hi]` (`hi == None` means the top of the key space).
///
/// The keys are sorted lexicographically, so column `k` is pinned to
/// `[lo[k], hi[k]]` only while every earlier column is equal between the two
/// bounds; past the first differing prefix column it can take any value.
fn column_segment(key_pos: usize, lo: &[u64], hi: Option<&[u64]>) -> (u64, Option<u64>) {
    match hi {
        Some(hi) => {
            if lo[..key_pos] == hi[..key_pos] {
                (lo[key_pos], Some(hi[key_pos]))
            } else {
                (0, None)
            }
        }
        None => {
            if key_pos == 0 {
                (lo[0], None)
            } else {
                (0, None)
            }
        }
    }
}

fn node_always_true(node: &ConditionNode) -> bool {
    match node {
        ConditionNode::True => true,
        ConditionNode::Atom { range, .. } => range.is_unbounded(),
        ConditionNode::And(children) => children.iter().all(node_always_true),
        ConditionNode::Or(children) => children.iter().any(node_always_true),
        // Proving NOT(x) tautological would need an always-false analysis;
        // answering "no" here only costs a full index descent.
        ConditionNode::Not(_) => false,
    }
}

impl fmt::Display for KeyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_node(&self.root, f)
    }
}

fn fmt_node(node: &ConditionNode, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match node {
        ConditionNode::True => write!(f, "TRUE"),
        ConditionNode::Atom { column, range, .. } => write!(f, "{column} in {range}"),
        ConditionNode::And(children) => fmt_children(children, " AND ", f),
        ConditionNode::Or(children) => fmt_children(children, " OR ", f),
        ConditionNode::Not(inner) => {
            write!(f, "NOT (")?;
            fmt_node(inner, f)?;
            write!(f, ")")
        }
    }
}

fn fmt_children(
    children: &[ConditionNode],
    sep: &str,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    if children.is_empty() {
        return write!(f, "TRUE");
    }
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        fmt_node(child, f)?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_where_is_always_true() {
        let arena = AstArena::new();
        let cond = KeyCondition::new(&arena, None, key(&["id"]));
        assert!(cond.always_true());
        assert!(cond.may_be_true_in_range(&[0], &[100]));
        assert!(cond.may_be_true_after(&[0]));
    }

    #[test]
    fn single_column_comparison_prunes() {
        let mut arena = AstArena::new();
        let col = arena.column("id");
        let lit = arena.literal(50);
        let lt = arena.call("less", vec![col, lit]);
        let cond = KeyCondition::new(&arena, Some(lt), key(&["id"]));

        assert!(!cond.always_true());
        assert!(cond.may_be_true_in_range(&[0], &[10]));
        assert!(cond.may_be_true_in_range(&[40], &[60]));
        assert!(!cond.may_be_true_in_range(&[50], &[90]));
        assert!(cond.may_be_true_after(&[10]));
        assert!(!cond.may_be_true_after(&[50]));
    }

    #[test]
    fn flipped_comparison_direction() {
        let mut arena = AstArena::new();
        let lit = arena.literal(50);
        let col = arena.column("id");
        // 50 < id  ==  id > 50
        let lt = arena.call("less", vec![lit, col]);
        let cond = KeyCondition::new(&arena, Some(lt), key(&["id"]));

        assert!(!cond.may_be_true_in_range(&[0], &[50]));
        assert!(cond.may_be_true_in_range(&[0], &[51]));
    }

    #[test]
    fn second_key_column_needs_pinned_prefix() {
        let mut arena = AstArena::new();
        let col = arena.column("minor");
        let lit = arena.literal(5);
        let eq = arena.call("equals", vec![col, lit]);
        let cond = KeyCondition::new(&arena, Some(eq), key(&["major", "minor"]));

        // Prefix equal between the bounds: minor is pinned to [10, 20].
        assert!(!cond.may_be_true_in_range(&[1, 10], &[1, 20]));
        assert!(cond.may_be_true_in_range(&[1, 0], &[1, 20]));
        // Prefix differs: minor can be anything inside the segment.
        assert!(cond.may_be_true_in_range(&[1, 10], &[2, 20]));
        // Open upper bound: only the first column is constrained.
        assert!(cond.may_be_true_after(&[9, 9]));
    }

    #[test]
    fn not_over_unknown_stays_conservative() {
        let mut arena = AstArena::new();
        let opaque = arena.call("starts_with", vec![]);
        let not = arena.call("not", vec![opaque]);
        let cond = KeyCondition::new(&arena, Some(not), key(&["id"]));

        assert!(cond.may_be_true_in_range(&[0], &[10]));
        assert!(!cond.always_true());
    }

    #[test]
    fn not_over_atom_inverts() {
        let mut arena = AstArena::new();
        let col = arena.column("id");
        let lit = arena.literal(100);
        let lt = arena.call("less", vec![col, lit]);
        let not = arena.call("not", vec![lt]);
        let cond = KeyCondition::new(&arena, Some(not), key(&["id"]));

        // Segment entirely below 100: `id < 100` cannot be false there.
        assert!(!cond.may_be_true_in_range(&[0], &[50]));
        assert!(cond.may_be_true_in_range(&[50], &[150]));
        assert!(cond.may_be_true_in_range(&[100], &[200]));
    }

    #[test]
    fn or_of_disjoint_points() {
        let mut arena = AstArena::new();
        let col = arena.column("id");
        let a = arena.literal(10);
        let b = arena.literal(90);
        let eq_a = arena.call("equals", vec![col, a]);
        let eq_b = arena.call("equals", vec![col, b]);
        let or = arena.call("or", vec![eq_a, eq_b]);
        let cond = KeyCondition::new(&arena, Some(or), key(&["id"]));

        assert!(cond.may_be_true_in_range(&[0], &[20]));
        assert!(!cond.may_be_true_in_range(&[30], &[60]));
        assert!(cond.may_be_true_in_range(&[80], &[95]));
    }

    #[test]
    fn add_condition_tightens_and_rejects_non_key() {
        let arena = AstArena::new();
        let mut cond = KeyCondition::new(&arena, None, key(&["id", "hash"]));
        assert!(cond.always_true());

        assert!(!cond.add_condition("value", OrderKeyRange::right_bounded(7, true)));
        assert!(cond.always_true());

        assert!(cond.add_condition("hash", OrderKeyRange::right_bounded(7, true)));
        assert!(!cond.always_true());
        assert!(cond.may_be_true_in_range(&[0, 0], &[0, 7]));
        assert!(!cond.may_be_true_in_range(&[3, 8], &[3, 20]));
    }

    #[test]
    fn display_is_readable() {
        let mut arena = AstArena::new();
        let col = arena.column("id");
        let lit = arena.literal(5);
        let le = arena.call("less_or_equals", vec![col, lit]);
        let cond = KeyCondition::new(&arena, Some(le), key(&["id"]));
        assert_eq!(cond.to_string(), "id in (-inf, 5]");
    }
}
