//! Query syntax nodes and predicate machinery for the Granite read planner.
//!
//! The planner never parses SQL; queries arrive as a prebuilt tree of
//! [`ast::Node`]s stored in an [`ast::AstArena`]. Two consumers read that
//! tree: [`condition::KeyCondition`], which turns it into a conservative
//! monotone predicate over sparse-index tuples, and
//! [`actions::ExpressionActions`], which compiles the small expression
//! subset that runs against blocks at execution time (sampling filters,
//! PREWHERE, the positive-sign condition).

pub mod actions;
pub mod ast;
pub mod condition;
pub mod range;

pub use actions::{CompareOp, ExpressionActions};
pub use ast::{AstArena, Node, NodeId, SampleSize, SelectQuery};
pub use condition::KeyCondition;
pub use range::OrderKeyRange;
