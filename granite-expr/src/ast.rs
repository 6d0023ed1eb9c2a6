//! Arena-allocated query syntax nodes.
//!
//! Query trees are directed acyclic graphs with frequent fan-in on shared
//! sub-expressions, so nodes live in a flat arena and refer to each other by
//! stable [`NodeId`]s instead of owning pointers. The planner only reads
//! leaf literals and a handful of named calls; everything it does not
//! recognize is treated conservatively downstream.

/// Stable identifier of a node inside an [`AstArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// A single query syntax node.
///
/// Literals are order-encoded `u64` values; callers encode signed or
/// floating-point constants with the order-key codecs before building the
/// tree, so node comparison semantics match sparse-index semantics.
#[derive(Debug, Clone)]
pub enum Node {
    /// Reference to a named column.
    Column(String),
    /// Order-encoded constant.
    Literal(u64),
    /// Named function application over other nodes.
    Call { name: String, args: Vec<NodeId> },
}

/// Flat node pool holding one query tree (or DAG).
#[derive(Debug, Clone, Default)]
pub struct AstArena {
    nodes: Vec<Node>,
}

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its id.
    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Look up a node by id.
    ///
    /// Ids are only ever minted by [`AstArena::push`], so an out-of-range id
    /// is a caller bug and panics.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Convenience constructor for a column reference.
    pub fn column(&mut self, name: impl Into<String>) -> NodeId {
        self.push(Node::Column(name.into()))
    }

    /// Convenience constructor for an order-encoded literal.
    pub fn literal(&mut self, value: u64) -> NodeId {
        self.push(Node::Literal(value))
    }

    /// Convenience constructor for a named call.
    pub fn call(&mut self, name: impl Into<String>, args: Vec<NodeId>) -> NodeId {
        self.push(Node::Call {
            name: name.into(),
            args,
        })
    }
}

/// Requested sample size, either a fraction of the data or an absolute
/// number of rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleSize {
    /// Fraction in `(0, 1]`; validated by the sampling planner.
    Fraction(f64),
    /// Absolute row count, translated into a fraction against a
    /// provisional row total during planning.
    Rows(u64),
}

/// The parsed select statement as seen by the read planner.
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    /// Root of the WHERE clause, if any.
    pub where_expr: Option<NodeId>,
    /// Root of the PREWHERE clause, if any. Evaluated inside the block
    /// reader before rows are emitted.
    pub prewhere_expr: Option<NodeId>,
    /// Requested sample, if any.
    pub sample_size: Option<SampleSize>,
    /// FINAL mode: materialize collapsed rows by merging sorted streams.
    pub final_mode: bool,
}
