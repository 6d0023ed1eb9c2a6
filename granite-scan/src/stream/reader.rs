//! The reading interface the planner plans against.

use std::sync::Arc;

use granite_expr::ExpressionActions;
use granite_result::Result;
use granite_store::DataPart;

use crate::ranges::MarkRanges;

use super::BlockStream;

/// PREWHERE: an early filter evaluated inside the reader, before blocks are
/// handed to the rest of the pipeline.
#[derive(Clone, Debug)]
pub struct PrewhereInfo {
    pub actions: ExpressionActions,
    /// Name of the flag column the actions produce.
    pub column: String,
}

/// Everything a reader needs to open one part.
#[derive(Clone, Debug)]
pub struct PartReadRequest {
    pub part: Arc<DataPart>,
    /// Pruned mark ranges, ascending and disjoint.
    pub ranges: MarkRanges,
    /// Projection, deduplicated by the planner.
    pub columns: Vec<String>,
    pub max_block_size: usize,
    /// Whether this query may consult the uncompressed-block cache.
    pub use_uncompressed_cache: bool,
    pub prewhere: Option<PrewhereInfo>,
}

/// Opens block streams over parts. Implementations own the storage format;
/// the planner only hands them mark ranges.
pub trait PartReader: Send + Sync {
    fn read_part(&self, request: PartReadRequest) -> Result<Box<dyn BlockStream>>;
}
