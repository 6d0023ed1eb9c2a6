//! Planner settings.

/// Table-level settings, read once when the select executor is built.
#[derive(Clone, Copy, Debug)]
pub struct TableSettings {
    /// Ranges closer than this many rows are merged instead of seeking.
    pub min_rows_for_seek: u64,
    /// Smallest amount of work worth handing to one worker.
    pub min_rows_for_concurrent_read: u64,
    /// Scans larger than this bypass the uncompressed-block cache.
    pub max_rows_to_use_cache: u64,
    /// Fan-out of the sparse-index descent; each candidate range splits
    /// into this many sub-ranges per step.
    pub coarse_index_granularity: u64,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            min_rows_for_seek: 5 * 8192,
            min_rows_for_concurrent_read: 20 * 8192,
            max_rows_to_use_cache: 1024 * 1024,
            coarse_index_granularity: 8,
        }
    }
}

/// Per-query settings.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanSettings {
    /// Let readers consult the uncompressed-block cache. May be forced off
    /// by the planner when the scan is too large.
    pub use_uncompressed_cache: bool,
}

/// How far the returned streams have processed the query.
///
/// The planner always stops at column fetching; aggregation and final
/// expression evaluation happen downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessedStage {
    FetchColumns,
}
