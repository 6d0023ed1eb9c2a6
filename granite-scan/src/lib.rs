//! Read planning for the Granite storage engine.
//!
//! Given a parsed query and a projection, the planner decides which parts
//! to open, which mark ranges of each part to read, and how to pack that
//! work into at most `threads` block streams. It performs no I/O itself:
//! parallelism is the shape of its output, driven later by worker threads
//! pulling blocks from the returned streams.
//!
//! The pipeline, in order: partition pruning by date bounds
//! ([`prune::part_may_match_date`]), sparse-index pruning per part
//! ([`prune::mark_ranges_from_key_condition`]), optional sampling
//! ([`sampling`]), and work distribution ([`spread`]). The
//! [`select::SelectExecutor`] ties the stages together behind a single
//! `read` entry point.

pub mod prune;
pub mod ranges;
pub mod sampling;
pub mod select;
pub mod settings;
pub mod spread;
pub mod stream;

pub use ranges::{MarkRange, MarkRanges, RangesInDataPart, RangesInDataParts};
pub use select::SelectExecutor;
pub use settings::{ProcessedStage, ScanSettings, TableSettings};
pub use stream::{BlockStream, MemPartReader, PartReadRequest, PartReader, PrewhereInfo};
