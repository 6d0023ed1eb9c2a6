//! Block streams and their combinators.
//!
//! A block stream is a pull interface over Arrow record batches. The
//! planner builds a tree of streams per worker (reader, concat, expression,
//! filter, collapsing merge) and hands the roots to the caller; nothing is
//! read until a worker pulls.

pub mod collapse;
pub mod concat;
pub mod expression;
pub mod filter;
pub mod mem;
pub mod reader;

pub use collapse::CollapsingFinalBlockStream;
pub use concat::ConcatBlockStream;
pub use expression::ExpressionBlockStream;
pub use filter::FilterBlockStream;
pub use mem::MemPartReader;
pub use reader::{PartReadRequest, PartReader, PrewhereInfo};

use arrow::record_batch::RecordBatch;
use granite_result::Result;

/// Lazy stream of blocks.
pub trait BlockStream: Send {
    /// Stream name for diagnostics.
    fn name(&self) -> &str;

    /// Pull the next block. `Ok(None)` means the stream is exhausted;
    /// streams never yield empty blocks.
    fn next_block(&mut self) -> Result<Option<RecordBatch>>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Stream over a fixed list of blocks.
    pub struct FixedBlockStream {
        blocks: VecDeque<RecordBatch>,
    }

    impl FixedBlockStream {
        pub fn new(blocks: Vec<RecordBatch>) -> Self {
            Self {
                blocks: blocks.into(),
            }
        }
    }

    impl BlockStream for FixedBlockStream {
        fn name(&self) -> &str {
            "fixed"
        }

        fn next_block(&mut self) -> Result<Option<RecordBatch>> {
            Ok(self.blocks.pop_front())
        }
    }

    /// Drain a stream into memory.
    pub fn collect_blocks(stream: &mut dyn BlockStream) -> Result<Vec<RecordBatch>> {
        let mut out = Vec::new();
        while let Some(block) = stream.next_block()? {
            out.push(block);
        }
        Ok(out)
    }
}
