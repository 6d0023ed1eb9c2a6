//! In-memory part reader.
//!
//! Backs each part with one resident record batch, mapping mark ranges to
//! row ranges through the index granularity. This is the reader the tests
//! plan against; a disk-backed reader implements the same trait and owns
//! its own formats.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arrow::record_batch::RecordBatch;
use granite_result::{Error, Result};
use granite_store::UncompressedCache;
use rustc_hash::FxHashMap;

use super::filter::filter_by_column;
use super::reader::{PartReadRequest, PartReader, PrewhereInfo};
use super::BlockStream;

/// Reader over parts whose rows live in memory.
pub struct MemPartReader {
    granularity: u64,
    rows: FxHashMap<String, RecordBatch>,
    cache: Option<Arc<UncompressedCache>>,
    cached_reads: AtomicU64,
    uncached_reads: AtomicU64,
}

impl MemPartReader {
    pub fn new(granularity: u64) -> Self {
        Self {
            granularity,
            rows: FxHashMap::default(),
            cache: None,
            cached_reads: AtomicU64::new(0),
            uncached_reads: AtomicU64::new(0),
        }
    }

    pub fn with_cache(mut self, cache: Arc<UncompressedCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Load the full row set of one part. The batch must be sorted by the
    /// table's primary key and contain every schema column.
    pub fn insert_part_rows(&mut self, part_name: impl Into<String>, rows: RecordBatch) {
        self.rows.insert(part_name.into(), rows);
    }

    /// `(with_cache, without_cache)` read_part calls observed so far.
    pub fn cache_usage(&self) -> (u64, u64) {
        (
            self.cached_reads.load(Ordering::Relaxed),
            self.uncached_reads.load(Ordering::Relaxed),
        )
    }
}

impl PartReader for MemPartReader {
    fn read_part(&self, request: PartReadRequest) -> Result<Box<dyn BlockStream>> {
        if request.max_block_size == 0 {
            return Err(Error::invalid_argument("max block size must be >= 1"));
        }
        let batch = self.rows.get(&request.part.name).ok_or_else(|| {
            Error::InvalidArgument(format!("no rows loaded for part {}", request.part.name))
        })?;

        if request.use_uncompressed_cache {
            self.cached_reads.fetch_add(1, Ordering::Relaxed);
        } else {
            self.uncached_reads.fetch_add(1, Ordering::Relaxed);
        }

        // Resolve the projection against the part's full schema up front.
        let mut projection = Vec::with_capacity(request.columns.len());
        for column in &request.columns {
            projection.push(batch.schema().index_of(column)?);
        }

        // Mark ranges become row chunks of at most max_block_size rows.
        let mut chunks = VecDeque::new();
        for range in &request.ranges {
            let (start, stop) =
                request
                    .part
                    .rows_for_marks(range.begin, range.end, self.granularity);
            let mut offset = start;
            while offset < stop {
                let len = (stop - offset).min(request.max_block_size as u64);
                chunks.push_back((offset as usize, len as usize));
                offset += len;
            }
        }

        Ok(Box::new(MemBlockStream {
            name: format!("mem({})", request.part.name),
            batch: batch.clone(),
            chunks,
            projection,
            prewhere: request.prewhere,
            cache: request
                .use_uncompressed_cache
                .then(|| self.cache.clone())
                .flatten(),
        }))
    }
}

struct MemBlockStream {
    name: String,
    batch: RecordBatch,
    chunks: VecDeque<(usize, usize)>,
    projection: Vec<usize>,
    prewhere: Option<PrewhereInfo>,
    cache: Option<Arc<UncompressedCache>>,
}

impl BlockStream for MemBlockStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_block(&mut self) -> Result<Option<RecordBatch>> {
        while let Some((offset, len)) = self.chunks.pop_front() {
            let mut block = self.batch.slice(offset, len);

            // The resident batch is always materialized fresh here, so a
            // cache-enabled read registers as a miss.
            if let Some(cache) = &self.cache {
                cache.record_miss();
            }

            if let Some(prewhere) = &self.prewhere {
                let evaluated = prewhere.actions.execute(&block)?;
                block = filter_by_column(&evaluated, &prewhere.column)?;
                if block.num_rows() == 0 {
                    continue;
                }
            }

            return Ok(Some(block.project(&self.projection)?));
        }
        Ok(None)
    }
}
