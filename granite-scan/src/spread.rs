//! Packing pruned mark ranges into worker streams.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use granite_expr::{CompareOp, ExpressionActions};
use granite_result::{Error, Result};
use granite_store::TableMeta;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rustc_hash::FxHasher;

use crate::ranges::{MarkRange, RangesInDataPart, RangesInDataParts};
use crate::stream::{
    BlockStream, CollapsingFinalBlockStream, ConcatBlockStream, ExpressionBlockStream,
    FilterBlockStream, PartReadRequest, PartReader, PrewhereInfo,
};

/// Mark thresholds the distributor honors.
#[derive(Clone, Copy, Debug)]
pub struct SpreadLimits {
    /// Smallest worth-while unit of work, in marks.
    pub min_marks_for_concurrent_read: usize,
    /// Scans past this size bypass the uncompressed-block cache.
    pub max_marks_to_use_cache: usize,
}

/// Pack the pruned ranges into at most `threads` streams.
///
/// Parts are consumed from the back of a shuffled list; each part's ranges
/// are reversed so the leftmost range sits on top and peeling a prefix is a
/// series of cheap pops. A worker takes about `sum_marks / threads` marks,
/// adjusted by two rules: it never takes less than one concurrent-read
/// quantum from a part that has one to give, and it never leaves a part
/// with a residual smaller than that quantum.
pub fn spread_mark_ranges_among_streams(
    mut parts: RangesInDataParts,
    threads: usize,
    column_names: &[String],
    max_block_size: usize,
    mut use_uncompressed_cache: bool,
    prewhere: Option<&PrewhereInfo>,
    reader: &dyn PartReader,
    limits: &SpreadLimits,
) -> Result<Vec<Box<dyn BlockStream>>> {
    if threads == 0 {
        return Err(Error::invalid_argument("worker count must be >= 1"));
    }

    // Shuffle so that equally sized parts spread over workers the same way
    // run after run: the seed comes from the part names, not from process
    // entropy.
    let mut hasher = FxHasher::default();
    for p in &parts {
        p.part.name.hash(&mut hasher);
    }
    let mut rng = StdRng::seed_from_u64(hasher.finish());
    parts.shuffle(&mut rng);

    // Ranges are consumed back-to-front; reversing puts the leftmost range
    // on top of each part's stack.
    let mut sum_marks_in_parts: Vec<usize> = Vec::with_capacity(parts.len());
    let mut sum_marks = 0usize;
    for p in parts.iter_mut() {
        p.ranges.reverse();
        let marks = p.marks();
        sum_marks_in_parts.push(marks);
        sum_marks += marks;
    }

    if sum_marks > limits.max_marks_to_use_cache {
        use_uncompressed_cache = false;
    }

    let mut res: Vec<Box<dyn BlockStream>> = Vec::new();
    if sum_marks == 0 {
        return Ok(res);
    }

    let min_marks_per_stream = (sum_marks - 1) / threads + 1;

    for _ in 0..threads {
        if parts.is_empty() {
            break;
        }
        let mut need_marks = min_marks_per_stream;
        let mut streams: Vec<Box<dyn BlockStream>> = Vec::new();

        while need_marks > 0 && !parts.is_empty() {
            let part_idx = parts.len() - 1;
            let marks_in_part = sum_marks_in_parts[part_idx];

            // Never hand out less than one concurrent-read quantum from a
            // part that still has one to give.
            if marks_in_part >= limits.min_marks_for_concurrent_read
                && need_marks < limits.min_marks_for_concurrent_read
            {
                need_marks = limits.min_marks_for_concurrent_read;
            }

            // Never leave a residual so small no later worker could read
            // it efficiently.
            if marks_in_part > need_marks
                && marks_in_part - need_marks < limits.min_marks_for_concurrent_read
            {
                need_marks = marks_in_part;
            }

            if marks_in_part <= need_marks {
                // Take the whole part, restoring its range order first.
                let Some(RangesInDataPart { part, mut ranges }) = parts.pop() else {
                    break;
                };
                sum_marks_in_parts.pop();
                ranges.reverse();
                need_marks -= marks_in_part;
                streams.push(reader.read_part(PartReadRequest {
                    part,
                    ranges,
                    columns: column_names.to_vec(),
                    max_block_size,
                    use_uncompressed_cache,
                    prewhere: prewhere.cloned(),
                })?);
                continue;
            }

            // Peel exactly need_marks marks off the back of the part.
            let mut ranges_to_get: Vec<MarkRange> = Vec::new();
            {
                let part = &mut parts[part_idx];
                while need_marks > 0 {
                    let Some(range) = part.ranges.last_mut() else {
                        return Err(Error::logical(
                            "unexpected end of ranges while spreading marks among streams",
                        ));
                    };
                    let to_get = range.len().min(need_marks);
                    ranges_to_get.push(MarkRange::new(range.begin, range.begin + to_get));
                    range.begin += to_get;
                    sum_marks_in_parts[part_idx] -= to_get;
                    need_marks -= to_get;
                    if range.begin == range.end {
                        part.ranges.pop();
                    }
                }
            }
            streams.push(reader.read_part(PartReadRequest {
                part: Arc::clone(&parts[part_idx].part),
                ranges: ranges_to_get,
                columns: column_names.to_vec(),
                max_block_size,
                use_uncompressed_cache,
                prewhere: prewhere.cloned(),
            })?);
        }

        if streams.len() == 1 {
            if let Some(stream) = streams.pop() {
                res.push(stream);
            }
        } else if !streams.is_empty() {
            res.push(Box::new(ConcatBlockStream::new(streams)));
        }
    }

    if !parts.is_empty() {
        return Err(Error::logical("couldn't spread marks among streams"));
    }

    Ok(res)
}

/// FINAL distribution: one stream per part fanned into a collapsing merge.
///
/// The caller has already widened `column_names` with the primary-key and
/// sign columns. A single surviving part needs no collapse; its stream is
/// filtered down to positive-sign rows instead.
pub fn spread_mark_ranges_among_streams_final(
    parts: RangesInDataParts,
    column_names: &[String],
    max_block_size: usize,
    mut use_uncompressed_cache: bool,
    prewhere: Option<&PrewhereInfo>,
    reader: &dyn PartReader,
    meta: &TableMeta,
    limits: &SpreadLimits,
) -> Result<Vec<Box<dyn BlockStream>>> {
    let sign_column = meta
        .sign_column
        .as_deref()
        .ok_or_else(|| Error::invalid_argument("FINAL requires a sign column"))?;

    let sum_marks: usize = parts.iter().map(RangesInDataPart::marks).sum();
    if sum_marks > limits.max_marks_to_use_cache {
        use_uncompressed_cache = false;
    }

    let key_projection = ExpressionActions::project(meta.key_columns.clone());

    let mut to_collapse: Vec<Box<dyn BlockStream>> = Vec::new();
    for part in parts {
        let source = reader.read_part(PartReadRequest {
            part: part.part,
            ranges: part.ranges,
            columns: column_names.to_vec(),
            max_block_size,
            use_uncompressed_cache,
            prewhere: prewhere.cloned(),
        })?;
        to_collapse.push(Box::new(ExpressionBlockStream::new(
            source,
            key_projection.clone(),
        )));
    }

    let mut res: Vec<Box<dyn BlockStream>> = Vec::new();
    if to_collapse.len() == 1 {
        let sign_condition =
            ExpressionActions::compare(CompareOp::Equals, sign_column, 1, &meta.schema)?;
        let flag_column = sign_condition
            .output_column()
            .ok_or_else(|| Error::logical("sign condition produced no output column"))?
            .to_string();
        if let Some(stream) = to_collapse.pop() {
            res.push(Box::new(FilterBlockStream::new(
                Box::new(ExpressionBlockStream::new(stream, sign_condition)),
                flag_column,
            )));
        }
    } else if to_collapse.len() > 1 {
        res.push(Box::new(CollapsingFinalBlockStream::new(
            to_collapse,
            meta.key_columns.clone(),
            sign_column,
        )));
    }

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use arrow::record_batch::RecordBatch;
    use granite_store::{DataPart, SparseIndex};

    fn expect_err<T>(result: std::result::Result<T, Error>, msg: &str) -> Error {
        match result {
            Ok(_) => panic!("{msg}"),
            Err(err) => err,
        }
    }

    struct EmptyStream;

    impl BlockStream for EmptyStream {
        fn name(&self) -> &str {
            "empty"
        }

        fn next_block(&mut self) -> Result<Option<RecordBatch>> {
            Ok(None)
        }
    }

    /// Records every read request and yields nothing.
    #[derive(Default)]
    struct RecordingReader {
        calls: Mutex<Vec<(String, Vec<MarkRange>, bool)>>,
    }

    impl RecordingReader {
        fn calls(&self) -> Vec<(String, Vec<MarkRange>, bool)> {
            self.calls.lock().expect("lock").clone()
        }
    }

    impl PartReader for RecordingReader {
        fn read_part(&self, request: PartReadRequest) -> Result<Box<dyn BlockStream>> {
            self.calls.lock().expect("lock").push((
                request.part.name.clone(),
                request.ranges.clone(),
                request.use_uncompressed_cache,
            ));
            Ok(Box::new(EmptyStream))
        }
    }

    fn part_with_ranges(name: &str, marks: usize, ranges: Vec<MarkRange>) -> RangesInDataPart {
        let index = SparseIndex::new((0..marks as u64).collect(), 1).expect("index");
        let part =
            Arc::new(DataPart::new(name, 0, 1, marks as u64 * 8, index).expect("part"));
        RangesInDataPart::new(part, ranges)
    }

    const LIMITS: SpreadLimits = SpreadLimits {
        min_marks_for_concurrent_read: 1,
        max_marks_to_use_cache: 1 << 20,
    };

    fn columns() -> Vec<String> {
        vec!["id".to_string()]
    }

    #[test]
    fn single_part_splits_evenly_between_two_workers() {
        let reader = RecordingReader::default();
        let parts = vec![part_with_ranges("p", 10, vec![MarkRange::new(0, 10)])];

        let streams = spread_mark_ranges_among_streams(
            parts, 2, &columns(), 128, false, None, &reader, &LIMITS,
        )
        .expect("spread");

        assert_eq!(streams.len(), 2);
        let calls = reader.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, vec![MarkRange::new(0, 5)]);
        assert_eq!(calls[1].1, vec![MarkRange::new(5, 10)]);
    }

    #[test]
    fn marks_are_conserved_across_workers() {
        let reader = RecordingReader::default();
        let parts = vec![
            part_with_ranges("a", 40, vec![MarkRange::new(0, 7), MarkRange::new(12, 40)]),
            part_with_ranges("b", 16, vec![MarkRange::new(2, 10), MarkRange::new(11, 16)]),
            part_with_ranges("c", 5, vec![MarkRange::new(0, 5)]),
        ];
        let mut expected: Vec<(String, usize)> = Vec::new();
        for p in &parts {
            for r in &p.ranges {
                for mark in r.begin..r.end {
                    expected.push((p.part.name.clone(), mark));
                }
            }
        }

        let streams = spread_mark_ranges_among_streams(
            parts, 3, &columns(), 128, false, None, &reader, &LIMITS,
        )
        .expect("spread");
        assert!(streams.len() <= 3);

        let mut got: Vec<(String, usize)> = Vec::new();
        for (name, ranges, _) in reader.calls() {
            // Ranges handed to one reader arrive ascending and disjoint.
            for w in ranges.windows(2) {
                assert!(w[0].end <= w[1].begin, "out of order: {ranges:?}");
            }
            for r in ranges {
                for mark in r.begin..r.end {
                    got.push((name.clone(), mark));
                }
            }
        }
        expected.sort();
        got.sort();
        assert_eq!(expected, got);
    }

    #[test]
    fn small_workers_are_raised_to_the_concurrent_read_quantum() {
        let reader = RecordingReader::default();
        let parts = vec![part_with_ranges("p", 10, vec![MarkRange::new(0, 10)])];
        let limits = SpreadLimits {
            min_marks_for_concurrent_read: 4,
            max_marks_to_use_cache: 1 << 20,
        };

        // min_marks_per_stream would be 3, below the quantum of 4; the
        // floor rule hands the first worker 4 marks and the ceiling rule
        // gives the second worker the remaining 6 instead of stranding 2.
        let streams = spread_mark_ranges_among_streams(
            parts, 4, &columns(), 128, false, None, &reader, &limits,
        )
        .expect("spread");

        assert_eq!(streams.len(), 2);
        let calls = reader.calls();
        assert_eq!(calls[0].1, vec![MarkRange::new(0, 4)]);
        assert_eq!(calls[1].1, vec![MarkRange::new(4, 10)]);
    }

    #[test]
    fn cache_is_forced_off_for_large_scans() {
        let limits = SpreadLimits {
            min_marks_for_concurrent_read: 1,
            max_marks_to_use_cache: 8,
        };

        let reader = RecordingReader::default();
        let parts = vec![part_with_ranges("p", 20, vec![MarkRange::new(0, 20)])];
        spread_mark_ranges_among_streams(
            parts, 2, &columns(), 128, true, None, &reader, &limits,
        )
        .expect("spread");
        assert!(reader.calls().iter().all(|(_, _, cache)| !cache));

        let reader = RecordingReader::default();
        let parts = vec![part_with_ranges("p", 6, vec![MarkRange::new(0, 6)])];
        spread_mark_ranges_among_streams(
            parts, 2, &columns(), 128, true, None, &reader, &limits,
        )
        .expect("spread");
        assert!(reader.calls().iter().all(|(_, _, cache)| *cache));
    }

    #[test]
    fn no_input_produces_no_streams() {
        let reader = RecordingReader::default();
        let streams = spread_mark_ranges_among_streams(
            Vec::new(),
            4,
            &columns(),
            128,
            false,
            None,
            &reader,
            &LIMITS,
        )
        .expect("spread");
        assert!(streams.is_empty());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let reader = RecordingReader::default();
        let err = expect_err(
            spread_mark_ranges_among_streams(
                Vec::new(),
                0,
                &columns(),
                128,
                false,
                None,
                &reader,
                &LIMITS,
            ),
            "must fail",
        );
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
