//! Sparse-index and partition pruning.

use granite_expr::KeyCondition;
use granite_store::{DataPart, SparseIndex};

use crate::ranges::{MarkRange, MarkRanges};

/// Mark-granular thresholds derived from the table settings.
#[derive(Clone, Copy, Debug)]
pub struct PruneLimits {
    /// Output ranges separated by no more than this many marks are merged.
    pub min_marks_for_seek: usize,
    /// Descent fan-out; candidate ranges split into this many sub-ranges.
    pub coarse_index_granularity: usize,
}

/// Compute the mark ranges of one part that may satisfy the key condition.
///
/// Coarse stack descent: a LIFO stack holds disjoint candidate ranges with
/// the leftmost on top. Each popped range is tested against the condition
/// using the index tuple *at* `range.end` as the open upper bound (the
/// first key of the granule after the range); rejected ranges are dropped,
/// single-mark ranges go to the output, and everything else splits into up
/// to `coarse_index_granularity` sub-ranges pushed right-to-left so the
/// output is produced in ascending mark order. That ordering is what lets
/// gap coalescing look at only the last emitted range.
pub fn mark_ranges_from_key_condition(
    index: &SparseIndex,
    condition: &KeyCondition,
    limits: &PruneLimits,
) -> MarkRanges {
    let marks_count = index.marks_count();
    if marks_count == 0 {
        return Vec::new();
    }

    if condition.always_true() {
        return vec![MarkRange::new(0, marks_count)];
    }

    let mut res: MarkRanges = Vec::new();
    let mut ranges_stack = vec![MarkRange::new(0, marks_count)];

    while let Some(range) = ranges_stack.pop() {
        let may_be_true = if range.end == marks_count {
            condition.may_be_true_after(index.tuple(range.begin))
        } else {
            condition.may_be_true_in_range(index.tuple(range.begin), index.tuple(range.end))
        };

        if !may_be_true {
            continue;
        }

        if range.len() == 1 {
            match res.last_mut() {
                Some(last) if range.begin - last.end <= limits.min_marks_for_seek => {
                    last.end = range.end;
                }
                _ => res.push(range),
            }
        } else {
            let step = (range.len() - 1) / limits.coarse_index_granularity + 1;
            let mut end = range.end;
            while end > range.begin + step {
                ranges_stack.push(MarkRange::new(end - step, end));
                end -= step;
            }
            ranges_stack.push(MarkRange::new(range.begin, end));
        }
    }

    res
}

/// Can the part's date interval satisfy the date condition?
///
/// The date condition has arity 1; the part's inclusive day bounds form
/// the tuple segment.
pub fn part_may_match_date(part: &DataPart, date_condition: &KeyCondition) -> bool {
    date_condition.may_be_true_in_range(&[part.left_date], &[part.right_date])
}
