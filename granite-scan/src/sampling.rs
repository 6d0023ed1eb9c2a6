//! Deterministic sampling.
//!
//! A sample is planned as two cooperating mechanisms: an extra upper-bound
//! atom on the sampling column, which lets the sparse index skip whole
//! granules, and a row-level filter with the same bound, which trims the
//! boundary granules where only a prefix of rows qualifies.

use std::sync::Arc;

use granite_expr::{CompareOp, ExpressionActions, KeyCondition, OrderKeyRange, SampleSize};
use granite_result::{Error, Result};
use granite_store::{DataPart, TableMeta};
use tracing::debug;

use crate::prune::{PruneLimits, mark_ranges_from_key_condition};
use crate::ranges::sum_marks;

/// Outcome of sampling planning.
#[derive(Clone, Debug)]
pub struct SamplingPlan {
    /// Fraction of the sampling-column domain that qualifies.
    pub relative_size: f64,
    /// Highest qualifying sampling-column value.
    pub limit: u64,
    /// Row filter `sampling_col <= limit`, applied to every worker stream.
    pub filter: ExpressionActions,
}

/// Translate the requested sample into a key-condition atom plus a row
/// filter. Tightens `key_condition` in place.
pub fn plan_sampling(
    meta: &TableMeta,
    sample: SampleSize,
    key_condition: &mut KeyCondition,
    parts: &[Arc<DataPart>],
    limits: &PruneLimits,
) -> Result<SamplingPlan> {
    let relative_size = match sample {
        SampleSize::Fraction(f) => {
            if f <= 0.0 {
                return Err(Error::ArgumentOutOfBound(format!(
                    "sample fraction {f} must be positive"
                )));
            }
            if f > 1.0 {
                return Err(Error::ArgumentOutOfBound(format!(
                    "sample fraction {f} exceeds 1; pass an absolute row count instead"
                )));
            }
            f
        }
        SampleSize::Rows(0) => {
            return Err(Error::ArgumentOutOfBound(
                "sample of zero rows".to_string(),
            ));
        }
        SampleSize::Rows(requested) => {
            // Find out how many rows would be read without sampling. Every
            // granule is counted as full; the short last granule of a part
            // only skews the chosen fraction, never correctness.
            debug!(condition = %key_condition, "preliminary index scan for absolute sample");
            let mut total_marks = 0usize;
            for part in parts {
                let ranges = mark_ranges_from_key_condition(&part.index, key_condition, limits);
                total_marks += sum_marks(&ranges);
            }
            let total_rows = (total_marks as u64) * meta.index_granularity;
            let size = if total_rows == 0 {
                1.0
            } else {
                (requested as f64 / total_rows as f64).min(1.0)
            };
            debug!(relative_size = size, total_rows, "selected relative sample size");
            size
        }
    };

    let column = meta.sampling_column.as_deref().ok_or_else(|| {
        Error::UnsupportedSamplingColumn("table has no sampling column".to_string())
    })?;

    let column_max = match meta.column_type(column) {
        Some(arrow::datatypes::DataType::UInt64) => u64::MAX,
        Some(arrow::datatypes::DataType::UInt32) => u32::MAX as u64,
        Some(arrow::datatypes::DataType::UInt16) => u16::MAX as u64,
        Some(arrow::datatypes::DataType::UInt8) => u8::MAX as u64,
        Some(other) => {
            return Err(Error::UnsupportedSamplingColumn(format!(
                "column {column} has type {other}; must be an unsigned integer"
            )));
        }
        None => return Err(Error::UnknownColumn(column.to_string())),
    };

    let limit = (relative_size * column_max as f64) as u64;

    if !key_condition.add_condition(column, OrderKeyRange::right_bounded(limit, true)) {
        return Err(Error::SamplingColumnNotInKey(column.to_string()));
    }

    let filter = ExpressionActions::compare(CompareOp::LessOrEquals, column, limit, &meta.schema)?;

    Ok(SamplingPlan {
        relative_size,
        limit,
        filter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field, Schema};
    use granite_expr::AstArena;
    use granite_store::SparseIndex;

    const LIMITS: PruneLimits = PruneLimits {
        min_marks_for_seek: 0,
        coarse_index_granularity: 2,
    };

    fn meta(sampling_type: DataType) -> TableMeta {
        let schema = Arc::new(Schema::new(vec![
            Field::new("date", DataType::UInt16, false),
            Field::new("id", DataType::UInt64, false),
            Field::new("hash", sampling_type, false),
            Field::new("value", DataType::UInt64, false),
        ]));
        TableMeta::new(
            schema,
            vec!["id".to_string(), "hash".to_string()],
            "date",
            100,
            "/tmp/t",
        )
        .expect("meta")
        .with_sampling_column("hash")
        .expect("sampling column")
    }

    fn condition(meta: &TableMeta) -> KeyCondition {
        KeyCondition::new(&AstArena::new(), None, meta.key_columns.clone())
    }

    /// One part, 40 granules, keys (id, hash) with hash spread over the
    /// UInt32 domain.
    fn part() -> Arc<DataPart> {
        let marks = 40u64;
        let mut values = Vec::new();
        for i in 0..marks {
            values.push(i);
            values.push(i * (u32::MAX as u64 / marks));
        }
        let index = SparseIndex::new(values, 2).expect("index");
        Arc::new(DataPart::new("p1", 0, 1, marks * 100, index).expect("part"))
    }

    #[test]
    fn fraction_half_on_uint32() {
        let meta = meta(DataType::UInt32);
        let mut cond = condition(&meta);
        let plan = plan_sampling(
            &meta,
            SampleSize::Fraction(0.5),
            &mut cond,
            &[part()],
            &LIMITS,
        )
        .expect("plan");
        assert_eq!(plan.limit, 2_147_483_647);
        assert_eq!(
            plan.filter.output_column(),
            Some("less_or_equals(hash, 2147483647)")
        );
        assert!(!cond.always_true());
    }

    #[test]
    fn absolute_rows_resolve_against_provisional_total() {
        // 40 granules of 100 rows: a provisional total of 4000 rows, so
        // 1000 requested rows become a quarter of the domain.
        let meta = meta(DataType::UInt32);
        let mut cond = condition(&meta);
        let plan = plan_sampling(
            &meta,
            SampleSize::Rows(1000),
            &mut cond,
            &[part()],
            &LIMITS,
        )
        .expect("plan");
        assert!((plan.relative_size - 0.25).abs() < 1e-9);
        assert_eq!(plan.limit, (0.25f64 * u32::MAX as f64) as u64);
    }

    #[test]
    fn absolute_rows_larger_than_table_read_everything() {
        let meta = meta(DataType::UInt32);
        let mut cond = condition(&meta);
        let plan = plan_sampling(
            &meta,
            SampleSize::Rows(1_000_000),
            &mut cond,
            &[part()],
            &LIMITS,
        )
        .expect("plan");
        assert_eq!(plan.relative_size, 1.0);
        assert_eq!(plan.limit, u32::MAX as u64);
    }

    #[test]
    fn non_positive_fractions_are_out_of_bound() {
        let meta = meta(DataType::UInt32);
        for f in [0.0, -0.5] {
            let mut cond = condition(&meta);
            let err = plan_sampling(
                &meta,
                SampleSize::Fraction(f),
                &mut cond,
                &[part()],
                &LIMITS,
            )
            .expect_err("must fail");
            assert!(matches!(err, Error::ArgumentOutOfBound(_)), "got {err}");
        }
    }

    #[test]
    fn signed_sampling_column_is_unsupported() {
        let meta = meta(DataType::Int32);
        let mut cond = condition(&meta);
        let err = plan_sampling(
            &meta,
            SampleSize::Fraction(0.5),
            &mut cond,
            &[part()],
            &LIMITS,
        )
        .expect_err("must fail");
        assert!(matches!(err, Error::UnsupportedSamplingColumn(_)));
    }

    #[test]
    fn sampling_column_outside_key_is_rejected() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("date", DataType::UInt16, false),
            Field::new("id", DataType::UInt64, false),
            Field::new("hash", DataType::UInt32, false),
        ]));
        let meta = TableMeta::new(schema, vec!["id".to_string()], "date", 100, "/tmp/t")
            .expect("meta")
            .with_sampling_column("hash")
            .expect("sampling column");
        let mut cond = condition(&meta);
        let err = plan_sampling(
            &meta,
            SampleSize::Fraction(0.5),
            &mut cond,
            &[part()],
            &LIMITS,
        )
        .expect_err("must fail");
        assert!(matches!(err, Error::SamplingColumnNotInKey(c) if c == "hash"));
    }

    #[test]
    fn smaller_fractions_select_subset_of_marks() {
        // Use hash as the leading key column so tightening actually prunes.
        let schema = Arc::new(Schema::new(vec![
            Field::new("date", DataType::UInt16, false),
            Field::new("hash", DataType::UInt32, false),
        ]));
        let meta = TableMeta::new(schema, vec!["hash".to_string()], "date", 100, "/tmp/t")
            .expect("meta")
            .with_sampling_column("hash")
            .expect("sampling column");

        let marks = 32u64;
        let values: Vec<u64> = (0..marks)
            .map(|i| i * (u32::MAX as u64 / marks))
            .collect();
        let index = SparseIndex::new(values, 1).expect("index");
        let part = Arc::new(DataPart::new("p", 0, 1, marks * 100, index).expect("part"));

        let mut marks_by_fraction = Vec::new();
        for f in [0.2, 0.5, 0.9] {
            let mut cond = KeyCondition::new(&AstArena::new(), None, meta.key_columns.clone());
            plan_sampling(&meta, SampleSize::Fraction(f), &mut cond, &[Arc::clone(&part)], &LIMITS)
                .expect("plan");
            let ranges = mark_ranges_from_key_condition(&part.index, &cond, &LIMITS);
            let selected: Vec<usize> = ranges
                .iter()
                .flat_map(|r| r.begin..r.end)
                .collect();
            marks_by_fraction.push(selected);
        }
        for pair in marks_by_fraction.windows(2) {
            assert!(
                pair[0].iter().all(|m| pair[1].contains(m)),
                "sampling is not monotone: {pair:?}"
            );
        }
        assert!(marks_by_fraction[0].len() < marks_by_fraction[2].len());
    }
}
