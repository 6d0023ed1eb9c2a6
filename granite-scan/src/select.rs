//! Top-level read planning.

use std::sync::Arc;

use granite_expr::{AstArena, ExpressionActions, KeyCondition, SelectQuery};
use granite_result::{Error, Result};
use granite_store::{DataPart, PartCatalog, TableMeta};
use tracing::info;

use crate::prune::{PruneLimits, mark_ranges_from_key_condition, part_may_match_date};
use crate::ranges::{RangesInDataPart, RangesInDataParts, sum_marks};
use crate::sampling::plan_sampling;
use crate::settings::{ProcessedStage, ScanSettings, TableSettings};
use crate::spread::{
    SpreadLimits, spread_mark_ranges_among_streams, spread_mark_ranges_among_streams_final,
};
use crate::stream::{
    BlockStream, ExpressionBlockStream, FilterBlockStream, PartReader, PrewhereInfo,
};

/// Plans reads for one table.
///
/// Holds the table metadata, the part catalog, and the reader, plus the
/// mark-granular thresholds derived once from the row-granular settings.
pub struct SelectExecutor {
    meta: Arc<TableMeta>,
    catalog: Arc<PartCatalog>,
    reader: Arc<dyn PartReader>,
    min_marks_for_seek: usize,
    min_marks_for_concurrent_read: usize,
    max_marks_to_use_cache: usize,
    coarse_index_granularity: usize,
}

impl SelectExecutor {
    pub fn new(
        meta: Arc<TableMeta>,
        catalog: Arc<PartCatalog>,
        reader: Arc<dyn PartReader>,
        settings: TableSettings,
    ) -> Result<Self> {
        if settings.coarse_index_granularity < 2 {
            return Err(Error::invalid_argument(
                "coarse index granularity must be >= 2",
            ));
        }
        let granularity = meta.index_granularity;
        let marks_for = |rows: u64| ((rows + granularity - 1) / granularity) as usize;
        Ok(Self {
            min_marks_for_seek: marks_for(settings.min_rows_for_seek),
            min_marks_for_concurrent_read: marks_for(settings.min_rows_for_concurrent_read),
            max_marks_to_use_cache: marks_for(settings.max_rows_to_use_cache),
            coarse_index_granularity: settings.coarse_index_granularity as usize,
            meta,
            catalog,
            reader,
        })
    }

    fn prune_limits(&self) -> PruneLimits {
        PruneLimits {
            min_marks_for_seek: self.min_marks_for_seek,
            coarse_index_granularity: self.coarse_index_granularity,
        }
    }

    fn spread_limits(&self) -> SpreadLimits {
        SpreadLimits {
            min_marks_for_concurrent_read: self.min_marks_for_concurrent_read,
            max_marks_to_use_cache: self.max_marks_to_use_cache,
        }
    }

    /// Plan a query into at most `threads` block streams.
    ///
    /// The streams perform no work until pulled; errors past this point
    /// come from the readers, not the plan.
    #[allow(clippy::too_many_arguments)]
    pub fn read(
        &self,
        column_names: &[String],
        query: &SelectQuery,
        arena: &AstArena,
        settings: &ScanSettings,
        processed_stage: &mut ProcessedStage,
        max_block_size: usize,
        threads: usize,
    ) -> Result<Vec<Box<dyn BlockStream>>> {
        if column_names.is_empty() {
            return Err(Error::invalid_argument(
                "projection must name at least one column",
            ));
        }
        self.meta.check_columns(column_names)?;
        *processed_stage = ProcessedStage::FetchColumns;

        let mut key_condition =
            KeyCondition::new(arena, query.where_expr, self.meta.key_columns.clone());
        let date_condition =
            KeyCondition::new(arena, query.where_expr, vec![self.meta.date_column.clone()]);

        // Keep only the parts whose date interval can satisfy the query.
        let parts: Vec<Arc<DataPart>> = self
            .catalog
            .snapshot()
            .into_iter()
            .filter(|p| part_may_match_date(p, &date_condition))
            .collect();
        let parts_by_date = parts.len();

        let mut columns_to_read = column_names.to_vec();
        sort_dedup(&mut columns_to_read);

        // Sampling tightens the key condition before the per-part pruning
        // pass, and its filter columns join the projection.
        let sampling = match query.sample_size {
            Some(sample) => {
                let plan = plan_sampling(
                    &self.meta,
                    sample,
                    &mut key_condition,
                    &parts,
                    &self.prune_limits(),
                )?;
                columns_to_read.extend(plan.filter.required_columns().iter().cloned());
                sort_dedup(&mut columns_to_read);
                Some(plan)
            }
            None => None,
        };

        info!(key_condition = %key_condition, date_condition = %date_condition, "query conditions");

        let prewhere = match query.prewhere_expr {
            Some(node) => {
                let actions = ExpressionActions::compile(arena, node, &self.meta.schema)?;
                let column = actions
                    .output_column()
                    .ok_or_else(|| Error::logical("prewhere produced no output column"))?
                    .to_string();
                Some(PrewhereInfo { actions, column })
            }
            None => None,
        };

        // Per-part sparse-index pruning.
        let mut parts_with_ranges: RangesInDataParts = Vec::new();
        let mut total_marks = 0usize;
        let mut total_ranges = 0usize;
        for part in parts {
            let ranges =
                mark_ranges_from_key_condition(&part.index, &key_condition, &self.prune_limits());
            if !ranges.is_empty() {
                total_marks += sum_marks(&ranges);
                total_ranges += ranges.len();
                parts_with_ranges.push(RangesInDataPart::new(part, ranges));
            }
        }

        info!(
            parts_by_date,
            parts_by_key = parts_with_ranges.len(),
            total_marks,
            total_ranges,
            "selected parts"
        );

        let streams = if query.final_mode {
            // FINAL needs the primary key for the merge and the sign for
            // collapsing; widen the projection before the readers open.
            let mut final_columns = columns_to_read;
            final_columns.extend(self.meta.key_columns.iter().cloned());
            if let Some(sign) = &self.meta.sign_column {
                final_columns.push(sign.clone());
            }
            sort_dedup(&mut final_columns);

            spread_mark_ranges_among_streams_final(
                parts_with_ranges,
                &final_columns,
                max_block_size,
                settings.use_uncompressed_cache,
                prewhere.as_ref(),
                self.reader.as_ref(),
                &self.meta,
                &self.spread_limits(),
            )?
        } else {
            spread_mark_ranges_among_streams(
                parts_with_ranges,
                threads,
                &columns_to_read,
                max_block_size,
                settings.use_uncompressed_cache,
                prewhere.as_ref(),
                self.reader.as_ref(),
                &self.spread_limits(),
            )?
        };

        // The tightened key condition only skips whole granules; the row
        // filter finishes the job inside the boundary granules.
        let streams = match sampling {
            Some(plan) => {
                let flag_column = plan
                    .filter
                    .output_column()
                    .ok_or_else(|| Error::logical("sampling filter produced no output column"))?
                    .to_string();
                streams
                    .into_iter()
                    .map(|stream| -> Box<dyn BlockStream> {
                        Box::new(FilterBlockStream::new(
                            Box::new(ExpressionBlockStream::new(stream, plan.filter.clone())),
                            flag_column.clone(),
                        ))
                    })
                    .collect()
            }
            None => streams,
        };

        Ok(streams)
    }
}

fn sort_dedup(names: &mut Vec<String>) {
    names.sort();
    names.dedup();
}
