//! Row filtering by a named flag column.

use arrow::array::{Array, BooleanArray, UInt8Array};
use arrow::compute::filter_record_batch;
use arrow::record_batch::RecordBatch;
use granite_result::{Error, Result};

use super::BlockStream;

/// Keeps the rows whose flag column is non-zero, skipping blocks that end
/// up empty.
pub struct FilterBlockStream {
    input: Box<dyn BlockStream>,
    column: String,
}

impl FilterBlockStream {
    pub fn new(input: Box<dyn BlockStream>, column: impl Into<String>) -> Self {
        Self {
            input,
            column: column.into(),
        }
    }
}

impl BlockStream for FilterBlockStream {
    fn name(&self) -> &str {
        "filter"
    }

    fn next_block(&mut self) -> Result<Option<RecordBatch>> {
        while let Some(block) = self.input.next_block()? {
            let filtered = filter_by_column(&block, &self.column)?;
            if filtered.num_rows() > 0 {
                return Ok(Some(filtered));
            }
        }
        Ok(None)
    }
}

/// Filter a block by a UInt8 or Boolean column; non-zero keeps the row.
pub(crate) fn filter_by_column(block: &RecordBatch, column: &str) -> Result<RecordBatch> {
    let idx = block.schema().index_of(column)?;
    let array = block.column(idx);

    let mask = if let Some(flags) = array.as_any().downcast_ref::<UInt8Array>() {
        BooleanArray::from_iter((0..flags.len()).map(|i| Some(flags.value(i) != 0)))
    } else if let Some(flags) = array.as_any().downcast_ref::<BooleanArray>() {
        flags.clone()
    } else {
        return Err(Error::InvalidArgument(format!(
            "filter column {column} must be UInt8 or Boolean, got {}",
            array.data_type()
        )));
    };

    Ok(filter_record_batch(block, &mask)?)
}
