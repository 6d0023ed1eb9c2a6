//! Collapsing merge for FINAL reads.
//!
//! Inputs are primary-key-sorted per-part streams of a sign table. Rows
//! sharing a key tuple cancel pairwise across signs; the survivor of each
//! group is emitted, in key order, as one output block. Cancellation needs
//! every occurrence of a key before it can decide, so the merge drains its
//! inputs on the first pull.

use arrow::array::{
    Array, ArrayRef, Int8Array, Int16Array, Int32Array, Int64Array, UInt8Array, UInt16Array,
    UInt32Array, UInt64Array,
};
use arrow::compute::{concat_batches, take};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

use granite_result::{Error, Result};
use granite_store::codecs::{
    sortable_u64_from_i8, sortable_u64_from_i16, sortable_u64_from_i32, sortable_u64_from_i64,
};

use super::BlockStream;

pub struct CollapsingFinalBlockStream {
    inputs: Vec<Box<dyn BlockStream>>,
    key_columns: Vec<String>,
    sign_column: String,
    done: bool,
}

impl CollapsingFinalBlockStream {
    pub fn new(
        inputs: Vec<Box<dyn BlockStream>>,
        key_columns: Vec<String>,
        sign_column: impl Into<String>,
    ) -> Self {
        Self {
            inputs,
            key_columns,
            sign_column: sign_column.into(),
            done: false,
        }
    }

    fn collapse(&mut self) -> Result<Option<RecordBatch>> {
        let mut blocks = Vec::new();
        for input in &mut self.inputs {
            while let Some(block) = input.next_block()? {
                blocks.push(block);
            }
        }
        let Some(first) = blocks.first() else {
            return Ok(None);
        };

        let schema = first.schema();
        let merged = concat_batches(&schema, blocks.iter())?;
        let rows = merged.num_rows();
        if rows == 0 {
            return Ok(None);
        }

        // Order-encoded key tuples, one column at a time.
        let mut keys: Vec<Vec<u64>> = Vec::with_capacity(self.key_columns.len());
        for column in &self.key_columns {
            let idx = schema.index_of(column)?;
            keys.push(order_keys(merged.column(idx))?);
        }
        let signs = {
            let idx = schema.index_of(&self.sign_column)?;
            sign_values(merged.column(idx))?
        };

        // Stable sort keeps arrival order within a key group, so "last
        // positive" and "first negative" are well defined.
        let mut order: Vec<usize> = (0..rows).collect();
        order.sort_by(|a, b| {
            keys.iter()
                .map(|k| k[*a].cmp(&k[*b]))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut survivors: Vec<u32> = Vec::new();
        let mut group_start = 0;
        while group_start < rows {
            let mut group_end = group_start + 1;
            while group_end < rows
                && keys
                    .iter()
                    .all(|k| k[order[group_end]] == k[order[group_start]])
            {
                group_end += 1;
            }

            let group = &order[group_start..group_end];
            let positives = group.iter().filter(|i| signs[**i] > 0).count();
            let negatives = group.len() - positives;
            if positives > negatives {
                let last_positive = group.iter().rev().find(|i| signs[**i] > 0);
                if let Some(i) = last_positive {
                    survivors.push(*i as u32);
                }
            } else if negatives > positives {
                let first_negative = group.iter().find(|i| signs[**i] <= 0);
                if let Some(i) = first_negative {
                    survivors.push(*i as u32);
                }
            }

            group_start = group_end;
        }

        if survivors.is_empty() {
            return Ok(None);
        }

        let indices = UInt32Array::from(survivors);
        let columns: Vec<ArrayRef> = merged
            .columns()
            .iter()
            .map(|c| take(c.as_ref(), &indices, None))
            .collect::<std::result::Result<_, _>>()?;
        Ok(Some(RecordBatch::try_new(schema, columns)?))
    }
}

impl BlockStream for CollapsingFinalBlockStream {
    fn name(&self) -> &str {
        "collapsing_final"
    }

    fn next_block(&mut self) -> Result<Option<RecordBatch>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        self.collapse()
    }
}

/// Order-encoded values of an integer key column.
fn order_keys(array: &ArrayRef) -> Result<Vec<u64>> {
    macro_rules! map_values {
        ($array_ty:ty, $map:expr) => {{
            let arr = array
                .as_any()
                .downcast_ref::<$array_ty>()
                .ok_or_else(|| Error::logical("key column type changed between blocks"))?;
            Ok((0..arr.len()).map(|i| $map(arr.value(i))).collect())
        }};
    }
    match array.data_type() {
        DataType::UInt8 => map_values!(UInt8Array, |v| v as u64),
        DataType::UInt16 => map_values!(UInt16Array, |v| v as u64),
        DataType::UInt32 => map_values!(UInt32Array, |v| v as u64),
        DataType::UInt64 => map_values!(UInt64Array, |v| v),
        DataType::Int8 => map_values!(Int8Array, sortable_u64_from_i8),
        DataType::Int16 => map_values!(Int16Array, sortable_u64_from_i16),
        DataType::Int32 => map_values!(Int32Array, sortable_u64_from_i32),
        DataType::Int64 => map_values!(Int64Array, sortable_u64_from_i64),
        other => Err(Error::InvalidArgument(format!(
            "unsupported key column type for collapsing: {other}"
        ))),
    }
}

/// Sign column as signed integers.
fn sign_values(array: &ArrayRef) -> Result<Vec<i64>> {
    macro_rules! map_values {
        ($array_ty:ty) => {{
            let arr = array
                .as_any()
                .downcast_ref::<$array_ty>()
                .ok_or_else(|| Error::logical("sign column type changed between blocks"))?;
            Ok((0..arr.len()).map(|i| arr.value(i) as i64).collect())
        }};
    }
    match array.data_type() {
        DataType::Int8 => map_values!(Int8Array),
        DataType::Int16 => map_values!(Int16Array),
        DataType::Int32 => map_values!(Int32Array),
        DataType::Int64 => map_values!(Int64Array),
        other => Err(Error::InvalidArgument(format!(
            "sign column must be a signed integer, got {other}"
        ))),
    }
}
