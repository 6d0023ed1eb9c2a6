//! Applies compiled expressions to every block of an input stream.

use arrow::record_batch::RecordBatch;
use granite_expr::ExpressionActions;
use granite_result::Result;

use super::BlockStream;

pub struct ExpressionBlockStream {
    input: Box<dyn BlockStream>,
    actions: ExpressionActions,
}

impl ExpressionBlockStream {
    pub fn new(input: Box<dyn BlockStream>, actions: ExpressionActions) -> Self {
        Self { input, actions }
    }
}

impl BlockStream for ExpressionBlockStream {
    fn name(&self) -> &str {
        "expression"
    }

    fn next_block(&mut self) -> Result<Option<RecordBatch>> {
        match self.input.next_block()? {
            Some(block) => Ok(Some(self.actions.execute(&block)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::testing::{FixedBlockStream, collect_blocks};
    use arrow::array::UInt64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use granite_expr::CompareOp;
    use std::sync::Arc;

    #[test]
    fn appends_computed_column_per_block() {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::UInt64, false)]));
        let block = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![Arc::new(UInt64Array::from(vec![1u64, 5, 9]))],
        )
        .expect("batch");

        let actions =
            ExpressionActions::compare(CompareOp::Less, "v", 6, &schema).expect("compile");
        let mut stream = ExpressionBlockStream::new(
            Box::new(FixedBlockStream::new(vec![block.clone(), block])),
            actions,
        );
        let blocks = collect_blocks(&mut stream).expect("collect");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].num_columns(), 2);
    }
}
