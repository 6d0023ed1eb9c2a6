//! Sequential concatenation of block streams.

use std::collections::VecDeque;

use arrow::record_batch::RecordBatch;
use granite_result::Result;

use super::BlockStream;

/// Drains each input stream in turn.
pub struct ConcatBlockStream {
    inputs: VecDeque<Box<dyn BlockStream>>,
}

impl ConcatBlockStream {
    pub fn new(inputs: Vec<Box<dyn BlockStream>>) -> Self {
        Self {
            inputs: inputs.into(),
        }
    }
}

impl BlockStream for ConcatBlockStream {
    fn name(&self) -> &str {
        "concat"
    }

    fn next_block(&mut self) -> Result<Option<RecordBatch>> {
        while let Some(current) = self.inputs.front_mut() {
            match current.next_block()? {
                Some(block) => return Ok(Some(block)),
                None => {
                    self.inputs.pop_front();
                }
            }
        }
        Ok(None)
    }
}
