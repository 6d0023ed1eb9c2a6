//! Table-level metadata consumed by the read planner.

use std::path::PathBuf;
use std::sync::Arc;

use arrow::datatypes::{DataType, Schema};

use granite_result::{Error, Result};

/// Static description of one table: schema, sort description, and the
/// designated special columns. Built once when the table handle is opened.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub schema: Arc<Schema>,
    /// Primary-key column names, in sort order.
    pub key_columns: Vec<String>,
    /// The date column driving partition pruning.
    pub date_column: String,
    /// Column the deterministic sampling limit applies to, if the table
    /// supports SAMPLE.
    pub sampling_column: Option<String>,
    /// Sign column used by FINAL collapsing, if the table is collapsing.
    pub sign_column: Option<String>,
    /// Rows per granule.
    pub index_granularity: u64,
    /// Root storage path of the table.
    pub path: PathBuf,
}

impl TableMeta {
    pub fn new(
        schema: Arc<Schema>,
        key_columns: Vec<String>,
        date_column: impl Into<String>,
        index_granularity: u64,
        path: impl Into<PathBuf>,
    ) -> Result<Self> {
        if key_columns.is_empty() {
            return Err(Error::invalid_argument("table needs at least one key column"));
        }
        if index_granularity == 0 {
            return Err(Error::invalid_argument("index granularity must be >= 1"));
        }
        let date_column = date_column.into();
        let meta = Self {
            schema,
            key_columns,
            date_column,
            sampling_column: None,
            sign_column: None,
            index_granularity,
            path: path.into(),
        };
        meta.check_columns(&meta.key_columns)?;
        meta.check_columns(std::slice::from_ref(&meta.date_column))?;
        Ok(meta)
    }

    pub fn with_sampling_column(mut self, column: impl Into<String>) -> Result<Self> {
        let column = column.into();
        self.check_columns(std::slice::from_ref(&column))?;
        self.sampling_column = Some(column);
        Ok(self)
    }

    pub fn with_sign_column(mut self, column: impl Into<String>) -> Result<Self> {
        let column = column.into();
        self.check_columns(std::slice::from_ref(&column))?;
        self.sign_column = Some(column);
        Ok(self)
    }

    /// Verify every name exists in the schema.
    pub fn check_columns(&self, names: &[String]) -> Result<()> {
        for name in names {
            if self.schema.index_of(name).is_err() {
                return Err(Error::UnknownColumn(name.clone()));
            }
        }
        Ok(())
    }

    /// Type of a column, if it exists.
    pub fn column_type(&self, name: &str) -> Option<&DataType> {
        self.schema
            .index_of(name)
            .ok()
            .map(|i| self.schema.field(i).data_type())
    }
}
