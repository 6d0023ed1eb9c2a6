//! Compiled expressions evaluated against blocks.
//!
//! The planner compiles three kinds of expressions: the sampling row filter
//! (`sampling_col <= limit`), the PREWHERE predicate, and the positive-sign
//! condition used by single-part FINAL reads. All of them reduce to one
//! comparison between an integer column and a constant, producing a `UInt8`
//! 0/1 column that a filter stream consumes. Projection-only actions exist
//! so FINAL can widen the read column set with the primary-key columns
//! without computing anything.

use std::cmp::Ordering;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Int8Array, Int16Array, Int32Array, Int64Array, UInt8Array, UInt16Array,
    UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use granite_result::{Error, Result};

use crate::ast::{AstArena, Node, NodeId};

/// Comparison operator of a compiled expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    Less,
    LessOrEquals,
    Greater,
    GreaterOrEquals,
}

impl CompareOp {
    pub fn name(&self) -> &'static str {
        match self {
            CompareOp::Equals => "equals",
            CompareOp::Less => "less",
            CompareOp::LessOrEquals => "less_or_equals",
            CompareOp::Greater => "greater",
            CompareOp::GreaterOrEquals => "greater_or_equals",
        }
    }

    fn from_name(name: &str) -> Option<CompareOp> {
        Some(match name {
            "equals" => CompareOp::Equals,
            "less" => CompareOp::Less,
            "less_or_equals" => CompareOp::LessOrEquals,
            "greater" => CompareOp::Greater,
            "greater_or_equals" => CompareOp::GreaterOrEquals,
            _ => return None,
        })
    }

    /// The operator with its operands swapped (`a < b` == `b > a`).
    fn flipped(&self) -> CompareOp {
        match self {
            CompareOp::Equals => CompareOp::Equals,
            CompareOp::Less => CompareOp::Greater,
            CompareOp::LessOrEquals => CompareOp::GreaterOrEquals,
            CompareOp::Greater => CompareOp::Less,
            CompareOp::GreaterOrEquals => CompareOp::LessOrEquals,
        }
    }

    #[inline]
    fn matches(&self, ord: Ordering) -> bool {
        match self {
            CompareOp::Equals => ord == Ordering::Equal,
            CompareOp::Less => ord == Ordering::Less,
            CompareOp::LessOrEquals => ord != Ordering::Greater,
            CompareOp::Greater => ord == Ordering::Greater,
            CompareOp::GreaterOrEquals => ord != Ordering::Less,
        }
    }
}

#[derive(Clone, Debug)]
enum CompiledOp {
    /// Widen the projection only; blocks pass through untouched.
    Project,
    /// Compare an integer column against a constant, appending a UInt8
    /// 0/1 output column.
    Compare {
        column: String,
        cmp: CompareOp,
        literal: u64,
    },
}

/// A compiled expression: required input columns plus the operation to run
/// over each block.
#[derive(Clone, Debug)]
pub struct ExpressionActions {
    required: Vec<String>,
    output: Option<String>,
    op: CompiledOp,
}

impl ExpressionActions {
    /// Actions that only declare required columns (FINAL primary-key
    /// reconstruction). `execute` passes blocks through unchanged.
    pub fn project(columns: Vec<String>) -> Self {
        Self {
            required: columns,
            output: None,
            op: CompiledOp::Project,
        }
    }

    /// Compile `column <op> literal` directly, bypassing the AST.
    pub fn compare(cmp: CompareOp, column: &str, literal: u64, schema: &Schema) -> Result<Self> {
        if schema.index_of(column).is_err() {
            return Err(Error::UnknownColumn(column.to_string()));
        }
        let output = format!("{}({}, {})", cmp.name(), column, literal);
        Ok(Self {
            required: vec![column.to_string()],
            output: Some(output),
            op: CompiledOp::Compare {
                column: column.to_string(),
                cmp,
                literal,
            },
        })
    }

    /// Compile a comparison call from the query tree.
    ///
    /// Supports `cmp(column, literal)` and `cmp(literal, column)`; anything
    /// else is rejected, since block-side expressions are restricted to the
    /// shapes the planner itself emits.
    pub fn compile(arena: &AstArena, id: NodeId, schema: &Schema) -> Result<Self> {
        let Node::Call { name, args } = arena.node(id) else {
            return Err(Error::invalid_argument(
                "expression root must be a comparison call",
            ));
        };
        let Some(cmp) = CompareOp::from_name(name) else {
            return Err(Error::InvalidArgument(format!(
                "unsupported expression function: {name}"
            )));
        };
        if args.len() != 2 {
            return Err(Error::InvalidArgument(format!(
                "{name} expects exactly two arguments"
            )));
        }
        let (column, literal, cmp) = match (arena.node(args[0]), arena.node(args[1])) {
            (Node::Column(c), Node::Literal(v)) => (c.as_str(), *v, cmp),
            (Node::Literal(v), Node::Column(c)) => (c.as_str(), *v, cmp.flipped()),
            _ => {
                return Err(Error::invalid_argument(
                    "comparison must pair a column with a literal",
                ));
            }
        };
        Self::compare(cmp, column, literal, schema)
    }

    /// Columns that must be present in input blocks.
    pub fn required_columns(&self) -> &[String] {
        &self.required
    }

    /// Name of the appended output column, if the actions produce one.
    pub fn output_column(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Run the actions over one block.
    pub fn execute(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        match &self.op {
            CompiledOp::Project => Ok(batch.clone()),
            CompiledOp::Compare {
                column,
                cmp,
                literal,
            } => {
                let idx = batch.schema().index_of(column)?;
                let flags = compare_column(batch.column(idx), *cmp, *literal)?;

                let mut fields: Vec<Arc<Field>> =
                    batch.schema().fields().iter().cloned().collect();
                fields.push(Arc::new(Field::new(
                    self.output.as_deref().unwrap_or_default(),
                    DataType::UInt8,
                    false,
                )));
                let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
                columns.push(Arc::new(flags));

                Ok(RecordBatch::try_new(
                    Arc::new(Schema::new(fields)),
                    columns,
                )?)
            }
        }
    }
}

/// Compare every value of an integer column against a constant.
///
/// Nulls compare as non-matching.
fn compare_column(array: &ArrayRef, cmp: CompareOp, literal: u64) -> Result<UInt8Array> {
    macro_rules! cmp_unsigned {
        ($array_ty:ty) => {{
            let arr = array
                .as_any()
                .downcast_ref::<$array_ty>()
                .ok_or_else(|| Error::logical("column type changed between blocks"))?;
            let mut out = Vec::with_capacity(arr.len());
            for i in 0..arr.len() {
                let hit = !arr.is_null(i) && cmp.matches((arr.value(i) as u64).cmp(&literal));
                out.push(hit as u8);
            }
            Ok(UInt8Array::from(out))
        }};
    }
    macro_rules! cmp_signed {
        ($array_ty:ty) => {{
            let arr = array
                .as_any()
                .downcast_ref::<$array_ty>()
                .ok_or_else(|| Error::logical("column type changed between blocks"))?;
            let lit = literal as i64;
            let mut out = Vec::with_capacity(arr.len());
            for i in 0..arr.len() {
                let hit = !arr.is_null(i) && cmp.matches((arr.value(i) as i64).cmp(&lit));
                out.push(hit as u8);
            }
            Ok(UInt8Array::from(out))
        }};
    }

    match array.data_type() {
        DataType::UInt8 => cmp_unsigned!(UInt8Array),
        DataType::UInt16 => cmp_unsigned!(UInt16Array),
        DataType::UInt32 => cmp_unsigned!(UInt32Array),
        DataType::UInt64 => cmp_unsigned!(UInt64Array),
        DataType::Int8 => cmp_signed!(Int8Array),
        DataType::Int16 => cmp_signed!(Int16Array),
        DataType::Int32 => cmp_signed!(Int32Array),
        DataType::Int64 => cmp_signed!(Int64Array),
        other => Err(Error::InvalidArgument(format!(
            "comparison over unsupported column type: {other}"
        ))),
    }
}
