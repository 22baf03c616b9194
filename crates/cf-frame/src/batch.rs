//! Arrow `RecordBatch` bridge.
//!
//! Collaborators that load reference forms or simulation outputs hand tables
//! over as Arrow batches:
//!
//! | Arrow type                         | Cell          |
//! |------------------------------------|---------------|
//! | `Float64`, `Float32`, `Int64`, `Int32` | `Number`  |
//! | `Utf8`, `LargeUtf8`                | `Text`        |
//! | null slot                          | `Null`        |
//!
//! On export, a column whose non-null cells are all numbers becomes
//! `Float64`; anything else becomes `Utf8`.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Float32Type, Float64Type, Int32Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use cf_core::{Error, Result, Value};
use indexmap::IndexMap;

use crate::table::ObservationTable;

fn arrow_error(err: arrow::error::ArrowError) -> Error {
    Error::Parse(format!("Arrow: {}", err))
}

fn column_values(name: &str, array: &dyn Array) -> Result<Vec<Value>> {
    let n = array.len();
    let cell = |i: usize, v: Value| if array.is_null(i) { Value::Null } else { v };
    let values = match array.data_type() {
        DataType::Float64 => {
            let a = array.as_primitive::<Float64Type>();
            (0..n).map(|i| cell(i, Value::from(a.value(i)))).collect()
        }
        DataType::Float32 => {
            let a = array.as_primitive::<Float32Type>();
            (0..n).map(|i| cell(i, Value::from(a.value(i) as f64))).collect()
        }
        DataType::Int64 => {
            let a = array.as_primitive::<Int64Type>();
            (0..n).map(|i| cell(i, Value::Number(a.value(i) as f64))).collect()
        }
        DataType::Int32 => {
            let a = array.as_primitive::<Int32Type>();
            (0..n).map(|i| cell(i, Value::Number(a.value(i) as f64))).collect()
        }
        DataType::Utf8 => {
            let a = array.as_string::<i32>();
            (0..n).map(|i| cell(i, Value::from(a.value(i)))).collect()
        }
        DataType::LargeUtf8 => {
            let a = array.as_string::<i64>();
            (0..n).map(|i| cell(i, Value::from(a.value(i)))).collect()
        }
        DataType::Null => vec![Value::Null; n],
        other => {
            return Err(Error::Parse(format!("column '{}' has unsupported Arrow type {}", name, other)));
        }
    };
    Ok(values)
}

impl ObservationTable {
    /// Build a table from an Arrow batch.
    pub fn from_record_batch(batch: &RecordBatch, stratifiers: &[&str]) -> Result<Self> {
        let schema = batch.schema();
        let mut columns: IndexMap<String, Vec<Value>> = IndexMap::with_capacity(batch.num_columns());
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            columns.insert(field.name().clone(), column_values(field.name(), array.as_ref())?);
        }
        ObservationTable::new(columns, stratifiers)
    }

    /// Export this table as an Arrow batch.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.shared_columns().len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.shared_columns().len());
        for (name, col) in self.shared_columns() {
            let numeric = col.iter().all(|v| !matches!(v, Value::Text(_)));
            if numeric {
                let array: Float64Array = col.iter().map(Value::as_f64).collect();
                fields.push(Field::new(name, DataType::Float64, true));
                arrays.push(Arc::new(array));
            } else {
                let array: StringArray =
                    col.iter().map(|v| (!v.is_null()).then(|| v.to_string())).collect();
                fields.push(Field::new(name, DataType::Utf8, true));
                arrays.push(Arc::new(array));
            }
        }
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(arrow_error)
    }
}
