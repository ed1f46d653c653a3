//! Columnar encoding of rows into a single Parquet file.
//!
//! Rows are JSON objects. The column set is the union of keys across all rows
//! in first-appearance order, and each column's Arrow type is inferred from its
//! non-null values:
//!
//! | values                        | type      |
//! |-------------------------------|-----------|
//! | booleans only                 | `Boolean` |
//! | integers only                 | `Int64`   |
//! | numbers only                  | `Float64` |
//! | anything else, or only nulls  | `Utf8`    |
//!
//! In `Utf8` columns strings are kept verbatim and every other value is stored
//! as its JSON text.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::{Map, Value};

use crate::error::EncodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Boolean,
    Int64,
    Float64,
    Utf8,
}

impl ColumnType {
    fn data_type(self) -> DataType {
        match self {
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Utf8 => DataType::Utf8,
        }
    }
}

/// Encode rows as Parquet bytes.
pub fn encode_parquet(rows: &[Map<String, Value>]) -> Result<Vec<u8>, EncodeError> {
    let batch = rows_to_record_batch(rows)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(buffer)
}

/// Build one record batch holding every row.
pub fn rows_to_record_batch(rows: &[Map<String, Value>]) -> Result<RecordBatch, EncodeError> {
    let columns = column_names(rows);

    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());

    for name in &columns {
        let values: Vec<&Value> = rows
            .iter()
            .map(|row| row.get(name).unwrap_or(&Value::Null))
            .collect();
        let column_type = infer_type(&values);
        fields.push(Field::new(name, column_type.data_type(), true));
        arrays.push(build_array(column_type, &values));
    }

    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    let batch =
        RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)?;
    Ok(batch)
}

fn column_names(rows: &[Map<String, Value>]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key.as_str()) {
                names.push(key.clone());
            }
        }
    }
    names
}

fn infer_type(values: &[&Value]) -> ColumnType {
    let mut inferred: Option<ColumnType> = None;

    for value in values {
        let current = match value {
            Value::Null => continue,
            Value::Bool(_) => ColumnType::Boolean,
            Value::Number(n) if n.is_i64() => ColumnType::Int64,
            Value::Number(_) => ColumnType::Float64,
            _ => return ColumnType::Utf8,
        };

        inferred = Some(match (inferred, current) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(ColumnType::Int64), ColumnType::Float64)
            | (Some(ColumnType::Float64), ColumnType::Int64) => ColumnType::Float64,
            _ => return ColumnType::Utf8,
        });
    }

    inferred.unwrap_or(ColumnType::Utf8)
}

fn build_array(column_type: ColumnType, values: &[&Value]) -> ArrayRef {
    match column_type {
        ColumnType::Boolean => Arc::new(BooleanArray::from(
            values.iter().map(|v| v.as_bool()).collect::<Vec<_>>(),
        )),
        ColumnType::Int64 => Arc::new(Int64Array::from(
            values.iter().map(|v| v.as_i64()).collect::<Vec<_>>(),
        )),
        ColumnType::Float64 => Arc::new(Float64Array::from(
            values.iter().map(|v| v.as_f64()).collect::<Vec<_>>(),
        )),
        ColumnType::Utf8 => Arc::new(StringArray::from(
            values
                .iter()
                .map(|v| match v {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect::<Vec<_>>(),
        )),
    }
}
