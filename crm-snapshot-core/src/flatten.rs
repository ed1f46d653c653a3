//! Projection of raw CRM records into flat output rows.

use std::collections::HashMap;

use serde_json::Value;

use crate::contract::{OutputRow, RawRecord};
use crate::decode::decode_value;
use crate::schema::FieldSchema;

/// Flatten every record, keeping input order.
///
/// Each row holds the standard fields (null when missing) followed by every
/// field of `schema`, decoded and placed under its renamed column when
/// `renames` has one. Keys of a record that are in neither list are left out,
/// so all rows of one call share the same columns.
pub fn flatten_records(
    records: &[RawRecord],
    schema: &FieldSchema,
    renames: &HashMap<String, String>,
    standard_fields: &[&str],
) -> Vec<OutputRow> {
    records
        .iter()
        .map(|record| flatten_record(record, schema, renames, standard_fields))
        .collect()
}

pub fn flatten_record(
    record: &RawRecord,
    schema: &FieldSchema,
    renames: &HashMap<String, String>,
    standard_fields: &[&str],
) -> OutputRow {
    let mut row = OutputRow::new();

    for &field in standard_fields {
        let value = record.get(field).cloned().unwrap_or(Value::Null);
        row.insert(field.to_owned(), value);
    }

    for descriptor in schema.iter() {
        let raw = record.get(&descriptor.code).unwrap_or(&Value::Null);
        let column = renames
            .get(&descriptor.code)
            .cloned()
            .unwrap_or_else(|| descriptor.code.clone());
        row.insert(column, decode_value(raw, descriptor));
    }

    row
}
