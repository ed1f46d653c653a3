use arrow::array::{Array, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::DataType;
use bytes::Bytes;
use crm_snapshot_core::columnar::{encode_parquet, rows_to_record_batch};
use crm_snapshot_core::OutputRow;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{json, Value};

fn row(value: Value) -> OutputRow {
    value.as_object().cloned().expect("row must be an object")
}

#[test]
fn test_column_types_are_inferred_from_values() {
    let rows = vec![
        row(json!({"ID": "1", "count": 3, "score": 1.5, "flag": true, "empty": null})),
        row(json!({"ID": "2", "count": 4, "score": 2, "flag": false, "empty": null})),
    ];

    let batch = rows_to_record_batch(&rows).unwrap();
    let schema = batch.schema();

    assert_eq!(schema.field_with_name("ID").unwrap().data_type(), &DataType::Utf8);
    assert_eq!(schema.field_with_name("count").unwrap().data_type(), &DataType::Int64);
    assert_eq!(schema.field_with_name("score").unwrap().data_type(), &DataType::Float64);
    assert_eq!(schema.field_with_name("flag").unwrap().data_type(), &DataType::Boolean);
    assert_eq!(schema.field_with_name("empty").unwrap().data_type(), &DataType::Utf8);
}

#[test]
fn test_mixed_and_nested_values_become_json_text() {
    let rows = vec![
        row(json!({"mixed": "a", "nested": {"k": 1}})),
        row(json!({"mixed": 5, "nested": [1, 2]})),
    ];

    let batch = rows_to_record_batch(&rows).unwrap();

    let mixed = batch
        .column_by_name("mixed")
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(mixed.value(0), "a");
    assert_eq!(mixed.value(1), "5");

    let nested = batch
        .column_by_name("nested")
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(nested.value(0), r#"{"k":1}"#);
    assert_eq!(nested.value(1), "[1,2]");
}

#[test]
fn test_columns_are_union_of_keys_in_first_appearance_order() {
    let rows = vec![
        row(json!({"ID": "1", "NAME": "Anna"})),
        row(json!({"ID": "2", "EMAIL": "b@example.com"})),
    ];

    let batch = rows_to_record_batch(&rows).unwrap();

    let names: Vec<&str> = batch
        .schema_ref()
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect();
    assert_eq!(names, vec!["ID", "NAME", "EMAIL"]);

    let email = batch.column_by_name("EMAIL").unwrap();
    assert!(email.is_null(0));
    assert!(!email.is_null(1));
}

#[test]
fn test_parquet_file_reads_back() {
    let rows = vec![
        row(json!({"ID": "1", "is_flagged": true, "amount": 10})),
        row(json!({"ID": "2", "is_flagged": false, "amount": null})),
    ];

    let encoded = encode_parquet(&rows).unwrap();
    assert_eq!(&encoded[..4], b"PAR1");

    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(encoded))
        .unwrap()
        .build()
        .unwrap();
    let batches: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
    let total: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(total, 2);

    let batch = &batches[0];
    let flags = batch
        .column_by_name("is_flagged")
        .unwrap()
        .as_any()
        .downcast_ref::<BooleanArray>()
        .unwrap();
    assert!(flags.value(0));
    assert!(!flags.value(1));

    let amounts = batch
        .column_by_name("amount")
        .unwrap()
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(amounts.value(0), 10);
    assert!(amounts.is_null(1));
}

#[test]
fn test_float_column_reads_back() {
    let rows = vec![row(json!({"rate": 0.25})), row(json!({"rate": 1}))];

    let batch = rows_to_record_batch(&rows).unwrap();
    let rates = batch
        .column_by_name("rate")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(rates.value(0), 0.25);
    assert_eq!(rates.value(1), 1.0);
}
