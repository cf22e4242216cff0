//! Round-trip law for reversible fixed-field decoding.
//!
//! For any fixed-width row fully covered by its layout's columns,
//! decode-then-reencode must reproduce the original string exactly.

use marcmap::fixedfield::{decode_columns, encode_fixed, DecodeMode};
use marcmap::{ColumnDefinition, FieldMap};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

/// Contiguous layout covering an eight-character row.
fn covering_layout() -> Arc<Vec<ColumnDefinition>> {
    let columns: Vec<ColumnDefinition> = serde_json::from_value(json!([
        {"offset": 0, "length": 1, "propRef": "category"},
        {"offset": 1, "length": 3, "propRef": "material"},
        {"offset": 4, "length": 1, "propRef": "color"},
        {"offset": 5, "length": 3, "placeholder": "<reserved>"}
    ]))
    .unwrap();
    Arc::new(columns)
}

proptest! {
    #[test]
    fn decode_then_encode_reproduces_row(row in "[a-z0-9 ]{8}") {
        let layout = covering_layout();
        let map = FieldMap::default();
        let value = decode_columns(&row, &layout, &map, DecodeMode::Reversible);
        prop_assert_eq!(encode_fixed(&value, &layout), row);
    }

    #[test]
    fn reversible_value_serializes_to_row(row in "[a-z0-9 ]{8}") {
        let layout = covering_layout();
        let map = FieldMap::default();
        let value = decode_columns(&row, &layout, &map, DecodeMode::Reversible);
        prop_assert_eq!(serde_json::to_value(&value).unwrap(), json!(row));
    }
}

#[test]
fn test_all_space_row_round_trips() {
    let layout = covering_layout();
    let map = FieldMap::default();
    let row = "        ";
    let value = decode_columns(row, &layout, &map, DecodeMode::Reversible);
    // The single-space column is stored as the sentinel, wide space runs
    // as data; both re-encode to spaces.
    assert_eq!(value.code_of("category"), Some("_"));
    assert_eq!(value.code_of("material"), Some("   "));
    assert_eq!(encode_fixed(&value, &layout), row);
}

#[test]
fn test_unset_column_renders_as_spaces() {
    let layout = covering_layout();
    let map = FieldMap::default();
    let mut value = decode_columns("ab cd efg", &layout, &map, DecodeMode::Reversible);
    value.columns.shift_remove("color");
    assert_eq!(&encode_fixed(&value, &layout)[4..5], " ");
}
