//! Flat raw/named conversion, without entity-graph assembly.
//!
//! A sibling of the graph builder: each field's decoded content is stored
//! under its definition's id in one flat object per record. Fixed fields
//! overwrite (they are implicitly non-repeatable); other defined fields
//! follow the repeatable-accumulation rule; fields with no definition are
//! stored verbatim under their raw tag, so nothing is dropped.

use crate::error::Result;
use crate::fieldmap::FieldMap;
use crate::fixedfield::{decode_fixed_field, parse_leader, DecodeMode, FixedFieldKind};
use crate::record::{LeaderSlot, RawRecord, Row};
use crate::variablefield::{accumulate, raw_row_to_named_row};
use serde_json::{Map, Value};
use tracing::warn;

/// Convert a record to one flat named-property object.
///
/// The decoded leader is stored under `leader`; no inter-entity relations
/// are constructed.
///
/// # Errors
///
/// Returns an error if a row cannot be serialized into the output
/// document.
pub fn raw_to_named(map: &FieldMap, record: &RawRecord) -> Result<Map<String, Value>> {
    let mut out = Map::new();

    let leader = match &record.leader {
        LeaderSlot::Raw(text) => parse_leader(map, text, DecodeMode::Plain),
        LeaderSlot::Decoded(value) => value.clone(),
    };
    out.insert("leader".to_string(), serde_json::to_value(&leader)?);

    for field in &record.fields {
        let tag = field.tag.as_str();
        let dfn = map.definition(tag);

        if let (Some(dfn), Some(_)) = (dfn, FixedFieldKind::for_tag(tag)) {
            let decoded = match &field.row {
                Row::Fixed(text) => {
                    match decode_fixed_field(tag, text, dfn, &leader, map, DecodeMode::Plain) {
                        Some(value) => serde_json::to_value(&value)?,
                        None => Value::String(text.clone()),
                    }
                }
                Row::Decoded(value) => serde_json::to_value(value)?,
                Row::Variable(_) => continue,
            };
            let key = dfn.id.clone().unwrap_or_else(|| tag.to_string());
            out.insert(key, decoded);
            continue;
        }

        match dfn {
            None => {
                warn!(tag, "no field definition, storing raw row under tag");
                accumulate(&mut out, tag.to_string(), serde_json::to_value(&field.row)?, true);
            }
            Some(dfn) => {
                let key = dfn.id.clone().unwrap_or_else(|| tag.to_string());
                let value = match raw_row_to_named_row(dfn, &field.row) {
                    Some(named) => Value::Object(named),
                    None => serde_json::to_value(&field.row)?,
                };
                accumulate(&mut out, key, value, dfn.repeatable);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_map() -> FieldMap {
        FieldMap::from_value(&json!({
            "000": {
                "fixmaps": [{
                    "name": "BibLeader",
                    "columns": [
                        {"offset": 6, "length": 1, "propRef": "typeOfRecord"},
                        {"offset": 7, "length": 1, "propRef": "bibLevel"}
                    ]
                }]
            },
            "008": {
                "id": "generalInfo",
                "fixmaps": [{
                    "name": "Books",
                    "matchRecTypeBibLevel": ["am"],
                    "columns": [
                        {"offset": 7, "length": 4, "propRef": "yearTime1"},
                        {"offset": 35, "length": 3, "propRef": "language"}
                    ]
                }]
            },
            "020": {
                "id": "isbn",
                "subfield": {"a": {"id": "isbnValue", "repeatable": false}}
            },
            "245": {
                "id": "title",
                "repeatable": false,
                "subfield": {"a": {"id": "titleProper", "repeatable": false}}
            },
            "001": {"id": "controlNumber"}
        }))
        .unwrap()
    }

    fn sample_record() -> RawRecord {
        RawRecord::from_value(&json!({
            "leader": "00081cam a22000494a 4500",
            "fields": [
                {"001": "9914523"},
                {"008": "020409s2002    enk           000 0 eng  "},
                {"020": {"ind1": " ", "ind2": " ", "subfields": [{"a": "0123456789"}]}},
                {"020": {"ind1": " ", "ind2": " ", "subfields": [{"a": "9876543210"}]}},
                {"245": {"ind1": "1", "ind2": " ", "subfields": [{"a": "Moby Dick"}]}},
                {"999": {"ind1": " ", "ind2": " ", "subfields": [{"z": "local data"}]}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_leader_and_fixed_fields_under_ids() {
        let map = sample_map();
        let out = raw_to_named(&map, &sample_record()).unwrap();
        assert_eq!(out["leader"]["typeOfRecord"]["code"], "a");
        assert_eq!(out["generalInfo"]["yearTime1"]["code"], "2002");
        assert_eq!(out["generalInfo"]["language"]["code"], "eng");
    }

    #[test]
    fn test_non_repeatable_field_stays_single() {
        let map = sample_map();
        let out = raw_to_named(&map, &sample_record()).unwrap();
        assert_eq!(out["title"], json!({"ind1": "1", "titleProper": "Moby Dick"}));
    }

    #[test]
    fn test_repeatable_field_accumulates() {
        let map = sample_map();
        let out = raw_to_named(&map, &sample_record()).unwrap();
        assert_eq!(
            out["isbn"],
            json!([{"isbnValue": "0123456789"}, {"isbnValue": "9876543210"}])
        );
    }

    #[test]
    fn test_control_field_passes_through_raw() {
        let map = sample_map();
        let out = raw_to_named(&map, &sample_record()).unwrap();
        // 001 has a definition but no subfield table: raw row, accumulated
        // under its id (repeatable by default).
        assert_eq!(out["controlNumber"], json!(["9914523"]));
    }

    #[test]
    fn test_unknown_tag_stored_verbatim_under_tag() {
        let map = sample_map();
        let out = raw_to_named(&map, &sample_record()).unwrap();
        let stored = &out["999"];
        assert_eq!(
            stored[0]["subfields"][0]["z"],
            json!("local data")
        );
    }
}
