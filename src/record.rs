//! Raw MARC record structures in the MARC-in-JSON shape.
//!
//! A raw record is a leader string plus an ordered field list. Each field
//! serializes as a single-key map from tag to row; a row is either a plain
//! fixed-width string or an `{ind1, ind2, subfields}` object whose subfields
//! are single-key maps from code to value:
//!
//! ```json
//! {"leader": "00081cam a22000494a 4500",
//!  "fields": [
//!    {"008": "020409s2002    enk           000 0 eng  "},
//!    {"245": {"ind1": "1", "ind2": " ",
//!             "subfields": [{"a": "Moby Dick"}, {"c": "Herman Melville"}]}}
//! ]}
//! ```
//!
//! Fixed-field decoration replaces leader and fixed rows in place with
//! decoded objects; the [`LeaderSlot`] and [`Row`] enums make that decorated
//! state representable, so repeated decoration is detectable and idempotent.

use crate::fixedfield::FixedFieldValue;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt;
use std::path::Path;

use crate::error::{MapError, Result};

/// Blank indicator sentinel.
pub const BLANK: char = ' ';

/// The record leader: a raw fixed-width string until decoration replaces it
/// with a decoded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeaderSlot {
    /// Undecoded leader string.
    Raw(String),
    /// Column-decoded leader.
    Decoded(FixedFieldValue),
}

impl LeaderSlot {
    /// Whether the leader has already been decoded in place.
    #[must_use]
    pub fn is_decoded(&self) -> bool {
        matches!(self, LeaderSlot::Decoded(_))
    }
}

/// A subfield: a single code → value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    /// Subfield code (single character).
    pub code: char,
    /// Subfield value.
    pub value: String,
}

/// An indicator- and subfield-bearing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRow {
    /// First indicator.
    #[serde(default = "blank")]
    pub ind1: char,
    /// Second indicator.
    #[serde(default = "blank")]
    pub ind2: char,
    /// Ordered subfields. Stored in `SmallVec` since typical fields carry
    /// four or fewer subfields.
    pub subfields: SmallVec<[Subfield; 4]>,
}

impl VariableRow {
    /// Build a blank row with empty-valued subfields for the given codes.
    #[must_use]
    pub fn blank(codes: &[char]) -> Self {
        VariableRow {
            ind1: BLANK,
            ind2: BLANK,
            subfields: codes
                .iter()
                .map(|&code| Subfield {
                    code,
                    value: String::new(),
                })
                .collect(),
        }
    }

    /// Insert an empty subfield with the given code.
    ///
    /// With `after: None` the subfield is appended; otherwise it is inserted
    /// immediately after the given position.
    pub fn insert_subfield(&mut self, code: char, after: Option<usize>) {
        let subfield = Subfield {
            code,
            value: String::new(),
        };
        match after {
            None => self.subfields.push(subfield),
            Some(index) => self.subfields.insert(index + 1, subfield),
        }
    }

    /// Remove the subfield at the given position.
    pub fn remove_subfield(&mut self, index: usize) {
        self.subfields.remove(index);
    }
}

/// One field row: fixed-width content, indicator/subfield structure, or an
/// in-place decoded fixed-field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Row {
    /// Plain fixed-width string content.
    Fixed(String),
    /// Indicator and subfield structure.
    Variable(VariableRow),
    /// Column-decoded fixed field (decoration output, never raw input).
    Decoded(FixedFieldValue),
}

impl Row {
    /// Whether this row is a plain string.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self, Row::Fixed(_))
    }

    /// The variable-row structure, when this row carries one.
    #[must_use]
    pub fn as_variable(&self) -> Option<&VariableRow> {
        match self {
            Row::Variable(row) => Some(row),
            _ => None,
        }
    }
}

/// A tagged field: serialized as a single-key map from tag to row.
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    /// Field tag (three digits by convention, any string accepted).
    pub tag: String,
    /// The field's row.
    pub row: Row,
}

/// A raw MARC record: leader plus ordered field list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Record leader.
    pub leader: LeaderSlot,
    /// Fields in document order.
    pub fields: Vec<RawField>,
}

impl RawRecord {
    /// Parse a record from a JSON document value.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not have the record shape.
    /// This is fatal: a record that did not load is never partially decoded.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| MapError::InvalidRecord(e.to_string()))
    }

    /// Load a record from a JSON file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        Self::from_value(&value)
    }

    /// Insert a field preserving ascending tag order, returning the
    /// insertion index.
    ///
    /// The new field lands after any existing fields with the same tag.
    pub fn insert_field_ordered(&mut self, tag: impl Into<String>, row: Row) -> usize {
        let tag = tag.into();
        let index = self
            .fields
            .iter()
            .position(|field| field.tag.as_str() > tag.as_str())
            .unwrap_or(self.fields.len());
        self.fields.insert(index, RawField { tag, row });
        index
    }

    /// Remove the field at the given position.
    pub fn remove_field(&mut self, index: usize) {
        self.fields.remove(index);
    }

    /// Iterate over fields with the given tag, in document order.
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a RawField> {
        self.fields.iter().filter(move |field| field.tag == tag)
    }
}

impl Serialize for RawField {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.tag, &self.row)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for RawField {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldVisitor;

        impl<'de> Visitor<'de> for FieldVisitor {
            type Value = RawField;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a single-key map from tag to row")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<RawField, A::Error>
            where
                A: MapAccess<'de>,
            {
                let (tag, row): (String, Row) = access
                    .next_entry()?
                    .ok_or_else(|| serde::de::Error::custom("field object has no tag key"))?;
                Ok(RawField { tag, row })
            }
        }

        deserializer.deserialize_map(FieldVisitor)
    }
}

impl Serialize for Subfield {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.code.to_string(), &self.value)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Subfield {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SubfieldVisitor;

        impl<'de> Visitor<'de> for SubfieldVisitor {
            type Value = Subfield;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a single-key map from subfield code to value")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Subfield, A::Error>
            where
                A: MapAccess<'de>,
            {
                let (key, value): (String, String) = access
                    .next_entry()?
                    .ok_or_else(|| serde::de::Error::custom("subfield object has no code key"))?;
                let code = key
                    .chars()
                    .next()
                    .ok_or_else(|| serde::de::Error::custom("empty subfield code"))?;
                Ok(Subfield { code, value })
            }
        }

        deserializer.deserialize_map(SubfieldVisitor)
    }
}

fn blank() -> char {
    BLANK
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> RawRecord {
        RawRecord::from_value(&json!({
            "leader": "00081cam a22000494a 4500",
            "fields": [
                {"001": "9914523"},
                {"008": "020409s2002    enk           000 0 eng  "},
                {"245": {"ind1": "1", "ind2": " ", "subfields": [
                    {"a": "Moby Dick"},
                    {"c": "Herman Melville"}
                ]}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_marc_in_json_shape() {
        let record = sample_record();
        assert!(!record.leader.is_decoded());
        assert_eq!(record.fields.len(), 3);
        assert_eq!(record.fields[0].tag, "001");
        assert!(record.fields[0].row.is_raw());

        let row = record.fields[2].row.as_variable().unwrap();
        assert_eq!(row.ind1, '1');
        assert_eq!(row.ind2, ' ');
        assert_eq!(row.subfields[0].code, 'a');
        assert_eq!(row.subfields[1].value, "Herman Melville");
    }

    #[test]
    fn test_serialize_round_trips_shape() {
        let record = sample_record();
        let value = serde_json::to_value(&record).unwrap();
        let reparsed = RawRecord::from_value(&value).unwrap();
        assert_eq!(record, reparsed);
        assert_eq!(value["fields"][2]["245"]["subfields"][0]["a"], "Moby Dick");
    }

    #[test]
    fn test_insert_field_preserves_tag_order() {
        let mut record = sample_record();
        let index = record.insert_field_ordered("100", Row::Variable(VariableRow::blank(&['a'])));
        assert_eq!(index, 2);
        let tags: Vec<&str> = record.fields.iter().map(|f| f.tag.as_str()).collect();
        assert_eq!(tags, ["001", "008", "100", "245"]);

        // A repeated tag lands after its siblings.
        let index = record.insert_field_ordered("100", Row::Variable(VariableRow::blank(&['a'])));
        assert_eq!(index, 3);
    }

    #[test]
    fn test_insert_field_appends_when_largest() {
        let mut record = sample_record();
        let index = record.insert_field_ordered("650", Row::Variable(VariableRow::blank(&['a'])));
        assert_eq!(index, 3);
    }

    #[test]
    fn test_subfield_insert_and_remove() {
        let mut row = VariableRow::blank(&['a']);
        row.insert_subfield('b', None);
        row.insert_subfield('x', Some(0));
        let codes: Vec<char> = row.subfields.iter().map(|s| s.code).collect();
        assert_eq!(codes, ['a', 'x', 'b']);

        row.remove_subfield(1);
        let codes: Vec<char> = row.subfields.iter().map(|s| s.code).collect();
        assert_eq!(codes, ['a', 'b']);
    }

    #[test]
    fn test_malformed_record_is_fatal() {
        assert!(RawRecord::from_value(&json!({"fields": []})).is_err());
        assert!(RawRecord::from_value(&json!("leader only")).is_err());
    }
}
