//! Field-map schema types and loading.
//!
//! The field map is an external, data-defined schema describing every known
//! MARC tag's parsing rules: per-tag field definitions, per-column
//! fixed-field layouts, indicator semantics, subfield repeatability, and
//! target entity types. It is loaded once per invocation and treated as
//! read-only by every decoder in the crate.
//!
//! # Document shape
//!
//! A marcmap document may nest per-record-type sub-maps (`bib`, `auth`, ...).
//! One sub-map is an object whose keys are tags (`"000"`, `"245"`, ...)
//! mapping to field definitions, plus a sibling `fixprops` table resolving
//! fixed-field codes to semantic identifiers:
//!
//! ```json
//! {
//!   "000": {"fixmaps": [{"name": "BibLeader", "columns": [...]}]},
//!   "245": {"id": "title", "repeatable": false,
//!           "ind1": {"1": {"id": "titleAddedEntry"}},
//!           "subfield": {"a": {"id": "titleProper", "repeatable": false}}},
//!   "fixprops": {"typeOfRecord": {"a": {"id": "LanguageMaterial"}}}
//! }
//! ```

use crate::error::{MapError, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Tag under which the leader's column layout is registered.
pub const LEADER_TAG: &str = "000";

/// Target entity role for a decoded property.
///
/// The five canonical FRBR-like roles are a closed set, each guaranteed a
/// single instance per entity graph. Any other schema-declared type is an
/// ad hoc entity, created on first reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum EntityType {
    /// The catalog record itself.
    Record,
    /// The physical/published embodiment.
    Manifestation,
    /// The realized expression of a work.
    Expression,
    /// The abstract intellectual creation.
    Work,
    /// A single exemplar of a manifestation.
    Item,
    /// Any other schema-declared entity type.
    Other(String),
}

impl EntityType {
    /// Whether this is one of the five canonical singleton roles.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        !matches!(self, EntityType::Other(_))
    }

    /// The entity type name as it appears in schema and output documents.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::Record => "Record",
            EntityType::Manifestation => "Manifestation",
            EntityType::Expression => "Expression",
            EntityType::Work => "Work",
            EntityType::Item => "Item",
            EntityType::Other(name) => name,
        }
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Record" => EntityType::Record,
            "Manifestation" => EntityType::Manifestation,
            "Expression" => EntityType::Expression,
            "Work" => EntityType::Work,
            "Item" => EntityType::Item,
            _ => EntityType::Other(name),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a field's row is represented and parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FieldType {
    /// Plain fixed-width string decoded by column offset/length.
    #[serde(rename = "fixedLength")]
    FixedLength,
    /// Two indicator characters plus an ordered subfield sequence.
    #[serde(rename = "variable")]
    Variable,
}

/// A labelled enumeration value (indicator codes, fixprop codes).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnumValue {
    /// Semantic identifier for the code, if registered.
    #[serde(default)]
    pub id: Option<String>,
    /// Swedish display label.
    #[serde(default)]
    pub label_sv: Option<String>,
    /// English display label.
    #[serde(default)]
    pub label_en: Option<String>,
}

/// Indicator semantics for one indicator position.
///
/// Mostly a code → [`EnumValue`] table; the table itself may carry an `id`
/// naming the decoded output property for that indicator.
#[derive(Debug, Clone, Default)]
pub struct IndicatorMap {
    /// Output property name for the resolved indicator, if declared.
    pub id: Option<String>,
    /// Indicator code → enumeration value. Blank is keyed `_`.
    pub values: IndexMap<String, EnumValue>,
}

impl IndicatorMap {
    /// Resolve an indicator character against the enumeration.
    #[must_use]
    pub fn resolve(&self, ind: char) -> Option<&EnumValue> {
        self.values.get(ind.to_string().as_str())
    }
}

impl<'de> Deserialize<'de> for IndicatorMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = IndexMap::<String, Value>::deserialize(deserializer)?;
        let mut map = IndicatorMap::default();
        for (key, value) in raw {
            if key == "id" {
                if let Value::String(s) = value {
                    map.id = Some(s);
                }
            } else if value.is_object() {
                let parsed: EnumValue =
                    serde_json::from_value(value).map_err(serde::de::Error::custom)?;
                map.values.insert(key, parsed);
            }
        }
        Ok(map)
    }
}

/// Parsing rules for one subfield code within a variable field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubfieldDefinition {
    /// Output key for this subfield's values, if registered.
    #[serde(default)]
    pub id: Option<String>,
    /// Swedish display label.
    #[serde(default)]
    pub label_sv: Option<String>,
    /// English display label.
    #[serde(default)]
    pub label_en: Option<String>,
    /// Whether the subfield may repeat within a field. Defaults to true.
    #[serde(default = "default_true")]
    pub repeatable: bool,
    /// Whether the subfield is mandatory in cataloging practice.
    #[serde(default)]
    pub mandatory: bool,
    /// Target entity for this subfield's values in the graph path.
    #[serde(default)]
    pub entity: Option<EntityType>,
}

impl SubfieldDefinition {
    /// Preferred display label, Swedish before English.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label_sv.as_deref().or(self.label_en.as_deref())
    }
}

/// One extraction window within a fixed-field layout.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDefinition {
    /// Byte offset of the column within the fixed-width row.
    pub offset: usize,
    /// Column width in bytes.
    pub length: usize,
    /// Registered property name, resolvable through `fixprops`.
    #[serde(default, rename = "propRef")]
    pub prop_ref: Option<String>,
    /// Fallback property name. A leading `<` marks it non-semantic.
    #[serde(default)]
    pub placeholder: Option<String>,
    /// Value to use when the row does not cover this column.
    #[serde(default)]
    pub default: Option<String>,
    /// Target entity for this column's value in the graph path.
    #[serde(default)]
    pub entity: Option<EntityType>,
    /// Swedish display label.
    #[serde(default)]
    pub label_sv: Option<String>,
    /// English display label.
    #[serde(default)]
    pub label_en: Option<String>,
}

impl ColumnDefinition {
    /// The decoded output property name for this column.
    ///
    /// Uses the explicit `propRef` when present, else a placeholder that
    /// carries a real name, else a synthesized `_col_{offset}_{length}`
    /// name guaranteeing uniqueness when no semantic name exists.
    #[must_use]
    pub fn property_name(&self) -> String {
        if let Some(prop) = &self.prop_ref {
            return prop.clone();
        }
        if let Some(placeholder) = &self.placeholder {
            if !placeholder.starts_with('<') {
                return placeholder.clone();
            }
        }
        format!("_col_{}_{}", self.offset, self.length)
    }
}

/// One candidate column layout for a fixed field, selected by a match
/// condition.
#[derive(Debug, Clone, Deserialize)]
pub struct FixMap {
    /// Layout name from the schema.
    #[serde(default)]
    pub name: Option<String>,
    /// Resource-type term this layout corresponds to.
    #[serde(default)]
    pub term: Option<String>,
    /// Swedish display label.
    #[serde(default)]
    pub label_sv: Option<String>,
    /// English display label.
    #[serde(default)]
    pub label_en: Option<String>,
    /// First-character codes this layout matches (006/007-style fields).
    #[serde(default, rename = "matchKeys")]
    pub match_keys: Vec<String>,
    /// Record-type + bib-level combinations this layout matches (008-style).
    #[serde(default, rename = "matchRecTypeBibLevel")]
    pub match_rec_type_bib_level: Vec<String>,
    /// Ordered column definitions, shared with reversible decoded values.
    pub columns: Arc<Vec<ColumnDefinition>>,
}

/// Parsing rules for one tag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldDefinition {
    /// Output key and graph relation name for this field, if registered.
    #[serde(default)]
    pub id: Option<String>,
    /// Swedish display label.
    #[serde(default)]
    pub label_sv: Option<String>,
    /// English display label.
    #[serde(default)]
    pub label_en: Option<String>,
    /// Row representation. Absent means variable.
    #[serde(default, rename = "type")]
    pub field_type: Option<FieldType>,
    /// Whether the field may repeat within a record. Defaults to true.
    #[serde(default = "default_true")]
    pub repeatable: bool,
    /// Whether the field is mandatory in cataloging practice.
    #[serde(default)]
    pub mandatory: bool,
    /// Target entity for the field as a whole, when declared.
    #[serde(default)]
    pub entity: Option<EntityType>,
    /// First indicator semantics.
    #[serde(default)]
    pub ind1: Option<IndicatorMap>,
    /// Second indicator semantics.
    #[serde(default)]
    pub ind2: Option<IndicatorMap>,
    /// Subfield code → parsing rules.
    #[serde(default)]
    pub subfield: Option<IndexMap<String, SubfieldDefinition>>,
    /// Candidate fixed-field layouts, in match order.
    #[serde(default)]
    pub fixmaps: Vec<FixMap>,
}

impl FieldDefinition {
    /// Whether this definition marks the field's row as fixed-length.
    #[must_use]
    pub fn is_fixed_length(&self) -> bool {
        self.field_type == Some(FieldType::FixedLength)
    }

    /// Look up a subfield definition by code.
    #[must_use]
    pub fn subfield(&self, code: char) -> Option<&SubfieldDefinition> {
        self.subfield
            .as_ref()
            .and_then(|table| table.get(code.to_string().as_str()))
    }
}

/// Resolution table from fixed-field property name and code to semantics.
pub type FixProps = IndexMap<String, IndexMap<String, EnumValue>>;

/// A loaded field-map schema for one record type.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    fields: IndexMap<String, FieldDefinition>,
    fixprops: FixProps,
}

impl FieldMap {
    /// Build a field map from a parsed JSON document.
    ///
    /// Every key except `fixprops` is taken as a tag; unknown keys inside
    /// definitions are ignored, so schema extensions do not break loading.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not an object or any definition
    /// fails to parse. This is the fatal error class: nothing is decoded
    /// from a schema that did not load.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| MapError::InvalidFieldMap("expected a JSON object".to_string()))?;

        let mut fields = IndexMap::new();
        let mut fixprops = FixProps::default();
        for (key, entry) in object {
            if key == "fixprops" {
                fixprops = serde_json::from_value(entry.clone()).map_err(|e| {
                    MapError::InvalidFieldMap(format!("bad fixprops table: {e}"))
                })?;
            } else {
                let dfn: FieldDefinition = serde_json::from_value(entry.clone()).map_err(|e| {
                    MapError::InvalidFieldMap(format!("bad definition for tag {key}: {e}"))
                })?;
                fields.insert(key.clone(), dfn);
            }
        }
        Ok(FieldMap { fields, fixprops })
    }

    /// Load a field map from a marcmap file on disk.
    ///
    /// When `record_type` is given (e.g. `"bib"`, `"auth"`), the named
    /// sub-map of the document is loaded; otherwise the document itself is
    /// taken as the field map.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the JSON is malformed,
    /// or the named sub-map is missing.
    pub fn load(path: impl AsRef<Path>, record_type: Option<&str>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&text)?;
        let submap = match record_type {
            Some(kind) => document.get(kind).ok_or_else(|| {
                MapError::InvalidFieldMap(format!("no record type {kind} in map"))
            })?,
            None => &document,
        };
        Self::from_value(submap)
    }

    /// Look up the definition for a tag. The pseudo-tag `leader` resolves
    /// to the leader definition.
    #[must_use]
    pub fn definition(&self, tag: &str) -> Option<&FieldDefinition> {
        if tag == "leader" {
            return self.fields.get(LEADER_TAG);
        }
        self.fields.get(tag)
    }

    /// Iterate over all tag → definition entries in schema order.
    pub fn definitions(&self) -> impl Iterator<Item = (&str, &FieldDefinition)> {
        self.fields.iter().map(|(tag, dfn)| (tag.as_str(), dfn))
    }

    /// The leader's column layout: the first fixmap of the `000` definition.
    #[must_use]
    pub fn leader_layout(&self) -> Option<&FixMap> {
        self.fields.get(LEADER_TAG)?.fixmaps.first()
    }

    /// Resolve a fixed-field property code to its registered semantics.
    #[must_use]
    pub fn fixprop(&self, prop: &str, code: &str) -> Option<&EnumValue> {
        self.fixprops.get(prop)?.get(code)
    }
}

fn default_true() -> bool {
    true
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
            "245": {
                "id": "title",
                "repeatable": false,
                "ind1": {"id": "titleIndicator", "1": {"id": "addedEntry"}},
                "subfield": {
                    "a": {"id": "titleProper", "repeatable": false},
                    "c": {"id": "statementOfResponsibility"}
                }
            },
            "fixprops": {
                "typeOfRecord": {"a": {"id": "LanguageMaterial"}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_load_definitions_and_fixprops() {
        let map = sample_map();
        assert!(map.definition("245").is_some());
        assert!(map.definition("999").is_none());
        assert_eq!(
            map.fixprop("typeOfRecord", "a").unwrap().id.as_deref(),
            Some("LanguageMaterial")
        );
    }

    #[test]
    fn test_leader_pseudo_tag_resolves_to_000() {
        let map = sample_map();
        let dfn = map.definition("leader").unwrap();
        assert_eq!(dfn.fixmaps.len(), 1);
        assert_eq!(map.leader_layout().unwrap().columns.len(), 2);
    }

    #[test]
    fn test_indicator_map_splits_id_from_values() {
        let map = sample_map();
        let ind1 = map.definition("245").unwrap().ind1.as_ref().unwrap();
        assert_eq!(ind1.id.as_deref(), Some("titleIndicator"));
        assert_eq!(ind1.resolve('1').unwrap().id.as_deref(), Some("addedEntry"));
        assert!(ind1.resolve('9').is_none());
    }

    #[test]
    fn test_repeatable_defaults_to_true() {
        let map = sample_map();
        let dfn = map.definition("245").unwrap();
        assert!(!dfn.repeatable);
        assert!(!dfn.subfield('a').unwrap().repeatable);
        assert!(dfn.subfield('c').unwrap().repeatable);
    }

    #[test]
    fn test_column_property_name_fallbacks() {
        let named: ColumnDefinition =
            serde_json::from_value(json!({"offset": 0, "length": 1, "propRef": "status"}))
                .unwrap();
        assert_eq!(named.property_name(), "status");

        let placeholder: ColumnDefinition =
            serde_json::from_value(json!({"offset": 3, "length": 2, "placeholder": "ctrlType"}))
                .unwrap();
        assert_eq!(placeholder.property_name(), "ctrlType");

        let anonymous: ColumnDefinition =
            serde_json::from_value(json!({"offset": 5, "length": 4, "placeholder": "<undef>"}))
                .unwrap();
        assert_eq!(anonymous.property_name(), "_col_5_4");
    }

    #[test]
    fn test_entity_type_round_trip() {
        assert_eq!(EntityType::from("Work".to_string()), EntityType::Work);
        assert!(EntityType::Work.is_canonical());
        let adhoc = EntityType::from("PublicationEvent".to_string());
        assert!(!adhoc.is_canonical());
        assert_eq!(adhoc.as_str(), "PublicationEvent");
    }

    #[test]
    fn test_rejects_non_object_map() {
        assert!(FieldMap::from_value(&json!([1, 2, 3])).is_err());
    }
}
