//! Fixed-field decoding by schema column layouts.
//!
//! Fixed fields (the leader and tags 006/007/008) are plain fixed-width
//! strings carrying one value per column window. The field map supplies the
//! column layouts; this module extracts columns into a [`FixedFieldValue`],
//! optionally resolving codes to registered identifiers and optionally
//! keeping the layout attached so the value can be re-encoded byte-exactly.
//!
//! Layout selection is a closed dispatch over the known fixed-field kinds:
//! the leader uses the schema's single leader layout; 006/007 pick a
//! candidate layout by the row's first character; 008 picks one by the
//! decoded leader's record-type + bib-level codes. Anything else has no
//! fixed parser. An unmatched candidate never fails the record: 006/007
//! fall back to the raw row, 008 degrades to an empty decoded value whose
//! columns fall through to defaults only.

use crate::fieldmap::{ColumnDefinition, EntityType, FieldDefinition, FieldMap};
use crate::record::{LeaderSlot, RawRecord, Row};
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use tracing::debug;

/// Sentinel stored for a single-space column value on the reversible path,
/// distinguishing "space as data" from "no value".
pub const SPACE_SENTINEL: &str = "_";

/// Decoding behavior for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Single-space columns are skipped; no identifiers, no layout.
    #[default]
    Plain,
    /// Single-space columns become the `_` sentinel and the layout is
    /// attached so serialization re-encodes the original string.
    Reversible,
    /// Like [`DecodeMode::Plain`], but codes are resolved through the
    /// schema's `fixprops` table to semantic identifiers.
    Resolved,
}

/// The closed set of fixed-field parser kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedFieldKind {
    /// 006/007: candidate layout matched on the row's first character.
    FirstChar,
    /// 008: layout matched on leader record-type + bib-level codes.
    RecTypeBibLevel,
}

impl FixedFieldKind {
    /// The fixed-field parser for a tag, if the tag has one.
    #[must_use]
    pub fn for_tag(tag: &str) -> Option<Self> {
        match tag {
            "006" | "007" => Some(FixedFieldKind::FirstChar),
            "008" => Some(FixedFieldKind::RecTypeBibLevel),
            _ => None,
        }
    }
}

/// One decoded column: the extracted code and, when resolved, its
/// registered identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnValue {
    /// The matched code. A space read on the reversible path is stored as
    /// the `_` sentinel.
    pub code: String,
    /// Semantic identifier resolved through `fixprops`, when registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Target entity from the column definition, for graph routing.
    #[serde(skip)]
    pub entity: Option<EntityType>,
}

/// A decoded fixed field: column property name → decoded value, in layout
/// order.
///
/// On the reversible path the value keeps a shared reference to its column
/// layout; serialization then re-encodes the original fixed-width string
/// instead of emitting the property map.
#[derive(Debug, Clone, Default)]
pub struct FixedFieldValue {
    /// Decoded columns in layout order.
    pub columns: IndexMap<String, ColumnValue>,
    layout: Option<Arc<Vec<ColumnDefinition>>>,
}

impl FixedFieldValue {
    /// Look up a decoded column by property name.
    #[must_use]
    pub fn get(&self, prop: &str) -> Option<&ColumnValue> {
        self.columns.get(prop)
    }

    /// The code of a decoded column, if present.
    #[must_use]
    pub fn code_of(&self, prop: &str) -> Option<&str> {
        self.columns.get(prop).map(|value| value.code.as_str())
    }

    /// Whether no columns were decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The attached layout, when decoded reversibly.
    #[must_use]
    pub fn layout(&self) -> Option<&Arc<Vec<ColumnDefinition>>> {
        self.layout.as_ref()
    }
}

impl PartialEq for FixedFieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Serialize for FixedFieldValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if let Some(layout) = &self.layout {
            serializer.serialize_str(&encode_fixed(self, layout))
        } else {
            let mut map = serializer.serialize_map(Some(self.columns.len()))?;
            for (prop, value) in &self.columns {
                map.serialize_entry(prop, value)?;
            }
            map.end()
        }
    }
}

impl<'de> Deserialize<'de> for FixedFieldValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let columns = IndexMap::<String, ColumnValue>::deserialize(deserializer)?;
        Ok(FixedFieldValue {
            columns,
            layout: None,
        })
    }
}

/// Re-encode a decoded fixed field against its column layout.
///
/// Stateless counterpart of the reversible decode: columns are concatenated
/// in layout order, the space sentinel maps back to a space, short values
/// are padded to column width, and unset columns render as spaces. For a
/// row fully covered by its layout this reproduces the original string
/// byte for byte.
#[must_use]
pub fn encode_fixed(value: &FixedFieldValue, layout: &[ColumnDefinition]) -> String {
    let mut out = String::new();
    for column in layout {
        match value.columns.get(&column.property_name()) {
            None => out.push_str(&" ".repeat(column.length)),
            Some(decoded) => {
                let code = if decoded.code == SPACE_SENTINEL {
                    " "
                } else {
                    decoded.code.as_str()
                };
                out.push_str(code);
                if code.len() < column.length {
                    out.push_str(&" ".repeat(column.length - code.len()));
                }
            }
        }
    }
    out
}

/// Decode one fixed-width row against an ordered column layout.
#[must_use]
pub fn decode_columns(
    repr: &str,
    columns: &Arc<Vec<ColumnDefinition>>,
    map: &FieldMap,
    mode: DecodeMode,
) -> FixedFieldValue {
    let mut value = FixedFieldValue {
        columns: IndexMap::new(),
        layout: (mode == DecodeMode::Reversible).then(|| Arc::clone(columns)),
    };

    for column in columns.iter() {
        let end = (column.offset + column.length).min(repr.len());
        let slice = repr.get(column.offset..end).unwrap_or("");
        let code = if slice.is_empty() {
            match &column.default {
                Some(default) => default.clone(),
                None => continue,
            }
        } else {
            slice.to_string()
        };

        let code = if code == " " {
            if mode == DecodeMode::Reversible {
                SPACE_SENTINEL.to_string()
            } else {
                continue;
            }
        } else {
            code
        };

        let prop = column.property_name();
        let id = if mode == DecodeMode::Resolved {
            map.fixprop(&prop, &code).and_then(|entry| entry.id.clone())
        } else {
            None
        };
        value.columns.insert(
            prop,
            ColumnValue {
                code,
                id,
                entity: column.entity.clone(),
            },
        );
    }
    value
}

/// Decode the record leader using the schema's single leader layout.
///
/// A schema without a leader layout yields an empty decoded value; later
/// layout matching then degrades to passthrough.
#[must_use]
pub fn parse_leader(map: &FieldMap, leader: &str, mode: DecodeMode) -> FixedFieldValue {
    match map.leader_layout() {
        Some(fixmap) => decode_columns(leader, &fixmap.columns, map, mode),
        None => FixedFieldValue::default(),
    }
}

/// Decode a tagged fixed field, selecting among the definition's candidate
/// layouts.
///
/// Returns `None` when the tag's kind matches on the first character and no
/// candidate layout applies; the caller keeps the raw row. An 008-style
/// field with an unmatched record-type/bib-level combination instead
/// returns an empty decoded value.
#[must_use]
pub fn decode_fixed_field(
    tag: &str,
    row: &str,
    dfn: &FieldDefinition,
    leader: &FixedFieldValue,
    map: &FieldMap,
    mode: DecodeMode,
) -> Option<FixedFieldValue> {
    let kind = FixedFieldKind::for_tag(tag)?;
    match kind {
        FixedFieldKind::FirstChar => {
            let match_key = row.chars().next().map(|c| c.to_string())?;
            let fixmap = dfn
                .fixmaps
                .iter()
                .find(|fixmap| fixmap.match_keys.contains(&match_key));
            match fixmap {
                Some(fixmap) => Some(decode_columns(row, &fixmap.columns, map, mode)),
                None => {
                    debug!(tag, %match_key, "no fixed-field layout matched");
                    None
                }
            }
        }
        FixedFieldKind::RecTypeBibLevel => {
            let rec_type = leader.code_of("typeOfRecord").unwrap_or("");
            let bib_level = leader.code_of("bibLevel").unwrap_or("");
            let match_key = format!("{rec_type}{bib_level}");
            let fixmap = dfn
                .fixmaps
                .iter()
                .find(|fixmap| fixmap.match_rec_type_bib_level.contains(&match_key));
            match fixmap {
                Some(fixmap) => Some(decode_columns(row, &fixmap.columns, map, mode)),
                None => {
                    debug!(tag, %match_key, "no fixed-field layout matched");
                    Some(FixedFieldValue::default())
                }
            }
        }
    }
}

/// Expand fixed fields into decoded objects, in place.
///
/// The leader is decoded first; each fixed-parser tag is then decoded
/// against the leader. With `reversible` the decoded objects keep their
/// layouts and serialize back to the original fixed-width strings.
///
/// Expansion is idempotent: a record whose leader is already decoded is
/// left unchanged.
pub fn expand_fixed_fields(map: &FieldMap, record: &mut RawRecord, reversible: bool) {
    if record.leader.is_decoded() {
        return;
    }
    let mode = if reversible {
        DecodeMode::Reversible
    } else {
        DecodeMode::Plain
    };

    let leader = match &record.leader {
        LeaderSlot::Raw(text) => parse_leader(map, text, mode),
        LeaderSlot::Decoded(value) => value.clone(),
    };

    for field in &mut record.fields {
        if FixedFieldKind::for_tag(&field.tag).is_none() {
            continue;
        }
        let Some(dfn) = map.definition(&field.tag) else {
            continue;
        };
        if let Row::Fixed(row) = &field.row {
            match decode_fixed_field(&field.tag, row, dfn, &leader, map, mode) {
                // An unmatched layout leaves the raw row in place rather
                // than dropping its content for an empty object.
                Some(value) if !value.is_empty() => field.row = Row::Decoded(value),
                _ => {}
            }
        }
    }
    record.leader = LeaderSlot::Decoded(leader);
}
