//! Overlay-driven partitioning of a record's fields into named groups.
//!
//! The assembler decorates every field with lookup helpers (its definition,
//! its row, an inferred widget kind) and partitions fields into the
//! overlay's per-entity groups. Group members reference record fields by
//! slot rather than copying them, so later edits to the record show through;
//! tag+subtag paths become lazily resolved projections over decoded
//! fixed-field properties.
//!
//! Independent of the entity-graph builder: this is the editing/display
//! view of a record, not its normalized form.

use crate::fieldmap::{FieldDefinition, FieldMap, IndicatorMap};
use crate::fixedfield::{expand_fixed_fields, FixedFieldKind};
use crate::overlay::{GroupEntry, IndicatorStyle, Overlay, TagExtension};
use crate::record::{LeaderSlot, RawRecord, Row, VariableRow};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// Pseudo-tag addressing the record leader in overlays and groups.
pub const LEADER_FIELD: &str = "leader";

/// Widget classification for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    /// The leader or a tag with a fixed-field parser.
    #[serde(rename = "fixedfield")]
    FixedField,
    /// A plain string row without a fixed-field parser.
    Raw,
    /// An indicator- and subfield-bearing field.
    Field,
}

/// Infer the widget kind for a tag and its row.
#[must_use]
pub fn widget_kind(tag: &str, row: &Row) -> WidgetKind {
    if tag == LEADER_FIELD || FixedFieldKind::for_tag(tag).is_some() {
        WidgetKind::FixedField
    } else if row.is_raw() {
        WidgetKind::Raw
    } else {
        WidgetKind::Field
    }
}

/// Infer the widget style of one indicator position.
///
/// A single-entry enumeration whose blank entry denotes "undefined" is
/// hidden; an overlay override wins next; any other enumeration selects;
/// no enumeration means free text.
#[must_use]
pub fn indicator_style(
    extension: Option<&TagExtension>,
    indicators: Option<&IndicatorMap>,
    first: bool,
) -> IndicatorStyle {
    if let Some(map) = indicators {
        if map.values.len() == 1 {
            if let Some(blank) = map.values.get("_") {
                let undefined = blank.id.as_deref() == Some("undefined")
                    || blank.label_sv.as_deref() == Some("odefinierad");
                if undefined {
                    return IndicatorStyle::Hidden;
                }
            }
        }
    }
    let overridden = extension.and_then(|ext| {
        let over = if first { ext.ind1.as_ref() } else { ext.ind2.as_ref() };
        over.map(|o| o.style)
    });
    if let Some(style) = overridden {
        return style;
    }
    if indicators.is_some() {
        IndicatorStyle::Select
    } else {
        IndicatorStyle::Plain
    }
}

/// Decoration context for one tag: the merged editing view of its
/// definition and overlay extension, computed without mutating either.
#[derive(Debug, Clone)]
pub struct FieldUi {
    /// The decorated tag.
    pub tag: String,
    /// First-indicator widget style.
    pub ind1_style: IndicatorStyle,
    /// Second-indicator widget style.
    pub ind2_style: IndicatorStyle,
    /// Subfield codes a newly added field starts with.
    pub default_codes: Vec<char>,
    /// Subfield code the indicator widgets are shown with.
    pub indicators_for: char,
}

/// Compute the decoration context for a tag.
///
/// Returns `None` when the field map has no definition for the tag.
#[must_use]
pub fn decorate_definition(map: &FieldMap, overlay: &Overlay, tag: &str) -> Option<FieldUi> {
    let dfn: &FieldDefinition = map.definition(tag)?;
    let extension = overlay.extension(tag);
    Some(FieldUi {
        tag: tag.to_string(),
        ind1_style: indicator_style(extension, dfn.ind1.as_ref(), true),
        ind2_style: indicator_style(extension, dfn.ind2.as_ref(), false),
        default_codes: overlay.default_codes(tag),
        indicators_for: extension
            .and_then(|ext| ext.indicators_for.as_ref())
            .and_then(|code| code.chars().next())
            .unwrap_or('a'),
    })
}

/// Reference to one field of the underlying record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSlot {
    /// The record leader.
    Leader,
    /// A position in the record's field list.
    Index(usize),
}

/// One member of an assembled group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupMember {
    /// A reference to a record field.
    Field(FieldSlot),
    /// A lazily resolved projection of named properties from the first
    /// field with the given tag.
    Projection {
        /// Source tag.
        tag: String,
        /// Property names to project.
        props: Vec<String>,
    },
}

/// Assembled groups: entity name → group name → ordered members, plus the
/// group specifications needed to splice added fields in order.
#[derive(Debug, Default)]
pub struct EntityGroups {
    groups: IndexMap<String, IndexMap<String, Vec<GroupMember>>>,
    specs: IndexMap<String, IndexMap<String, Vec<GroupEntry>>>,
}

/// Partition a record's fields into the overlay's entity groups.
///
/// Fixed fields are expanded in place (non-reversibly) first, so group
/// members and projections see decoded values. Entities, groups, or tags
/// the overlay names but the record lacks simply yield empty output.
pub fn create_entity_groups(
    map: &FieldMap,
    overlay: &Overlay,
    record: &mut RawRecord,
) -> EntityGroups {
    expand_fixed_fields(map, record, false);

    let mut by_tag: IndexMap<String, Vec<FieldSlot>> = IndexMap::new();
    by_tag.insert(LEADER_FIELD.to_string(), vec![FieldSlot::Leader]);
    for (index, field) in record.fields.iter().enumerate() {
        by_tag
            .entry(field.tag.clone())
            .or_default()
            .push(FieldSlot::Index(index));
    }

    let mut out = EntityGroups::default();
    for (entity, groups) in &overlay.entities {
        let mut assembled: IndexMap<String, Vec<GroupMember>> = IndexMap::new();
        for (group_name, spec) in groups {
            let mut members = Vec::new();
            for entry in spec {
                match entry {
                    GroupEntry::Tag(tag) => {
                        if let Some(slots) = by_tag.get(tag) {
                            members.extend(slots.iter().map(|&slot| GroupMember::Field(slot)));
                        }
                    }
                    GroupEntry::Path(paths) => {
                        for (tag, props) in paths {
                            if by_tag.contains_key(tag) {
                                members.push(GroupMember::Projection {
                                    tag: tag.clone(),
                                    props: props.clone(),
                                });
                            }
                        }
                    }
                }
            }
            assembled.insert(group_name.clone(), members);
        }
        out.groups.insert(entity.clone(), assembled);
        out.specs.insert(entity.clone(), groups.clone());
    }
    out
}

impl EntityGroups {
    /// The members of one group, if assembled.
    #[must_use]
    pub fn get(&self, entity: &str, group: &str) -> Option<&[GroupMember]> {
        self.groups.get(entity)?.get(group).map(Vec::as_slice)
    }

    /// Add a blank field for a tag to the record and splice it into a
    /// group.
    ///
    /// The new field starts with one empty instance of each of the tag's
    /// default subfield codes, is inserted into the record preserving
    /// ascending tag order, and joins the group immediately before the
    /// first member of the next tag listed in the group's specification
    /// (else at the end). Returns the record index of the new field.
    pub fn add_field(
        &mut self,
        record: &mut RawRecord,
        overlay: &Overlay,
        entity: &str,
        group: &str,
        tag: &str,
    ) -> usize {
        let codes = overlay.default_codes(tag);
        let index = record.insert_field_ordered(tag, Row::Variable(VariableRow::blank(&codes)));

        // Record positions at and after the insertion point shifted by one.
        for groups in self.groups.values_mut() {
            for members in groups.values_mut() {
                for member in members.iter_mut() {
                    if let GroupMember::Field(FieldSlot::Index(i)) = member {
                        if *i >= index {
                            *i += 1;
                        }
                    }
                }
            }
        }

        let next_tag = self.specs.get(entity).and_then(|groups| {
            let spec = groups.get(group)?;
            let position = spec
                .iter()
                .position(|entry| matches!(entry, GroupEntry::Tag(t) if t == tag))?;
            spec[position + 1..].iter().find_map(|entry| match entry {
                GroupEntry::Tag(t) => Some(t.clone()),
                GroupEntry::Path(_) => None,
            })
        });

        if let Some(members) = self
            .groups
            .get_mut(entity)
            .and_then(|groups| groups.get_mut(group))
        {
            let splice_at = next_tag
                .and_then(|next| {
                    members.iter().position(|member| {
                        member_tag(member, record).map_or(false, |t| t == next)
                    })
                })
                .unwrap_or(members.len());
            members.insert(splice_at, GroupMember::Field(FieldSlot::Index(index)));
        }
        index
    }

    /// The decoration contexts for the bare tags a group's specification
    /// lists, in specification order.
    ///
    /// Tags without a field-map definition are omitted; subtag-path entries
    /// do not contribute a definition of their own.
    #[must_use]
    pub fn group_definitions(
        &self,
        map: &FieldMap,
        overlay: &Overlay,
        entity: &str,
        group: &str,
    ) -> Vec<FieldUi> {
        self.specs
            .get(entity)
            .and_then(|groups| groups.get(group))
            .map(|spec| {
                spec.iter()
                    .filter_map(|entry| match entry {
                        GroupEntry::Tag(tag) => decorate_definition(map, overlay, tag),
                        GroupEntry::Path(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Serialize entity → group → ordered field documents.
    ///
    /// Only public field content is emitted; the lookup helpers backing
    /// group members are not part of the output document.
    #[must_use]
    pub fn to_value(&self, record: &RawRecord) -> Value {
        let mut out = Map::new();
        for (entity, groups) in &self.groups {
            let mut entity_out = Map::new();
            for (group_name, members) in groups {
                let rendered: Vec<Value> = members
                    .iter()
                    .map(|member| member_to_value(member, record))
                    .collect();
                entity_out.insert(group_name.clone(), Value::Array(rendered));
            }
            out.insert(entity.clone(), Value::Object(entity_out));
        }
        Value::Object(out)
    }

    /// The widget kind of one group member.
    #[must_use]
    pub fn member_widget(&self, member: &GroupMember, record: &RawRecord) -> WidgetKind {
        match member {
            GroupMember::Field(FieldSlot::Leader) => WidgetKind::FixedField,
            GroupMember::Field(FieldSlot::Index(i)) => {
                let field = &record.fields[*i];
                widget_kind(&field.tag, &field.row)
            }
            GroupMember::Projection { tag, .. } => match first_row(record, tag) {
                Some(row) => widget_kind(tag, row),
                None => WidgetKind::FixedField,
            },
        }
    }
}

fn member_tag<'a>(member: &'a GroupMember, record: &'a RawRecord) -> Option<&'a str> {
    match member {
        GroupMember::Field(FieldSlot::Leader) => Some(LEADER_FIELD),
        GroupMember::Field(FieldSlot::Index(i)) => {
            record.fields.get(*i).map(|field| field.tag.as_str())
        }
        GroupMember::Projection { tag, .. } => Some(tag.as_str()),
    }
}

fn first_row<'a>(record: &'a RawRecord, tag: &'a str) -> Option<&'a Row> {
    record.fields_by_tag(tag).next().map(|field| &field.row)
}

fn member_to_value(member: &GroupMember, record: &RawRecord) -> Value {
    match member {
        GroupMember::Field(FieldSlot::Leader) => {
            let mut field = Map::new();
            field.insert(
                LEADER_FIELD.to_string(),
                serde_json::to_value(&record.leader).unwrap_or(Value::Null),
            );
            Value::Object(field)
        }
        GroupMember::Field(FieldSlot::Index(i)) => {
            serde_json::to_value(&record.fields[*i]).unwrap_or(Value::Null)
        }
        GroupMember::Projection { tag, props } => {
            let mut projected = Map::new();
            let decoded = match tag.as_str() {
                LEADER_FIELD => match &record.leader {
                    LeaderSlot::Decoded(value) => Some(value),
                    LeaderSlot::Raw(_) => None,
                },
                _ => match first_row(record, tag) {
                    Some(Row::Decoded(value)) => Some(value),
                    _ => None,
                },
            };
            if let Some(value) = decoded {
                for prop in props {
                    if let Some(column) = value.get(prop) {
                        projected.insert(
                            prop.clone(),
                            serde_json::to_value(column).unwrap_or(Value::Null),
                        );
                    }
                }
            }
            let mut field = Map::new();
            field.insert(tag.clone(), Value::Object(projected));
            Value::Object(field)
        }
    }
}
