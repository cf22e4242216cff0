//! Entity-graph assembly from a decoded record.
//!
//! One pass over a record's field list routes decoded properties onto a
//! graph of linked entities. The canonical skeleton is created up front —
//! Record describes a Manifestation, which owns an Expression (of a Work)
//! and an Item — and field definitions then declare which entity each
//! decoded value belongs to. Ad hoc entity types are created on first
//! reference and attached to the Manifestation under the originating
//! field's relation name, or appended to the top-level entity list when no
//! relation is available.
//!
//! The builder is total: unknown tags are logged and skipped, and
//! unmatched fixed-field layouts contribute nothing rather than failing
//! the record.

use crate::entity::{Disambiguation, EntityArena, EntityId, PropertyValue};
use crate::fieldmap::{EntityType, FieldDefinition, FieldMap};
use crate::fixedfield::{
    decode_fixed_field, parse_leader, DecodeMode, FixedFieldKind, FixedFieldValue,
};
use crate::record::{LeaderSlot, RawRecord, Row};
use crate::variablefield::subfield_key;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

/// Relation from the Record to the Manifestation it describes.
const DESCRIBES: &str = "describes";
/// Relation from the Manifestation to its Expression.
const EXPRESSION_MANIFESTED: &str = "expressionManifested";
/// Relation from the Expression to its Work.
const EXPRESSION_OF_WORK: &str = "expressionOfWork";
/// Relation from the Manifestation to its Item.
const EXEMPLAR_OF_MANIFESTATION: &str = "exemplarOfManifestation";

/// A built entity graph: the arena plus the ordered top-level entity list,
/// rooted at the Record.
#[derive(Debug)]
pub struct EntityGraph {
    arena: EntityArena,
    roots: Vec<EntityId>,
}

impl EntityGraph {
    /// The Record entity at the head of the graph.
    #[must_use]
    pub fn root(&self) -> EntityId {
        self.roots[0]
    }

    /// The entity arena backing the graph.
    #[must_use]
    pub fn arena(&self) -> &EntityArena {
        &self.arena
    }

    /// Serialize the graph as an ordered array of nested entity documents,
    /// starting with the Record.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Array(self.roots.iter().map(|&id| self.arena.to_value(id)).collect())
    }
}

/// Builds entity graphs from records against one field map.
#[derive(Debug)]
pub struct GraphBuilder<'a> {
    map: &'a FieldMap,
    disambiguation: Disambiguation,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder with the default first-seen conflation of ad hoc
    /// entities.
    #[must_use]
    pub fn new(map: &'a FieldMap) -> Self {
        GraphBuilder {
            map,
            disambiguation: Disambiguation::default(),
        }
    }

    /// Select how ad hoc entities of the same type are told apart.
    #[must_use]
    pub fn with_disambiguation(mut self, disambiguation: Disambiguation) -> Self {
        self.disambiguation = disambiguation;
        self
    }

    /// Build the entity graph for one record.
    ///
    /// Accepts raw records as well as records whose fixed fields were
    /// already decoded in place; decoded rows are reused as-is.
    #[must_use]
    pub fn build(&self, record: &RawRecord) -> EntityGraph {
        let mut state = BuildState::new(self.map, self.disambiguation);

        let leader = match &record.leader {
            LeaderSlot::Raw(text) => parse_leader(self.map, text, DecodeMode::Resolved),
            LeaderSlot::Decoded(value) => value.clone(),
        };
        state.process_fixed_value(&leader, "leader:0");

        let mut occurrences: IndexMap<String, usize> = IndexMap::new();
        for field in &record.fields {
            let count = occurrences.entry(field.tag.clone()).or_insert(0);
            let occurrence = format!("{}:{count}", field.tag);
            *count += 1;

            let Some(dfn) = self.map.definition(&field.tag) else {
                warn!(tag = %field.tag, "missing field definition, skipping field");
                continue;
            };

            if FixedFieldKind::for_tag(&field.tag).is_some() {
                state.process_fixed_field(field.tag.as_str(), &field.row, dfn, &leader, &occurrence);
            } else {
                state.process_row(&field.row, dfn, &occurrence);
            }
        }

        state.finish()
    }
}

/// Build the entity graph for one record with default settings.
#[must_use]
pub fn build_entity_graph(map: &FieldMap, record: &RawRecord) -> EntityGraph {
    GraphBuilder::new(map).build(record)
}

/// Mutable assembly state for one record.
struct BuildState<'a> {
    map: &'a FieldMap,
    disambiguation: Disambiguation,
    arena: EntityArena,
    canonical: IndexMap<EntityType, EntityId>,
    adhoc: IndexMap<(String, String), EntityId>,
    roots: Vec<EntityId>,
    manifestation: EntityId,
}

impl<'a> BuildState<'a> {
    fn new(map: &'a FieldMap, disambiguation: Disambiguation) -> Self {
        let mut arena = EntityArena::new();
        let record = arena.alloc(EntityType::Record);
        let manifestation = arena.alloc(EntityType::Manifestation);
        let expression = arena.alloc(EntityType::Expression);
        let work = arena.alloc(EntityType::Work);
        let item = arena.alloc(EntityType::Item);

        arena.set_property(
            manifestation,
            EXPRESSION_MANIFESTED,
            PropertyValue::Link(expression),
        );
        arena.set_property(expression, EXPRESSION_OF_WORK, PropertyValue::Link(work));
        arena.set_property(
            manifestation,
            EXEMPLAR_OF_MANIFESTATION,
            PropertyValue::Link(item),
        );

        let mut canonical = IndexMap::new();
        canonical.insert(EntityType::Record, record);
        canonical.insert(EntityType::Manifestation, manifestation);
        canonical.insert(EntityType::Expression, expression);
        canonical.insert(EntityType::Work, work);
        canonical.insert(EntityType::Item, item);

        BuildState {
            map,
            disambiguation,
            arena,
            canonical,
            adhoc: IndexMap::new(),
            roots: vec![record],
            manifestation,
        }
    }

    /// Resolve the entity a value belongs to, creating ad hoc entities on
    /// demand.
    ///
    /// Canonical types resolve to their singleton. An ad hoc type reuses
    /// the arena entry under its (type, disambiguation key); a newly
    /// created ad hoc entity is attached to the Manifestation under `rel`
    /// when a relation name is supplied, else appended to the top-level
    /// list.
    fn get_entity(
        &mut self,
        entity_type: Option<&EntityType>,
        rel: Option<&str>,
        occurrence: &str,
    ) -> EntityId {
        let entity_type = entity_type.cloned().unwrap_or(EntityType::Record);
        if let Some(&id) = self.canonical.get(&entity_type) {
            return id;
        }

        let key = match self.disambiguation {
            Disambiguation::Conflate => String::new(),
            Disambiguation::ByFieldOccurrence => occurrence.to_string(),
        };
        let index_key = (entity_type.as_str().to_string(), key);
        if let Some(&id) = self.adhoc.get(&index_key) {
            return id;
        }

        let id = self.arena.alloc(entity_type);
        self.adhoc.insert(index_key, id);
        match rel {
            Some(rel) => self.arena.push_relation(self.manifestation, rel, id),
            None => self.roots.push(id),
        }
        id
    }

    /// Write each decoded column onto its declared entity.
    ///
    /// Values decoded without identifier resolution (for example by a prior
    /// in-place decoration pass) are resolved here, so graph output does
    /// not depend on how the record was decorated.
    fn process_fixed_value(&mut self, value: &FixedFieldValue, occurrence: &str) {
        for (prop, column) in &value.columns {
            let entity = self.get_entity(column.entity.as_ref(), None, occurrence);
            let id = column.id.clone().or_else(|| {
                self.map
                    .fixprop(prop, &column.code)
                    .and_then(|entry| entry.id.clone())
            });
            let property = match id {
                Some(id) => PropertyValue::Identifier(id),
                None => PropertyValue::Text(column.code.clone()),
            };
            self.arena.set_property(entity, prop.clone(), property);
        }
    }

    fn process_fixed_field(
        &mut self,
        tag: &str,
        row: &Row,
        dfn: &FieldDefinition,
        leader: &FixedFieldValue,
        occurrence: &str,
    ) {
        match row {
            Row::Fixed(text) => {
                if let Some(value) =
                    decode_fixed_field(tag, text, dfn, leader, self.map, DecodeMode::Resolved)
                {
                    self.process_fixed_value(&value, occurrence);
                }
            }
            Row::Decoded(value) => self.process_fixed_value(value, occurrence),
            Row::Variable(_) => {}
        }
    }

    /// Route a variable row's subfield values onto their declared entities.
    ///
    /// Indicator values and subfields without a schema entry have no entity
    /// target and do not appear in graph output.
    fn process_row(&mut self, row: &Row, dfn: &FieldDefinition, occurrence: &str) {
        let Some(var) = row.as_variable() else {
            return;
        };
        if dfn.is_fixed_length() || dfn.subfield.is_none() {
            return;
        }

        let rel = dfn.id.clone();
        for subfield in &var.subfields {
            let Some(subdfn) = dfn.subfield(subfield.code) else {
                continue;
            };
            let key = subfield_key(subfield.code, subdfn);
            let entity = self.get_entity(subdfn.entity.as_ref(), rel.as_deref(), occurrence);
            self.arena.accumulate_property(
                entity,
                key,
                PropertyValue::Text(subfield.value.clone()),
                subdfn.repeatable,
            );
        }
    }

    fn finish(mut self) -> EntityGraph {
        let record = self.roots[0];
        self.arena
            .set_property(record, DESCRIBES, PropertyValue::Link(self.manifestation));
        EntityGraph {
            arena: self.arena,
            roots: self.roots,
        }
    }
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
                        {"offset": 6, "length": 1, "propRef": "typeOfRecord", "entity": "Work"},
                        {"offset": 7, "length": 1, "propRef": "bibLevel"}
                    ]
                }]
            },
            "008": {
                "fixmaps": [{
                    "name": "Books",
                    "matchRecTypeBibLevel": ["am"],
                    "columns": [
                        {"offset": 7, "length": 4, "propRef": "yearTime1", "entity": "PublicationEvent"},
                        {"offset": 35, "length": 3, "propRef": "language", "entity": "Expression"}
                    ]
                }]
            },
            "245": {
                "id": "titleStatement",
                "repeatable": false,
                "subfield": {
                    "a": {"id": "titleProper", "entity": "Expression", "repeatable": false},
                    "c": {"id": "statementOfResponsibility", "entity": "Expression"}
                }
            },
            "650": {
                "id": "subjectAddedEntry",
                "subfield": {
                    "a": {"id": "topicalTerm", "entity": "Concept"}
                }
            },
            "035": {
                "id": "systemControlNumber",
                "subfield": {
                    "a": {"id": "controlNumber"}
                }
            },
            "fixprops": {
                "typeOfRecord": {"a": {"id": "LanguageMaterial"}}
            }
        }))
        .unwrap()
    }

    fn sample_record() -> RawRecord {
        RawRecord::from_value(&json!({
            "leader": "00081cam a22000494a 4500",
            "fields": [
                {"008": "020409s2002    enk           000 0 eng  "},
                {"035": {"ind1": " ", "ind2": " ", "subfields": [{"a": "9914523"}]}},
                {"245": {"ind1": "1", "ind2": " ", "subfields": [
                    {"a": "Moby Dick"},
                    {"c": "Herman Melville"}
                ]}},
                {"650": {"ind1": " ", "ind2": "0", "subfields": [{"a": "Whales"}]}},
                {"650": {"ind1": " ", "ind2": "0", "subfields": [{"a": "Ships"}]}},
                {"999": {"ind1": " ", "ind2": " ", "subfields": [{"a": "local"}]}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_canonical_entities_appear_exactly_once() {
        let map = sample_map();
        let graph = build_entity_graph(&map, &sample_record());
        for name in ["Record", "Manifestation", "Expression", "Work", "Item"] {
            let count = graph
                .arena()
                .iter()
                .filter(|e| e.entity_type.as_str() == name)
                .count();
            assert_eq!(count, 1, "expected one {name}");
        }
    }

    #[test]
    fn test_every_entity_has_declared_type() {
        let map = sample_map();
        let graph = build_entity_graph(&map, &sample_record());
        for entity in graph.arena().iter() {
            assert!(!entity.entity_type.as_str().is_empty());
        }
    }

    #[test]
    fn test_leader_identifier_lands_on_work() {
        let map = sample_map();
        let graph = build_entity_graph(&map, &sample_record());
        let value = graph.to_value();
        let record = &value[0];
        assert_eq!(record["type"], "Record");
        // typeOfRecord targets Work; its code resolves through fixprops.
        let work = &record["describes"]["expressionManifested"]["expressionOfWork"];
        assert_eq!(work["typeOfRecord"], json!({"id": "LanguageMaterial"}));
        // bibLevel has no entity target and no fixprop entry: plain code on
        // the Record.
        assert_eq!(record["bibLevel"], "m");
    }

    #[test]
    fn test_subfields_land_on_declared_entities() {
        let map = sample_map();
        let graph = build_entity_graph(&map, &sample_record());
        let value = graph.to_value();
        let expression = &value[0]["describes"]["expressionManifested"];
        assert_eq!(expression["titleProper"], "Moby Dick");
        assert_eq!(
            expression["statementOfResponsibility"],
            json!(["Herman Melville"])
        );
        assert_eq!(expression["language"], "eng");
    }

    #[test]
    fn test_adhoc_entity_attaches_under_relation() {
        let map = sample_map();
        let graph = build_entity_graph(&map, &sample_record());
        let value = graph.to_value();
        let concepts = &value[0]["describes"]["subjectAddedEntry"];
        let list = concepts.as_array().unwrap();
        // Default conflation: both 650s feed one Concept entity.
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["type"], "Concept");
        assert_eq!(list[0]["topicalTerm"], json!(["Whales", "Ships"]));
    }

    #[test]
    fn test_by_field_occurrence_keeps_entities_distinct() {
        let map = sample_map();
        let graph = GraphBuilder::new(&map)
            .with_disambiguation(Disambiguation::ByFieldOccurrence)
            .build(&sample_record());
        let value = graph.to_value();
        let list = value[0]["describes"]["subjectAddedEntry"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["topicalTerm"], json!(["Whales"]));
        assert_eq!(list[1]["topicalTerm"], json!(["Ships"]));
    }

    #[test]
    fn test_unknown_tag_is_skipped_not_fatal() {
        let map = sample_map();
        let graph = build_entity_graph(&map, &sample_record());
        // Tag 999 has no definition; the build still completes and no
        // entity carries its value.
        let text = graph.to_value().to_string();
        assert!(!text.contains("local"));
    }

    #[test]
    fn test_subfield_without_entity_lands_on_record() {
        let map = sample_map();
        let graph = build_entity_graph(&map, &sample_record());
        let value = graph.to_value();
        assert_eq!(value[0]["controlNumber"], json!(["9914523"]));
    }

    #[test]
    fn test_publication_event_in_top_level_list() {
        let map = sample_map();
        let graph = build_entity_graph(&map, &sample_record());
        let value = graph.to_value();
        let list = value.as_array().unwrap();
        // yearTime1 declares an ad hoc PublicationEvent with no relation
        // name, so it joins the top-level list after the Record.
        assert_eq!(list.len(), 2);
        assert_eq!(list[1]["type"], "PublicationEvent");
        assert_eq!(list[1]["yearTime1"], "2002");
    }

    #[test]
    fn test_decorated_record_builds_same_graph() {
        let map = sample_map();
        let mut decorated = sample_record();
        crate::fixedfield::expand_fixed_fields(&map, &mut decorated, false);
        let from_raw = build_entity_graph(&map, &sample_record()).to_value();
        let from_decorated = build_entity_graph(&map, &decorated).to_value();
        assert_eq!(from_raw, from_decorated);
    }
}
