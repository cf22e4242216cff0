//! Entity graph output types.
//!
//! The graph builder produces a set of entities held in an arena and linked
//! by id. The five canonical FRBR-like roles (Record, Manifestation,
//! Expression, Work, Item) are singletons per graph; ad hoc entity types
//! declared by field definitions are created on first reference and indexed
//! by (type, disambiguation key).
//!
//! The disambiguation key derivation is pluggable: the default
//! [`Disambiguation::Conflate`] reuses one entity per ad hoc type (first
//! seen wins), matching long-standing converter behavior where two distinct
//! same-typed entities conflate. [`Disambiguation::ByFieldOccurrence`] opts
//! into stricter identity keyed by the originating field occurrence.

use crate::fieldmap::EntityType;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Handle to an entity in an [`EntityArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(usize);

/// A property value on an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Plain text value.
    Text(String),
    /// Resolved semantic identifier, serialized as `{"id": ...}`.
    Identifier(String),
    /// Ordered sequence of values.
    List(Vec<PropertyValue>),
    /// Reference to another entity, serialized as the nested entity.
    Link(EntityId),
}

/// One graph node: a typed bag of properties.
#[derive(Debug, Clone)]
pub struct Entity {
    /// The entity's declared type.
    pub entity_type: EntityType,
    /// Properties in assignment order.
    pub properties: IndexMap<String, PropertyValue>,
}

/// How ad hoc entities of the same type are told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disambiguation {
    /// One entity per ad hoc type; every reference to the type resolves to
    /// the first-created instance.
    #[default]
    Conflate,
    /// One entity per (type, originating field occurrence), so repeated
    /// fields yield distinct entities.
    ByFieldOccurrence,
}

/// Arena of entities indexed by (type, disambiguation key).
#[derive(Debug, Default)]
pub struct EntityArena {
    entities: Vec<Entity>,
}

impl EntityArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        EntityArena::default()
    }

    /// Allocate a new entity of the given type.
    pub fn alloc(&mut self, entity_type: EntityType) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(Entity {
            entity_type,
            properties: IndexMap::new(),
        });
        id
    }

    /// Borrow an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    /// Mutably borrow an entity.
    pub fn get_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0]
    }

    /// Iterate over all entities in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Number of allocated entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the arena holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Set a property, overwriting any previous value.
    pub fn set_property(&mut self, id: EntityId, key: impl Into<String>, value: PropertyValue) {
        self.get_mut(id).properties.insert(key.into(), value);
    }

    /// Add a value under a key with the repeatable rule: repeatable keys
    /// hold an ordered sequence from the first occurrence on,
    /// non-repeatable keys overwrite.
    pub fn accumulate_property(
        &mut self,
        id: EntityId,
        key: impl Into<String>,
        value: PropertyValue,
        repeatable: bool,
    ) {
        let key = key.into();
        let properties = &mut self.get_mut(id).properties;
        if !repeatable {
            properties.insert(key, value);
            return;
        }
        match properties.get_mut(&key) {
            Some(PropertyValue::List(list)) => list.push(value),
            Some(existing) => {
                let first = existing.clone();
                *existing = PropertyValue::List(vec![first, value]);
            }
            None => {
                properties.insert(key, PropertyValue::List(vec![value]));
            }
        }
    }

    /// Append a link to the sequence stored under `rel`.
    pub fn push_relation(&mut self, id: EntityId, rel: impl Into<String>, target: EntityId) {
        let rel = rel.into();
        let properties = &mut self.get_mut(id).properties;
        match properties.get_mut(&rel) {
            Some(PropertyValue::List(list)) => list.push(PropertyValue::Link(target)),
            Some(existing) => {
                let first = existing.clone();
                *existing = PropertyValue::List(vec![first, PropertyValue::Link(target)]);
            }
            None => {
                properties.insert(rel, PropertyValue::List(vec![PropertyValue::Link(target)]));
            }
        }
    }

    /// Serialize an entity as a nested JSON document, resolving links into
    /// nested entities.
    #[must_use]
    pub fn to_value(&self, id: EntityId) -> Value {
        let entity = self.get(id);
        let mut out = Map::new();
        out.insert(
            "type".to_string(),
            Value::String(entity.entity_type.as_str().to_string()),
        );
        for (key, value) in &entity.properties {
            out.insert(key.clone(), self.property_to_value(value));
        }
        Value::Object(out)
    }

    fn property_to_value(&self, value: &PropertyValue) -> Value {
        match value {
            PropertyValue::Text(text) => Value::String(text.clone()),
            PropertyValue::Identifier(ident) => {
                let mut obj = Map::new();
                obj.insert("id".to_string(), Value::String(ident.clone()));
                Value::Object(obj)
            }
            PropertyValue::List(list) => {
                Value::Array(list.iter().map(|v| self.property_to_value(v)).collect())
            }
            PropertyValue::Link(target) => self.to_value(*target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_serialization_resolves_links() {
        let mut arena = EntityArena::new();
        let record = arena.alloc(EntityType::Record);
        let manifestation = arena.alloc(EntityType::Manifestation);
        arena.set_property(record, "describes", PropertyValue::Link(manifestation));
        arena.set_property(
            manifestation,
            "title",
            PropertyValue::Text("Moby Dick".to_string()),
        );

        assert_eq!(
            arena.to_value(record),
            json!({
                "type": "Record",
                "describes": {"type": "Manifestation", "title": "Moby Dick"}
            })
        );
    }

    #[test]
    fn test_identifier_serializes_as_object() {
        let mut arena = EntityArena::new();
        let work = arena.alloc(EntityType::Work);
        arena.set_property(
            work,
            "contentType",
            PropertyValue::Identifier("LanguageMaterial".to_string()),
        );
        assert_eq!(
            arena.to_value(work),
            json!({"type": "Work", "contentType": {"id": "LanguageMaterial"}})
        );
    }

    #[test]
    fn test_accumulate_builds_singleton_then_appends() {
        let mut arena = EntityArena::new();
        let work = arena.alloc(EntityType::Work);
        arena.accumulate_property(work, "subject", PropertyValue::Text("whales".into()), true);
        assert_eq!(
            arena.to_value(work),
            json!({"type": "Work", "subject": ["whales"]})
        );

        arena.accumulate_property(work, "subject", PropertyValue::Text("ships".into()), true);
        assert_eq!(
            arena.to_value(work),
            json!({"type": "Work", "subject": ["whales", "ships"]})
        );
    }

    #[test]
    fn test_non_repeatable_overwrites() {
        let mut arena = EntityArena::new();
        let work = arena.alloc(EntityType::Work);
        arena.accumulate_property(work, "lang", PropertyValue::Text("swe".into()), false);
        arena.accumulate_property(work, "lang", PropertyValue::Text("eng".into()), false);
        assert_eq!(arena.to_value(work), json!({"type": "Work", "lang": "eng"}));
    }

    #[test]
    fn test_push_relation_appends_links() {
        let mut arena = EntityArena::new();
        let manifestation = arena.alloc(EntityType::Manifestation);
        let event = arena.alloc(EntityType::from("PublicationEvent".to_string()));
        let event2 = arena.alloc(EntityType::from("PublicationEvent".to_string()));
        arena.push_relation(manifestation, "publication", event);
        arena.push_relation(manifestation, "publication", event2);

        let value = arena.to_value(manifestation);
        assert_eq!(value["publication"].as_array().unwrap().len(), 2);
        assert_eq!(value["publication"][0]["type"], "PublicationEvent");
    }
}
