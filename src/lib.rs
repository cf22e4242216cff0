#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # marcmap: schema-driven MARC decoding
//!
//! A library for decoding raw MARC-style bibliographic records into a
//! normalized entity graph, driven entirely by an external field-map
//! schema.
//!
//! ## Quick Start
//!
//! ### Expanding fixed fields in place
//!
//! ```ignore
//! use marcmap::{expand_fixed_fields, FieldMap, RawRecord};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let map = FieldMap::load("etc/marcmap.json", Some("bib"))?;
//! let mut record = RawRecord::load("record.json")?;
//! expand_fixed_fields(&map, &mut record, true);
//! println!("{}", serde_json::to_string_pretty(&record)?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Building the entity graph
//!
//! ```ignore
//! use marcmap::{build_entity_graph, FieldMap, RawRecord};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let map = FieldMap::load("etc/marcmap.json", Some("bib"))?;
//! let record = RawRecord::load("record.json")?;
//! let graph = build_entity_graph(&map, &record);
//! println!("{}", graph.to_value());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`fieldmap`] — field-map schema types and loading
//! - [`overlay`] — overlay schema for display/edit groupings
//! - [`record`] — raw record structures and edit operations
//! - [`fixedfield`] — fixed-field decoding and reversible re-encoding
//! - [`variablefield`] — indicator and subfield decoding
//! - [`entity`] — entity graph output types
//! - [`graph`] — entity-graph assembly
//! - [`groups`] — overlay-driven field grouping
//! - [`named`] — flat raw/named conversion
//! - [`error`] — error types and result type

pub mod entity;
pub mod error;
pub mod fieldmap;
pub mod fixedfield;
pub mod graph;
pub mod groups;
pub mod named;
pub mod overlay;
pub mod record;
pub mod variablefield;

pub use entity::{Disambiguation, Entity, EntityArena, EntityId, PropertyValue};
pub use error::{MapError, Result};
pub use fieldmap::{
    ColumnDefinition, EntityType, EnumValue, FieldDefinition, FieldMap, FieldType, FixMap,
    FixProps, IndicatorMap, SubfieldDefinition,
};
pub use fixedfield::{
    decode_fixed_field, encode_fixed, expand_fixed_fields, parse_leader, ColumnValue, DecodeMode,
    FixedFieldKind, FixedFieldValue,
};
pub use graph::{build_entity_graph, EntityGraph, GraphBuilder};
pub use groups::{
    create_entity_groups, decorate_definition, indicator_style, widget_kind, EntityGroups,
    FieldSlot, FieldUi, GroupMember, WidgetKind,
};
pub use named::raw_to_named;
pub use overlay::{GroupEntry, IndicatorStyle, Overlay, TagExtension};
pub use record::{LeaderSlot, RawField, RawRecord, Row, Subfield, VariableRow};
pub use variablefield::raw_row_to_named_row;
