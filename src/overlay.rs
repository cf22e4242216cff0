//! Overlay schema: display/edit groupings layered over the field map.
//!
//! An overlay declares, per logical entity, named groups of tags or
//! tag+subtag paths, plus tag-level extensions (default subfield codes for
//! newly added fields, indicator-widget overrides). It is independent of
//! the core field map and never required: a referenced entity, group, or
//! tag the overlay does not define simply yields empty output.
//!
//! ```json
//! {
//!   "entities": {
//!     "work": {
//!       "titles": ["245", "246"],
//!       "dates": [{"008": ["yearTime1", "yearTime2"]}]
//!     }
//!   },
//!   "extend": {
//!     "245": {"defaultCodes": ["a", "b"], "ind1": {"type": "plain"}}
//!   }
//! }
//! ```

use crate::error::{MapError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Widget classification for one indicator position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorStyle {
    /// Undefined indicator, not shown.
    Hidden,
    /// Enumerated values, shown as a selection.
    Select,
    /// Free text.
    Plain,
}

/// Overlay override for one indicator position.
#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorOverride {
    /// The widget style to use instead of the inferred one.
    #[serde(rename = "type")]
    pub style: IndicatorStyle,
}

/// Tag-level overlay extension.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagExtension {
    /// Subfield codes a newly added field starts with.
    #[serde(default, rename = "defaultCodes")]
    pub default_codes: Vec<String>,
    /// Subfield code the indicator widgets are shown with.
    #[serde(default, rename = "indicatorsFor")]
    pub indicators_for: Option<String>,
    /// First-indicator style override.
    #[serde(default)]
    pub ind1: Option<IndicatorOverride>,
    /// Second-indicator style override.
    #[serde(default)]
    pub ind2: Option<IndicatorOverride>,
}

/// One member of a group specification: a bare tag pulling every field
/// with that tag, or a tag+subtag path projecting named properties out of
/// a decoded fixed field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GroupEntry {
    /// All fields with this tag, in document order.
    Tag(String),
    /// Named properties projected from the first field with each tag.
    Path(IndexMap<String, Vec<String>>),
}

/// Named groups of group entries, per logical entity.
pub type GroupSpecs = IndexMap<String, IndexMap<String, Vec<GroupEntry>>>;

/// A loaded overlay document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Overlay {
    /// Entity name → group name → group specification.
    #[serde(default)]
    pub entities: GroupSpecs,
    /// Tag → extension.
    #[serde(default)]
    pub extend: IndexMap<String, TagExtension>,
}

impl Overlay {
    /// Parse an overlay from a JSON document value.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not have the overlay shape.
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| MapError::InvalidOverlay(e.to_string()))
    }

    /// Load an overlay from a JSON file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        Self::from_value(&value)
    }

    /// The extension for a tag, if declared.
    #[must_use]
    pub fn extension(&self, tag: &str) -> Option<&TagExtension> {
        self.extend.get(tag)
    }

    /// Default subfield codes for new fields of a tag. Falls back to `a`.
    #[must_use]
    pub fn default_codes(&self, tag: &str) -> Vec<char> {
        let declared: Vec<char> = self
            .extension(tag)
            .map(|ext| {
                ext.default_codes
                    .iter()
                    .filter_map(|code| code.chars().next())
                    .collect()
            })
            .unwrap_or_default();
        if declared.is_empty() {
            vec!['a']
        } else {
            declared
        }
    }
}
