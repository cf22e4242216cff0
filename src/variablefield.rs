//! Variable-field decoding into named properties.
//!
//! A variable field's row carries two indicator characters and an ordered
//! subfield sequence. The field definition resolves indicators through
//! their enumerations and subfield codes to registered output keys, with
//! repeatability governing whether values accumulate into ordered
//! sequences or overwrite.

use crate::fieldmap::{FieldDefinition, IndicatorMap, SubfieldDefinition};
use crate::record::{Row, BLANK};
use serde_json::{Map, Value};

/// Output key for a subfield: the registered id, or a composite of the raw
/// code and its label so unregistered codes stay unique and traceable.
#[must_use]
pub fn subfield_key(code: char, dfn: &SubfieldDefinition) -> String {
    match &dfn.id {
        Some(id) => id.clone(),
        None => format!("[{code}] {}", dfn.label().unwrap_or("")),
    }
}

/// Accumulate a value under a key with the repeatable rule.
///
/// Repeatable keys hold an ordered sequence from the first occurrence on,
/// so a single value is already queryable as a singleton sequence and later
/// appends lose nothing. Non-repeatable keys overwrite.
pub fn accumulate(out: &mut Map<String, Value>, key: String, value: Value, repeatable: bool) {
    if !repeatable {
        out.insert(key, value);
        return;
    }
    match out.get_mut(&key) {
        Some(Value::Array(list)) => list.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            out.insert(key, Value::Array(vec![value]));
        }
    }
}

fn resolve_indicator(
    out: &mut Map<String, Value>,
    map: Option<&IndicatorMap>,
    ind: char,
    default_key: &str,
) {
    if ind == BLANK {
        return;
    }
    let repr = ind.to_string();
    let resolved = map
        .and_then(|m| m.resolve(ind))
        .and_then(|entry| entry.id.clone());
    let key = map
        .and_then(|m| m.id.clone())
        .unwrap_or_else(|| default_key.to_string());
    out.insert(key, Value::String(resolved.unwrap_or(repr)));
}

/// Decode a variable row into a named-property object.
///
/// Returns `None` for rows this decoder does not apply to — plain-string
/// rows, fixed-length definitions, or definitions without a subfield table;
/// the caller keeps the raw row in those cases.
#[must_use]
pub fn raw_row_to_named_row(dfn: &FieldDefinition, row: &Row) -> Option<Map<String, Value>> {
    let var = row.as_variable()?;
    if dfn.is_fixed_length() || dfn.subfield.is_none() {
        return None;
    }

    let mut out = Map::new();
    resolve_indicator(&mut out, dfn.ind1.as_ref(), var.ind1, "ind1");
    resolve_indicator(&mut out, dfn.ind2.as_ref(), var.ind2, "ind2");

    for subfield in &var.subfields {
        let subdfn = dfn.subfield(subfield.code);
        let key = match subdfn {
            Some(sd) => subfield_key(subfield.code, sd),
            None => subfield.code.to_string(),
        };
        let repeatable = subdfn.map_or(true, |sd| sd.repeatable);
        accumulate(
            &mut out,
            key,
            Value::String(subfield.value.clone()),
            repeatable,
        );
    }
    Some(out)
}
