//! Command-line driver for the marcmap pipelines.
//!
//! ```text
//! marcmap MARCMAP_FILE [RECORD_TYPE] MARC_JSON_FILE [-n | -f | OVERLAY_FILE]
//! ```
//!
//! With no mode argument the record is printed with fixed fields expanded
//! in place; `-n` prints the flat named object, `-f` the entity graph, and
//! an overlay path the assembled entity groups. Diagnostics go to stderr,
//! the resulting document to stdout.

use anyhow::Result;
use marcmap::{
    build_entity_graph, create_entity_groups, expand_fixed_fields, raw_to_named, FieldMap,
    Overlay, RawRecord,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "USAGE: marcmap MARCMAP_FILE [RECORD_TYPE] MARC_JSON_FILE [-n | -f | OVERLAY_FILE]";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        println!("{USAGE}");
        return Ok(());
    }

    let map_text = std::fs::read_to_string(&args[0])?;
    let document: Value = serde_json::from_str(&map_text)?;

    // A record-type argument is recognized by naming a sub-map of the
    // loaded document.
    let (submap, rest) = match document.get(args[1].as_str()) {
        Some(sub) => (sub, &args[2..]),
        None => (&document, &args[1..]),
    };
    let map = FieldMap::from_value(submap)?;

    let Some(record_path) = rest.first() else {
        println!("{USAGE}");
        return Ok(());
    };
    let mut record = RawRecord::load(record_path)?;

    let out = match rest.get(1).map(String::as_str) {
        Some("-n") => Value::Object(raw_to_named(&map, &record)?),
        Some("-f") => build_entity_graph(&map, &record).to_value(),
        Some(overlay_path) => {
            let overlay = Overlay::load(overlay_path)?;
            let groups = create_entity_groups(&map, &overlay, &mut record);
            groups.to_value(&record)
        }
        None => {
            expand_fixed_fields(&map, &mut record, false);
            serde_json::to_value(&record)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
