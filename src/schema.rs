// src/schema.rs

use std::{fs, path::PathBuf};

use anyhow::{Context, Error};
use schemars::schema_for;
use tracing::info;

use crate::bridge::FlowTrigger;
use crate::services::LocationSample;
use crate::surface::Screen;

/// The entry point invoked by `main.rs` for `Commands::Schema`: write a
/// JSON Schema per public wire type into `out_dir`.
pub fn write_schema(out_dir: PathBuf) -> Result<(), Error> {
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let schemas = [
        ("flow_trigger.schema.json", schema_for!(FlowTrigger)),
        ("screen.schema.json", schema_for!(Screen)),
        ("location_sample.schema.json", schema_for!(LocationSample)),
    ];
    for (file, schema) in schemas {
        let json = serde_json::to_string_pretty(&schema)?;
        fs::write(out_dir.join(file), json)?;
        info!(%file, "schema written");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_schemas_are_written_and_parse() {
        let dir = tempdir().unwrap();
        write_schema(dir.path().to_path_buf()).unwrap();

        for file in [
            "flow_trigger.schema.json",
            "screen.schema.json",
            "location_sample.schema.json",
        ] {
            let raw = fs::read_to_string(dir.path().join(file)).unwrap();
            let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert!(parsed.is_object());
        }
    }
}
