//! Subcommand implementations

pub mod run;
pub mod translate;

use anyhow::{Context, Result};
use moorage_query::ModelRegistry;
use moorage_store::StageThreeQuery;
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Read a JSON file, or stdin when the path is `-`
pub fn read_json(path: &Path) -> Result<Value> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))
}

pub fn load_query(path: &Path) -> Result<StageThreeQuery> {
    serde_json::from_value(read_json(path)?)
        .with_context(|| format!("{} is not a stage-three query", path.display()))
}

pub fn load_registry(path: &Path) -> Result<ModelRegistry> {
    serde_json::from_value(read_json(path)?)
        .with_context(|| format!("{} is not a model registry", path.display()))
}

/// Render JSON output, compact or pretty
pub fn render(value: &Value, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}
