use anyhow::Result;
use bson::Bson;
use moorage_query::TranslateOptions;
use moorage_store::plan;
use std::path::Path;
use tracing::debug;

use super::{load_query, load_registry, render};

/// Translate one query and return the native command as relaxed extended JSON
pub fn execute(
    query_path: &Path,
    models_path: &Path,
    options: &TranslateOptions,
    pretty: bool,
) -> Result<String> {
    let query = load_query(query_path)?;
    let registry = load_registry(models_path)?;
    debug!(models = registry.len(), method = %query.method, "translating");

    let request = plan(&query, &registry, options)?;
    let command = Bson::Document(request.to_command()).into_relaxed_extjson();
    render(&command, pretty)
}
