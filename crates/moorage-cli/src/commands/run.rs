use anyhow::{bail, Context, Result};
use moorage_query::TranslateOptions;
use moorage_store::{Adapter, MemoryStore, QueryMethod, StageThreeQuery};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{load_query, load_registry, read_json, render};

/// Run one query against an in-memory store and return its output as JSON
pub async fn execute(
    query_path: &Path,
    models_path: &Path,
    data_path: Option<&Path>,
    options: &TranslateOptions,
    pretty: bool,
) -> Result<String> {
    let query = load_query(query_path)?;
    let registry = Arc::new(load_registry(models_path)?);
    let store = Arc::new(MemoryStore::with_key(options.native_key.as_str()));
    let adapter = Adapter::new(store, registry).with_options(options.clone());

    if let Some(path) = data_path {
        let seeded = seed(&adapter, read_json(path)?).await?;
        info!(records = seeded, "seeded in-memory store");
    }

    let output = adapter.run(&query).await?;
    debug!(method = %query.method, "query complete");
    render(&serde_json::to_value(output)?, pretty)
}

/// Create every seed record through the adapter so it is normalized like any
/// other write
async fn seed(adapter: &Adapter, data: Value) -> Result<usize> {
    let Value::Object(models) = data else {
        bail!("seed data must be an object mapping model identity to records");
    };

    let mut seeded = 0;
    for (model, records) in models {
        let Value::Array(records) = records else {
            bail!("seed data for `{}` must be an array", model);
        };

        for record in records {
            let Value::Object(record) = record else {
                bail!("seed records for `{}` must be objects", model);
            };
            let query = StageThreeQuery::new(QueryMethod::Create, model.as_str())
                .with_new_record(record);
            adapter
                .create(&query)
                .await
                .with_context(|| format!("Failed to seed `{}`", model))?;
            seeded += 1;
        }
    }

    Ok(seeded)
}
