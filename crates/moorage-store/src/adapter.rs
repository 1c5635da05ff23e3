//! Adapter: runs stage-three queries against a store executor.

use crate::error::AdapterResult;
use crate::executor::StoreExecutor;
use crate::plan::{plan_create, plan_find, plan_reduction, resolve_schema};
use crate::query::{QueryMethod, StageThreeQuery};
use bson::{Bson, Document};
use moorage_query::{
    normalize_for_read, to_generic, ModelRegistry, ModelSchema, Record, ReductionKind,
    TranslateOptions,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Result of [`Adapter::run`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Records(Vec<Record>),
    Record(Record),
    Value(Value),
}

/// Runs stage-three queries for the models in a registry.
///
/// The registry and executor are shared; an adapter is cheap to clone.
#[derive(Clone)]
pub struct Adapter {
    executor: Arc<dyn StoreExecutor>,
    registry: Arc<ModelRegistry>,
    options: TranslateOptions,
}

impl Adapter {
    pub fn new(executor: Arc<dyn StoreExecutor>, registry: Arc<ModelRegistry>) -> Self {
        Self {
            executor,
            registry,
            options: TranslateOptions::default(),
        }
    }

    /// Builder-style: set translation options
    #[must_use]
    pub fn with_options(mut self, options: TranslateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &TranslateOptions {
        &self.options
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Dispatch on the query's own method
    pub async fn run(&self, query: &StageThreeQuery) -> AdapterResult<QueryOutput> {
        let output = match query.method {
            QueryMethod::Find => QueryOutput::Records(self.find(query).await?),
            QueryMethod::Create => QueryOutput::Record(self.create(query).await?),
            QueryMethod::Count => QueryOutput::Value(Value::from(self.count(query).await?)),
            QueryMethod::Sum => QueryOutput::Value(self.sum(query).await?),
            QueryMethod::Avg => QueryOutput::Value(self.avg(query).await?),
            QueryMethod::Min => QueryOutput::Value(self.min(query).await?),
            QueryMethod::Max => QueryOutput::Value(self.max(query).await?),
        };
        Ok(output)
    }

    /// Records matching `criteria.where`
    pub async fn find(&self, query: &StageThreeQuery) -> AdapterResult<Vec<Record>> {
        let schema = self.schema(query)?;
        let filter = plan_find(query, schema, &self.options)?;

        let documents = self.executor.find(&query.using, filter).await?;
        debug!(model = %query.using, found = documents.len(), "find");

        Ok(documents
            .into_iter()
            .map(|document| normalize_for_read(document, schema, &self.options))
            .collect())
    }

    /// Number of records matching `criteria.where`
    pub async fn count(&self, query: &StageThreeQuery) -> AdapterResult<u64> {
        let count = match self.reduce(query, ReductionKind::Count).await? {
            Bson::Int32(n) => u64::try_from(n).unwrap_or(0),
            Bson::Int64(n) => u64::try_from(n).unwrap_or(0),
            Bson::Double(n) if n >= 0.0 => n as u64,
            _ => 0,
        };
        Ok(count)
    }

    /// Sum of `numericAttrName` over matching records; `0` when none match
    pub async fn sum(&self, query: &StageThreeQuery) -> AdapterResult<Value> {
        self.reduce_generic(query, ReductionKind::Sum).await
    }

    /// Mean of `numericAttrName` over matching records; `null` when none match
    pub async fn avg(&self, query: &StageThreeQuery) -> AdapterResult<Value> {
        self.reduce_generic(query, ReductionKind::Avg).await
    }

    pub async fn min(&self, query: &StageThreeQuery) -> AdapterResult<Value> {
        self.reduce_generic(query, ReductionKind::Min).await
    }

    pub async fn max(&self, query: &StageThreeQuery) -> AdapterResult<Value> {
        self.reduce_generic(query, ReductionKind::Max).await
    }

    /// Insert `newRecord` and return it as stored
    pub async fn create(&self, query: &StageThreeQuery) -> AdapterResult<Record> {
        let schema = self.schema(query)?;
        let document = plan_create(query, schema, &self.options)?;

        let stored: Document = self.executor.insert(&query.using, document).await?;
        debug!(model = %query.using, "created record");
        Ok(normalize_for_read(stored, schema, &self.options))
    }

    async fn reduce_generic(
        &self,
        query: &StageThreeQuery,
        kind: ReductionKind,
    ) -> AdapterResult<Value> {
        Ok(to_generic(self.reduce(query, kind).await?))
    }

    async fn reduce(&self, query: &StageThreeQuery, kind: ReductionKind) -> AdapterResult<Bson> {
        let schema = self.schema(query)?;
        let pipeline = plan_reduction(query, schema, &self.options, kind)?;

        let rows = self
            .executor
            .aggregate(&query.using, pipeline.stages().to_vec())
            .await?;
        if rows.is_empty() {
            debug!(model = %query.using, %kind, "no rows matched, using identity");
        }
        Ok(pipeline.extract(&rows))
    }

    fn schema(&self, query: &StageThreeQuery) -> AdapterResult<&ModelSchema> {
        resolve_schema(&self.registry, query)
    }
}
