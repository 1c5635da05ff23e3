//! Planning: stage-three query -> native request, without touching a store.

use crate::error::{AdapterError, AdapterResult};
use crate::query::{QueryMethod, StageThreeQuery};
use bson::{doc, Bson, Document};
use moorage_query::{
    build_reduction_pipeline, normalize_for_write, normalize_where, ModelRegistry, ModelSchema,
    ReductionKind, ReductionPipeline, TranslateOptions,
};
use tracing::debug;

/// A native request ready for a [`StoreExecutor`](crate::StoreExecutor)
#[derive(Debug, Clone, PartialEq)]
pub enum NativeRequest {
    Find {
        collection: String,
        filter: Document,
    },
    Aggregate {
        collection: String,
        pipeline: ReductionPipeline,
    },
    Insert {
        collection: String,
        document: Document,
    },
}

impl NativeRequest {
    pub fn collection(&self) -> &str {
        match self {
            NativeRequest::Find { collection, .. }
            | NativeRequest::Aggregate { collection, .. }
            | NativeRequest::Insert { collection, .. } => collection,
        }
    }

    /// The request in database command form, e.g.
    /// `{ "aggregate": "pet", "pipeline": [..] }`
    pub fn to_command(&self) -> Document {
        match self {
            NativeRequest::Find { collection, filter } => {
                doc! { "find": collection.as_str(), "filter": filter.clone() }
            }
            NativeRequest::Aggregate {
                collection,
                pipeline,
            } => {
                let stages: Vec<Bson> = pipeline
                    .stages()
                    .iter()
                    .cloned()
                    .map(Bson::Document)
                    .collect();
                doc! { "aggregate": collection.as_str(), "pipeline": stages }
            }
            NativeRequest::Insert {
                collection,
                document,
            } => {
                doc! { "insert": collection.as_str(), "documents": [document.clone()] }
            }
        }
    }
}

/// Look up the schema a query is addressed to
pub fn resolve_schema<'r>(
    registry: &'r ModelRegistry,
    query: &StageThreeQuery,
) -> AdapterResult<&'r ModelSchema> {
    registry
        .get(&query.using)
        .ok_or_else(|| AdapterError::unknown_model(&query.using))
}

/// Plan `query` according to its own method
pub fn plan(
    query: &StageThreeQuery,
    registry: &ModelRegistry,
    options: &TranslateOptions,
) -> AdapterResult<NativeRequest> {
    let schema = resolve_schema(registry, query)?;
    let collection = query.using.clone();
    let request = match (query.method, query.method.reduction()) {
        (QueryMethod::Create, _) => NativeRequest::Insert {
            collection,
            document: plan_create(query, schema, options)?,
        },
        (_, Some(kind)) => NativeRequest::Aggregate {
            collection,
            pipeline: plan_reduction(query, schema, options, kind)?,
        },
        _ => NativeRequest::Find {
            collection,
            filter: plan_find(query, schema, options)?,
        },
    };

    debug!(method = %query.method, model = %query.using, "planned query");
    Ok(request)
}

/// Native filter for `criteria.where`
pub fn plan_find(
    query: &StageThreeQuery,
    schema: &ModelSchema,
    options: &TranslateOptions,
) -> AdapterResult<Document> {
    Ok(normalize_where(&query.criteria.where_clause, schema, options)?)
}

/// Plan a reduction of kind `kind`.
///
/// `count` needs no attribute; every other kind reads `numericAttrName`,
/// mapped to the native key when it names the primary key.
pub fn plan_reduction(
    query: &StageThreeQuery,
    schema: &ModelSchema,
    options: &TranslateOptions,
    kind: ReductionKind,
) -> AdapterResult<ReductionPipeline> {
    let attribute = match (&query.numeric_attr_name, kind) {
        (Some(attribute), _) => attribute.as_str(),
        (None, ReductionKind::Count) => schema.primary_key.as_str(),
        (None, _) => {
            return Err(AdapterError::MissingAttribute {
                method: kind.as_str(),
                field: "numericAttrName",
            })
        }
    };
    let native_attribute = if schema.is_primary_key(attribute) {
        options.native_key.as_str()
    } else {
        attribute
    };

    let filter = plan_find(query, schema, options)?;
    Ok(build_reduction_pipeline(filter, native_attribute, kind))
}

/// Native document for `newRecord`
pub fn plan_create(
    query: &StageThreeQuery,
    schema: &ModelSchema,
    options: &TranslateOptions,
) -> AdapterResult<Document> {
    let record = query
        .new_record
        .clone()
        .ok_or(AdapterError::MissingAttribute {
            method: "create",
            field: "newRecord",
        })?;

    Ok(normalize_for_write(record, schema, options)?)
}
