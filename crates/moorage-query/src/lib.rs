//! Composable query translation for MongoDB-style document stores.
//!
//! Turns storage-agnostic stage-three queries into the store's native
//! dialect:
//!
//! - [`Filter`] trees (or raw `where` JSON) become native filter documents
//!   via [`normalize_filter`] / [`normalize_where`]
//! - scalar reductions become two-stage pipelines via
//!   [`build_reduction_pipeline`]
//! - generic records become native documents via [`normalize_for_write`],
//!   and back via [`normalize_for_read`]
//!
//! Everything here is synchronous and pure. Execution belongs to the
//! `moorage-store` crate.
//!
//! ```rust,ignore
//! use moorage_query::{build_reduction_pipeline, normalize_where, ReductionKind};
//!
//! let filter = normalize_where(&json!({ "species": "cat" }), &schema, &options)?;
//! let pipeline = build_reduction_pipeline(filter, "price", ReductionKind::Sum);
//! let rows = executor.aggregate("pet", pipeline.stages().to_vec()).await?;
//! let total = pipeline.extract(&rows);
//! ```

pub mod coerce;
pub mod document;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod options;
pub mod pipeline;
pub mod schema;

pub use coerce::{
    coerce_identifier, coerce_identifier_under, coerce_native, coerce_structured, to_generic,
    to_native,
};
pub use document::{normalize_for_read, normalize_for_write, Record};
pub use error::{CoercionError, TranslateError, TranslateResult};
pub use filter::{CompareOp, Comparison, Filter, Operand};
pub use normalize::{normalize_filter, normalize_where, FilterNormalizer, NativeOp};
pub use options::{CoercionPolicy, TranslateOptions};
pub use pipeline::{
    build_reduction_pipeline, build_reduction_pipeline_named, ReductionKind, ReductionPipeline,
};
pub use schema::{AttributeType, ModelRegistry, ModelSchema};
