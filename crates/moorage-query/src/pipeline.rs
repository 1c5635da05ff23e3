//! Reduction pipelines
//!
//! Builds the two-stage aggregation used for scalar reductions:
//!
//! ```text
//! [ { $match: <native filter> },
//!   { $group: { _id: null, <kind>: { $<kind>: "$<attribute>" } } } ]
//! ```
//!
//! Building is pure data construction; running the pipeline is the
//! executor's job. The rule for reading the result back lives here too,
//! because an empty result set must never be indexed.

use crate::error::{TranslateError, TranslateResult};
use bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scalar reductions supported by the pipeline builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionKind {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl ReductionKind {
    pub const ALL: [ReductionKind; 5] = [
        ReductionKind::Sum,
        ReductionKind::Avg,
        ReductionKind::Min,
        ReductionKind::Max,
        ReductionKind::Count,
    ];

    /// Name of the reduction, also the output field of the group stage
    pub fn as_str(&self) -> &'static str {
        match self {
            ReductionKind::Sum => "sum",
            ReductionKind::Avg => "avg",
            ReductionKind::Min => "min",
            ReductionKind::Max => "max",
            ReductionKind::Count => "count",
        }
    }

    fn accumulator(&self) -> &'static str {
        match self {
            ReductionKind::Sum | ReductionKind::Count => "$sum",
            ReductionKind::Avg => "$avg",
            ReductionKind::Min => "$min",
            ReductionKind::Max => "$max",
        }
    }

    /// Result reported when no document matched.
    ///
    /// Sums and counts over nothing are zero; an average, minimum or maximum
    /// of nothing is undefined and reported as `null`.
    pub fn identity(&self) -> Bson {
        match self {
            ReductionKind::Sum | ReductionKind::Count => Bson::Int32(0),
            ReductionKind::Avg | ReductionKind::Min | ReductionKind::Max => Bson::Null,
        }
    }

    /// The reduced value from the first result row, or `None` when the
    /// executor returned no rows at all.
    pub fn extract_row(&self, rows: &[Document]) -> Option<Bson> {
        rows.first()
            .map(|row| row.get(self.as_str()).cloned().unwrap_or(Bson::Null))
    }

    /// The reduced value, substituting [`identity`](Self::identity) for an
    /// empty result set.
    pub fn extract(&self, rows: &[Document]) -> Bson {
        self.extract_row(rows).unwrap_or_else(|| self.identity())
    }
}

impl fmt::Display for ReductionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReductionKind {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReductionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TranslateError::UnsupportedReduction {
                kind: s.to_string(),
            })
    }
}

/// A built reduction pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ReductionPipeline {
    pub kind: ReductionKind,
    /// Native field the reduction runs over
    pub attribute: String,
    stages: Vec<Document>,
}

impl ReductionPipeline {
    pub fn stages(&self) -> &[Document] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<Document> {
        self.stages
    }

    /// Read the reduction result out of executor rows
    pub fn extract(&self, rows: &[Document]) -> Bson {
        self.kind.extract(rows)
    }
}

/// Build the match + group pipeline for `kind` over `attribute`.
///
/// `filter` is used verbatim as the match stage. `count` counts matched
/// documents, so it does not read `attribute`.
pub fn build_reduction_pipeline(
    filter: Document,
    attribute: &str,
    kind: ReductionKind,
) -> ReductionPipeline {
    let operand = match kind {
        ReductionKind::Count => Bson::Int32(1),
        _ => Bson::String(format!("${}", attribute)),
    };

    let mut accumulator = Document::new();
    accumulator.insert(kind.accumulator(), operand);

    let mut group = doc! { "_id": null };
    group.insert(kind.as_str(), accumulator);

    ReductionPipeline {
        kind,
        attribute: attribute.to_string(),
        stages: vec![doc! { "$match": filter }, doc! { "$group": group }],
    }
}

/// Like [`build_reduction_pipeline`], with the kind given by name.
pub fn build_reduction_pipeline_named(
    filter: Document,
    attribute: &str,
    kind: &str,
) -> TranslateResult<ReductionPipeline> {
    let kind = kind.parse::<ReductionKind>()?;
    Ok(build_reduction_pipeline(filter, attribute, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ReductionKind::Sum, doc! { "sum": { "$sum": "$price" } })]
    #[test_case(ReductionKind::Avg, doc! { "avg": { "$avg": "$price" } })]
    #[test_case(ReductionKind::Min, doc! { "min": { "$min": "$price" } })]
    #[test_case(ReductionKind::Max, doc! { "max": { "$max": "$price" } })]
    #[test_case(ReductionKind::Count, doc! { "count": { "$sum": 1 } })]
    fn test_group_stage(kind: ReductionKind, accumulator: Document) {
        let filter = doc! { "species": { "$eq": "cat" } };
        let pipeline = build_reduction_pipeline(filter.clone(), "price", kind);

        let mut group = doc! { "_id": null };
        for (key, value) in accumulator {
            group.insert(key, value);
        }

        assert_eq!(
            pipeline.stages(),
            &[doc! { "$match": filter }, doc! { "$group": group }]
        );
    }

    #[test]
    fn test_empty_filter_kept_verbatim() {
        let pipeline = build_reduction_pipeline(Document::new(), "price", ReductionKind::Sum);
        assert_eq!(pipeline.stages()[0], doc! { "$match": {} });
        assert_eq!(pipeline.into_stages().len(), 2);
    }

    #[test]
    fn test_named_kind() {
        let pipeline = build_reduction_pipeline_named(Document::new(), "price", "avg").unwrap();
        assert_eq!(pipeline.kind, ReductionKind::Avg);
        assert_eq!(pipeline.attribute, "price");
    }

    #[test_case("median" ; "unknown name")]
    #[test_case("SUM" ; "wrong case")]
    #[test_case("" ; "empty name")]
    fn test_unsupported_kind(kind: &str) {
        let err = build_reduction_pipeline_named(Document::new(), "price", kind).unwrap_err();
        assert_eq!(
            err,
            TranslateError::UnsupportedReduction {
                kind: kind.to_string()
            }
        );
    }

    #[test]
    fn test_kind_display_round_trip() {
        for kind in ReductionKind::ALL {
            assert_eq!(kind.to_string().parse::<ReductionKind>().unwrap(), kind);
        }
    }

    #[test_case(ReductionKind::Sum, Bson::Int32(0))]
    #[test_case(ReductionKind::Count, Bson::Int32(0))]
    #[test_case(ReductionKind::Avg, Bson::Null)]
    #[test_case(ReductionKind::Min, Bson::Null)]
    #[test_case(ReductionKind::Max, Bson::Null)]
    fn test_empty_rows_yield_identity(kind: ReductionKind, identity: Bson) {
        assert_eq!(kind.extract_row(&[]), None);
        assert_eq!(kind.extract(&[]), identity);
    }

    #[test]
    fn test_extract_first_row() {
        let rows = vec![doc! { "_id": null, "sum": 60_i64 }];
        assert_eq!(ReductionKind::Sum.extract(&rows), Bson::Int64(60));
    }

    #[test]
    fn test_extract_missing_field_is_null() {
        let rows = vec![doc! { "_id": null }];
        assert_eq!(ReductionKind::Avg.extract_row(&rows), Some(Bson::Null));
    }
}
