//! Stage-three queries as handed to the adapter

use moorage_query::{ReductionKind, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Adapter method a query is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMethod {
    Find,
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Create,
}

impl QueryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMethod::Find => "find",
            QueryMethod::Count => "count",
            QueryMethod::Sum => "sum",
            QueryMethod::Avg => "avg",
            QueryMethod::Min => "min",
            QueryMethod::Max => "max",
            QueryMethod::Create => "create",
        }
    }

    /// The reduction this method runs, if it is one
    pub fn reduction(&self) -> Option<ReductionKind> {
        match self {
            QueryMethod::Count => Some(ReductionKind::Count),
            QueryMethod::Sum => Some(ReductionKind::Sum),
            QueryMethod::Avg => Some(ReductionKind::Avg),
            QueryMethod::Min => Some(ReductionKind::Min),
            QueryMethod::Max => Some(ReductionKind::Max),
            QueryMethod::Find | QueryMethod::Create => None,
        }
    }
}

impl fmt::Display for QueryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query criteria; only `where` is interpreted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(rename = "where", default)]
    pub where_clause: Value,
}

/// A fully normalized query addressed to one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageThreeQuery {
    pub method: QueryMethod,
    /// Identity of the model, also the collection name
    pub using: String,
    #[serde(default)]
    pub criteria: Criteria,
    /// Attribute reduced by `sum`, `avg`, `min` and `max`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_attr_name: Option<String>,
    /// Record written by `create`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_record: Option<Record>,
}

impl StageThreeQuery {
    pub fn new(method: QueryMethod, using: impl Into<String>) -> Self {
        Self {
            method,
            using: using.into(),
            criteria: Criteria::default(),
            numeric_attr_name: None,
            new_record: None,
        }
    }

    #[must_use]
    pub fn with_where(mut self, where_clause: Value) -> Self {
        self.criteria.where_clause = where_clause;
        self
    }

    #[must_use]
    pub fn with_numeric_attr(mut self, attribute: impl Into<String>) -> Self {
        self.numeric_attr_name = Some(attribute.into());
        self
    }

    #[must_use]
    pub fn with_new_record(mut self, record: Record) -> Self {
        self.new_record = Some(record);
        self
    }
}
