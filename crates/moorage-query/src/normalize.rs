//! Filter normalizer: generic filter tree -> native filter document.
//!
//! Post-order rewrite over [`Filter`]. Combinators become `$and` / `$or`
//! with their children in the original order, comparisons become
//! `{ field: { $op: value } }`. The primary key is renamed to the native key
//! and its operands, like those of `ref` attributes, are coerced into native
//! identifiers.

use crate::coerce::{identifier_to_native, to_native};
use crate::error::TranslateResult;
use crate::filter::{CompareOp, Comparison, Filter, Operand};
use crate::options::TranslateOptions;
use crate::schema::ModelSchema;
use bson::{doc, Bson, Document};
use serde_json::Value;
use tracing::trace;

/// Native comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Regex,
    In,
    Nin,
    Exists,
}

impl NativeOp {
    /// Operator key as it appears in a native filter
    pub fn as_str(&self) -> &'static str {
        match self {
            NativeOp::Eq => "$eq",
            NativeOp::Ne => "$ne",
            NativeOp::Lt => "$lt",
            NativeOp::Lte => "$lte",
            NativeOp::Gt => "$gt",
            NativeOp::Gte => "$gte",
            NativeOp::Regex => "$regex",
            NativeOp::In => "$in",
            NativeOp::Nin => "$nin",
            NativeOp::Exists => "$exists",
        }
    }
}

impl CompareOp {
    /// The native operator this comparison translates to
    pub fn native(&self) -> NativeOp {
        match self {
            CompareOp::Eq => NativeOp::Eq,
            CompareOp::Ne => NativeOp::Ne,
            CompareOp::Lt => NativeOp::Lt,
            CompareOp::Lte => NativeOp::Lte,
            CompareOp::Gt => NativeOp::Gt,
            CompareOp::Gte => NativeOp::Gte,
            CompareOp::Like => NativeOp::Regex,
            CompareOp::In => NativeOp::In,
            CompareOp::Nin => NativeOp::Nin,
            CompareOp::Exists => NativeOp::Exists,
        }
    }
}

/// Translate a SQL LIKE pattern into an anchored regex.
///
/// `%` matches any run of characters, `_` exactly one; everything else is
/// matched literally.
pub fn like_to_regex(pattern: &str) -> String {
    let mut anchored = String::with_capacity(pattern.len() + 2);
    anchored.push('^');
    for c in pattern.chars() {
        match c {
            '%' => anchored.push_str(".*"),
            '_' => anchored.push('.'),
            other => anchored.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    anchored.push('$');
    anchored
}

/// Rewrites generic filters for one model.
pub struct FilterNormalizer<'a> {
    schema: &'a ModelSchema,
    options: &'a TranslateOptions,
}

impl<'a> FilterNormalizer<'a> {
    pub fn new(schema: &'a ModelSchema, options: &'a TranslateOptions) -> Self {
        Self { schema, options }
    }

    /// Normalize a filter tree into a native filter document.
    ///
    /// An unconstrained filter yields `{}`, which matches every document.
    pub fn normalize(&self, filter: &Filter) -> TranslateResult<Document> {
        match filter {
            Filter::And(children) if children.is_empty() => Ok(Document::new()),
            Filter::And(children) => Ok(doc! { "$and": self.normalize_children(children)? }),
            // The store rejects `$or: []`; an empty disjunction is unsatisfiable.
            Filter::Or(children) if children.is_empty() => Ok(self.match_nothing()),
            Filter::Or(children) => Ok(doc! { "$or": self.normalize_children(children)? }),
            Filter::Compare(comparison) => self.normalize_comparison(comparison),
        }
    }

    fn normalize_children(&self, children: &[Filter]) -> TranslateResult<Vec<Bson>> {
        children
            .iter()
            .map(|child| self.normalize(child).map(Bson::Document))
            .collect()
    }

    fn normalize_comparison(&self, comparison: &Comparison) -> TranslateResult<Document> {
        comparison.check_operand()?;

        let attribute = comparison.attribute.as_str();
        let field = self.native_field(attribute);

        let predicate = match (&comparison.op, &comparison.operand) {
            (CompareOp::Like, Operand::Scalar(Value::String(pattern))) => {
                self.like_predicate(pattern)
            }
            (op, operand) => {
                let value = match operand {
                    Operand::Null => Bson::Null,
                    Operand::Scalar(value) => self.leaf(attribute, value)?,
                    Operand::Set(values) => Bson::Array(
                        values
                            .iter()
                            .map(|value| self.leaf(attribute, value))
                            .collect::<TranslateResult<Vec<_>>>()?,
                    ),
                };
                let mut predicate = Document::new();
                predicate.insert(op.native().as_str(), value);
                predicate
            }
        };

        let mut clause = Document::new();
        clause.insert(field, predicate);
        Ok(clause)
    }

    fn like_predicate(&self, pattern: &str) -> Document {
        let mut predicate = Document::new();
        predicate.insert(NativeOp::Regex.as_str(), like_to_regex(pattern));
        if self.options.like_case_insensitive {
            predicate.insert("$options", "i");
        }
        predicate
    }

    fn leaf(&self, attribute: &str, value: &Value) -> TranslateResult<Bson> {
        let native = if self.holds_identifier(attribute) {
            identifier_to_native(attribute, value)?
        } else {
            to_native(attribute, value)?
        };
        Ok(native)
    }

    fn holds_identifier(&self, attribute: &str) -> bool {
        self.schema.is_primary_key(attribute)
            || self
                .schema
                .attribute_type(attribute)
                .is_some_and(|ty| ty.is_identifier())
    }

    fn native_field<'b>(&'b self, attribute: &'b str) -> &'b str {
        if self.schema.is_primary_key(attribute) {
            &self.options.native_key
        } else {
            attribute
        }
    }

    fn match_nothing(&self) -> Document {
        let mut predicate = Document::new();
        predicate.insert(NativeOp::In.as_str(), Bson::Array(Vec::new()));
        let mut clause = Document::new();
        clause.insert(self.options.native_key.as_str(), predicate);
        clause
    }
}

/// Normalize `filter` against `schema`.
pub fn normalize_filter(
    filter: &Filter,
    schema: &ModelSchema,
    options: &TranslateOptions,
) -> TranslateResult<Document> {
    let native = FilterNormalizer::new(schema, options).normalize(filter)?;
    trace!(native = %native, "normalized filter");
    Ok(native)
}

/// Parse and normalize a stage-three `where` clause in one step.
pub fn normalize_where(
    where_clause: &Value,
    schema: &ModelSchema,
    options: &TranslateOptions,
) -> TranslateResult<Document> {
    let filter = Filter::from_where(where_clause)?;
    normalize_filter(&filter, schema, options)
}
