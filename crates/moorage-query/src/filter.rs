//! Generic filter tree
//!
//! The storage-agnostic form of a query's `where` clause. Trees are either
//! built directly through the constructors below or parsed from the
//! stage-three JSON form with [`Filter::from_where`].
//!
//! ```ignore
//! // {"and": [{"age": {">": 21}}, {"or": [{"name": "Rex"}, {"name": {"like": "Fi%"}}]}]}
//! let filter = Filter::and(vec![
//!     Filter::gt("age", json!(21)),
//!     Filter::or(vec![
//!         Filter::eq("name", json!("Rex")),
//!         Filter::like("name", "Fi%"),
//!     ]),
//! ]);
//! ```

use crate::error::{TranslateError, TranslateResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum nesting depth accepted by [`Filter::from_where`].
const MAX_WHERE_DEPTH: usize = 32;

/// Comparison operators of the generic filter language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// SQL LIKE pattern (`%` and `_` wildcards)
    Like,
    /// Member of a set
    In,
    /// Not a member of a set
    Nin,
    /// Attribute present (`true`) or absent (`false`)
    Exists,
}

impl CompareOp {
    /// Every operator, in declaration order
    pub const ALL: [CompareOp; 10] = [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lt,
        CompareOp::Lte,
        CompareOp::Gt,
        CompareOp::Gte,
        CompareOp::Like,
        CompareOp::In,
        CompareOp::Nin,
        CompareOp::Exists,
    ];

    /// Look up the operator for a stage-three modifier key.
    ///
    /// Equality has no modifier key; it is the bare `{"attr": value}` form.
    pub fn from_modifier(modifier: &str) -> Option<Self> {
        match modifier {
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Lte),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Gte),
            "!=" => Some(CompareOp::Ne),
            "like" => Some(CompareOp::Like),
            "in" => Some(CompareOp::In),
            "nin" => Some(CompareOp::Nin),
            "exists" => Some(CompareOp::Exists),
            _ => None,
        }
    }

    /// The stage-three spelling of this operator
    pub fn modifier(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Like => "like",
            CompareOp::In => "in",
            CompareOp::Nin => "nin",
            CompareOp::Exists => "exists",
        }
    }

    /// Check if this operator takes a set operand
    pub fn is_set_op(&self) -> bool {
        matches!(self, CompareOp::In | CompareOp::Nin)
    }

    /// Check if this operator is an ordering comparison
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte
        )
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Null,
    Scalar(Value),
    Set(Vec<Value>),
}

impl Operand {
    /// Classify a raw JSON value: `null`, arrays as sets, anything else scalar.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Operand::Null,
            Value::Array(items) => Operand::Set(items),
            other => Operand::Scalar(other),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Operand::Null => "null",
            Operand::Scalar(_) => "a scalar",
            Operand::Set(_) => "a set",
        }
    }
}

/// A single attribute comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub attribute: String,
    pub op: CompareOp,
    pub operand: Operand,
}

impl Comparison {
    pub fn new(attribute: impl Into<String>, op: CompareOp, operand: Operand) -> Self {
        Self {
            attribute: attribute.into(),
            op,
            operand,
        }
    }

    /// Check the operand shape against the operator.
    ///
    /// - `=` / `!=`: scalar or null
    /// - `<`, `<=`, `>`, `>=`: non-null scalar
    /// - `like`: string
    /// - `in` / `nin`: set
    /// - `exists`: boolean
    pub fn check_operand(&self) -> TranslateResult<()> {
        let ok = match (&self.op, &self.operand) {
            (CompareOp::Eq | CompareOp::Ne, Operand::Null | Operand::Scalar(_)) => true,
            (op, Operand::Scalar(_)) if op.is_ordering() => true,
            (CompareOp::Like, Operand::Scalar(Value::String(_))) => true,
            (CompareOp::In | CompareOp::Nin, Operand::Set(_)) => true,
            (CompareOp::Exists, Operand::Scalar(Value::Bool(_))) => true,
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(TranslateError::malformed(format!(
                "`{}` on `{}` cannot take {}",
                self.op.modifier(),
                self.attribute,
                self.operand.describe()
            )))
        }
    }
}

/// Generic filter tree
///
/// Combinators keep their children in order; order never changes the
/// meaning of `And`/`Or` but keeps translated output deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Logical AND of the children (empty = match everything)
    And(Vec<Filter>),
    /// Logical OR of the children (empty = match nothing)
    Or(Vec<Filter>),
    /// Attribute comparison
    Compare(Comparison),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::all()
    }
}

impl Filter {
    /// Filter without constraints
    pub fn all() -> Self {
        Filter::And(Vec::new())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    pub fn compare(attribute: impl Into<String>, op: CompareOp, operand: Operand) -> Self {
        Filter::Compare(Comparison::new(attribute, op, operand))
    }

    pub fn eq(attribute: impl Into<String>, value: Value) -> Self {
        Self::compare(attribute, CompareOp::Eq, Operand::from_value(value))
    }

    pub fn ne(attribute: impl Into<String>, value: Value) -> Self {
        Self::compare(attribute, CompareOp::Ne, Operand::from_value(value))
    }

    pub fn lt(attribute: impl Into<String>, value: Value) -> Self {
        Self::compare(attribute, CompareOp::Lt, Operand::from_value(value))
    }

    pub fn lte(attribute: impl Into<String>, value: Value) -> Self {
        Self::compare(attribute, CompareOp::Lte, Operand::from_value(value))
    }

    pub fn gt(attribute: impl Into<String>, value: Value) -> Self {
        Self::compare(attribute, CompareOp::Gt, Operand::from_value(value))
    }

    pub fn gte(attribute: impl Into<String>, value: Value) -> Self {
        Self::compare(attribute, CompareOp::Gte, Operand::from_value(value))
    }

    pub fn like(attribute: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(
            attribute,
            CompareOp::Like,
            Operand::Scalar(Value::String(pattern.into())),
        )
    }

    pub fn in_set(attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Self::compare(attribute, CompareOp::In, Operand::Set(values))
    }

    pub fn not_in_set(attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Self::compare(attribute, CompareOp::Nin, Operand::Set(values))
    }

    pub fn exists(attribute: impl Into<String>, present: bool) -> Self {
        Self::compare(
            attribute,
            CompareOp::Exists,
            Operand::Scalar(Value::Bool(present)),
        )
    }

    /// Check if this filter places no constraint at all
    pub fn is_unconstrained(&self) -> bool {
        matches!(self, Filter::And(children) if children.is_empty())
    }

    /// Check if this is a compound filter
    pub fn is_compound(&self) -> bool {
        matches!(self, Filter::And(_) | Filter::Or(_))
    }

    /// Parse the stage-three JSON `where` clause.
    ///
    /// `null` and `{}` both yield [`Filter::all`]. Keys `and` / `or` take
    /// arrays of nested clauses; any other key is an attribute whose value is
    /// either compared for equality or an object of modifiers
    /// (`<`, `<=`, `>`, `>=`, `!=`, `like`, `in`, `nin`, `exists`).
    /// Several keys in one object are ANDed in key order.
    pub fn from_where(where_clause: &Value) -> TranslateResult<Self> {
        match where_clause {
            Value::Null => Ok(Filter::all()),
            Value::Object(map) => parse_clause(map, 0),
            other => Err(TranslateError::malformed(format!(
                "`where` must be an object, got {}",
                json_kind(other)
            ))),
        }
    }
}

fn parse_clause(map: &Map<String, Value>, depth: usize) -> TranslateResult<Filter> {
    if depth > MAX_WHERE_DEPTH {
        return Err(TranslateError::malformed(format!(
            "`where` nesting exceeds the maximum depth of {}",
            MAX_WHERE_DEPTH
        )));
    }

    let mut clauses = Vec::with_capacity(map.len());
    for (key, value) in map {
        let clause = match key.as_str() {
            "and" => Filter::And(parse_branches(key, value, depth)?),
            "or" => Filter::Or(parse_branches(key, value, depth)?),
            attribute => parse_constraint(attribute, value)?,
        };
        clauses.push(clause);
    }

    Ok(match clauses.len() {
        1 => clauses.remove(0),
        _ => Filter::And(clauses),
    })
}

fn parse_branches(combinator: &str, value: &Value, depth: usize) -> TranslateResult<Vec<Filter>> {
    let Value::Array(branches) = value else {
        return Err(TranslateError::malformed(format!(
            "`{}` expects an array of clauses, got {}",
            combinator,
            json_kind(value)
        )));
    };

    branches
        .iter()
        .map(|branch| match branch {
            Value::Object(map) => parse_clause(map, depth + 1),
            other => Err(TranslateError::malformed(format!(
                "`{}` branches must be objects, got {}",
                combinator,
                json_kind(other)
            ))),
        })
        .collect()
}

fn parse_constraint(attribute: &str, value: &Value) -> TranslateResult<Filter> {
    let Value::Object(modifiers) = value else {
        return Ok(Filter::eq(attribute, value.clone()));
    };

    if modifiers.is_empty() {
        return Err(TranslateError::malformed(format!(
            "empty modifier object on `{}`",
            attribute
        )));
    }

    let mut comparisons = modifiers
        .iter()
        .map(|(modifier, operand)| {
            let op = CompareOp::from_modifier(modifier).ok_or_else(|| {
                TranslateError::malformed(format!(
                    "unrecognized modifier `{}` on `{}`",
                    modifier, attribute
                ))
            })?;
            Ok(Filter::compare(
                attribute,
                op,
                Operand::from_value(operand.clone()),
            ))
        })
        .collect::<TranslateResult<Vec<_>>>()?;

    Ok(match comparisons.len() {
        1 => comparisons.remove(0),
        _ => Filter::And(comparisons),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("<", CompareOp::Lt)]
    #[test_case("<=", CompareOp::Lte)]
    #[test_case(">", CompareOp::Gt)]
    #[test_case(">=", CompareOp::Gte)]
    #[test_case("!=", CompareOp::Ne)]
    #[test_case("like", CompareOp::Like)]
    #[test_case("in", CompareOp::In)]
    #[test_case("nin", CompareOp::Nin)]
    #[test_case("exists", CompareOp::Exists)]
    fn test_modifier_round_trip(modifier: &str, op: CompareOp) {
        assert_eq!(CompareOp::from_modifier(modifier), Some(op));
        assert_eq!(op.modifier(), modifier);
    }

    #[test]
    fn test_unknown_modifier_lookup() {
        assert_eq!(CompareOp::from_modifier("contains"), None);
        assert_eq!(CompareOp::from_modifier("="), None);
    }

    #[test]
    fn test_empty_where_is_unconstrained() {
        assert!(Filter::from_where(&json!({})).unwrap().is_unconstrained());
        assert!(Filter::from_where(&Value::Null).unwrap().is_unconstrained());
    }

    #[test]
    fn test_bare_value_is_equality() {
        let filter = Filter::from_where(&json!({ "name": "Rex" })).unwrap();
        assert_eq!(filter, Filter::eq("name", json!("Rex")));
    }

    #[test]
    fn test_null_value_is_null_equality() {
        let filter = Filter::from_where(&json!({ "owner": null })).unwrap();
        assert_eq!(
            filter,
            Filter::compare("owner", CompareOp::Eq, Operand::Null)
        );
    }

    #[test]
    fn test_nested_combinators_keep_order() {
        let filter = Filter::from_where(&json!({
            "or": [
                { "age": { ">": 3 } },
                { "and": [ { "name": { "like": "Fi%" } }, { "id": { "in": ["a", "b"] } } ] }
            ]
        }))
        .unwrap();

        assert_eq!(
            filter,
            Filter::or(vec![
                Filter::gt("age", json!(3)),
                Filter::and(vec![
                    Filter::like("name", "Fi%"),
                    Filter::in_set("id", vec![json!("a"), json!("b")]),
                ]),
            ])
        );
    }

    #[test]
    fn test_multiple_keys_are_anded() {
        let filter = Filter::from_where(&json!({ "age": 3, "name": "Rex" })).unwrap();
        assert_eq!(
            filter,
            Filter::and(vec![
                Filter::eq("age", json!(3)),
                Filter::eq("name", json!("Rex")),
            ])
        );
    }

    #[test]
    fn test_multiple_modifiers_are_anded() {
        let filter = Filter::from_where(&json!({ "age": { ">": 1, "<": 9 } })).unwrap();
        let Filter::And(children) = filter else {
            panic!("expected AND");
        };
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn test_unrecognized_modifier_is_malformed() {
        let err = Filter::from_where(&json!({ "age": { "between": [1, 2] } })).unwrap_err();
        assert!(matches!(err, TranslateError::MalformedFilter { .. }));
        assert!(err.to_string().contains("between"));
    }

    #[test_case(json!({ "and": { "age": 1 } }) ; "and not an array")]
    #[test_case(json!({ "or": [1, 2] }) ; "or branches not objects")]
    #[test_case(json!({ "age": {} }) ; "empty modifier object")]
    #[test_case(json!([1, 2]) ; "where not an object")]
    fn test_malformed_where(where_clause: Value) {
        let result = Filter::from_where(&where_clause);
        assert!(matches!(result, Err(TranslateError::MalformedFilter { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let mut clause = json!({ "age": 1 });
        for _ in 0..40 {
            clause = json!({ "and": [clause] });
        }
        assert!(Filter::from_where(&clause).is_err());
    }

    #[test_case(Filter::eq("a", json!(1)) ; "eq scalar")]
    #[test_case(Filter::compare("a", CompareOp::Ne, Operand::Null) ; "ne null")]
    #[test_case(Filter::lte("a", json!("m")) ; "lte string")]
    #[test_case(Filter::like("a", "x%") ; "like string")]
    #[test_case(Filter::in_set("a", vec![]) ; "in empty set")]
    #[test_case(Filter::exists("a", false) ; "exists bool")]
    fn test_valid_operands(filter: Filter) {
        let Filter::Compare(comparison) = filter else {
            unreachable!()
        };
        assert!(comparison.check_operand().is_ok());
    }

    #[test_case(Filter::compare("a", CompareOp::Lt, Operand::Null) ; "lt null")]
    #[test_case(Filter::eq("a", json!([1, 2])) ; "eq set")]
    #[test_case(Filter::compare("a", CompareOp::In, Operand::Scalar(json!(1))) ; "in scalar")]
    #[test_case(Filter::compare("a", CompareOp::Like, Operand::Scalar(json!(4))) ; "like number")]
    #[test_case(Filter::compare("a", CompareOp::Exists, Operand::Scalar(json!("yes"))) ; "exists string")]
    fn test_invalid_operands(filter: Filter) {
        let Filter::Compare(comparison) = filter else {
            unreachable!()
        };
        assert!(matches!(
            comparison.check_operand(),
            Err(TranslateError::MalformedFilter { .. })
        ));
    }
}
