//! Native filter evaluation
//!
//! Filters are compiled once into a [`Predicate`] and then evaluated per
//! document. Compilation is where malformed filters are rejected, so an
//! empty collection still reports a bad operator.

use crate::error::{ExecutorError, ExecutorResult};
use bson::{Bson, Document};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

const MAX_FILTER_DEPTH: usize = 64;

/// A compiled native filter
#[derive(Debug, Clone)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Field {
        path: String,
        conditions: Vec<Condition>,
    },
}

/// One operator applied to a field
#[derive(Debug, Clone)]
pub enum Condition {
    Eq(Bson),
    Ne(Bson),
    Lt(Bson),
    Lte(Bson),
    Gt(Bson),
    Gte(Bson),
    In(Vec<Bson>),
    Nin(Vec<Bson>),
    Exists(bool),
    Regex(Regex),
}

impl Predicate {
    /// Compile a native filter document. `{}` matches everything.
    pub fn compile(filter: &Document) -> ExecutorResult<Self> {
        compile_document(filter, 0)
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Predicate::And(children) => children.iter().all(|child| child.matches(document)),
            Predicate::Or(children) => children.iter().any(|child| child.matches(document)),
            Predicate::Field { path, conditions } => {
                let value = lookup(document, path);
                conditions.iter().all(|condition| condition.matches(value))
            }
        }
    }
}

impl Condition {
    fn matches(&self, value: Option<&Bson>) -> bool {
        match self {
            Condition::Eq(target) => equals(value, target),
            Condition::Ne(target) => !equals(value, target),
            Condition::Lt(target) => ordered(value, target, |o| o == Ordering::Less),
            Condition::Lte(target) => ordered(value, target, |o| o != Ordering::Greater),
            Condition::Gt(target) => ordered(value, target, |o| o == Ordering::Greater),
            Condition::Gte(target) => ordered(value, target, |o| o != Ordering::Less),
            Condition::In(set) => set.iter().any(|target| equals(value, target)),
            Condition::Nin(set) => !set.iter().any(|target| equals(value, target)),
            Condition::Exists(present) => value.is_some() == *present,
            Condition::Regex(re) => {
                any_element(value, |v| matches!(v, Bson::String(text) if re.is_match(text)))
            }
        }
    }
}

fn compile_document(filter: &Document, depth: usize) -> ExecutorResult<Predicate> {
    if depth > MAX_FILTER_DEPTH {
        return Err(ExecutorError::rejected(format!(
            "filter nesting exceeds {} levels",
            MAX_FILTER_DEPTH
        )));
    }

    let mut clauses = Vec::with_capacity(filter.len());
    for (key, value) in filter {
        let clause = match key.as_str() {
            "$and" => Predicate::And(compile_branches(key, value, depth)?),
            "$or" => Predicate::Or(compile_branches(key, value, depth)?),
            op if op.starts_with('$') => {
                return Err(ExecutorError::rejected(format!(
                    "unknown top level operator: {}",
                    op
                )))
            }
            path => Predicate::Field {
                path: path.to_string(),
                conditions: compile_conditions(path, value)?,
            },
        };
        clauses.push(clause);
    }

    Ok(Predicate::And(clauses))
}

fn compile_branches(op: &str, value: &Bson, depth: usize) -> ExecutorResult<Vec<Predicate>> {
    let Bson::Array(branches) = value else {
        return Err(ExecutorError::rejected(format!("{} must be an array", op)));
    };
    if branches.is_empty() {
        return Err(ExecutorError::rejected(format!(
            "{} must be a nonempty array",
            op
        )));
    }

    branches
        .iter()
        .map(|branch| match branch {
            Bson::Document(filter) => compile_document(filter, depth + 1),
            _ => Err(ExecutorError::rejected(format!(
                "{} entries need to be full objects",
                op
            ))),
        })
        .collect()
}

fn compile_conditions(path: &str, value: &Bson) -> ExecutorResult<Vec<Condition>> {
    let operators = match value {
        Bson::Document(doc) if doc.keys().next().is_some_and(|k| k.starts_with('$')) => doc,
        literal => return Ok(vec![Condition::Eq(literal.clone())]),
    };

    let options = match operators.get("$options") {
        None => "",
        Some(Bson::String(options)) => options.as_str(),
        Some(_) => {
            return Err(ExecutorError::rejected(format!(
                "$options on `{}` must be a string",
                path
            )))
        }
    };

    let mut conditions = Vec::with_capacity(operators.len());
    for (op, operand) in operators {
        let condition = match op.as_str() {
            "$eq" => Condition::Eq(operand.clone()),
            "$ne" => Condition::Ne(operand.clone()),
            "$lt" => Condition::Lt(operand.clone()),
            "$lte" => Condition::Lte(operand.clone()),
            "$gt" => Condition::Gt(operand.clone()),
            "$gte" => Condition::Gte(operand.clone()),
            "$in" => Condition::In(set_operand(path, op, operand)?),
            "$nin" => Condition::Nin(set_operand(path, op, operand)?),
            "$exists" => Condition::Exists(truthy(operand)),
            "$regex" => Condition::Regex(compile_regex(path, operand, options)?),
            "$options" if operators.contains_key("$regex") => continue,
            "$options" => {
                return Err(ExecutorError::rejected(format!(
                    "$options on `{}` needs a $regex",
                    path
                )))
            }
            other => {
                return Err(ExecutorError::rejected(format!(
                    "unknown operator {} on `{}`",
                    other, path
                )))
            }
        };
        conditions.push(condition);
    }

    Ok(conditions)
}

fn set_operand(path: &str, op: &str, operand: &Bson) -> ExecutorResult<Vec<Bson>> {
    match operand {
        Bson::Array(values) => Ok(values.clone()),
        _ => Err(ExecutorError::rejected(format!(
            "{} on `{}` needs an array",
            op, path
        ))),
    }
}

fn compile_regex(path: &str, operand: &Bson, options: &str) -> ExecutorResult<Regex> {
    let (pattern, inline_options) = match operand {
        Bson::String(pattern) => (pattern.as_str(), ""),
        Bson::RegularExpression(re) => (re.pattern.as_str(), re.options.as_str()),
        _ => {
            return Err(ExecutorError::rejected(format!(
                "$regex on `{}` has to be a string",
                path
            )))
        }
    };

    let mut builder = RegexBuilder::new(pattern);
    for flag in inline_options.chars().chain(options.chars()) {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => {
                return Err(ExecutorError::rejected(format!(
                    "invalid regex flag `{}` on `{}`",
                    other, path
                )))
            }
        };
    }

    builder.build().map_err(|e| {
        ExecutorError::rejected(format!("invalid $regex on `{}`: {}", path, e))
    })
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        other => as_f64(other).map_or(true, |n| n != 0.0),
    }
}

/// Resolve a dotted path through nested documents
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(v) => {
            values_equal(v, target)
                || matches!(v, Bson::Array(items) if items.iter().any(|item| values_equal(item, target)))
        }
    }
}

fn ordered(value: Option<&Bson>, target: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    any_element(value, |v| compare_values(v, target).is_some_and(&accept))
}

fn any_element(value: Option<&Bson>, test: impl Fn(&Bson) -> bool) -> bool {
    match value {
        Some(Bson::Array(items)) => items.iter().any(&test),
        Some(v) => test(v),
        None => false,
    }
}

pub(crate) fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Compare two values of the same kind; numbers compare across widths.
/// `None` when the kinds are not comparable.
pub(crate) fn compare_values(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => Some(a.bytes().cmp(&b.bytes())),
        (Bson::DateTime(a), Bson::DateTime(b)) => {
            Some(a.timestamp_millis().cmp(&b.timestamp_millis()))
        }
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        (Bson::Int32(a), Bson::Int32(b)) => Some(a.cmp(b)),
        (Bson::Int64(a), Bson::Int64(b)) => Some(a.cmp(b)),
        (Bson::Int32(a), Bson::Int64(b)) => Some(i64::from(*a).cmp(b)),
        (Bson::Int64(a), Bson::Int32(b)) => Some(a.cmp(&i64::from(*b))),
        _ => as_f64(a)?.partial_cmp(&as_f64(b)?),
    }
}

pub(crate) fn values_equal(a: &Bson, b: &Bson) -> bool {
    compare_values(a, b) == Some(Ordering::Equal) || a == b
}
