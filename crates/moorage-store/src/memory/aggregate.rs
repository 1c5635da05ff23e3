//! Aggregation pipeline evaluation: `$match` and `$group`.

use super::matcher::{as_f64, compare_values, lookup, values_equal, Predicate};
use crate::error::{ExecutorError, ExecutorResult};
use bson::{Bson, Document};
use std::cmp::Ordering;

/// A compiled pipeline stage
#[derive(Debug, Clone)]
pub enum Stage {
    Match(Predicate),
    Group(GroupStage),
}

impl Stage {
    pub fn compile(stage: &Document) -> ExecutorResult<Self> {
        let mut entries = stage.iter();
        let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
            return Err(ExecutorError::rejected(
                "a pipeline stage specification object must contain exactly one field",
            ));
        };

        match (name.as_str(), spec) {
            ("$match", Bson::Document(filter)) => Ok(Stage::Match(Predicate::compile(filter)?)),
            ("$group", Bson::Document(spec)) => Ok(Stage::Group(GroupStage::compile(spec)?)),
            ("$match" | "$group", _) => Err(ExecutorError::rejected(format!(
                "the {} stage specification must be an object",
                name
            ))),
            (other, _) => Err(ExecutorError::rejected(format!(
                "unrecognized pipeline stage name: {}",
                other
            ))),
        }
    }

    pub fn run(&self, documents: Vec<Document>) -> Vec<Document> {
        match self {
            Stage::Match(predicate) => documents
                .into_iter()
                .filter(|document| predicate.matches(document))
                .collect(),
            Stage::Group(group) => group.run(&documents),
        }
    }
}

/// Compile every stage of a pipeline before any of it runs
pub fn compile_pipeline(pipeline: &[Document]) -> ExecutorResult<Vec<Stage>> {
    pipeline.iter().map(Stage::compile).collect()
}

#[derive(Debug, Clone)]
enum Expression {
    Field(String),
    Constant(Bson),
}

impl Expression {
    fn parse(value: &Bson) -> Self {
        match value {
            Bson::String(text) if text.starts_with('$') => {
                Expression::Field(text.trim_start_matches('$').to_string())
            }
            other => Expression::Constant(other.clone()),
        }
    }

    fn evaluate<'a>(&'a self, document: &'a Document) -> Option<&'a Bson> {
        match self {
            Expression::Field(path) => lookup(document, path),
            Expression::Constant(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccumulatorOp {
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone)]
struct Accumulator {
    output: String,
    op: AccumulatorOp,
    input: Expression,
}

/// `$group` stage: bucket documents by `_id`, then fold each bucket
#[derive(Debug, Clone)]
pub struct GroupStage {
    key: Expression,
    accumulators: Vec<Accumulator>,
}

impl GroupStage {
    fn compile(spec: &Document) -> ExecutorResult<Self> {
        let key = spec.get("_id").map(Expression::parse).ok_or_else(|| {
            ExecutorError::rejected("a group specification must include an _id")
        })?;

        let mut accumulators = Vec::with_capacity(spec.len().saturating_sub(1));
        for (output, definition) in spec {
            if output == "_id" {
                continue;
            }
            accumulators.push(compile_accumulator(output, definition)?);
        }

        Ok(Self { key, accumulators })
    }

    fn run(&self, documents: &[Document]) -> Vec<Document> {
        let mut buckets: Vec<(Bson, Vec<&Document>)> = Vec::new();
        for document in documents {
            let key = self.key.evaluate(document).cloned().unwrap_or(Bson::Null);
            match buckets.iter_mut().find(|(existing, _)| values_equal(existing, &key)) {
                Some((_, members)) => members.push(document),
                None => buckets.push((key, vec![document])),
            }
        }

        buckets
            .into_iter()
            .map(|(key, members)| {
                let mut row = Document::new();
                row.insert("_id", key);
                for accumulator in &self.accumulators {
                    row.insert(accumulator.output.clone(), accumulator.fold(&members));
                }
                row
            })
            .collect()
    }
}

fn compile_accumulator(output: &str, definition: &Bson) -> ExecutorResult<Accumulator> {
    let Bson::Document(definition) = definition else {
        return Err(ExecutorError::rejected(format!(
            "the field '{}' must be an accumulator object",
            output
        )));
    };

    let mut entries = definition.iter();
    let (Some((name, operand)), None) = (entries.next(), entries.next()) else {
        return Err(ExecutorError::rejected(format!(
            "the field '{}' must specify one accumulator",
            output
        )));
    };

    let op = match name.as_str() {
        "$sum" => AccumulatorOp::Sum,
        "$avg" => AccumulatorOp::Avg,
        "$min" => AccumulatorOp::Min,
        "$max" => AccumulatorOp::Max,
        other => {
            return Err(ExecutorError::rejected(format!(
                "unknown group operator '{}'",
                other
            )))
        }
    };

    Ok(Accumulator {
        output: output.to_string(),
        op,
        input: Expression::parse(operand),
    })
}

impl Accumulator {
    fn fold(&self, members: &[&Document]) -> Bson {
        let inputs = members
            .iter()
            .filter_map(|document| self.input.evaluate(document));

        match self.op {
            AccumulatorOp::Sum => {
                let mut total = Total::new();
                inputs.for_each(|value| total.add(value));
                total.finish()
            }
            AccumulatorOp::Avg => {
                let numbers: Vec<f64> = inputs.filter_map(as_f64).collect();
                if numbers.is_empty() {
                    Bson::Null
                } else {
                    Bson::Double(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            }
            AccumulatorOp::Min => extremum(inputs, Ordering::Less),
            AccumulatorOp::Max => extremum(inputs, Ordering::Greater),
        }
    }
}

/// Running `$sum`: stays integral while it can, widens to double on the
/// first double or on 64-bit overflow. Non-numeric inputs are skipped.
struct Total {
    exact: Option<i64>,
    approx: f64,
    saw_int64: bool,
    saw_double: bool,
}

impl Total {
    fn new() -> Self {
        Self {
            exact: Some(0),
            approx: 0.0,
            saw_int64: false,
            saw_double: false,
        }
    }

    fn add(&mut self, value: &Bson) {
        let int = match value {
            Bson::Int32(v) => i64::from(*v),
            Bson::Int64(v) => {
                self.saw_int64 = true;
                *v
            }
            Bson::Double(v) => {
                self.saw_double = true;
                self.approx += v;
                return;
            }
            _ => return,
        };
        self.approx += int as f64;
        self.exact = self.exact.and_then(|total| total.checked_add(int));
    }

    fn finish(self) -> Bson {
        match self.exact {
            Some(total) if !self.saw_double => match i32::try_from(total) {
                Ok(small) if !self.saw_int64 => Bson::Int32(small),
                _ => Bson::Int64(total),
            },
            _ => Bson::Double(self.approx),
        }
    }
}

/// Smallest (`Less`) or largest (`Greater`) non-null input, ordering first
/// by kind and then by value. `null` when there is none.
fn extremum<'a>(inputs: impl Iterator<Item = &'a Bson>, wanted: Ordering) -> Bson {
    inputs
        .filter(|value| !matches!(value, Bson::Null | Bson::Undefined))
        .fold(None::<&Bson>, |best, value| match best {
            Some(current) if canonical_cmp(value, current) != wanted => Some(current),
            _ => Some(value),
        })
        .cloned()
        .unwrap_or(Bson::Null)
}

fn canonical_cmp(a: &Bson, b: &Bson) -> Ordering {
    kind_rank(a)
        .cmp(&kind_rank(b))
        .then_with(|| compare_values(a, b).unwrap_or(Ordering::Equal))
}

fn kind_rank(value: &Bson) -> u8 {
    match value {
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        _ => 12,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use test_case::test_case;

    fn pets() -> Vec<Document> {
        vec![
            doc! { "name": "Rex", "species": "dog", "price": 10_i64 },
            doc! { "name": "Tom", "species": "cat", "price": 20_i64 },
            doc! { "name": "Kit", "species": "cat", "price": 30_i64 },
        ]
    }

    fn run(pipeline: Vec<Document>, documents: Vec<Document>) -> Vec<Document> {
        compile_pipeline(&pipeline)
            .unwrap()
            .iter()
            .fold(documents, |rows, stage| stage.run(rows))
    }

    #[test_case("$sum", Bson::Int64(60))]
    #[test_case("$avg", Bson::Double(20.0))]
    #[test_case("$min", Bson::Int64(10))]
    #[test_case("$max", Bson::Int64(30))]
    fn test_group_all(accumulator: &str, expected: Bson) {
        let mut spec = Document::new();
        spec.insert(accumulator, "$price");
        let rows = run(
            vec![doc! { "$match": {} }, doc! { "$group": { "_id": null, "out": spec } }],
            pets(),
        );

        assert_eq!(rows, vec![doc! { "_id": null, "out": expected }]);
    }

    #[test]
    fn test_count_via_sum_constant() {
        let rows = run(
            vec![
                doc! { "$match": { "species": { "$eq": "cat" } } },
                doc! { "$group": { "_id": null, "count": { "$sum": 1 } } },
            ],
            pets(),
        );
        assert_eq!(rows, vec![doc! { "_id": null, "count": 2 }]);
    }

    #[test]
    fn test_empty_input_yields_no_rows() {
        let rows = run(
            vec![
                doc! { "$match": { "species": "bird" } },
                doc! { "$group": { "_id": null, "sum": { "$sum": "$price" } } },
            ],
            pets(),
        );
        assert!(rows.is_empty());
    }

    #[test]
    fn test_group_by_field_keeps_first_seen_order() {
        let rows = run(
            vec![doc! { "$group": { "_id": "$species", "total": { "$sum": "$price" } } }],
            pets(),
        );
        assert_eq!(
            rows,
            vec![
                doc! { "_id": "dog", "total": 10_i64 },
                doc! { "_id": "cat", "total": 50_i64 },
            ]
        );
    }

    #[test]
    fn test_constant_group_key() {
        let rows = run(
            vec![doc! { "$group": { "_id": "price", "n": { "$sum": 1 } } }],
            pets(),
        );
        assert_eq!(rows, vec![doc! { "_id": "price", "n": 3 }]);
    }

    #[test]
    fn test_sum_widens_on_double() {
        let docs = vec![doc! { "v": 1 }, doc! { "v": 2.5 }, doc! { "v": "x" }, doc! {}];
        let rows = run(
            vec![doc! { "$group": { "_id": null, "s": { "$sum": "$v" } } }],
            docs,
        );
        assert_eq!(rows[0].get("s"), Some(&Bson::Double(3.5)));
    }

    #[test]
    fn test_sum_of_int32_stays_int32() {
        let docs = vec![doc! { "v": 1 }, doc! { "v": 2 }];
        let rows = run(
            vec![doc! { "$group": { "_id": null, "s": { "$sum": "$v" } } }],
            docs,
        );
        assert_eq!(rows[0].get("s"), Some(&Bson::Int32(3)));
    }

    #[test]
    fn test_avg_and_min_skip_missing_values() {
        let docs = vec![doc! { "v": null }, doc! {}, doc! { "v": "text" }];
        let rows = run(
            vec![doc! { "$group": {
                "_id": null,
                "a": { "$avg": "$v" },
                "lo": { "$min": "$v" },
            } }],
            docs,
        );
        assert_eq!(rows[0].get("a"), Some(&Bson::Null));
        assert_eq!(rows[0].get("lo"), Some(&Bson::String("text".into())));
    }

    #[test]
    fn test_min_orders_numbers_before_strings() {
        let docs = vec![doc! { "v": "a" }, doc! { "v": 5 }, doc! { "v": 2.5 }];
        let rows = run(
            vec![doc! { "$group": {
                "_id": null,
                "lo": { "$min": "$v" },
                "hi": { "$max": "$v" },
            } }],
            docs,
        );
        assert_eq!(rows[0].get("lo"), Some(&Bson::Double(2.5)));
        assert_eq!(rows[0].get("hi"), Some(&Bson::String("a".into())));
    }

    #[test_case(doc! { "$sort": { "a": 1 } } ; "unknown stage")]
    #[test_case(doc! { "$match": {}, "$group": { "_id": null } } ; "two stage names")]
    #[test_case(doc! { "$match": 1 } ; "match not object")]
    #[test_case(doc! { "$group": { "total": { "$sum": 1 } } } ; "group without id")]
    #[test_case(doc! { "$group": { "_id": null, "x": { "$push": "$a" } } } ; "unknown accumulator")]
    #[test_case(doc! { "$group": { "_id": null, "x": 1 } } ; "accumulator not object")]
    #[test_case(doc! { "$match": { "$or": [] } } ; "match rejected by filter")]
    fn test_rejected(stage: Document) {
        let err = compile_pipeline(&[stage]).unwrap_err();
        assert!(matches!(err, ExecutorError::Rejected(_)));
    }
}
