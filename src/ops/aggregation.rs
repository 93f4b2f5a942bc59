use std::collections::HashMap;
use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};
use crate::db::Collection;
use crate::document::{type_name, Document};
use crate::engine::converter::{canonical, number_value};
use crate::query::{matches, SortSpec};
use crate::{Result, Error, Operation};
use super::load_documents;

/// One pipeline stage. Each stage object carries exactly one operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Document),
    Group(GroupSpec),
    Sort(Option<SortSpec>),
    Project(Vec<String>),
    Limit(usize),
    Skip(usize),
    Unwind(String),
    AddFields(Document),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    id: GroupId,
    accumulators: Vec<(String, Accumulator)>,
}

#[derive(Debug, Clone, PartialEq)]
enum GroupId {
    /// `"$field"`
    Field(String),
    /// Any literal; `null` becomes the string `"null"`.
    Constant(Value),
    /// `{"out": "$field", ...}` in spec order.
    Compound(Vec<(String, String)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccumulatorKind {
    Sum,
    Avg,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Field(String),
    Constant(f64),
}

#[derive(Debug, Clone, PartialEq)]
struct Accumulator {
    kind: AccumulatorKind,
    operand: Operand,
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::Validation(msg.into())
}

fn field_ref(s: &str) -> String {
    s.strip_prefix('$').unwrap_or(s).to_string()
}

fn as_count(stage: &str, value: &Value) -> Result<usize> {
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| invalid(format!("{} must be a non-negative integer, got {}", stage, value)))
}

fn as_object(stage: &str, value: &Value) -> Result<Document> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| invalid(format!("{} must be an object, got {}", stage, type_name(value))))
}

impl Stage {
    pub fn parse(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| invalid(format!("pipeline stage must be an object, got {}", type_name(value))))?;
        if map.len() != 1 {
            return Err(invalid(format!("pipeline stage must have exactly one operator, got {}", map.len())));
        }
        let Some((op, arg)) = map.iter().next() else {
            return Err(invalid("empty pipeline stage"));
        };

        match op.as_str() {
            "$match" => Ok(Stage::Match(as_object(op, arg)?)),
            "$group" => Ok(Stage::Group(GroupSpec::parse(arg)?)),
            "$sort" => Ok(Stage::Sort(SortSpec::parse(arg)?)),
            "$project" => {
                let spec = as_object(op, arg)?;
                Ok(Stage::Project(
                    spec.into_iter()
                        .filter(|(_, flag)| flag.as_f64() == Some(1.0))
                        .map(|(field, _)| field)
                        .collect(),
                ))
            }
            "$limit" => Ok(Stage::Limit(as_count(op, arg)?)),
            "$skip" => Ok(Stage::Skip(as_count(op, arg)?)),
            "$unwind" => match arg {
                Value::String(path) => Ok(Stage::Unwind(field_ref(path))),
                other => Err(invalid(format!("$unwind must be a field path string, got {}", type_name(other)))),
            },
            "$addFields" => Ok(Stage::AddFields(as_object(op, arg)?)),
            other => Err(invalid(format!("unknown pipeline stage {:?}", other))),
        }
    }

    fn apply(&self, documents: Vec<Document>) -> Vec<Document> {
        match self {
            Stage::Match(query) => documents.into_iter().filter(|d| matches(d, query)).collect(),
            Stage::Group(spec) => spec.apply(documents),
            Stage::Sort(Some(sort)) => {
                let mut documents = documents;
                sort.sort(&mut documents);
                documents
            }
            Stage::Sort(None) => documents,
            Stage::Project(fields) => documents
                .into_iter()
                .map(|d| {
                    fields
                        .iter()
                        .filter_map(|f| d.get(f).map(|v| (f.clone(), v.clone())))
                        .collect::<Document>()
                })
                .collect(),
            Stage::Limit(n) => documents.into_iter().take(*n).collect(),
            Stage::Skip(n) => documents.into_iter().skip(*n).collect(),
            Stage::Unwind(field) => documents
                .into_iter()
                .flat_map(|d| match d.get(field).cloned() {
                    Some(Value::Array(items)) => items
                        .into_iter()
                        .map(|item| {
                            let mut copy = d.clone();
                            copy.insert(field.clone(), item);
                            copy
                        })
                        .collect::<Vec<_>>(),
                    _ => vec![d],
                })
                .collect(),
            Stage::AddFields(fields) => documents
                .into_iter()
                .map(|mut d| {
                    for (k, v) in fields {
                        d.insert(k.clone(), v.clone());
                    }
                    d
                })
                .collect(),
        }
    }
}

impl GroupSpec {
    fn parse(value: &Value) -> Result<Self> {
        let spec = as_object("$group", value)?;

        let id = match spec.get("_id") {
            Some(Value::String(s)) if s.starts_with('$') => GroupId::Field(field_ref(s)),
            Some(Value::Object(fields)) => GroupId::Compound(
                fields
                    .iter()
                    .map(|(out, path)| match path {
                        Value::String(p) => Ok((out.clone(), field_ref(p))),
                        other => Err(invalid(format!(
                            "compound _id field {:?} must be a field path, got {}",
                            out,
                            type_name(other)
                        ))),
                    })
                    .collect::<Result<_>>()?,
            ),
            Some(Value::Null) | None => GroupId::Constant(Value::String("null".to_string())),
            Some(literal) => GroupId::Constant(literal.clone()),
        };

        let mut accumulators = Vec::new();
        for (out, op) in spec.iter().filter(|(k, _)| k.as_str() != "_id") {
            accumulators.push((out.clone(), Accumulator::parse(out, op)?));
        }
        Ok(Self { id, accumulators })
    }

    /// Key used to compare groups, and the `_id` value written to the output.
    fn key(&self, document: &Document) -> (String, Value) {
        let id = match &self.id {
            GroupId::Field(f) => document.get(f).cloned().unwrap_or(Value::Null),
            GroupId::Constant(v) => v.clone(),
            GroupId::Compound(fields) => {
                let mut compound = Map::new();
                for (out, path) in fields {
                    if let Some(v) = document.get(path) {
                        compound.insert(out.clone(), v.clone());
                    }
                }
                Value::Object(compound)
            }
        };
        (canonical(&id), id)
    }

    fn apply(&self, documents: Vec<Document>) -> Vec<Document> {
        // Groups are emitted in order of first appearance.
        let mut groups: Vec<(Value, Vec<Totals>)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for document in &documents {
            let (key, id) = self.key(document);
            let pos = *positions.entry(key).or_insert_with(|| {
                groups.push((id, vec![Totals::default(); self.accumulators.len()]));
                groups.len() - 1
            });
            for ((_, acc), totals) in self.accumulators.iter().zip(groups[pos].1.iter_mut()) {
                acc.accumulate(document, totals);
            }
        }

        groups
            .into_iter()
            .map(|(id, totals)| {
                let mut out = Document::new();
                out.insert("_id".to_string(), id);
                for ((name, acc), totals) in self.accumulators.iter().zip(totals) {
                    out.insert(name.clone(), acc.finish(&totals));
                }
                out
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn parse(out: &str, value: &Value) -> Result<Self> {
        let map = value.as_object().filter(|m| m.len() == 1).ok_or_else(|| {
            invalid(format!("accumulator {:?} must be an object with one operator", out))
        })?;
        let Some((op, arg)) = map.iter().next() else {
            return Err(invalid(format!("accumulator {:?} is empty", out)));
        };
        let kind = match op.as_str() {
            "$sum" => AccumulatorKind::Sum,
            "$avg" => AccumulatorKind::Avg,
            other => return Err(invalid(format!("unsupported accumulator {:?}", other))),
        };
        let operand = match arg {
            Value::String(path) => Operand::Field(field_ref(path)),
            Value::Number(n) => Operand::Constant(n.as_f64().unwrap_or(0.0)),
            other => {
                return Err(invalid(format!(
                    "{} operand must be a field path or number, got {}",
                    op,
                    type_name(other)
                )))
            }
        };
        Ok(Self { kind, operand })
    }

    /// Non-numeric and missing values are skipped.
    fn accumulate(&self, document: &Document, totals: &mut Totals) {
        let value = match &self.operand {
            Operand::Field(f) => document.get(f).and_then(Value::as_f64),
            Operand::Constant(c) => Some(*c),
        };
        if let Some(v) = value {
            totals.sum += v;
            totals.count += 1;
        }
    }

    fn finish(&self, totals: &Totals) -> Value {
        match self.kind {
            AccumulatorKind::Sum => number_value(totals.sum),
            AccumulatorKind::Avg if totals.count == 0 => Value::Null,
            AccumulatorKind::Avg => number_value(totals.sum / totals.count as f64),
        }
    }
}

/// Validates a pipeline value into stages.
pub fn parse_pipeline(pipeline: &Value) -> Result<Vec<Stage>> {
    let stages = pipeline
        .as_array()
        .ok_or_else(|| invalid("pipeline must be an array of aggregation stages"))?;
    stages.iter().map(Stage::parse).collect()
}

/// Threads `documents` through `stages` in order.
pub fn run_pipeline(stages: &[Stage], documents: Vec<Document>) -> Vec<Document> {
    stages.iter().fold(documents, |docs, stage| stage.apply(docs))
}

/// Aggregation pipeline over the full collection.
///
/// The pipeline is validated when the operation is built, so a malformed
/// pipeline fails before any file is touched.
#[derive(Debug, Clone)]
pub struct Aggregation {
    collection: Collection,
    stages: Vec<Stage>,
}

impl Aggregation {
    pub fn new(collection: Collection, pipeline: Value) -> Result<Self> {
        let stages = parse_pipeline(&pipeline)?;
        Ok(Self { collection, stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

#[async_trait]
impl Operation for Aggregation {
    type Output = Vec<Document>;

    async fn exec(&self) -> Result<Vec<Document>> {
        let entries = {
            let guard = self.collection.lock().await;
            load_documents(&self.collection, &guard).await?
        };
        debug!("running {} stages over {} documents", self.stages.len(), entries.len());
        let documents = entries.into_iter().map(|e| e.document).collect();
        Ok(run_pipeline(&self.stages, documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::into_document;
    use serde_json::json;

    fn docs(values: Value) -> Vec<Document> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| into_document(v.clone(), "doc").unwrap())
            .collect()
    }

    fn run(pipeline: Value, input: Value) -> Value {
        let stages = parse_pipeline(&pipeline).unwrap();
        Value::Array(run_pipeline(&stages, docs(input)).into_iter().map(Value::Object).collect())
    }

    #[test]
    fn test_group_by_null_with_sum() {
        let out = run(
            json!([{"$group": {"_id": null, "total": {"$sum": "$age"}}}]),
            json!([{"age": 10}, {"age": 20}, {"age": 30}]),
        );
        assert_eq!(out, json!([{"_id": "null", "total": 60}]));
    }

    #[test]
    fn test_group_by_field_with_avg_and_count() {
        let out = run(
            json!([{"$group": {
                "_id": "$dept",
                "avgPay": {"$avg": "$pay"},
                "n": {"$sum": 1}
            }}]),
            json!([
                {"dept": "eng", "pay": 100},
                {"dept": "ops", "pay": 50},
                {"dept": "eng", "pay": 151},
                {"dept": "ops", "pay": "n/a"}
            ]),
        );
        assert_eq!(
            out,
            json!([
                {"_id": "eng", "avgPay": 125.5, "n": 2},
                {"_id": "ops", "avgPay": 50, "n": 2}
            ])
        );
    }

    #[test]
    fn test_group_by_compound_key() {
        let out = run(
            json!([{"$group": {"_id": {"c": "$city", "y": "$year"}, "total": {"$sum": "$amt"}}}]),
            json!([
                {"city": "Oslo", "year": 2024, "amt": 1},
                {"year": 2024, "city": "Oslo", "amt": 2},
                {"city": "Oslo", "year": 2025, "amt": 4}
            ]),
        );
        assert_eq!(
            out,
            json!([
                {"_id": {"c": "Oslo", "y": 2024}, "total": 3},
                {"_id": {"c": "Oslo", "y": 2025}, "total": 4}
            ])
        );
    }

    #[test]
    fn test_avg_of_no_numeric_values_is_null() {
        let out = run(
            json!([{"$group": {"_id": "all", "a": {"$avg": "$x"}}}]),
            json!([{"x": "str"}, {}]),
        );
        assert_eq!(out, json!([{"_id": "all", "a": null}]));
    }

    #[test]
    fn test_unwind() {
        let out = run(
            json!([{"$unwind": "$tags"}]),
            json!([{"name": "a", "tags": ["x", "y"]}, {"name": "b", "tags": "solo"}, {"name": "c"}]),
        );
        assert_eq!(
            out,
            json!([
                {"name": "a", "tags": "x"},
                {"name": "a", "tags": "y"},
                {"name": "b", "tags": "solo"},
                {"name": "c"}
            ])
        );
    }

    #[test]
    fn test_match_sort_project_limit_skip_in_order() {
        let input = json!([
            {"n": "a", "k": 1, "v": 5},
            {"n": "b", "k": 2, "v": 3},
            {"n": "c", "k": 1, "v": 9},
            {"n": "d", "k": 1, "v": 1}
        ]);
        let out = run(
            json!([
                {"$match": {"k": 1}},
                {"$sort": {"v": -1}},
                {"$skip": 1},
                {"$limit": 1},
                {"$project": {"v": 1, "n": 1, "k": 0}}
            ]),
            input.clone(),
        );
        assert_eq!(out, json!([{"v": 5, "n": "a"}]));

        // Order matters: limit before skip.
        let out = run(json!([{"$limit": 2}, {"$skip": 1}]), input);
        assert_eq!(out, json!([{"n": "b", "k": 2, "v": 3}]));
    }

    #[test]
    fn test_add_fields_copies_literals() {
        let out = run(
            json!([{"$addFields": {"source": "import", "v": "$other"}}]),
            json!([{"v": 1, "other": 2}]),
        );
        assert_eq!(out, json!([{"v": "$other", "other": 2, "source": "import"}]));
    }

    #[test]
    fn test_malformed_pipelines_are_rejected() {
        for bad in [
            json!({"$match": {}}),
            json!([{"$match": {}, "$limit": 1}]),
            json!([{}]),
            json!(["$match"]),
            json!([{"$bogus": 1}]),
            json!([{"$limit": -1}]),
            json!([{"$skip": "2"}]),
            json!([{"$unwind": 3}]),
            json!([{"$match": [1]}]),
            json!([{"$group": {"_id": null, "t": {"$max": "$x"}}}]),
            json!([{"$group": {"_id": {"a": 1}}}]),
            json!([{"$sort": {"v": 0}}]),
        ] {
            assert!(matches!(parse_pipeline(&bad), Err(Error::Validation(_))), "{}", bad);
        }
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let input = json!([{"a": 1}, {"a": 2}]);
        assert_eq!(run(json!([]), input.clone()), input);
    }
}
