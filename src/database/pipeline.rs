use std::cmp::Ordering;

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::database::store::{Document, FindQuery, ID_FIELD};
use crate::filter::filter::compare_values;
use crate::filter::{FieldPath, Filter, FilterError, FilterOrder, Projection, Sort, SortOrder};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidShape(String),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

fn invalid(message: impl Into<String>) -> PipelineError {
    PipelineError::InvalidShape(message.into())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// `{ "$sum": 1 }` counts, `{ "$sum": "$field" }` totals a field.
    Sum(SumOperand),
    Min(FieldPath),
    Max(FieldPath),
    Push(FieldPath),
    First(FieldPath),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SumOperand {
    Constant(Number),
    Field(FieldPath),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// `None` groups every input document together.
    pub key: Option<FieldPath>,
    pub fields: Vec<(String, Accumulator)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Sort(Sort),
    Skip(u64),
    Limit(u64),
    Project(Projection),
    Count(String),
    Group(Group),
}

/// Aggregation pipeline accepted by `Repository::raw`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn parse(value: &Value) -> Result<Self, PipelineError> {
        let stages = value.as_array().ok_or_else(|| invalid("Pipeline must be an array of stages"))?;
        let stages = stages.iter().map(Self::parse_stage).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { stages })
    }

    fn parse_stage(value: &Value) -> Result<Stage, PipelineError> {
        let obj = value.as_object().ok_or_else(|| invalid("Stage must be an object"))?;
        if obj.len() != 1 {
            return Err(invalid("Stage must have exactly one operator"));
        }
        let Some((op, body)) = obj.iter().next() else {
            return Err(invalid("Stage must have exactly one operator"));
        };

        match op.as_str() {
            "$match" => {
                if !body.is_object() {
                    return Err(invalid("$match requires an object"));
                }
                Ok(Stage::Match(Filter::from_json(body)?))
            }
            "$sort" => {
                if !body.as_object().is_some_and(|o| !o.is_empty()) {
                    return Err(invalid("$sort requires a non-empty object"));
                }
                Ok(Stage::Sort(FilterOrder::validate_and_parse(body)?))
            }
            "$skip" => Ok(Stage::Skip(Self::parse_count(op, body)?)),
            "$limit" => Ok(Stage::Limit(Self::parse_count(op, body)?)),
            "$project" => Ok(Stage::Project(Self::parse_project(body)?)),
            "$count" => {
                let name = body.as_str().ok_or_else(|| invalid("$count requires a field name"))?;
                FieldPath::from(name).validate()?;
                Ok(Stage::Count(name.to_string()))
            }
            "$group" => Ok(Stage::Group(Self::parse_group(body)?)),
            other => Err(invalid(format!("Unsupported stage: {}", other))),
        }
    }

    fn parse_count(op: &str, body: &Value) -> Result<u64, PipelineError> {
        body.as_u64().ok_or_else(|| invalid(format!("{} requires a non-negative integer", op)))
    }

    fn parse_project(body: &Value) -> Result<Projection, PipelineError> {
        let obj = body
            .as_object()
            .filter(|o| !o.is_empty())
            .ok_or_else(|| invalid("$project requires a non-empty object"))?;
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for (field, flag) in obj {
            let on = match flag {
                Value::Bool(b) => *b,
                Value::Number(n) if n.as_i64() == Some(0) => false,
                Value::Number(n) if n.as_i64() == Some(1) => true,
                _ => return Err(invalid(format!("$project value for {} must be 0 or 1", field))),
            };
            if on {
                include.push(FieldPath::from(field.as_str()));
            } else {
                exclude.push(FieldPath::from(field.as_str()));
            }
        }
        let projection = match (include.is_empty(), exclude.is_empty()) {
            (false, true) => Projection::Include(include),
            (true, false) => Projection::Exclude(exclude),
            _ => return Err(invalid("$project cannot mix inclusion and exclusion")),
        };
        projection.validate()?;
        Ok(projection)
    }

    fn parse_group(body: &Value) -> Result<Group, PipelineError> {
        let obj = body.as_object().ok_or_else(|| invalid("$group requires an object"))?;
        let key = match obj.get(ID_FIELD) {
            Some(Value::Null) => None,
            Some(Value::String(s)) => Some(Self::parse_field_ref(s)?),
            _ => return Err(invalid("$group requires _id as null or a \"$field\" reference")),
        };

        let mut fields = Vec::new();
        for (name, spec) in obj.iter().filter(|(k, _)| k.as_str() != ID_FIELD) {
            FieldPath::from(name.as_str()).validate()?;
            let spec = spec
                .as_object()
                .filter(|o| o.len() == 1)
                .ok_or_else(|| invalid(format!("Accumulator for {} must have one operator", name)))?;
            let Some((op, arg)) = spec.iter().next() else {
                return Err(invalid(format!("Accumulator for {} must have one operator", name)));
            };
            let field_arg = || -> Result<FieldPath, PipelineError> {
                let s = arg.as_str().ok_or_else(|| invalid(format!("{} requires a \"$field\" reference", op)))?;
                Self::parse_field_ref(s)
            };
            let accumulator = match op.as_str() {
                "$sum" => match arg {
                    Value::Number(n) => Accumulator::Sum(SumOperand::Constant(n.clone())),
                    _ => Accumulator::Sum(SumOperand::Field(field_arg()?)),
                },
                "$min" => Accumulator::Min(field_arg()?),
                "$max" => Accumulator::Max(field_arg()?),
                "$push" => Accumulator::Push(field_arg()?),
                "$first" => Accumulator::First(field_arg()?),
                other => return Err(invalid(format!("Unsupported accumulator: {}", other))),
            };
            fields.push((name.clone(), accumulator));
        }
        Ok(Group { key, fields })
    }

    fn parse_field_ref(s: &str) -> Result<FieldPath, PipelineError> {
        let path = s
            .strip_prefix('$')
            .ok_or_else(|| invalid(format!("Expected a \"$field\" reference, got {}", s)))?;
        let path = FieldPath::from(path);
        path.validate()?;
        Ok(path)
    }

    /// Split off the leading stages an engine can answer with a plain find:
    /// `$match` and `$sort` before any paging, then `$skip`/`$limit`.
    pub fn pushdown(&self) -> (FindQuery, &[Stage]) {
        let mut query = FindQuery::default();
        let mut consumed = 0;
        for stage in &self.stages {
            let paged = query.skip > 0 || query.limit.is_some();
            match stage {
                Stage::Match(filter) if query.sort.is_empty() && !paged => {
                    query.filter = std::mem::take(&mut query.filter).and(filter.clone());
                }
                Stage::Sort(sort) if query.sort.is_empty() && !paged => query.sort = sort.clone(),
                Stage::Skip(n) if query.limit.is_none() => query.skip = query.skip.saturating_add(*n),
                Stage::Limit(n) => query.limit = Some(query.limit.map_or(*n, |l| l.min(*n))),
                _ => break,
            }
            consumed += 1;
        }
        (query, &self.stages[consumed..])
    }
}

/// Evaluate stages over documents in process.
pub fn run(stages: &[Stage], mut docs: Vec<Document>) -> Vec<Document> {
    for stage in stages {
        docs = match stage {
            Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
            Stage::Sort(sort) => {
                sort_documents(&mut docs, sort);
                docs
            }
            Stage::Skip(n) => docs.into_iter().skip(*n as usize).collect(),
            Stage::Limit(n) => docs.into_iter().take(*n as usize).collect(),
            Stage::Project(projection) => docs.into_iter().map(|d| projection.apply(d)).collect(),
            Stage::Count(name) => {
                if docs.is_empty() {
                    vec![]
                } else {
                    let mut out = Map::new();
                    out.insert(name.clone(), Value::from(docs.len() as u64));
                    vec![out]
                }
            }
            Stage::Group(group) => run_group(group, docs),
        };
    }
    docs
}

/// Stable multi-key sort matching the Postgres `NULLS FIRST/LAST` ordering.
pub fn sort_documents(docs: &mut [Document], sort: &Sort) {
    if sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for (field, order) in &sort.0 {
            let ord = compare_values(field.lookup(a), field.lookup(b));
            let ord = match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn run_group(group: &Group, docs: Vec<Document>) -> Vec<Document> {
    let mut buckets: Vec<(Value, Vec<Document>)> = Vec::new();
    for doc in docs {
        let key = group
            .key
            .as_ref()
            .and_then(|k| k.lookup(&doc).cloned())
            .unwrap_or(Value::Null);
        match buckets.iter_mut().find(|(k, _)| crate::filter::filter::values_equal(k, &key)) {
            Some((_, members)) => members.push(doc),
            None => buckets.push((key, vec![doc])),
        }
    }

    buckets
        .into_iter()
        .map(|(key, members)| {
            let mut out = Map::new();
            out.insert(ID_FIELD.to_string(), key);
            for (name, accumulator) in &group.fields {
                out.insert(name.clone(), accumulate(accumulator, &members));
            }
            out
        })
        .collect()
}

fn accumulate(accumulator: &Accumulator, members: &[Document]) -> Value {
    let present = |field: &FieldPath| -> Vec<Value> {
        members
            .iter()
            .filter_map(|d| field.lookup(d))
            .filter(|v| !v.is_null())
            .cloned()
            .collect()
    };
    match accumulator {
        Accumulator::Sum(operand) => {
            let numbers: Vec<Number> = match operand {
                SumOperand::Constant(n) => vec![n.clone(); members.len()],
                SumOperand::Field(field) => present(field)
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Number(n) => Some(n),
                        _ => None,
                    })
                    .collect(),
            };
            sum_numbers(&numbers)
        }
        Accumulator::Min(field) => present(field)
            .into_iter()
            .min_by(|a, b| compare_values(Some(a), Some(b)))
            .unwrap_or(Value::Null),
        Accumulator::Max(field) => present(field)
            .into_iter()
            .max_by(|a, b| compare_values(Some(a), Some(b)))
            .unwrap_or(Value::Null),
        Accumulator::Push(field) => Value::Array(present(field)),
        Accumulator::First(field) => members
            .first()
            .and_then(|d| field.lookup(d).cloned())
            .unwrap_or(Value::Null),
    }
}

fn sum_numbers(numbers: &[Number]) -> Value {
    if numbers.iter().all(|n| n.is_i64()) {
        let total: i64 = numbers.iter().filter_map(Number::as_i64).sum();
        Value::from(total)
    } else {
        let total: f64 = numbers.iter().filter_map(Number::as_f64).sum();
        Number::from_f64(total).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs(v: Value) -> Vec<Document> {
        v.as_array().unwrap().iter().map(|d| d.as_object().cloned().unwrap()).collect()
    }

    #[test]
    fn rejects_unsupported_shapes() {
        assert!(Pipeline::parse(&json!({ "$match": {} })).is_err());
        assert!(Pipeline::parse(&json!([{ "$lookup": {} }])).is_err());
        assert!(Pipeline::parse(&json!([{ "$match": {}, "$limit": 1 }])).is_err());
        assert!(Pipeline::parse(&json!([{ "$limit": -1 }])).is_err());
        assert!(Pipeline::parse(&json!([{ "$project": { "a": 1, "b": 0 } }])).is_err());
        assert!(Pipeline::parse(&json!([{ "$group": { "_id": "name" } }])).is_err());
        assert!(Pipeline::parse(&json!([])).is_ok());
    }

    #[test]
    fn pushes_leading_find_stages() {
        let pipeline = Pipeline::parse(&json!([
            { "$match": { "isActive": true } },
            { "$sort": { "name": 1 } },
            { "$skip": 5 },
            { "$limit": 10 },
            { "$skip": 1 },
            { "$count": "total" }
        ]))
        .unwrap();
        let (query, rest) = pipeline.pushdown();
        assert_eq!(query.filter, Filter::eq("isActive", true));
        assert_eq!(query.sort, Sort::by("name", SortOrder::Asc));
        assert_eq!(query.skip, 5);
        assert_eq!(query.limit, Some(10));
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn consecutive_skips_saturate() {
        let pipeline = Pipeline::parse(&json!([
            { "$skip": u64::MAX },
            { "$skip": 1 }
        ]))
        .unwrap();
        let (query, rest) = pipeline.pushdown();
        assert_eq!(query.skip, u64::MAX);
        assert!(rest.is_empty());
    }

    #[test]
    fn groups_and_accumulates() {
        let input = docs(json!([
            { "group": "USER", "n": 1, "code": "a" },
            { "group": "ROLE", "n": 2, "code": "b" },
            { "group": "USER", "n": 3, "code": "c" }
        ]));
        let pipeline = Pipeline::parse(&json!([
            { "$group": {
                "_id": "$group",
                "count": { "$sum": 1 },
                "total": { "$sum": "$n" },
                "codes": { "$push": "$code" },
                "max": { "$max": "$n" }
            } },
            { "$sort": { "_id": 1 } }
        ]))
        .unwrap();
        let out = run(pipeline.stages(), input);
        assert_eq!(
            Value::Array(out.into_iter().map(Value::Object).collect()),
            json!([
                { "_id": "ROLE", "count": 1, "total": 2, "codes": ["b"], "max": 2 },
                { "_id": "USER", "count": 2, "total": 4, "codes": ["a", "c"], "max": 3 }
            ])
        );
    }

    #[test]
    fn count_on_empty_input_yields_nothing() {
        let pipeline = Pipeline::parse(&json!([{ "$count": "total" }])).unwrap();
        assert!(run(pipeline.stages(), vec![]).is_empty());
        let out = run(pipeline.stages(), docs(json!([{ "a": 1 }, { "a": 2 }])));
        assert_eq!(Value::Object(out[0].clone()), json!({ "total": 2 }));
    }
}
