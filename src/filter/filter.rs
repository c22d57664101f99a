use std::cmp::Ordering;

use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::FilterError;
use super::filter_where::FilterWhere;
use super::types::FieldPath;

/// Engine-neutral predicate tree. Built directly by services or parsed
/// from the JSON query dialect, then compiled by each storage engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq(FieldPath, Value),
    Ne(FieldPath, Value),
    Gt(FieldPath, Value),
    Gte(FieldPath, Value),
    Lt(FieldPath, Value),
    Lte(FieldPath, Value),
    In(FieldPath, Vec<Value>),
    Nin(FieldPath, Vec<Value>),
    /// `null` counts as absent.
    Exists(FieldPath, bool),
    Regex {
        field: FieldPath,
        pattern: String,
        case_insensitive: bool,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

impl Filter {
    pub fn eq(field: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Filter::Ne(field.into(), value.into())
    }

    pub fn gt(field: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Filter::Gt(field.into(), value.into())
    }

    pub fn lt(field: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Filter::Lt(field.into(), value.into())
    }

    pub fn is_in(field: impl Into<FieldPath>, values: Vec<Value>) -> Self {
        Filter::In(field.into(), values)
    }

    pub fn not_in(field: impl Into<FieldPath>, values: Vec<Value>) -> Self {
        Filter::Nin(field.into(), values)
    }

    pub fn exists(field: impl Into<FieldPath>, exists: bool) -> Self {
        Filter::Exists(field.into(), exists)
    }

    /// Case-insensitive whole-value match, used for uniqueness checks.
    pub fn eq_ignore_case(field: impl Into<FieldPath>, value: &str) -> Self {
        Filter::Regex {
            field: field.into(),
            pattern: format!("^{}$", regex::escape(value)),
            case_insensitive: true,
        }
    }

    pub fn contains_ignore_case(field: impl Into<FieldPath>, value: &str) -> Self {
        Filter::Regex {
            field: field.into(),
            pattern: regex::escape(value),
            case_insensitive: true,
        }
    }

    pub fn id(id: Uuid) -> Self {
        Filter::Eq(FieldPath::from("_id"), Value::String(id.to_string()))
    }

    pub fn ids(ids: &[Uuid]) -> Self {
        Filter::In(
            FieldPath::from("_id"),
            ids.iter().map(|id| Value::String(id.to_string())).collect(),
        )
    }

    pub fn from_json(value: &Value) -> Result<Self, FilterError> {
        FilterWhere::parse(value)
    }

    /// Conjunction that flattens nested `And`s and drops `All`.
    pub fn and(self, other: Filter) -> Filter {
        let mut parts = Vec::new();
        for f in [self, other] {
            match f {
                Filter::All => {}
                Filter::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Filter::All,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        match self {
            Filter::All => Ok(()),
            Filter::Eq(f, _)
            | Filter::Ne(f, _)
            | Filter::Gt(f, _)
            | Filter::Gte(f, _)
            | Filter::Lt(f, _)
            | Filter::Lte(f, _)
            | Filter::In(f, _)
            | Filter::Nin(f, _)
            | Filter::Exists(f, _) => f.validate(),
            Filter::Regex { field, pattern, case_insensitive } => {
                field.validate()?;
                compile_regex(pattern, *case_insensitive).map(|_| ())
            }
            Filter::And(parts) | Filter::Or(parts) => parts.iter().try_for_each(Filter::validate),
            Filter::Not(inner) => inner.validate(),
        }
    }

    /// Evaluate against an in-memory document.
    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(f, v) => matches_eq(f.lookup(doc), v),
            Filter::Ne(f, v) => !matches_eq(f.lookup(doc), v),
            Filter::Gt(f, v) => compare_same_type(f.lookup(doc), v) == Some(Ordering::Greater),
            Filter::Gte(f, v) => matches!(compare_same_type(f.lookup(doc), v), Some(Ordering::Greater | Ordering::Equal)),
            Filter::Lt(f, v) => compare_same_type(f.lookup(doc), v) == Some(Ordering::Less),
            Filter::Lte(f, v) => matches!(compare_same_type(f.lookup(doc), v), Some(Ordering::Less | Ordering::Equal)),
            Filter::In(f, values) => match f.lookup(doc) {
                Some(actual) => values.iter().any(|v| values_equal(actual, v)),
                None => false,
            },
            Filter::Nin(f, values) => match f.lookup(doc) {
                Some(actual) => !values.iter().any(|v| values_equal(actual, v)),
                None => true,
            },
            Filter::Exists(f, expected) => is_present(f.lookup(doc)) == *expected,
            Filter::Regex { field, pattern, case_insensitive } => match field.lookup(doc) {
                Some(Value::String(s)) => compile_regex(pattern, *case_insensitive)
                    .map(|re| re.is_match(s))
                    .unwrap_or(false),
                _ => false,
            },
            Filter::And(parts) => parts.iter().all(|p| p.matches(doc)),
            Filter::Or(parts) => parts.iter().any(|p| p.matches(doc)),
            Filter::Not(inner) => !inner.matches(doc),
        }
    }
}

pub(crate) fn compile_regex(pattern: &str, case_insensitive: bool) -> Result<regex::Regex, FilterError> {
    regex::RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| FilterError::InvalidRegex { pattern: pattern.to_string(), message: e.to_string() })
}

fn is_present(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

fn matches_eq(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(actual), expected) => values_equal(actual, expected),
    }
}

/// Structural equality, numbers compared by value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_same_type(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order used when sorting documents in memory: missing and null
/// first, then numbers, strings, objects, arrays, booleans.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        _ => Ordering::Equal,
    }
}
