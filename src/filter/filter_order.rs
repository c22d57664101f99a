use serde_json::Value;

use super::error::FilterError;
use super::types::{FieldPath, Sort, SortOrder};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value) -> Result<Sort, FilterError> {
        let sort = match order {
            Value::Null => Sort::default(),
            Value::String(s) => Self::parse_order_string(s)?,
            Value::Array(arr) => {
                // ["createdAt@desc", "name"]
                let mut out = Sort::default();
                for v in arr {
                    let s = v
                        .as_str()
                        .ok_or_else(|| FilterError::InvalidSort(format!("Expected string, got {}", v)))?;
                    out.0.extend(Self::parse_order_string(s)?.0);
                }
                out
            }
            Value::Object(obj) => {
                // { "createdAt": -1, "name": "asc" }
                let mut out = Sort::default();
                for (k, v) in obj {
                    out.0.push((FieldPath::from(k.as_str()), SortOrder::from_mongo(v)?));
                }
                out
            }
            other => return Err(FilterError::InvalidSort(format!("Unsupported sort shape: {}", other))),
        };
        sort.validate()?;
        Ok(sort)
    }

    /// `field@asc,other@desc`; a bare field sorts ascending.
    pub fn parse_order_string(s: &str) -> Result<Sort, FilterError> {
        let mut out = Sort::default();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let (field, dir) = match trimmed.split_once('@') {
                Some((field, dir)) => (field.trim(), dir.trim()),
                None => (trimmed, "asc"),
            };
            let order = SortOrder::from_mongo(&Value::String(dir.to_string()))?;
            out.0.push((FieldPath::from(field), order));
        }
        Ok(out)
    }

    pub fn generate(sort: &Sort) -> Result<String, FilterError> {
        if sort.is_empty() {
            return Ok(String::new());
        }
        sort.validate()?;
        let parts: Vec<String> = sort
            .0
            .iter()
            .map(|(field, order)| format!("doc #> {} {}", field.to_pg_path(), order.to_sql()))
            .collect();
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}
