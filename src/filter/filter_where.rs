use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter::Filter;
use super::types::FieldPath;

/// Translates between the JSON query dialect, the `Filter` tree and
/// parameterised Postgres SQL over a JSONB `doc` column.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Compile a filter into a WHERE predicate. Placeholders continue from
    /// `starting_param_index`; the returned params must be bound in order.
    pub fn generate(filter: &Filter, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        filter.validate()?;
        let mut filter_where = Self::new(starting_param_index);
        let sql = filter_where.build_sql_condition(filter)?;
        Ok((sql, filter_where.param_values))
    }

    pub fn parse(where_data: &Value) -> Result<Filter, FilterError> {
        match where_data {
            Value::Null => Ok(Filter::All),
            Value::Object(obj) => Self::parse_object(obj),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_object(obj: &Map<String, Value>) -> Result<Filter, FilterError> {
        let mut conditions = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                conditions.push(Self::parse_logical_operator(key, value)?);
            } else {
                conditions.extend(Self::parse_field_condition(key, value)?);
            }
        }
        Ok(match conditions.len() {
            0 => Filter::All,
            1 => conditions.remove(0),
            _ => Filter::And(conditions),
        })
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<Filter, FilterError> {
        match op {
            "$and" | "$or" | "$nor" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let parts = arr.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(match op {
                    "$and" => Filter::And(parts),
                    "$or" => Filter::Or(parts),
                    _ => Filter::Not(Box::new(Filter::Or(parts))),
                })
            }
            "$not" => Ok(Filter::Not(Box::new(Self::parse(value)?))),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<Filter>, FilterError> {
        let path = FieldPath::from(field);
        path.validate()?;

        let obj = match value {
            Value::Object(obj) if !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')) => obj,
            // Implicit equality: { field: value }
            _ => return Ok(vec![Filter::Eq(path, value.clone())]),
        };

        let case_insensitive = obj
            .get("$options")
            .and_then(Value::as_str)
            .map(|o| o.contains('i'))
            .unwrap_or(false);

        let mut out = Vec::new();
        for (op_key, op_val) in obj {
            let condition = match op_key.as_str() {
                "$eq" => Filter::Eq(path.clone(), op_val.clone()),
                "$ne" | "$neq" => Filter::Ne(path.clone(), op_val.clone()),
                "$gt" => Filter::Gt(path.clone(), op_val.clone()),
                "$gte" => Filter::Gte(path.clone(), op_val.clone()),
                "$lt" => Filter::Lt(path.clone(), op_val.clone()),
                "$lte" => Filter::Lte(path.clone(), op_val.clone()),
                "$in" => Filter::In(path.clone(), Self::array_operand(op_key, op_val)?),
                "$nin" => Filter::Nin(path.clone(), Self::array_operand(op_key, op_val)?),
                "$exists" => {
                    let flag = op_val
                        .as_bool()
                        .ok_or_else(|| FilterError::InvalidOperatorData("$exists requires boolean".to_string()))?;
                    Filter::Exists(path.clone(), flag)
                }
                "$regex" => {
                    let pattern = op_val
                        .as_str()
                        .ok_or_else(|| FilterError::InvalidOperatorData("$regex requires string".to_string()))?;
                    Filter::Regex { field: path.clone(), pattern: pattern.to_string(), case_insensitive }
                }
                "$options" => continue,
                "$not" => Filter::Not(Box::new(Self::parse_object(
                    &std::iter::once((field.to_string(), op_val.clone())).collect(),
                )?)),
                other => return Err(FilterError::UnsupportedOperator(other.to_string())),
            };
            out.push(condition);
        }
        Ok(out)
    }

    fn array_operand(op: &str, value: &Value) -> Result<Vec<Value>, FilterError> {
        value
            .as_array()
            .cloned()
            .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))
    }

    fn build_sql_condition(&mut self, filter: &Filter) -> Result<String, FilterError> {
        Ok(match filter {
            Filter::All => "TRUE".to_string(),
            Filter::Eq(field, value) => {
                let column = Self::column(field);
                if value.is_null() {
                    format!("({0} IS NULL OR {0} = 'null'::jsonb)", column)
                } else if field.as_str() == "_id" && value.is_string() {
                    format!("\"id\" = ({} #>> '{{}}')", self.param(value.clone()))
                } else {
                    format!("{} = {}", column, self.param(value.clone()))
                }
            }
            Filter::Ne(field, value) => {
                let column = Self::column(field);
                if value.is_null() {
                    format!("({0} IS NOT NULL AND {0} <> 'null'::jsonb)", column)
                } else {
                    format!("{} IS DISTINCT FROM {}", column, self.param(value.clone()))
                }
            }
            Filter::Gt(field, value) => self.comparison(field, ">", value),
            Filter::Gte(field, value) => self.comparison(field, ">=", value),
            Filter::Lt(field, value) => self.comparison(field, "<", value),
            Filter::Lte(field, value) => self.comparison(field, "<=", value),
            Filter::In(field, values) => {
                if values.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let params = self.params(values);
                if field.as_str() == "_id" && values.iter().all(Value::is_string) {
                    let texts: Vec<String> = params.iter().map(|p| format!("({} #>> '{{}}')", p)).collect();
                    format!("\"id\" IN ({})", texts.join(", "))
                } else {
                    format!("{} IN ({})", Self::column(field), params.join(", "))
                }
            }
            Filter::Nin(field, values) => {
                if values.is_empty() {
                    return Ok("TRUE".to_string());
                }
                let column = Self::column(field);
                let params = self.params(values);
                format!("({0} IS NULL OR {0} NOT IN ({1}))", column, params.join(", "))
            }
            Filter::Exists(field, true) => {
                format!("COALESCE({}, 'null'::jsonb) <> 'null'::jsonb", Self::column(field))
            }
            Filter::Exists(field, false) => {
                format!("COALESCE({}, 'null'::jsonb) = 'null'::jsonb", Self::column(field))
            }
            Filter::Regex { field, pattern, case_insensitive } => {
                let op = if *case_insensitive { "~*" } else { "~" };
                let param = self.param(Value::String(pattern.clone()));
                format!(
                    "(jsonb_typeof({}) = 'string' AND (doc #>> {}) {} ({} #>> '{{}}'))",
                    Self::column(field),
                    field.to_pg_path(),
                    op,
                    param
                )
            }
            Filter::And(parts) => {
                if parts.is_empty() {
                    return Ok("TRUE".to_string());
                }
                let sql = parts.iter().map(|p| self.build_sql_condition(p)).collect::<Result<Vec<_>, _>>()?;
                format!("({})", sql.join(" AND "))
            }
            Filter::Or(parts) => {
                if parts.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let sql = parts.iter().map(|p| self.build_sql_condition(p)).collect::<Result<Vec<_>, _>>()?;
                format!("({})", sql.join(" OR "))
            }
            Filter::Not(inner) => format!("NOT COALESCE(({}), FALSE)", self.build_sql_condition(inner)?),
        })
    }

    fn comparison(&mut self, field: &FieldPath, op: &str, value: &Value) -> String {
        let column = Self::column(field);
        let param = self.param(value.clone());
        format!("(jsonb_typeof({0}) = jsonb_typeof({1}) AND {0} {2} {1})", column, param, op)
    }

    fn column(field: &FieldPath) -> String {
        format!("(doc #> {})", field.to_pg_path())
    }

    fn params(&mut self, values: &[Value]) -> Vec<String> {
        values.iter().map(|v| self.param(v.clone())).collect()
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}::jsonb", self.param_index)
    }
}
