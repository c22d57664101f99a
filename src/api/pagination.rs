use std::collections::HashMap;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::database::FindAllOptions;
use crate::error::{codes, ApiError};
use crate::filter::{FieldPath, Filter, FilterOrder, Paging, Sort, SortOrder};

pub const DEFAULT_PER_PAGE: u64 = 20;
pub const MAX_PER_PAGE: u64 = 100;

/// What a listing endpoint allows clients to search and sort on.
#[derive(Debug, Clone, Copy)]
pub struct ListSpec {
    pub available_search: &'static [&'static str],
    pub available_sort: &'static [&'static str],
    pub default_sort: (&'static str, SortOrder),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub total_data: u64,
    pub total_page: u64,
    pub current_page: u64,
    pub per_page: u64,
    pub available_search: Vec<String>,
    pub available_sort: Vec<String>,
}

/// Parsed `page`, `per_page`, `sort` and `search` query parameters.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
    pub sort: Sort,
    pub search: Filter,
    spec: ListSpec,
}

impl Pagination {
    pub fn parse(params: &HashMap<String, String>, spec: ListSpec) -> Result<Self, ApiError> {
        let page = parse_positive(params, "page")?.unwrap_or(1);
        let per_page = parse_positive(params, "per_page")?
            .unwrap_or(DEFAULT_PER_PAGE)
            .min(MAX_PER_PAGE);
        (page - 1)
            .checked_mul(per_page)
            .filter(|skip| *skip <= i64::MAX as u64)
            .ok_or_else(|| invalid_query("page is out of range".to_string()))?;

        Ok(Self {
            page,
            per_page,
            sort: parse_sort(params.get("sort").map(String::as_str), &spec),
            search: parse_search(params.get("search").map(String::as_str), &spec),
            spec,
        })
    }

    pub fn paging(&self) -> Paging {
        Paging {
            limit: self.per_page,
            skip: (self.page - 1) * self.per_page,
        }
    }

    pub fn find_options(&self) -> FindAllOptions {
        FindAllOptions {
            paging: Some(self.paging()),
            sort: self.sort.clone(),
            ..Default::default()
        }
    }

    pub fn meta(&self, total_data: u64) -> PaginationMeta {
        PaginationMeta {
            total_data,
            total_page: total_data.div_ceil(self.per_page),
            current_page: self.page,
            per_page: self.per_page,
            available_search: self.spec.available_search.iter().map(|s| s.to_string()).collect(),
            available_sort: self.spec.available_sort.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn invalid_query(message: String) -> ApiError {
    ApiError::coded(StatusCode::BAD_REQUEST, codes::REQUEST_QUERY_INVALID, message)
}

fn parse_positive(params: &HashMap<String, String>, name: &str) -> Result<Option<u64>, ApiError> {
    match params.get(name) {
        None => Ok(None),
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) | Err(_) => Err(invalid_query(format!("{} must be a positive integer", name))),
            Ok(n) => Ok(Some(n)),
        },
    }
}

/// `field@asc` / `field@desc`. Fields outside the allowed list fall back to
/// the default sort.
fn parse_sort(raw: Option<&str>, spec: &ListSpec) -> Sort {
    let (default_field, default_order) = spec.default_sort;
    let fallback = Sort::by(default_field, default_order);
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return fallback;
    };
    match FilterOrder::parse_order_string(raw) {
        Ok(sort) if sort.0.iter().all(|(field, _)| spec.available_sort.contains(&field.as_str())) => sort,
        _ => fallback,
    }
}

fn parse_search(raw: Option<&str>, spec: &ListSpec) -> Filter {
    let Some(term) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Filter::All;
    };
    let clauses: Vec<Filter> = spec
        .available_search
        .iter()
        .map(|field| Filter::contains_ignore_case(*field, term))
        .collect();
    if clauses.is_empty() {
        Filter::All
    } else {
        Filter::Or(clauses)
    }
}

/// `?is_active=true,false` style filter on a boolean field.
pub fn boolean_filter(params: &HashMap<String, String>, name: &str, field: &str) -> Result<Filter, ApiError> {
    let Some(raw) = params.get(name) else {
        return Ok(Filter::All);
    };
    let values = raw
        .split(',')
        .map(|v| match v.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(invalid_query(format!("{} must be true or false, got {}", name, other))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Filter::is_in(FieldPath::new(field), values))
}

/// `?group=USER,ROLE` style filter restricted to known values.
pub fn enum_filter(
    params: &HashMap<String, String>,
    name: &str,
    field: &str,
    allowed: &[&str],
) -> Result<Filter, ApiError> {
    let Some(raw) = params.get(name) else {
        return Ok(Filter::All);
    };
    let values = raw
        .split(',')
        .map(|v| {
            let v = v.trim().to_uppercase();
            if allowed.contains(&v.as_str()) {
                Ok(Value::String(v))
            } else {
                Err(invalid_query(format!("{} must be one of {}", name, allowed.join(", "))))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Filter::is_in(FieldPath::new(field), values))
}
