use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::FilterError;

/// Dotted path into a document, e.g. `role.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    pub fn is_top_level(&self) -> bool {
        !self.0.contains('.')
    }

    /// Every segment must look like an identifier. Paths are inlined into
    /// engine queries, so nothing else gets through.
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.0.is_empty() {
            return Err(FilterError::InvalidField("Field path cannot be empty".to_string()));
        }
        for segment in self.segments() {
            let mut chars = segment.chars();
            let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
            if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(FilterError::InvalidField(format!("Invalid field path format: {}", self.0)));
            }
        }
        Ok(())
    }

    /// Postgres text-array literal for the `#>` operators.
    pub fn to_pg_path(&self) -> String {
        format!("'{{{}}}'", self.segments().collect::<Vec<_>>().join(","))
    }

    /// Resolve the path inside a document.
    pub fn lookup<'a>(&self, doc: &'a Map<String, Value>) -> Option<&'a Value> {
        let mut segments = self.segments();
        let mut current = doc.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FieldPath {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC NULLS FIRST",
            SortOrder::Desc => "DESC NULLS LAST",
        }
    }

    /// Document-database encoding used by `$sort` stages.
    pub fn to_mongo(&self) -> i64 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }

    pub fn from_mongo(value: &Value) -> Result<Self, FilterError> {
        match value.as_i64() {
            Some(1) => Ok(SortOrder::Asc),
            Some(-1) => Ok(SortOrder::Desc),
            _ => match value.as_str().map(|s| s.to_ascii_lowercase()) {
                Some(s) if s == "asc" => Ok(SortOrder::Asc),
                Some(s) if s == "desc" => Ok(SortOrder::Desc),
                _ => Err(FilterError::InvalidSort(format!("Unsupported sort direction: {}", value))),
            },
        }
    }
}

/// Ordered list of sort keys, first key wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sort(pub Vec<(FieldPath, SortOrder)>);

impl Sort {
    pub fn by(field: impl Into<FieldPath>, order: SortOrder) -> Self {
        Self(vec![(field.into(), order)])
    }

    pub fn then(mut self, field: impl Into<FieldPath>, order: SortOrder) -> Self {
        self.0.push((field.into(), order));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        self.0.iter().try_for_each(|(field, _)| field.validate())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub limit: u64,
    pub skip: u64,
}

/// Field selection applied to returned documents. `_id` always survives
/// an inclusion projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Include(Vec<FieldPath>),
    Exclude(Vec<FieldPath>),
}

impl Projection {
    /// Parse a space separated select string: `"name email"` or
    /// `"-password -hash"`. Mixing the two forms is rejected.
    pub fn parse(select: &str) -> Result<Self, FilterError> {
        let tokens: Vec<&str> = select.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(FilterError::InvalidProjection("Empty select".to_string()));
        }
        let excluded = tokens.iter().filter(|t| t.starts_with('-')).count();
        if excluded != 0 && excluded != tokens.len() {
            return Err(FilterError::InvalidProjection(format!("Cannot mix inclusion and exclusion: {}", select)));
        }
        let fields = tokens
            .iter()
            .map(|t| FieldPath::new(t.trim_start_matches('-')))
            .collect();
        let projection = if excluded == 0 { Projection::Include(fields) } else { Projection::Exclude(fields) };
        projection.validate()?;
        Ok(projection)
    }

    pub fn fields(&self) -> &[FieldPath] {
        match self {
            Projection::Include(fields) | Projection::Exclude(fields) => fields,
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        for field in self.fields() {
            field.validate()?;
            if !field.is_top_level() {
                return Err(FilterError::InvalidProjection(format!("Only top-level fields can be projected: {}", field)));
            }
        }
        Ok(())
    }

    pub fn apply(&self, doc: Map<String, Value>) -> Map<String, Value> {
        match self {
            Projection::Include(fields) => doc
                .into_iter()
                .filter(|(key, _)| key == "_id" || fields.iter().any(|f| f.as_str() == key))
                .collect(),
            Projection::Exclude(fields) => doc
                .into_iter()
                .filter(|(key, _)| !fields.iter().any(|f| f.as_str() == key))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}
