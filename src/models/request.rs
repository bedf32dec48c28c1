//! Page request models.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Query;

/// Maximum number of rows the provider returns for one request
pub const PAGE_CAP: usize = 2000;

/// Field used as the identity of a record
pub const IDENTITY_FIELD: &str = "bibcode";

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

impl SortOrder {
    fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

/// Explicit sort specification sent with every page request.
///
/// Offsets are only meaningful if the provider returns records in the same
/// order on every page, so a spec always ends with the identity field as a
/// unique tiebreaker (see [`SortSpec::with_tiebreak`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// Sort by a single field
    pub fn by(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            keys: vec![SortKey {
                field: field.into(),
                order,
            }],
        }
    }

    /// Add a secondary key
    pub fn then(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.keys.push(SortKey {
            field: field.into(),
            order,
        });
        self
    }

    /// Make the identity field the last key. An existing identity key is
    /// moved there with its order; otherwise `bibcode desc` is appended.
    pub fn with_tiebreak(mut self) -> Self {
        let order = self
            .keys
            .iter()
            .find(|k| k.field == IDENTITY_FIELD)
            .map_or(SortOrder::Desc, |k| k.order);
        self.keys.retain(|k| k.field != IDENTITY_FIELD);
        self.keys.push(SortKey {
            field: IDENTITY_FIELD.to_string(),
            order,
        });
        self
    }

    /// Parse `"date desc, bibcode asc"`
    pub fn parse(spec: &str) -> Option<Self> {
        let mut keys = Vec::new();
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let mut tokens = part.split_whitespace();
            let field = tokens.next()?;
            let order = match tokens.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("desc") => SortOrder::Desc,
                Some("asc") => SortOrder::Asc,
                Some(_) => return None,
            };
            if tokens.next().is_some() {
                return None;
            }
            keys.push(SortKey {
                field: field.to_string(),
                order,
            });
        }
        (!keys.is_empty()).then_some(Self { keys })
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec::by("date", SortOrder::Desc).with_tiebreak()
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .keys
            .iter()
            .map(|k| format!("{} {}", k.field, k.order.as_str()))
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&rendered)
    }
}

/// Fields to return (`fl` parameter)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldList {
    fields: Vec<String>,
}

impl FieldList {
    /// Every available field (`*`)
    pub fn all() -> Self {
        Self {
            fields: vec!["*".to_string()],
        }
    }

    /// An explicit list of fields
    pub fn of<S: AsRef<str>>(fields: &[S]) -> Self {
        let mut list = Self { fields: Vec::new() };
        for field in fields {
            list = list.with(field.as_ref());
        }
        list
    }

    /// `bibcode,title,abstract`
    pub fn summary() -> Self {
        Self::of(&["bibcode", "title", "abstract"])
    }

    /// Add a field if it is not already requested
    pub fn with(mut self, field: &str) -> Self {
        let field = field.trim();
        if !field.is_empty() && !self.includes(field) {
            self.fields.push(field.to_string());
        }
        self
    }

    /// Whether the field is returned, `*` returns everything
    pub fn includes(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == "*" || f == field)
    }

    /// Parse a comma separated list
    pub fn parse(list: &str) -> Self {
        let fields: Vec<&str> = list.split(',').collect();
        Self::of(&fields)
    }
}

impl Default for FieldList {
    fn default() -> Self {
        Self::summary()
    }
}

impl fmt::Display for FieldList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fields.join(","))
    }
}

/// A single request for one window of results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub query: Query,
    pub fields: FieldList,
    pub rows: usize,
    pub start: usize,
    pub sort: Option<SortSpec>,
}

impl PageRequest {
    /// Create a request for the first `rows` results, capped at [`PAGE_CAP`]
    pub fn new(query: Query, fields: FieldList, rows: usize) -> Self {
        Self {
            query,
            fields,
            rows: rows.min(PAGE_CAP),
            start: 0,
            sort: None,
        }
    }

    /// Set the start offset
    pub fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    /// Set the sort specification
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Query string parameters in the order they are sent
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("q".to_string(), self.query.to_string()),
            ("fl".to_string(), self.fields.to_string()),
            ("rows".to_string(), self.rows.to_string()),
        ];
        if self.start > 0 {
            params.push(("start".to_string(), self.start.to_string()));
        }
        if let Some(sort) = &self.sort {
            params.push(("sort".to_string(), sort.to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    #[test]
    fn test_default_sort_ends_with_identity() {
        assert_eq!(SortSpec::default().to_string(), "date desc,bibcode desc");
    }

    #[test]
    fn test_tiebreak_moves_identity_last() {
        let spec = SortSpec::by("bibcode", SortOrder::Asc)
            .then("citation_count", SortOrder::Desc)
            .with_tiebreak();
        assert_eq!(spec.to_string(), "citation_count desc,bibcode asc");

        let parsed = SortSpec::parse("bibcode asc, date desc").unwrap().with_tiebreak();
        assert_eq!(parsed.to_string(), "date desc,bibcode asc");

        let appended = SortSpec::by("citation_count", SortOrder::Asc).with_tiebreak();
        assert_eq!(appended.to_string(), "citation_count asc,bibcode desc");

        let untouched = SortSpec::by("bibcode", SortOrder::Asc).with_tiebreak();
        assert_eq!(untouched.to_string(), "bibcode asc");
    }

    #[test]
    fn test_sort_parse() {
        let spec = SortSpec::parse("date desc, citation_count asc").unwrap();
        assert_eq!(spec.keys().len(), 2);
        assert_eq!(spec.keys()[1].order, SortOrder::Asc);
        assert!(SortSpec::parse("date sideways").is_none());
        assert!(SortSpec::parse("  ").is_none());
    }

    #[test]
    fn test_field_list() {
        let fields = FieldList::parse("title, abstract,title").with("bibcode");
        assert_eq!(fields.to_string(), "title,abstract,bibcode");
        assert!(FieldList::all().includes("bibcode"));
    }

    #[test]
    fn test_page_request_params() {
        let request = PageRequest::new(Query::term(Field::Title, "binary"), FieldList::summary(), 5000)
            .start(2000)
            .sort(SortSpec::default());

        assert_eq!(request.rows, PAGE_CAP);
        let params = request.params();
        assert_eq!(params[0], ("q".to_string(), "title:binary".to_string()));
        assert_eq!(params[2], ("rows".to_string(), "2000".to_string()));
        assert_eq!(params[3], ("start".to_string(), "2000".to_string()));
        assert_eq!(params[4].0, "sort");
    }
}
