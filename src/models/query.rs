//! Query construction for the ADS search syntax.
//!
//! A [`Query`] is an immutable search expression. Terms are field scoped
//! (`title:`, `abs:`, `full:`, `bibcode:`) and combined with `AND` / `OR`.
//! Mixed combinations are parenthesised so that operator precedence on the
//! provider side never changes the meaning of the expression.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Searchable ADS fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Abstract,
    Full,
    Bibcode,
    Author,
    Year,
    /// Any other field name understood by the provider
    Other(String),
}

impl Field {
    /// Field name as used in the query language
    pub fn as_str(&self) -> &str {
        match self {
            Field::Title => "title",
            Field::Abstract => "abs",
            Field::Full => "full",
            Field::Bibcode => "bibcode",
            Field::Author => "author",
            Field::Year => "year",
            Field::Other(name) => name,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean combinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    fn keyword(self) -> &'static str {
        match self {
            BoolOp::And => " AND ",
            BoolOp::Or => " OR ",
        }
    }
}

/// An immutable search expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    text: String,
    /// Top-level operator, `None` for a single term
    op: Option<BoolOp>,
}

impl Query {
    /// Use a raw expression verbatim
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            op: None,
        }
    }

    /// `field:value`
    pub fn term(field: Field, value: &str) -> Self {
        Self::raw(format!("{}:{}", field, quote_if_needed(value)))
    }

    /// Exact-match term: `=field:"value"`
    pub fn exact(field: Field, value: &str) -> Self {
        Self::raw(format!("={}:\"{}\"", field, value.trim_matches('"')))
    }

    /// Similarity pseudo-function: `similar(bibcode)`
    pub fn similar(bibcode: &str) -> Self {
        Self::raw(format!("similar({})", bibcode))
    }

    /// Combine with another query using `AND`
    pub fn and(self, other: Query) -> Self {
        Self::combine(BoolOp::And, [self, other])
    }

    /// Combine with another query using `OR`
    pub fn or(self, other: Query) -> Self {
        Self::combine(BoolOp::Or, [self, other])
    }

    /// Join every query with `AND`. Returns `None` for an empty input.
    pub fn all_of(queries: impl IntoIterator<Item = Query>) -> Option<Self> {
        Self::join(BoolOp::And, queries)
    }

    /// Join every query with `OR`. Returns `None` for an empty input.
    pub fn any_of(queries: impl IntoIterator<Item = Query>) -> Option<Self> {
        Self::join(BoolOp::Or, queries)
    }

    /// `field:a OR field:b OR ...`
    pub fn field_any<S: AsRef<str>>(field: Field, values: &[S]) -> Option<Self> {
        Self::any_of(values.iter().map(|v| Self::term(field.clone(), v.as_ref())))
    }

    /// The rendered expression
    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn join(op: BoolOp, queries: impl IntoIterator<Item = Query>) -> Option<Self> {
        let parts: Vec<Query> = queries.into_iter().collect();
        match parts.len() {
            0 => None,
            1 => parts.into_iter().next(),
            _ => Some(Self::combine(op, parts)),
        }
    }

    fn combine(op: BoolOp, parts: impl IntoIterator<Item = Query>) -> Self {
        let text = parts
            .into_iter()
            .map(|part| match part.op {
                Some(inner) if inner != op => format!("({})", part.text),
                _ => part.text,
            })
            .collect::<Vec<_>>()
            .join(op.keyword());

        Self { text, op: Some(op) }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn quote_if_needed(value: &str) -> String {
    let already_quoted = value.len() >= 2 && value.starts_with('"') && value.ends_with('"');
    if !already_quoted && value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_rendering() {
        assert_eq!(Query::term(Field::Bibcode, "2020ApJ...1A").as_str(), "bibcode:2020ApJ...1A");
        assert_eq!(Query::term(Field::Abstract, "W UMa").as_str(), "abs:\"W UMa\"");
        assert_eq!(Query::term(Field::Full, "\"contact binary\"").as_str(), "full:\"contact binary\"");
    }

    #[test]
    fn test_exact_and_similar() {
        assert_eq!(Query::exact(Field::Title, "spot").as_str(), "=title:\"spot\"");
        assert_eq!(Query::exact(Field::Abstract, "\"spot\"").as_str(), "=abs:\"spot\"");
        assert_eq!(Query::similar("2019MNRAS.482.1A").as_str(), "similar(2019MNRAS.482.1A)");
    }

    #[test]
    fn test_field_any_joins_with_or() {
        let query = Query::field_any(Field::Bibcode, &["a", "b", "c"]).unwrap();
        assert_eq!(query.as_str(), "bibcode:a OR bibcode:b OR bibcode:c");
        assert!(Query::field_any::<&str>(Field::Bibcode, &[]).is_none());
    }

    #[test]
    fn test_mixed_operators_are_grouped() {
        let objects = Query::term(Field::Abstract, "V1").or(Query::term(Field::Abstract, "V2"));
        let query = Query::term(Field::Full, "spot").and(objects);
        assert_eq!(query.as_str(), "full:spot AND (abs:V1 OR abs:V2)");

        let chained = Query::term(Field::Title, "a")
            .and(Query::term(Field::Title, "b"))
            .and(Query::term(Field::Title, "c"));
        assert_eq!(chained.as_str(), "title:a AND title:b AND title:c");
    }

    #[test]
    fn test_single_query_join_is_unwrapped() {
        let query = Query::all_of([Query::term(Field::Year, "2020")]).unwrap();
        assert_eq!(query.as_str(), "year:2020");
    }
}
