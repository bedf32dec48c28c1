//! Document model for ADS search results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::IDENTITY_FIELD;

/// A single record returned by the search API.
///
/// The provider decides which fields are present (driven by the `fl`
/// parameter), so the record keeps the raw JSON object and exposes typed
/// accessors for the fields this crate relies on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Wrap a raw JSON object
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Returns the bibcode, if the record carries one
    pub fn bibcode(&self) -> Option<&str> {
        self.key(IDENTITY_FIELD)
    }

    /// Returns a string field usable as an identity key
    pub fn key(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the title. ADS returns titles as a one-element array.
    pub fn title(&self) -> Option<&str> {
        self.first_text("title")
    }

    /// Returns the abstract text
    pub fn abstract_text(&self) -> Option<&str> {
        self.first_text("abstract")
    }

    /// Returns the author names in order
    pub fn authors(&self) -> Vec<&str> {
        match self.fields.get("author") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(s)) => vec![s.as_str()],
            _ => Vec::new(),
        }
    }

    /// Returns the publication year
    pub fn year(&self) -> Option<&str> {
        self.first_text("year")
    }

    /// Returns the publication (journal) name
    pub fn publication(&self) -> Option<&str> {
        self.first_text("pub")
    }

    /// Returns the first PDF link, if any
    pub fn pdf_link(&self) -> Option<&str> {
        self.first_text("pdf")
    }

    /// Raw access to any field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// All raw fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    fn first_text(&self, field: &str) -> Option<&str> {
        let text = match self.fields.get(field)? {
            Value::String(s) => s.as_str(),
            Value::Array(items) => items.first()?.as_str()?,
            _ => return None,
        };
        (!text.trim().is_empty()).then_some(text)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_map(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_accessors() {
        let document = doc(json!({
            "bibcode": "2021AJ....161..123A",
            "title": ["Spots on contact binaries"],
            "abstract": "We model starspots.",
            "author": ["Doe, J.", "Roe, R."],
            "year": "2021",
            "pub": "The Astronomical Journal"
        }));

        assert_eq!(document.bibcode(), Some("2021AJ....161..123A"));
        assert_eq!(document.title(), Some("Spots on contact binaries"));
        assert_eq!(document.abstract_text(), Some("We model starspots."));
        assert_eq!(document.authors(), vec!["Doe, J.", "Roe, R."]);
        assert_eq!(document.year(), Some("2021"));
        assert_eq!(document.publication(), Some("The Astronomical Journal"));
    }

    #[test]
    fn test_missing_and_blank_fields() {
        let document = doc(json!({ "bibcode": "  ", "title": [], "abstract": "" }));
        assert_eq!(document.bibcode(), None);
        assert_eq!(document.title(), None);
        assert_eq!(document.abstract_text(), None);
        assert!(document.authors().is_empty());
    }

    #[test]
    fn test_serializes_transparently() {
        let document = doc(json!({ "bibcode": "X" }));
        assert_eq!(serde_json::to_value(&document).unwrap(), json!({ "bibcode": "X" }));
    }
}
