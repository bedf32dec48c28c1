//! Catalogue loading: identifier lists from CSV files.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Column that holds identifiers in the catalogues this tool reads
pub const DEFAULT_COLUMN: &str = "Bibcode";

/// Errors raised while reading a catalogue
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("Catalogue not found: {0}")]
    NotFound(PathBuf),

    #[error("Column '{column}' not present in catalogue header")]
    MissingColumn { column: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Identifiers read from a catalogue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalogue {
    /// Unique identifiers in first-seen order
    pub identifiers: Vec<String>,
    /// Non-blank identifier cells read, duplicates included
    pub rows_read: usize,
    pub duplicates_removed: usize,
}

impl Catalogue {
    /// Read identifiers from `column` of a CSV file with a header row
    pub fn from_path(path: &Path, column: &str) -> Result<Self, CatalogueError> {
        if !path.exists() {
            return Err(CatalogueError::NotFound(path.to_path_buf()));
        }
        let reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        Self::read(reader, column)
    }

    /// Read identifiers from any CSV source
    pub fn from_reader<R: Read>(source: R, column: &str) -> Result<Self, CatalogueError> {
        let reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);
        Self::read(reader, column)
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    fn read<R: Read>(mut reader: csv::Reader<R>, column: &str) -> Result<Self, CatalogueError> {
        let position = reader
            .headers()?
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| CatalogueError::MissingColumn {
                column: column.to_string(),
            })?;

        let mut raw = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let Some(value) = record.get(position).map(str::trim) {
                if !value.is_empty() {
                    raw.push(value.to_string());
                }
            }
        }

        let rows_read = raw.len();
        let identifiers = dedup_preserving_order(raw);
        tracing::info!(
            "Read {} identifiers ({} unique) from catalogue",
            rows_read,
            identifiers.len()
        );

        Ok(Self {
            duplicates_removed: rows_read - identifiers.len(),
            identifiers,
            rows_read,
        })
    }
}

/// Remove repeated values, keeping the first occurrence of each
pub fn dedup_preserving_order<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(Into::into)
        .filter(|v| seen.insert(v.clone()))
        .collect()
}
