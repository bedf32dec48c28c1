//! Checkpoint files for long-running catalogue downloads.
//!
//! A checkpoint is a single JSON document:
//!
//! ```text
//! {
//!   "metadata": { "source_file": ..., "download_date": ..., "total_bibcodes": ..., "batch_size": ... },
//!   "papers": { "<bibcode>": { "title": ..., "abstract": ... } }
//! }
//! ```
//!
//! Every save writes a temporary file next to the target and renames it into
//! place, so readers see either the previous checkpoint or the new one.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::Document;

/// Errors raised while reading or writing checkpoints
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid checkpoint {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Run metadata stored with the papers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Catalogue the identifiers came from
    pub source_file: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub download_date: DateTime<Local>,
    pub total_bibcodes: usize,
    pub batch_size: usize,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_date: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub papers_retrieved: Option<usize>,
}

/// Parse RFC 3339, or an offset-free ISO 8601 time read as local time
fn parse_timestamp(raw: &str) -> Result<DateTime<Local>, String> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Local));
    }
    let naive: NaiveDateTime = raw
        .parse()
        .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))?;
    naive
        .and_local_timezone(Local)
        .earliest()
        .ok_or_else(|| format!("nonexistent local time '{}'", raw))
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Local>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(de::Error::custom)
}

fn deserialize_optional_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Local>>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_timestamp(&raw).map(Some).map_err(de::Error::custom),
        None => Ok(None),
    }
}

/// Title and abstract of one paper
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperSummary {
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
}

impl PaperSummary {
    pub fn from_document(document: &Document) -> Self {
        Self {
            title: document.title().unwrap_or_default().to_string(),
            abstract_text: document.abstract_text().unwrap_or_default().to_string(),
        }
    }

    pub fn has_abstract(&self) -> bool {
        !self.abstract_text.trim().is_empty()
    }
}

/// Papers keyed by bibcode, in the order they were first retrieved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Papers {
    entries: Vec<(String, PaperSummary)>,
    positions: HashMap<String, usize>,
}

impl Papers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace in place; a replaced paper keeps its position
    pub fn insert(&mut self, bibcode: String, paper: PaperSummary) -> Option<PaperSummary> {
        if let Some(&position) = self.positions.get(&bibcode) {
            return Some(std::mem::replace(&mut self.entries[position].1, paper));
        }
        self.positions.insert(bibcode.clone(), self.entries.len());
        self.entries.push((bibcode, paper));
        None
    }

    pub fn get(&self, bibcode: &str) -> Option<&PaperSummary> {
        self.positions.get(bibcode).map(|&position| &self.entries[position].1)
    }

    pub fn contains_key(&self, bibcode: &str) -> bool {
        self.positions.contains_key(bibcode)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PaperSummary)> {
        self.entries.iter().map(|(bibcode, paper)| (bibcode.as_str(), paper))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(bibcode, _)| bibcode.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &PaperSummary> {
        self.entries.iter().map(|(_, paper)| paper)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::ops::Index<&str> for Papers {
    type Output = PaperSummary;

    fn index(&self, bibcode: &str) -> &PaperSummary {
        match self.get(bibcode) {
            Some(paper) => paper,
            None => panic!("no paper for bibcode '{}'", bibcode),
        }
    }
}

impl Serialize for Papers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (bibcode, paper) in &self.entries {
            map.serialize_entry(bibcode, paper)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Papers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PapersVisitor;

        impl<'de> Visitor<'de> for PapersVisitor {
            type Value = Papers;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of bibcode to paper")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut papers = Papers::new();
                while let Some((bibcode, paper)) = access.next_entry::<String, PaperSummary>()? {
                    papers.insert(bibcode, paper);
                }
                Ok(papers)
            }
        }

        deserializer.deserialize_map(PapersVisitor)
    }
}

/// Contents of a checkpoint file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub metadata: CheckpointMetadata,
    #[serde(default)]
    pub papers: Papers,
}

impl Checkpoint {
    /// Start an empty checkpoint for a catalogue run
    pub fn new(source_file: impl Into<String>, total_bibcodes: usize, batch_size: usize) -> Self {
        Self {
            metadata: CheckpointMetadata {
                source_file: source_file.into(),
                download_date: Local::now(),
                total_bibcodes,
                batch_size,
                completed_date: None,
                papers_retrieved: None,
            },
            papers: Papers::new(),
        }
    }

    /// Record summaries of `documents`, keyed by bibcode; repeats replace in place
    pub fn record_documents<'a>(&mut self, documents: impl IntoIterator<Item = &'a Document>) {
        for document in documents {
            if let Some(bibcode) = document.bibcode() {
                self.papers
                    .insert(bibcode.to_string(), PaperSummary::from_document(document));
            }
        }
    }

    /// Stamp completion metadata
    pub fn mark_completed(&mut self) {
        self.metadata.completed_date = Some(Local::now());
        self.metadata.papers_retrieved = Some(self.papers.len());
    }

    pub fn is_completed(&self) -> bool {
        self.metadata.completed_date.is_some()
    }

    /// Number of stored papers that have a non-empty abstract
    pub fn papers_with_abstracts(&self) -> usize {
        self.papers.values().filter(|p| p.has_abstract()).count()
    }

    /// Load a checkpoint from disk
    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let content = fs::read_to_string(path).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| CheckpointError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the checkpoint, replacing `path` atomically
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let io_err = |source: io::Error| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, self).map_err(|source| {
                CheckpointError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        tracing::debug!("Wrote checkpoint with {} papers to {}", self.papers.len(), path.display());
        Ok(())
    }
}

/// How often and where a batch run checkpoints
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointPlan {
    pub path: PathBuf,
    /// Save after every `every` batches; 0 only saves at the end
    pub every: usize,
}

impl CheckpointPlan {
    pub fn new(path: impl Into<PathBuf>, every: usize) -> Self {
        Self {
            path: path.into(),
            every,
        }
    }

    /// Whether a save is due after `completed` batches (1-based)
    pub fn is_due(&self, completed: usize) -> bool {
        self.every > 0 && completed > 0 && completed % self.every == 0
    }
}
