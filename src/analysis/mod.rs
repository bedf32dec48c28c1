//! Text analytics over downloaded papers.
//!
//! Works on the `{metadata, papers}` files written by catalogue downloads:
//! clean titles or abstracts into content words, count them, save frequency
//! reports, and derive keyword lists for exact-match searches.

mod frequency;
mod text;

pub use frequency::{
    merge_top_words, top_keywords, FrequencyReport, ReportMetadata, WordFrequencies, GENERIC_TERMS,
};
pub use text::{clean_text, TextCleaner, DEFAULT_STOPWORDS};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::Checkpoint;

/// Errors raised while reading or writing analysis files
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Which text of each paper to analyse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Corpus {
    Titles,
    Abstracts,
}

impl Corpus {
    pub fn as_str(self) -> &'static str {
        match self {
            Corpus::Titles => "titles",
            Corpus::Abstracts => "abstracts",
        }
    }
}

/// Cleaned words of every paper's title or abstract, in retrieval order
pub fn corpus_words(checkpoint: &Checkpoint, corpus: Corpus, cleaner: &TextCleaner) -> Vec<String> {
    checkpoint
        .papers
        .values()
        .map(|paper| match corpus {
            Corpus::Titles => paper.title.as_str(),
            Corpus::Abstracts => paper.abstract_text.as_str(),
        })
        .filter(|text| !text.trim().is_empty())
        .flat_map(|text| cleaner.words(text))
        .collect()
}
