//! Word frequency counting, reports and keyword selection.

use chrono::{DateTime, Local};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use super::AnalysisError;

/// Research terms too broad to be useful as exact-search keywords
pub const GENERIC_TERMS: &[&str] = &[
    "system", "systems", "object", "objects", "source", "sources", "method", "methods",
    "observation", "observations", "measurement", "measurements", "detection", "detections",
    "model", "models", "simulation", "simulations", "technique", "techniques", "approach",
    "approaches", "investigation", "investigations", "research", "work", "survey", "surveys",
    "catalog", "catalogue", "database", "sample", "samples", "population", "populations",
    "distribution", "distributions", "properties", "characteristics", "parameters", "values",
    "data", "dataset", "datasets", "analysis", "analyses", "statistics",
];

/// Word counts ordered by count, descending. Ties keep first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordFrequencies {
    entries: Vec<(String, u64)>,
}

impl WordFrequencies {
    /// Count every word
    pub fn count<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut entries: Vec<(String, u64)> = Vec::new();

        for word in words {
            let word = word.as_ref();
            match index.get(word) {
                Some(&position) => entries[position].1 += 1,
                None => {
                    index.insert(word.to_string(), entries.len());
                    entries.push((word.to_string(), 1));
                }
            }
        }

        Self::from_entries(entries)
    }

    /// Build from (word, count) pairs; order among equal counts is kept
    pub fn from_entries(mut entries: Vec<(String, u64)>) -> Self {
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        Self { entries }
    }

    /// The `n` most common words
    pub fn most_common(&self, n: usize) -> &[(String, u64)] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// Keep only the `n` most common words
    pub fn truncate(mut self, n: usize) -> Self {
        self.entries.truncate(n);
        self
    }

    pub fn get(&self, word: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(w, _)| w == word)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(w, c)| (w.as_str(), *c))
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(w, _)| w.as_str())
    }

    /// Distinct words
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| c).sum()
    }
}

impl Serialize for WordFrequencies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (word, count) in &self.entries {
            map.serialize_entry(word, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for WordFrequencies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FrequencyVisitor;

        impl<'de> Visitor<'de> for FrequencyVisitor {
            type Value = WordFrequencies;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of word to count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((word, count)) = access.next_entry::<String, u64>()? {
                    entries.push((word, count));
                }
                Ok(WordFrequencies::from_entries(entries))
            }
        }

        deserializer.deserialize_map(FrequencyVisitor)
    }
}

/// Header of a frequency report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Words in the cleaned text
    pub total_words: u64,
    /// Distinct words in the cleaned text
    pub unique_words: usize,
    pub top_n_words: usize,
    pub generated_at: DateTime<Local>,
}

/// The top words of one text corpus, as saved to JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyReport {
    pub metadata: ReportMetadata,
    pub word_frequencies: WordFrequencies,
}

impl FrequencyReport {
    /// Count `words` and keep the `top_n` most common
    pub fn from_words<I, S>(words: I, top_n: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let all = WordFrequencies::count(words);
        Self {
            metadata: ReportMetadata {
                total_words: all.total(),
                unique_words: all.len(),
                top_n_words: top_n,
                generated_at: Local::now(),
            },
            word_frequencies: all.truncate(top_n),
        }
    }

    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let content = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| AnalysisError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), AnalysisError> {
        let io_err = |source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| AnalysisError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)
    }
}

/// Union of the top `n` words of each list, titles first, without duplicates
pub fn merge_top_words(titles: &WordFrequencies, abstracts: &WordFrequencies, n: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    titles
        .most_common(n)
        .iter()
        .chain(abstracts.most_common(n))
        .map(|(word, _)| word.clone())
        .filter(|word| seen.insert(word.clone()))
        .collect()
}

/// Keywords suitable for exact-match searches.
///
/// Title counts are weighted twice as heavily as abstract counts. Words of
/// three letters or fewer are dropped, as are [`GENERIC_TERMS`] when
/// `exclude_generic` is set.
pub fn top_keywords(
    titles: &WordFrequencies,
    abstracts: &WordFrequencies,
    top_n: usize,
    exclude_generic: bool,
) -> Vec<String> {
    let combined = WordFrequencies::from_entries(weighted_sum(&[(titles, 2), (abstracts, 1)]));
    let generic: HashSet<&str> = if exclude_generic {
        GENERIC_TERMS.iter().copied().collect()
    } else {
        HashSet::new()
    };

    combined
        .words()
        .filter(|word| word.chars().count() > 3 && !generic.contains(word))
        .take(top_n)
        .map(str::to_string)
        .collect()
}

fn weighted_sum(sources: &[(&WordFrequencies, u64)]) -> Vec<(String, u64)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut entries: Vec<(String, u64)> = Vec::new();

    for (frequencies, weight) in sources {
        for (word, count) in frequencies.iter() {
            match index.get(word) {
                Some(&position) => entries[position].1 += count * weight,
                None => {
                    index.insert(word, entries.len());
                    entries.push((word.to_string(), count * weight));
                }
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn freq(pairs: &[(&str, u64)]) -> WordFrequencies {
        WordFrequencies::from_entries(pairs.iter().map(|(w, c)| (w.to_string(), *c)).collect())
    }

    #[test]
    fn test_count_orders_by_frequency_then_first_seen() {
        let counts = WordFrequencies::count("binary star binary period star binary eclipse".split(' '));

        let top: Vec<_> = counts.iter().collect();
        assert_eq!(top, vec![("binary", 3), ("star", 2), ("period", 1), ("eclipse", 1)]);
        assert_eq!(counts.total(), 7);
        assert_eq!(counts.most_common(2).len(), 2);
        assert_eq!(counts.most_common(10).len(), 4);
    }

    #[test]
    fn test_report_metadata_and_json_order() {
        let report = FrequencyReport::from_words(["zeta", "alpha", "zeta", "beta", "zeta", "alpha"], 2);

        assert_eq!(report.metadata.total_words, 6);
        assert_eq!(report.metadata.unique_words, 3);
        assert_eq!(report.metadata.top_n_words, 2);

        let json = serde_json::to_string(&report.word_frequencies).unwrap();
        assert_eq!(json, r#"{"zeta":3,"alpha":2}"#);
    }

    #[test]
    fn test_report_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("titles_word_frequencies.json");

        let report = FrequencyReport::from_words(["contact", "binary", "contact"], 10);
        report.save(&path).unwrap();

        let loaded = FrequencyReport::load(&path).unwrap();
        assert_eq!(loaded.word_frequencies, report.word_frequencies);
        assert_eq!(loaded.metadata.total_words, 3);

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["word_frequencies"]["contact"], 2);
        assert!(value["metadata"]["generated_at"].is_string());
    }

    #[test]
    fn test_load_missing_report() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            FrequencyReport::load(&dir.path().join("none.json")),
            Err(AnalysisError::Io { .. })
        ));
    }

    #[test]
    fn test_merge_top_words_without_duplicates() {
        let titles = freq(&[("contact", 9), ("binary", 8), ("period", 1)]);
        let abstracts = freq(&[("binary", 20), ("light", 10), ("curve", 5)]);

        assert_eq!(
            merge_top_words(&titles, &abstracts, 2),
            vec!["contact", "binary", "light"]
        );
    }

    #[test]
    fn test_top_keywords_weights_titles() {
        let titles = freq(&[("contact", 5), ("systems", 9), ("uma", 9)]);
        let abstracts = freq(&[("photometric", 9), ("contact", 1), ("spectra", 3)]);

        // contact 5*2+1 = 11, photometric 9, spectra 3; systems is generic, uma too short
        assert_eq!(
            top_keywords(&titles, &abstracts, 10, true),
            vec!["contact", "photometric", "spectra"]
        );
        assert_eq!(top_keywords(&titles, &abstracts, 1, true), vec!["contact"]);
        assert_eq!(
            top_keywords(&titles, &abstracts, 2, false),
            vec!["systems", "contact"]
        );
    }
}
