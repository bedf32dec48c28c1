//! Text cleaning for titles and abstracts.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Stopwords tuned for astronomical literature
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "the", "and", "of", "in", "to", "a", "is", "are", "for", "with", "by", "on", "as", "at", "be",
    "or", "an", "we", "it", "that", "from", "this", "these", "have", "has", "was", "were", "been",
    "their", "they", "them", "than", "more", "can", "will", "would", "could", "should", "may",
    "might", "must", "shall", "do", "does", "did", "had", "which", "who", "what", "where", "when",
    "why", "how", "all", "any", "each", "every", "some", "many", "much", "most", "other", "such",
    "only", "own", "same", "so", "also", "just", "now", "here", "there", "then", "very", "well",
    "still", "even", "back", "through", "about", "into", "over", "after", "up", "out", "if", "no",
    "not", "new", "our", "but", "first", "last", "two", "three", "one", "year", "years", "time",
    "during", "within", "between", "under", "above", "below", "found", "using", "used", "based",
    "obtained", "observed", "presented", "show", "shows", "shown", "present", "presents",
    "analysis", "study", "studies", "paper", "data", "results", "result", "suggest", "suggests",
    "indicate", "indicates", "determine", "determined", "calculate", "calculated", "measure",
    "measured", "estimate", "estimated", "derive", "derived", "find", "finds",
];

static HTML_TAG: OnceLock<Option<Regex>> = OnceLock::new();
static BRACE_GROUP: OnceLock<Option<Regex>> = OnceLock::new();
static LATEX_COMMAND: OnceLock<Option<Regex>> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Option<Regex>>, source: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(source).ok()).as_ref()
}

/// Splits text into lowercase content words.
///
/// Markup is stripped first (HTML tags, then LaTeX `{...}` groups and
/// `\commands`), everything that is not a letter becomes a separator, and
/// words shorter than `min_word_length` or in the stopword set are dropped.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    stopwords: HashSet<String>,
    min_word_length: usize,
    keep_digits: bool,
    strip_latex: bool,
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self {
            stopwords: DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect(),
            min_word_length: 3,
            keep_digits: false,
            strip_latex: true,
        }
    }
}

impl TextCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stopword list
    pub fn stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stopwords = words.into_iter().map(|w| w.into().to_lowercase()).collect();
        self
    }

    /// Add words to the stopword list
    pub fn extra_stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stopwords
            .extend(words.into_iter().map(|w| w.into().to_lowercase()));
        self
    }

    pub fn min_word_length(mut self, length: usize) -> Self {
        self.min_word_length = length;
        self
    }

    /// Keep digits and underscores inside words
    pub fn keep_digits(mut self, keep: bool) -> Self {
        self.keep_digits = keep;
        self
    }

    pub fn strip_latex(mut self, strip: bool) -> Self {
        self.strip_latex = strip;
        self
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    /// Content words of `text`, in order
    pub fn words(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut text = text.to_string();
        if let Some(re) = pattern(&HTML_TAG, r"<[^>]+>") {
            text = re.replace_all(&text, "").into_owned();
        }
        if self.strip_latex {
            if let Some(re) = pattern(&BRACE_GROUP, r"\{[^}]*\}") {
                text = re.replace_all(&text, "").into_owned();
            }
            if let Some(re) = pattern(&LATEX_COMMAND, r"\\[a-zA-Z]+") {
                text = re.replace_all(&text, "").into_owned();
            }
        }

        let keep_digits = self.keep_digits;
        text.to_lowercase()
            .split(|c: char| {
                if keep_digits {
                    !(c.is_alphanumeric() || c == '_')
                } else {
                    !c.is_ascii_alphabetic()
                }
            })
            .filter(|w| w.chars().count() >= self.min_word_length && !self.stopwords.contains(*w))
            .map(str::to_string)
            .collect()
    }

    /// Content words joined with single spaces
    pub fn clean(&self, text: &str) -> String {
        self.words(text).join(" ")
    }
}

/// Clean `text` with the default settings
pub fn clean_text(text: &str) -> String {
    TextCleaner::default().clean(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_markup_and_stopwords() {
        let cleaned = clean_text(
            "The <i>W UMa</i> contact binaries in the {\\it Kepler} field: \\textbf photometric study of 1234 systems",
        );
        assert_eq!(cleaned, "uma contact binaries field photometric systems");
    }

    #[test]
    fn test_punctuation_and_digits_split_words() {
        assert_eq!(clean_text("light-curve; O-C diagram (2019)"), "light curve diagram");
    }

    #[test]
    fn test_min_word_length() {
        let cleaner = TextCleaner::new().min_word_length(5);
        assert_eq!(cleaner.words("short stars period"), vec!["short", "stars", "period"]);

        let cleaner = TextCleaner::new().min_word_length(6);
        assert_eq!(cleaner.words("short stars period"), vec!["period"]);
    }

    #[test]
    fn test_custom_stopwords() {
        let cleaner = TextCleaner::new().extra_stopwords(["binary", "Stars"]);
        assert_eq!(cleaner.clean("binary stars eclipse"), "eclipse");

        let cleaner = TextCleaner::new().stopwords(Vec::<String>::new());
        assert_eq!(cleaner.clean("the stars"), "the stars");
    }

    #[test]
    fn test_keep_digits() {
        let cleaner = TextCleaner::new().keep_digits(true).strip_latex(false);
        assert_eq!(cleaner.clean("gaia dr3 {catalogue}"), "gaia dr3 catalogue");
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("   "), "");
        assert!(TextCleaner::new().words("of the and").is_empty());
    }
}
