//! CLI UI utilities: colored status lines, result tables and progress bars.

use comfy_table::{presets, Attribute, Cell, CellAlignment, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::sync::Mutex;
use std::time::Duration;

use crate::analysis::WordFrequencies;
use crate::models::{Document, Harvest};
use crate::utils::{EventSink, HarvestEvent, TracingSink};

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Pending => "○",
        Status::Search => "🔍",
        Status::Save => "💾",
    }
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Pending,
    Search,
    Save,
}

/// Print a styled status message.
#[macro_export]
macro_rules! print_status {
    ($status:expr, $($arg:tt)*) => {{
        use owo_colors::OwoColorize;
        use $crate::ui::{status_icon, Status};
        let status: Status = $status;
        let icon = status_icon(status);
        let msg = format!($($arg)*);
        match status {
            Status::Success => println!("{} {}", icon.green().bold(), msg),
            Status::Error => println!("{} {}", icon.red().bold(), msg),
            Status::Warning => println!("{} {}", icon.yellow().bold(), msg),
            Status::Info => println!("{} {}", icon.cyan().bold(), msg),
            Status::Pending => println!("{} {}", icon.white().dimmed(), msg),
            Status::Search => println!("{} {}", icon.yellow(), msg),
            Status::Save => println!("{} {}", icon.magenta(), msg),
        }
    }};
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// Print a divider line.
pub fn print_divider() {
    println!("{}", "─".repeat(80).dimmed());
}

/// Format a number with commas.
pub fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Truncate text to at most `max_chars` characters, ending in `...` when cut.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return "...".to_string();
    }
    let kept: String = text.chars().take(max_chars - 3).collect();
    format!("{}...", kept.trim_end())
}

/// Table of documents: bibcode, year, first author, title
pub fn document_table(documents: &[Document]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Bibcode", "Year", "First author", "Title"]);

    for (i, doc) in documents.iter().enumerate() {
        let first_author = match doc.authors().as_slice() {
            [] => String::new(),
            [only] => only.to_string(),
            [first, ..] => format!("{} et al.", first),
        };
        table.add_row(vec![
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(doc.bibcode().unwrap_or_default()),
            Cell::new(doc.year().unwrap_or_default()),
            Cell::new(truncate_with_ellipsis(&first_author, 30)),
            Cell::new(truncate_with_ellipsis(doc.title().unwrap_or_default(), 70))
                .add_attribute(Attribute::Bold),
        ]);
    }
    table
}

/// Table of the `top_n` most common words
pub fn frequency_table(frequencies: &WordFrequencies, top_n: usize) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_header(vec!["Rank", "Word", "Occurrences"]);

    for (rank, (word, count)) in frequencies.most_common(top_n).iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1).set_alignment(CellAlignment::Right),
            Cell::new(word).add_attribute(Attribute::Bold),
            Cell::new(count).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// Print counters and failures of a retrieval run.
pub fn print_harvest_summary(harvest: &Harvest) {
    let stats = &harvest.stats;
    print_section("Summary");
    if let Some(total) = harvest.total_found {
        println!("  Matching records: {}", format_number(total as usize).cyan());
    }
    println!("  Records retrieved: {}", format_number(harvest.len()).green().bold());
    println!(
        "  Requests: {} attempted, {} succeeded, {} failed, {} skipped ({:.1}% success)",
        stats.attempted,
        stats.succeeded,
        stats.failed,
        stats.skipped,
        stats.success_rate() * 100.0
    );
    if stats.records_without_key > 0 {
        println!("  Records without bibcode dropped: {}", stats.records_without_key);
    }
    if let Some(remaining) = harvest.rate_limit_remaining {
        println!("  Rate limit remaining: {}", format_number(remaining as usize));
    }

    if harvest.partial {
        println!();
        println!(
            "{} {}",
            status_icon(Status::Warning).yellow().bold(),
            "Incomplete: some requests did not finish".yellow()
        );
        for failure in &harvest.failures {
            match &failure.status {
                Some(status) => println!(
                    "    {} {} after {} attempt(s)",
                    failure.unit,
                    status.red(),
                    failure.attempts
                ),
                None => println!("    {} {}", failure.unit, "not attempted".dimmed()),
            }
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░ ")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
}

/// Event sink that drives a progress bar and still logs through tracing.
///
/// The bar is created when the run announces how many units it planned and
/// advances once per finished unit.
#[derive(Debug, Default)]
pub struct ProgressSink {
    bar: Mutex<Option<ProgressBar>>,
    log: TracingSink,
}

impl ProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|bar| bar.clone())
    }

    fn start(&self, units: usize, label: &str) {
        let bar = ProgressBar::new(units as u64);
        bar.set_style(bar_style());
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn take(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|mut bar| bar.take())
    }
}

impl EventSink for ProgressSink {
    fn emit(&self, event: &HarvestEvent) {
        match event {
            HarvestEvent::Planned { planned, .. } if *planned > 0 => self.start(*planned, "pages"),
            HarvestEvent::BatchesPlanned { batches, .. } if *batches > 0 => {
                self.start(*batches, "batches")
            }
            HarvestEvent::UnitSucceeded { .. } | HarvestEvent::UnitFailed { .. } => {
                if let Some(bar) = self.current() {
                    bar.inc(1);
                }
            }
            HarvestEvent::RetryScheduled { status, delay, .. } => {
                if let Some(bar) = self.current() {
                    bar.set_message(format!("{}, retrying in {:.1}s", status, delay.as_secs_f64()));
                }
            }
            HarvestEvent::RateLimit { remaining } => {
                if let Some(bar) = self.current() {
                    bar.set_message(format!("{} requests left today", format_number(*remaining as usize)));
                }
            }
            HarvestEvent::Stopped { reason, .. } => {
                if let Some(bar) = self.take() {
                    bar.abandon_with_message(format!("stopped: {}", reason));
                }
            }
            HarvestEvent::Finished { records, .. } => {
                if let Some(bar) = self.take() {
                    bar.finish_with_message(format!("{} records", format_number(*records)));
                }
            }
            _ => {}
        }

        match self.current() {
            Some(bar) => bar.suspend(|| self.log.emit(event)),
            None => self.log.emit(event),
        }
    }
}

/// A spinner for single requests.
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(msg: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(spinner_style());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    /// Remove the spinner from the terminal
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HarvestStats, PageStatus, UnitFailure, WorkUnit};
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_status_icon() {
        assert_eq!(status_icon(Status::Success), "✓");
        assert_eq!(status_icon(Status::Error), "✗");
        assert_eq!(status_icon(Status::Search), "🔍");
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("Hello", 10), "Hello");
        assert_eq!(truncate_with_ellipsis("Hello World", 8), "Hello...");
        assert_eq!(truncate_with_ellipsis("", 10), "");
        assert_eq!(truncate_with_ellipsis("Hello", 3), "...");
        assert_eq!(truncate_with_ellipsis("Ångström units", 9), "Ångstr...");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(123), "123");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1000000), "1,000,000");
    }

    #[test]
    fn test_document_table() {
        let documents = vec![
            doc(json!({
                "bibcode": "2020ApJ...900..100A",
                "title": ["A very long title about contact binaries observed by many surveys over decades"],
                "author": ["Smith, J.", "Doe, A."],
                "year": "2020"
            })),
            doc(json!({ "bibcode": "2021MNRAS.500..1B" })),
        ];

        let rendered = document_table(&documents).to_string();
        assert!(rendered.contains("2020ApJ...900..100A"));
        assert!(rendered.contains("Smith, J. et al."));
        assert!(rendered.contains("2021MNRAS.500..1B"));
    }

    #[test]
    fn test_frequency_table() {
        let frequencies = WordFrequencies::count(["star", "binary", "star"]);
        let rendered = frequency_table(&frequencies, 1).to_string();
        assert!(rendered.contains("star"));
        assert!(!rendered.contains("binary"));
    }

    #[test]
    fn test_progress_sink_tracks_units() {
        let sink = ProgressSink::new();
        let unit = WorkUnit::Lookup {
            identifier: "X".into(),
        };

        sink.emit(&HarvestEvent::BatchesPlanned {
            identifiers: 2,
            duplicates_removed: 0,
            batches: 2,
        });
        sink.emit(&HarvestEvent::UnitSucceeded {
            unit: unit.clone(),
            records: 1,
        });
        sink.emit(&HarvestEvent::UnitFailed {
            unit,
            status: PageStatus::RateLimited,
            attempts: 4,
        });
        assert_eq!(sink.current().map(|bar| bar.position()), Some(2));

        sink.emit(&HarvestEvent::Finished {
            records: 1,
            attempted: 2,
            failed: 1,
            partial: true,
        });
        assert!(sink.current().is_none());
    }

    #[test]
    fn test_summary_prints_without_panicking() {
        let harvest = Harvest {
            stats: HarvestStats {
                attempted: 1,
                failed: 1,
                skipped: 1,
                ..Default::default()
            },
            failures: vec![
                UnitFailure::failed(WorkUnit::Count, PageStatus::HttpError(401), 1),
                UnitFailure::skipped(WorkUnit::Lookup {
                    identifier: "X".into(),
                }),
            ],
            partial: true,
            ..Default::default()
        };
        print_harvest_summary(&harvest);
    }
}
