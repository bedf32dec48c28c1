//! Outcome models for single requests and whole retrieval runs.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Document;

/// Classification of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PageStatus {
    /// 200 with a well-formed body
    Success,
    /// 429 Too Many Requests
    RateLimited,
    /// 502, 503 or 504
    ServerError(u16),
    /// Any other non-200 status
    HttpError(u16),
    /// Timeout, connection failure or other transport error
    NetworkError(String),
    /// 200 whose body is not the expected `{response: {numFound, docs}}` shape
    Malformed(String),
}

impl PageStatus {
    /// Classify an HTTP status code. 200 is optimistic: the body still has to parse.
    pub fn from_http(status: u16) -> Self {
        match status {
            200 => PageStatus::Success,
            429 => PageStatus::RateLimited,
            502..=504 => PageStatus::ServerError(status),
            other => PageStatus::HttpError(other),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PageStatus::Success)
    }

    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PageStatus::RateLimited | PageStatus::ServerError(_) | PageStatus::NetworkError(_)
        )
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageStatus::Success => write!(f, "success"),
            PageStatus::RateLimited => write!(f, "rate limited (429)"),
            PageStatus::ServerError(code) => write!(f, "server error ({})", code),
            PageStatus::HttpError(code) => write!(f, "HTTP error ({})", code),
            PageStatus::NetworkError(msg) => write!(f, "network error: {}", msg),
            PageStatus::Malformed(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

/// Result of one page request
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub status: PageStatus,
    /// `numFound` from the response, 0 on failure
    pub total_found: u64,
    pub documents: Vec<Document>,
    /// `X-RateLimit-Remaining`, when the provider sent it
    pub rate_limit_remaining: Option<u64>,
}

impl PageResult {
    pub fn success(total_found: u64, documents: Vec<Document>) -> Self {
        Self {
            status: PageStatus::Success,
            total_found,
            documents,
            rate_limit_remaining: None,
        }
    }

    pub fn failure(status: PageStatus) -> Self {
        Self {
            status,
            total_found: 0,
            documents: Vec::new(),
            rate_limit_remaining: None,
        }
    }

    pub fn with_rate_limit(mut self, remaining: Option<u64>) -> Self {
        self.rate_limit_remaining = remaining;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// A unit of planned work inside one top-level operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum WorkUnit {
    /// The count-only request that opens a paginated walk
    Count,
    /// One offset window of a paginated walk
    Page {
        index: usize,
        total: usize,
        start: usize,
        rows: usize,
    },
    /// One identifier batch
    Batch {
        index: usize,
        total: usize,
        identifiers: Vec<String>,
    },
    /// A single lookup
    Lookup { identifier: String },
}

impl WorkUnit {
    /// Identifiers covered by this unit (batches and lookups only)
    pub fn identifiers(&self) -> &[String] {
        match self {
            WorkUnit::Batch { identifiers, .. } => identifiers,
            WorkUnit::Lookup { identifier } => std::slice::from_ref(identifier),
            _ => &[],
        }
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkUnit::Count => write!(f, "count query"),
            WorkUnit::Page {
                index,
                total,
                start,
                rows,
            } => write!(f, "page {}/{} (start {}, rows {})", index + 1, total, start, rows),
            WorkUnit::Batch {
                index,
                total,
                identifiers,
            } => write!(f, "batch {}/{} ({} identifiers)", index + 1, total, identifiers.len()),
            WorkUnit::Lookup { identifier } => write!(f, "lookup {}", identifier),
        }
    }
}

/// A unit that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub unit: WorkUnit,
    /// Final status, `None` when the unit was never attempted
    pub status: Option<PageStatus>,
    pub attempts: u32,
}

impl UnitFailure {
    pub fn failed(unit: WorkUnit, status: PageStatus, attempts: u32) -> Self {
        Self {
            unit,
            status: Some(status),
            attempts,
        }
    }

    pub fn skipped(unit: WorkUnit) -> Self {
        Self {
            unit,
            status: None,
            attempts: 0,
        }
    }

    pub fn was_attempted(&self) -> bool {
        self.status.is_some()
    }
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestStats {
    /// Units that were sent to the provider
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Planned units never attempted
    pub skipped: usize,
    /// Records returned by the provider, before merging
    pub records_received: usize,
    /// Records dropped because they lacked the identity field
    pub records_without_key: usize,
}

impl HarvestStats {
    /// Fraction of attempted units that succeeded, 1.0 when nothing was attempted
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            1.0
        } else {
            self.succeeded as f64 / self.attempted as f64
        }
    }
}

/// Aggregated result of one top-level retrieval operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Harvest {
    /// Merged records, in first-seen order
    pub documents: Vec<Document>,
    pub stats: HarvestStats,
    pub failures: Vec<UnitFailure>,
    /// Some planned work did not complete
    pub partial: bool,
    /// `numFound` of the count query, for paginated walks
    pub total_found: Option<u64>,
    /// Last `X-RateLimit-Remaining` value observed
    pub rate_limit_remaining: Option<u64>,
}

impl Harvest {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Look up a record by bibcode
    pub fn get(&self, bibcode: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.bibcode() == Some(bibcode))
    }

    /// Identifiers from failed or skipped units, ready to be retried
    pub fn unfinished_identifiers(&self) -> Vec<String> {
        self.failures
            .iter()
            .flat_map(|f| f.unit.identifiers().iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(PageStatus::from_http(200), PageStatus::Success);
        assert_eq!(PageStatus::from_http(429), PageStatus::RateLimited);
        for code in [502, 503, 504] {
            assert!(PageStatus::from_http(code).is_retryable());
        }
        for code in [400, 401, 404, 500] {
            assert_eq!(PageStatus::from_http(code), PageStatus::HttpError(code));
            assert!(!PageStatus::from_http(code).is_retryable());
        }
        assert!(PageStatus::NetworkError("timeout".into()).is_retryable());
        assert!(!PageStatus::Malformed("no docs".into()).is_retryable());
    }

    #[test]
    fn test_success_rate() {
        let stats = HarvestStats {
            attempted: 4,
            succeeded: 3,
            failed: 1,
            ..Default::default()
        };
        assert_eq!(stats.success_rate(), 0.75);
        assert_eq!(HarvestStats::default().success_rate(), 1.0);
    }

    #[test]
    fn test_unfinished_identifiers() {
        let harvest = Harvest {
            failures: vec![
                UnitFailure::failed(
                    WorkUnit::Batch {
                        index: 1,
                        total: 3,
                        identifiers: vec!["b".into(), "c".into()],
                    },
                    PageStatus::RateLimited,
                    4,
                ),
                UnitFailure::skipped(WorkUnit::Batch {
                    index: 2,
                    total: 3,
                    identifiers: vec!["d".into()],
                }),
            ],
            partial: true,
            ..Default::default()
        };

        assert_eq!(harvest.unfinished_identifiers(), vec!["b", "c", "d"]);
        assert!(!harvest.failures[1].was_attempted());
    }

    #[test]
    fn test_work_unit_display() {
        let unit = WorkUnit::Page {
            index: 0,
            total: 3,
            start: 0,
            rows: 2000,
        };
        assert_eq!(unit.to_string(), "page 1/3 (start 0, rows 2000)");
    }
}
