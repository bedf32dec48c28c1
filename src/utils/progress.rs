//! Progress events for long-running retrieval operations.
//!
//! Retrieval code never prints. It emits [`HarvestEvent`]s through an
//! [`EventSink`]; the default [`TracingSink`] turns them into `tracing`
//! records, and the CLI layers a progress bar on top.
//!
//! # Usage
//!
//! ```ignore
//! use ads_harvest::utils::{EventSink, HarvestEvent, TracingSink};
//!
//! let sink = TracingSink;
//! sink.emit(&HarvestEvent::RateLimit { remaining: 4999 });
//! ```

use std::time::Duration;

use crate::models::{PageStatus, WorkUnit};

/// Something observable happened during retrieval
#[derive(Debug, Clone, PartialEq)]
pub enum HarvestEvent {
    /// The count query returned `total_found`; `planned` units will follow
    Planned { total_found: u64, planned: usize },
    /// A batch run starts
    BatchesPlanned {
        identifiers: usize,
        duplicates_removed: usize,
        batches: usize,
    },
    /// A unit is about to be requested
    UnitStarted { unit: WorkUnit },
    /// A unit returned `records` documents
    UnitSucceeded { unit: WorkUnit, records: usize },
    /// A unit failed for good
    UnitFailed {
        unit: WorkUnit,
        status: PageStatus,
        attempts: u32,
    },
    /// A transient failure will be retried after `delay`
    RetryScheduled {
        unit: WorkUnit,
        status: PageStatus,
        attempt: u32,
        remaining: u32,
        delay: Duration,
    },
    /// The provider reported its remaining request budget
    RateLimit { remaining: u64 },
    /// Politeness pause before the next request
    Pausing { delay: Duration },
    /// Remaining units will not be attempted
    Stopped { reason: String, skipped: usize },
    /// A checkpoint file was written
    CheckpointSaved { path: String, records: usize },
    /// A checkpoint write failed; retrieval continues
    CheckpointFailed { path: String, error: String },
    /// The operation is over
    Finished {
        records: usize,
        attempted: usize,
        failed: usize,
        partial: bool,
    },
}

/// Receiver of retrieval events
pub trait EventSink: Send + Sync + std::fmt::Debug {
    fn emit(&self, event: &HarvestEvent);
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &HarvestEvent) {}
}

/// Sink that logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &HarvestEvent) {
        match event {
            HarvestEvent::Planned {
                total_found,
                planned,
            } => tracing::info!(total_found, planned, "Planned paginated retrieval"),
            HarvestEvent::BatchesPlanned {
                identifiers,
                duplicates_removed,
                batches,
            } => tracing::info!(
                identifiers,
                duplicates_removed,
                batches,
                "Planned batch retrieval"
            ),
            HarvestEvent::UnitStarted { unit } => tracing::debug!("Requesting {}", unit),
            HarvestEvent::UnitSucceeded { unit, records } => {
                tracing::info!(records, "Retrieved {}", unit)
            }
            HarvestEvent::UnitFailed {
                unit,
                status,
                attempts,
            } => tracing::warn!(attempts, "{} failed: {}", unit, status),
            HarvestEvent::RetryScheduled {
                unit,
                status,
                attempt,
                remaining,
                delay,
            } => tracing::warn!(
                attempt,
                remaining,
                "{} hit {}, retrying in {:.1}s",
                unit,
                status,
                delay.as_secs_f64()
            ),
            HarvestEvent::RateLimit { remaining } => {
                tracing::debug!(remaining, "Rate limit remaining")
            }
            HarvestEvent::Pausing { delay } => {
                tracing::debug!("Waiting {:.1}s before next request", delay.as_secs_f64())
            }
            HarvestEvent::Stopped { reason, skipped } => {
                tracing::warn!(skipped, "Stopping early: {}", reason)
            }
            HarvestEvent::CheckpointSaved { path, records } => {
                tracing::info!(records, "Checkpoint saved to {}", path)
            }
            HarvestEvent::CheckpointFailed { path, error } => {
                tracing::warn!("Could not save checkpoint {}: {}", path, error)
            }
            HarvestEvent::Finished {
                records,
                attempted,
                failed,
                partial,
            } => tracing::info!(records, attempted, failed, partial, "Retrieval finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::CollectingSink;

    #[test]
    fn test_collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        sink.emit(&HarvestEvent::RateLimit { remaining: 10 });
        sink.emit(&HarvestEvent::Pausing {
            delay: Duration::from_secs(1),
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], HarvestEvent::RateLimit { remaining: 10 });
    }

    #[test]
    fn test_tracing_sink_accepts_every_event() {
        let sink = TracingSink;
        sink.emit(&HarvestEvent::Stopped {
            reason: "rate limit exhausted".into(),
            skipped: 2,
        });
        NullSink.emit(&HarvestEvent::RateLimit { remaining: 0 });
    }
}
