//! Utility modules supporting retrieval operations.
//!
//! - [`Aggregator`]: merge documents across batches and pages (last write wins)
//! - [`RetryPolicy`] / [`with_retry`]: bounded exponential backoff with jitter
//! - [`Sleeper`]: injectable wait used for backoff and politeness delays
//! - [`EventSink`] / [`HarvestEvent`]: structured progress reporting
//! - [`Checkpoint`]: atomically written JSON checkpoints
//! - [`Catalogue`]: identifier lists read from CSV
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use ads_harvest::models::{PageResult, PageStatus};
//! use ads_harvest::utils::{with_retry, RetryPolicy, TokioSleeper};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let policy = RetryPolicy::default().max_retries(2);
//! let outcome = with_retry(&policy, &TokioSleeper, |_attempt| async {
//!     PageResult::failure(PageStatus::ServerError(503))
//! })
//! .await;
//! assert_eq!(outcome.attempts, 3);
//! # }
//! ```

mod aggregate;
mod catalogue;
mod checkpoint;
mod progress;
mod retry;

pub use aggregate::Aggregator;
pub use catalogue::{dedup_preserving_order, Catalogue, CatalogueError, DEFAULT_COLUMN};
pub use checkpoint::{
    Checkpoint, CheckpointError, CheckpointMetadata, CheckpointPlan, PaperSummary, Papers,
};
pub use progress::{EventSink, HarvestEvent, NullSink, TracingSink};
pub use retry::{
    with_retry, with_retry_notify, Attempted, RetryNotice, RetryPolicy, Retryable, Sleeper,
    TokioSleeper,
};
