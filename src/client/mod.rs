//! ADS search client.
//!
//! [`AdsClient`] is the entry point for every retrieval operation. It is built
//! from a [`Config`] and wires together the pieces below:
//!
//! - [`Transport`]: sends one GET ([`HttpTransport`] in production)
//! - [`RequestExecutor`]: builds the request, classifies the response, retries
//! - [`Paginator`]: walks a query in offset windows of at most 2000 rows
//! - [`BatchJob`]: splits identifier lists into `bibcode:a OR bibcode:b ...` queries
//! - [`Aggregator`]: merges units into one [`Harvest`]
//!
//! Requests are strictly sequential: every await completes before the next
//! request is built.
//!
//! # Example
//!
//! ```rust,no_run
//! use ads_harvest::client::AdsClient;
//! use ads_harvest::config::Config;
//! use ads_harvest::models::{Field, FieldList, Query};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::default();
//! config.api.token = Some("my-token".into());
//!
//! let client = AdsClient::builder(&config).build()?;
//! let harvest = client
//!     .search(&Query::term(Field::Abstract, "dark matter"), &FieldList::summary(), 100)
//!     .await;
//! println!("{} papers, partial: {}", harvest.len(), harvest.partial);
//! # Ok(())
//! # }
//! ```

mod batch;
mod executor;
pub mod mock;
mod paginator;
mod transport;

pub use batch::{Batch, BatchJob};
pub use executor::{classify, RequestExecutor, RATE_LIMIT_HEADER};
pub use paginator::{plan_pages, Paginator};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport, TransportError};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::models::{
    Document, Field, FieldList, Harvest, PageRequest, PageStatus, Query, UnitFailure, WorkUnit,
    IDENTITY_FIELD, PAGE_CAP,
};
use crate::utils::{
    Aggregator, Catalogue, CatalogueError, Checkpoint, CheckpointError, CheckpointPlan, EventSink,
    HarvestEvent, Sleeper, TokioSleeper, TracingSink, DEFAULT_COLUMN,
};

/// Errors surfaced by client operations
#[derive(Debug, thiserror::Error)]
pub enum AdsError {
    #[error(
        "ADS API token is not configured (set api.token, ADS_HARVEST__API__TOKEN or ADS_API_TOKEN)"
    )]
    MissingCredentials,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{context} failed: {status}")]
    Provider { context: String, status: PageStatus },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
}

/// A non-empty API token. `Debug` never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Result<Self, AdsError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(AdsError::MissingCredentials);
        }
        Ok(Self(token))
    }

    pub fn from_option(token: Option<&str>) -> Result<Self, AdsError> {
        match token {
            Some(token) => Self::new(token),
            None => Err(AdsError::MissingCredentials),
        }
    }

    /// The raw token, for the Authorization header only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// Options for a batched identifier lookup
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOptions {
    pub batch_size: usize,
    /// Politeness delay between batches
    pub delay: Duration,
    /// Fields to return; bibcode is always added
    pub fields: FieldList,
    pub checkpoint: Option<CheckpointPlan>,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            delay: Duration::from_secs(1),
            fields: FieldList::summary(),
            checkpoint: None,
        }
    }
}

impl BulkOptions {
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fields(mut self, fields: FieldList) -> Self {
        self.fields = fields;
        self
    }

    pub fn checkpoint(mut self, plan: CheckpointPlan) -> Self {
        self.checkpoint = Some(plan);
        self
    }
}

/// A catalogue download: CSV in, checkpoint JSON out
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogueJob {
    pub csv_path: PathBuf,
    /// Column holding bibcodes
    pub column: String,
    pub output: PathBuf,
    /// Skip bibcodes already present in `output`
    pub resume: bool,
    pub batch_size: usize,
    pub delay: Duration,
    /// Save every N batches, 0 to only save at the end
    pub checkpoint_every: usize,
}

impl CatalogueJob {
    pub fn new(csv_path: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            column: DEFAULT_COLUMN.to_string(),
            output: output.into(),
            resume: false,
            batch_size: 50,
            delay: Duration::from_secs(2),
            checkpoint_every: 5,
        }
    }
}

/// Outcome of a catalogue download
#[derive(Debug, Clone)]
pub struct CatalogueReport {
    pub output: PathBuf,
    /// Unique bibcodes in the catalogue
    pub total_bibcodes: usize,
    pub duplicates_removed: usize,
    /// Bibcodes skipped because the checkpoint already had them
    pub already_present: usize,
    /// This run's retrieval
    pub harvest: Harvest,
    /// Papers in the saved file
    pub papers_saved: usize,
    pub papers_with_abstracts: usize,
}

/// Result of [`AdsClient::test_connection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub endpoint: String,
    pub total_found: u64,
    pub returned: usize,
    pub rate_limit_remaining: Option<u64>,
    pub attempts: u32,
}

/// Builder for [`AdsClient`]
#[derive(Debug)]
pub struct AdsClientBuilder {
    config: Config,
    transport: Option<Arc<dyn Transport>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    events: Option<Arc<dyn EventSink>>,
}

impl AdsClientBuilder {
    /// Use a custom transport instead of reqwest
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom sleeper for backoff and politeness delays
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Send progress events to `events` instead of tracing
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the client. Fails before any I/O when the token is missing.
    pub fn build(self) -> Result<AdsClient, AdsError> {
        let token = ApiToken::from_option(self.config.api.token.as_deref())?;
        let sort = self
            .config
            .sort_spec()
            .map_err(|e| AdsError::InvalidRequest(e.to_string()))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };
        let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper));
        let events = self.events.unwrap_or_else(|| Arc::new(TracingSink));

        let executor = RequestExecutor::new(
            transport,
            &self.config.api.base_url,
            token,
            self.config.timeout(),
            self.config.retry_policy(),
            sleeper,
            events,
        );
        let paginator = Paginator::new(
            self.config.pagination.page_cap,
            self.config.page_delay(),
            sort,
        );

        Ok(AdsClient {
            executor,
            paginator,
            config: self.config,
        })
    }
}

/// Client for the ADS search API
#[derive(Debug, Clone)]
pub struct AdsClient {
    executor: RequestExecutor,
    paginator: Paginator,
    config: Config,
}

impl AdsClient {
    pub fn builder(config: &Config) -> AdsClientBuilder {
        AdsClientBuilder {
            config: config.clone(),
            transport: None,
            sleeper: None,
            events: None,
        }
    }

    /// Client with the reqwest transport and tracing events
    pub fn from_config(config: &Config) -> Result<Self, AdsError> {
        Self::builder(config).build()
    }

    pub fn endpoint(&self) -> &str {
        self.executor.endpoint()
    }

    /// Bulk options from the `[batch]` config section
    pub fn bulk_options(&self) -> BulkOptions {
        BulkOptions {
            batch_size: self.config.batch.batch_size,
            delay: self.config.batch_delay(),
            fields: FieldList::summary(),
            checkpoint: None,
        }
    }

    /// Catalogue job with batch settings from config
    pub fn catalogue_job(&self, csv_path: impl Into<PathBuf>, output: impl Into<PathBuf>) -> CatalogueJob {
        CatalogueJob {
            batch_size: self.config.batch.batch_size,
            delay: self.config.catalogue_delay(),
            checkpoint_every: self.config.batch.checkpoint_every,
            ..CatalogueJob::new(csv_path, output)
        }
    }

    /// Run a known query (`author:Einstein`, one row) to check credentials and reachability
    pub async fn test_connection(&self) -> Result<ConnectionReport, AdsError> {
        let request = PageRequest::new(
            Query::term(Field::Author, "Einstein"),
            FieldList::of(&["bibcode", "title"]),
            1,
        );
        let outcome = self
            .executor
            .execute_with_retry(&request, &WorkUnit::Count)
            .await;

        if !outcome.value.is_success() {
            return Err(AdsError::Provider {
                context: "connection test".to_string(),
                status: outcome.value.status,
            });
        }

        tracing::info!(
            "Connected to {}: {} results",
            self.endpoint(),
            outcome.value.total_found
        );
        Ok(ConnectionReport {
            endpoint: self.endpoint().to_string(),
            total_found: outcome.value.total_found,
            returned: outcome.value.documents.len(),
            rate_limit_remaining: outcome.value.rate_limit_remaining,
            attempts: outcome.attempts,
        })
    }

    /// Every field of one paper. Unknown bibcodes give `Ok(None)`.
    pub async fn get_paper(&self, bibcode: &str) -> Result<Option<Document>, AdsError> {
        self.lookup(bibcode, FieldList::all()).await
    }

    /// Abstract of one paper, `None` when the paper is unknown or has no abstract
    pub async fn get_abstract(&self, bibcode: &str) -> Result<Option<String>, AdsError> {
        let document = self.lookup(bibcode, FieldList::summary()).await?;
        Ok(document
            .as_ref()
            .and_then(Document::abstract_text)
            .map(str::to_string))
    }

    /// Retrieve up to `max_results` records matching `query`
    pub async fn search(&self, query: &Query, fields: &FieldList, max_results: usize) -> Harvest {
        tracing::info!("Searching '{}' (max {} results)", query, max_results);
        let mut aggregator = Aggregator::new();
        self.paginator
            .collect(
                &self.executor,
                query,
                &fields.clone().with(IDENTITY_FIELD),
                max_results,
                &mut aggregator,
            )
            .await;
        self.finish(aggregator)
    }

    /// Papers similar to `bibcode`, through the same paginated walk
    pub async fn similar(&self, bibcode: &str, fields: &FieldList, max_results: usize) -> Harvest {
        self.search(&Query::similar(bibcode.trim()), fields, max_results)
            .await
    }

    /// Look up many bibcodes in batches.
    ///
    /// Batches run in input order with the politeness delay between them. A
    /// batch that is still rate limited after its retries stops the run and
    /// the remaining batches are recorded as skipped; any other failure is
    /// recorded and the run moves on. With a checkpoint plan, results are
    /// saved every `plan.every` batches and once more at the end.
    pub async fn fetch_bulk<I, S>(&self, identifiers: I, options: &BulkOptions) -> Result<Harvest, AdsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let job = BatchJob::new(identifiers, options.batch_size)
            .ok_or_else(invalid_batch_size)?;

        let Some(plan) = &options.checkpoint else {
            return Ok(self.run_batches(&job, options, None).await);
        };

        let mut checkpoint = Checkpoint::new("identifier list", job.identifiers().len(), job.batch_size());
        let harvest = self.run_batches(&job, options, Some(&mut checkpoint)).await;

        checkpoint.record_documents(&harvest.documents);
        if !harvest.partial {
            checkpoint.mark_completed();
        }
        self.save_checkpoint(&checkpoint, &plan.path)?;
        Ok(harvest)
    }

    /// Download titles and abstracts for every bibcode in a CSV catalogue.
    ///
    /// Writes `{metadata, papers}` JSON to `job.output`, checkpointing as it
    /// goes. With `job.resume`, bibcodes already present in an existing
    /// output file are not requested again.
    pub async fn download_catalogue(&self, job: &CatalogueJob) -> Result<CatalogueReport, AdsError> {
        let catalogue = Catalogue::from_path(&job.csv_path, &job.column)?;
        if catalogue.is_empty() {
            return Err(AdsError::InvalidRequest(format!(
                "no bibcodes found in column '{}' of {}",
                job.column,
                job.csv_path.display()
            )));
        }
        tracing::info!(
            "Loaded {} unique bibcodes from {} ({} duplicates removed)",
            catalogue.identifiers.len(),
            job.csv_path.display(),
            catalogue.duplicates_removed
        );

        let mut checkpoint = self.open_checkpoint(job, catalogue.identifiers.len())?;
        let pending: Vec<&String> = catalogue
            .identifiers
            .iter()
            .filter(|bibcode| !checkpoint.papers.contains_key(bibcode.as_str()))
            .collect();
        let already_present = catalogue.identifiers.len() - pending.len();
        if already_present > 0 {
            tracing::info!("Resuming: {} bibcodes already retrieved", already_present);
        }

        let options = BulkOptions {
            batch_size: job.batch_size,
            delay: job.delay,
            fields: FieldList::summary(),
            checkpoint: Some(CheckpointPlan::new(&job.output, job.checkpoint_every)),
        };
        let batch_job = BatchJob::new(pending, job.batch_size)
            .ok_or_else(invalid_batch_size)?;

        let harvest = self.run_batches(&batch_job, &options, Some(&mut checkpoint)).await;

        checkpoint.record_documents(&harvest.documents);
        if !harvest.partial {
            checkpoint.mark_completed();
        }
        self.save_checkpoint(&checkpoint, &job.output)?;

        Ok(CatalogueReport {
            output: job.output.clone(),
            total_bibcodes: catalogue.identifiers.len(),
            duplicates_removed: catalogue.duplicates_removed,
            already_present,
            papers_saved: checkpoint.papers.len(),
            papers_with_abstracts: checkpoint.papers_with_abstracts(),
            harvest,
        })
    }

    async fn lookup(&self, bibcode: &str, fields: FieldList) -> Result<Option<Document>, AdsError> {
        let bibcode = bibcode.trim();
        if bibcode.is_empty() {
            return Err(AdsError::InvalidRequest("bibcode is empty".to_string()));
        }

        let request = PageRequest::new(
            Query::term(Field::Bibcode, bibcode),
            fields.with(IDENTITY_FIELD),
            1,
        );
        let unit = WorkUnit::Lookup {
            identifier: bibcode.to_string(),
        };
        let outcome = self.executor.execute_with_retry(&request, &unit).await;

        if !outcome.value.is_success() {
            return Err(AdsError::Provider {
                context: unit.to_string(),
                status: outcome.value.status,
            });
        }
        Ok(outcome.value.documents.into_iter().next())
    }

    async fn run_batches(
        &self,
        job: &BatchJob,
        options: &BulkOptions,
        mut checkpoint: Option<&mut Checkpoint>,
    ) -> Harvest {
        let batches = job.batches();
        self.executor.emit(HarvestEvent::BatchesPlanned {
            identifiers: job.identifiers().len(),
            duplicates_removed: job.duplicates_removed(),
            batches: batches.len(),
        });

        let fields = options.fields.clone().with(IDENTITY_FIELD);
        let mut aggregator = Aggregator::new();
        let mut completed = 0;
        let mut remaining = batches.into_iter();

        while let Some(batch) = remaining.next() {
            let unit = batch.unit();
            let request = PageRequest::new(batch.query.clone(), fields.clone(), batch.len());

            self.executor.emit(HarvestEvent::UnitStarted { unit: unit.clone() });
            let outcome = self.executor.execute_with_retry(&request, &unit).await;
            aggregator.observe_rate_limit(outcome.value.rate_limit_remaining);

            if outcome.value.is_success() {
                let records = outcome.value.documents.len();
                aggregator.record_success(outcome.value.documents);
                self.executor
                    .emit(HarvestEvent::UnitSucceeded { unit, records });
            } else {
                let status = outcome.value.status;
                tracing::warn!("{} failed after {} attempts: {}", unit, outcome.attempts, status);
                self.executor.emit(HarvestEvent::UnitFailed {
                    unit: unit.clone(),
                    status: status.clone(),
                    attempts: outcome.attempts,
                });
                aggregator.record_failure(UnitFailure::failed(
                    unit,
                    status.clone(),
                    outcome.attempts,
                ));

                if status == PageStatus::RateLimited {
                    let skipped: Vec<WorkUnit> = remaining.map(|b| b.unit()).collect();
                    if !skipped.is_empty() {
                        self.executor.emit(HarvestEvent::Stopped {
                            reason: "rate limit exceeded after retries".to_string(),
                            skipped: skipped.len(),
                        });
                        aggregator.record_skipped(skipped);
                    }
                    break;
                }
            }

            completed += 1;
            if let (Some(plan), Some(checkpoint)) = (&options.checkpoint, checkpoint.as_deref_mut()) {
                if plan.is_due(completed) {
                    checkpoint.record_documents(aggregator.documents());
                    if let Err(e) = self.save_checkpoint(checkpoint, &plan.path) {
                        tracing::warn!("Checkpoint not saved, continuing: {}", e);
                    }
                }
            }

            if remaining.len() > 0 {
                self.executor.pause(options.delay).await;
            }
        }

        self.finish(aggregator)
    }

    fn open_checkpoint(&self, job: &CatalogueJob, total: usize) -> Result<Checkpoint, AdsError> {
        if job.resume && job.output.exists() {
            let mut checkpoint = Checkpoint::load(&job.output)?;
            checkpoint.metadata.total_bibcodes = total;
            checkpoint.metadata.completed_date = None;
            checkpoint.metadata.papers_retrieved = None;
            return Ok(checkpoint);
        }
        Ok(Checkpoint::new(
            job.csv_path.display().to_string(),
            total,
            job.batch_size,
        ))
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint, path: &Path) -> Result<(), AdsError> {
        match checkpoint.save(path) {
            Ok(()) => {
                self.executor.emit(HarvestEvent::CheckpointSaved {
                    path: path.display().to_string(),
                    records: checkpoint.papers.len(),
                });
                Ok(())
            }
            Err(e) => {
                self.executor.emit(HarvestEvent::CheckpointFailed {
                    path: path.display().to_string(),
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    fn finish(&self, aggregator: Aggregator) -> Harvest {
        let harvest = aggregator.finish();
        self.executor.emit(HarvestEvent::Finished {
            records: harvest.len(),
            attempted: harvest.stats.attempted,
            failed: harvest.stats.failed,
            partial: harvest.partial,
        });
        harvest
    }
}

fn invalid_batch_size() -> AdsError {
    AdsError::InvalidRequest(format!("batch size must be between 1 and {}", PAGE_CAP))
}
