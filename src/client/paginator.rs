//! Offset pagination over a single query.

use std::time::Duration;

use super::executor::RequestExecutor;
use crate::models::{
    FieldList, PageRequest, Query, SortSpec, UnitFailure, WorkUnit, IDENTITY_FIELD, PAGE_CAP,
};
use crate::utils::{Aggregator, HarvestEvent};

/// Plan the page windows for a walk.
///
/// The walk covers `min(total_found, max_results)` records in windows of at
/// most `page_cap` rows. The cap is clamped to `1..=PAGE_CAP`.
pub fn plan_pages(total_found: u64, max_results: usize, page_cap: usize) -> Vec<WorkUnit> {
    let page_cap = page_cap.clamp(1, PAGE_CAP);
    let wanted = usize::try_from(total_found)
        .unwrap_or(usize::MAX)
        .min(max_results);
    let total = wanted.div_ceil(page_cap);

    (0..total)
        .map(|index| {
            let start = index * page_cap;
            WorkUnit::Page {
                index,
                total,
                start,
                rows: page_cap.min(wanted - start),
            }
        })
        .collect()
}

/// Walks a query page by page through the executor
#[derive(Debug, Clone)]
pub struct Paginator {
    page_cap: usize,
    page_delay: Duration,
    sort: SortSpec,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            page_cap: PAGE_CAP,
            page_delay: Duration::from_secs(1),
            sort: SortSpec::default(),
        }
    }
}

impl Paginator {
    pub fn new(page_cap: usize, page_delay: Duration, sort: SortSpec) -> Self {
        Self {
            page_cap: page_cap.clamp(1, PAGE_CAP),
            page_delay,
            sort: sort.with_tiebreak(),
        }
    }

    pub fn page_cap(&self) -> usize {
        self.page_cap
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    /// Retrieve up to `max_results` records for `query` into `aggregator`.
    ///
    /// A count request comes first. Pages follow in offset order, each one
    /// through the retry policy, with the politeness delay between pages. The
    /// first page that fails for good ends the walk; the pages after it are
    /// recorded as skipped.
    pub async fn collect(
        &self,
        executor: &RequestExecutor,
        query: &Query,
        fields: &FieldList,
        max_results: usize,
        aggregator: &mut Aggregator,
    ) {
        let count_request = PageRequest::new(query.clone(), FieldList::of(&[IDENTITY_FIELD]), 1)
            .sort(self.sort.clone());
        let count = executor
            .execute_with_retry(&count_request, &WorkUnit::Count)
            .await;
        aggregator.observe_rate_limit(count.value.rate_limit_remaining);

        if !count.value.is_success() {
            tracing::warn!("Count query for '{}' failed: {}", query, count.value.status);
            executor.emit(HarvestEvent::UnitFailed {
                unit: WorkUnit::Count,
                status: count.value.status.clone(),
                attempts: count.attempts,
            });
            aggregator.record_failure(UnitFailure::failed(
                WorkUnit::Count,
                count.value.status,
                count.attempts,
            ));
            return;
        }

        let total_found = count.value.total_found;
        aggregator.set_total_found(total_found);

        let pages = plan_pages(total_found, max_results, self.page_cap);
        executor.emit(HarvestEvent::Planned {
            total_found,
            planned: pages.len(),
        });
        if pages.is_empty() {
            tracing::info!("No results for '{}'", query);
            return;
        }

        let mut remaining = pages.into_iter();
        while let Some(unit) = remaining.next() {
            let WorkUnit::Page { start, rows, .. } = unit else {
                continue;
            };
            let request = PageRequest::new(query.clone(), fields.clone(), rows)
                .start(start)
                .sort(self.sort.clone());

            executor.emit(HarvestEvent::UnitStarted { unit: unit.clone() });
            let outcome = executor.execute_with_retry(&request, &unit).await;
            aggregator.observe_rate_limit(outcome.value.rate_limit_remaining);

            if outcome.value.is_success() {
                let records = outcome.value.documents.len();
                aggregator.record_success(outcome.value.documents);
                executor.emit(HarvestEvent::UnitSucceeded { unit, records });
            } else {
                let status = outcome.value.status;
                tracing::warn!("{} failed after {} attempts: {}", unit, outcome.attempts, status);
                executor.emit(HarvestEvent::UnitFailed {
                    unit: unit.clone(),
                    status: status.clone(),
                    attempts: outcome.attempts,
                });
                aggregator.record_failure(UnitFailure::failed(
                    unit,
                    status.clone(),
                    outcome.attempts,
                ));

                let skipped: Vec<WorkUnit> = remaining.collect();
                if !skipped.is_empty() {
                    executor.emit(HarvestEvent::Stopped {
                        reason: format!("page failed: {}", status),
                        skipped: skipped.len(),
                    });
                    aggregator.record_skipped(skipped);
                }
                return;
            }

            if remaining.len() > 0 {
                executor.pause(self.page_delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{search_body, CollectingSink, MockTransport, RecordingSleeper};
    use crate::client::transport::HttpResponse;
    use crate::client::ApiToken;
    use crate::models::{Field, PageStatus};
    use crate::utils::RetryPolicy;
    use std::sync::Arc;

    fn rows_and_starts(units: &[WorkUnit]) -> (Vec<usize>, Vec<usize>) {
        units
            .iter()
            .map(|u| match u {
                WorkUnit::Page { rows, start, .. } => (*rows, *start),
                other => panic!("unexpected unit {:?}", other),
            })
            .unzip()
    }

    fn setup(
        transport: Arc<MockTransport>,
    ) -> (RequestExecutor, Arc<RecordingSleeper>, Arc<CollectingSink>) {
        let sleeper = Arc::new(RecordingSleeper::new());
        let sink = Arc::new(CollectingSink::new());
        let executor = RequestExecutor::new(
            transport,
            "https://ads.test/v1",
            ApiToken::new("secret").unwrap(),
            Duration::from_secs(5),
            RetryPolicy::default().max_retries(1).jitter(false),
            sleeper.clone(),
            sink.clone(),
        );
        (executor, sleeper, sink)
    }

    fn paginator() -> Paginator {
        Paginator::new(PAGE_CAP, Duration::from_millis(500), SortSpec::default())
    }

    #[test]
    fn test_plan_pages_clamps_to_max_results() {
        let pages = plan_pages(4500, 5000, 2000);
        let (rows, starts) = rows_and_starts(&pages);
        assert_eq!(rows, vec![2000, 2000, 500]);
        assert_eq!(starts, vec![0, 2000, 4000]);
    }

    #[test]
    fn test_plan_pages_edge_cases() {
        assert!(plan_pages(0, 100, 2000).is_empty());
        assert!(plan_pages(100, 0, 2000).is_empty());

        let (rows, starts) = rows_and_starts(&plan_pages(10_000, 25, 2000));
        assert_eq!(rows, vec![25]);
        assert_eq!(starts, vec![0]);

        let (rows, _) = rows_and_starts(&plan_pages(5, 100, 5000));
        assert_eq!(rows, vec![5]);
    }

    #[tokio::test]
    async fn test_zero_results_only_sends_count_query() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::new(200, search_body(0, &[])));
        let (executor, sleeper, _) = setup(transport.clone());
        let mut aggregator = Aggregator::new();

        paginator()
            .collect(&executor, &Query::term(Field::Title, "nothing"), &FieldList::summary(), 100, &mut aggregator)
            .await;

        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.requests()[0].param("rows"), Some("1"));
        assert!(sleeper.sleeps().is_empty());
        let harvest = aggregator.finish();
        assert!(harvest.is_empty());
        assert!(!harvest.partial);
        assert_eq!(harvest.total_found, Some(0));
    }

    #[tokio::test]
    async fn test_walk_issues_offset_pages_with_delay_between() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::new(200, search_body(4500, &["X"])));
        transport.push_response(HttpResponse::new(200, search_body(4500, &["A", "B"])));
        transport.push_response(HttpResponse::new(200, search_body(4500, &["C"])));
        transport.push_response(HttpResponse::new(200, search_body(4500, &["D"])));
        let (executor, sleeper, _) = setup(transport.clone());
        let mut aggregator = Aggregator::new();

        paginator()
            .collect(&executor, &Query::term(Field::Abstract, "galaxy"), &FieldList::summary(), 5000, &mut aggregator)
            .await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        let rows: Vec<_> = requests[1..].iter().map(|r| r.param("rows").unwrap()).collect();
        let starts: Vec<_> = requests[1..].iter().map(|r| r.param("start").unwrap_or("0")).collect();
        assert_eq!(rows, vec!["2000", "2000", "500"]);
        assert_eq!(starts, vec!["0", "2000", "4000"]);
        assert!(requests.iter().all(|r| r.param("sort") == Some("date desc,bibcode desc")));

        assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(500); 2]);
        assert_eq!(aggregator.finish().len(), 4);
    }

    #[tokio::test]
    async fn test_terminal_page_failure_stops_walk() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::new(200, search_body(4500, &[])));
        transport.push_response(HttpResponse::new(200, search_body(4500, &["A", "B"])));
        transport.push_status(400);
        let (executor, _, sink) = setup(transport.clone());
        let mut aggregator = Aggregator::new();

        paginator()
            .collect(&executor, &Query::raw("star"), &FieldList::summary(), 5000, &mut aggregator)
            .await;

        assert_eq!(transport.call_count(), 3);
        let harvest = aggregator.finish();
        assert!(harvest.partial);
        assert_eq!(harvest.len(), 2);
        assert_eq!(harvest.stats.failed, 1);
        assert_eq!(harvest.stats.skipped, 1);
        assert_eq!(harvest.failures[0].status, Some(PageStatus::HttpError(400)));
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, HarvestEvent::Stopped { skipped: 1, .. })));
    }

    #[tokio::test]
    async fn test_failed_count_query_is_partial() {
        let transport = Arc::new(MockTransport::new());
        transport.push_status(401);
        let (executor, _, _) = setup(transport.clone());
        let mut aggregator = Aggregator::new();

        paginator()
            .collect(&executor, &Query::raw("star"), &FieldList::summary(), 10, &mut aggregator)
            .await;

        assert_eq!(transport.call_count(), 1);
        let harvest = aggregator.finish();
        assert!(harvest.partial);
        assert_eq!(harvest.failures[0].unit, WorkUnit::Count);
        assert_eq!(harvest.total_found, None);
    }
}
