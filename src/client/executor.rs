//! Request execution: one GET, classified.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::transport::{HttpRequest, HttpResponse, Transport};
use super::ApiToken;
use crate::models::{Document, PageRequest, PageResult, PageStatus, WorkUnit};
use crate::utils::{with_retry_notify, Attempted, EventSink, HarvestEvent, RetryPolicy, Sleeper};

/// Header carrying the provider's remaining request budget
pub const RATE_LIMIT_HEADER: &str = "X-RateLimit-Remaining";

const SEARCH_PATH: &str = "/search/query";

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: Option<SearchBody>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(rename = "numFound", default)]
    num_found: u64,
    docs: Option<Vec<Map<String, Value>>>,
}

/// Sends page requests and turns every outcome into a [`PageResult`].
///
/// Expected failures (HTTP errors, transport errors, malformed bodies) are
/// values, never `Err`. Retries, politeness pauses and event emission all go
/// through the executor so the paginator and batch runner stay sequential and
/// free of I/O details.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    endpoint: String,
    token: ApiToken,
    timeout: Duration,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    events: Arc<dyn EventSink>,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: &str,
        token: ApiToken,
        timeout: Duration,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            transport,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), SEARCH_PATH),
            token,
            timeout,
            policy,
            sleeper,
            events,
        }
    }

    /// Full URL of the search endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Single attempt, no retry
    pub async fn execute(&self, request: &PageRequest) -> PageResult {
        let http = self.build_request(request);
        tracing::debug!(q = %request.query, rows = request.rows, start = request.start, "GET {}", self.endpoint);

        match self.transport.get(&http).await {
            Ok(response) => {
                let result = classify(&response);
                if let Some(remaining) = result.rate_limit_remaining {
                    self.emit(HarvestEvent::RateLimit { remaining });
                }
                result
            }
            Err(err) => PageResult::failure(PageStatus::NetworkError(err.to_string())),
        }
    }

    /// Execute through the retry policy, reporting each scheduled retry for `unit`
    pub async fn execute_with_retry(
        &self,
        request: &PageRequest,
        unit: &WorkUnit,
    ) -> Attempted<PageResult> {
        with_retry_notify(
            &self.policy,
            self.sleeper.as_ref(),
            |_| self.execute(request),
            |result, notice| {
                self.emit(HarvestEvent::RetryScheduled {
                    unit: unit.clone(),
                    status: result.status.clone(),
                    attempt: notice.attempt,
                    remaining: notice.remaining,
                    delay: notice.delay,
                })
            },
        )
        .await
    }

    /// Politeness delay between consecutive requests
    pub async fn pause(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        self.emit(HarvestEvent::Pausing { delay });
        self.sleeper.sleep(delay).await;
    }

    pub fn emit(&self, event: HarvestEvent) {
        self.events.emit(&event);
    }

    fn build_request(&self, request: &PageRequest) -> HttpRequest {
        HttpRequest {
            url: self.endpoint.clone(),
            headers: vec![(
                "Authorization".to_string(),
                format!("Bearer {}", self.token.expose()),
            )],
            params: request.params(),
            timeout: self.timeout,
        }
    }
}

/// Turn an HTTP response into a page result
pub fn classify(response: &HttpResponse) -> PageResult {
    let remaining = response
        .header(RATE_LIMIT_HEADER)
        .and_then(|v| v.trim().parse::<u64>().ok());

    let status = PageStatus::from_http(response.status);
    if !status.is_success() {
        return PageResult::failure(status).with_rate_limit(remaining);
    }

    parse_body(&response.body).with_rate_limit(remaining)
}

fn parse_body(body: &str) -> PageResult {
    let envelope: SearchEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => return PageResult::failure(PageStatus::Malformed(format!("JSON: {}", e))),
    };

    let Some(response) = envelope.response else {
        return PageResult::failure(PageStatus::Malformed("missing 'response'".to_string()));
    };
    let Some(docs) = response.docs else {
        return PageResult::failure(PageStatus::Malformed("missing 'response.docs'".to_string()));
    };

    PageResult::success(
        response.num_found,
        docs.into_iter().map(Document::from_map).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{search_body, CollectingSink, MockTransport, RecordingSleeper};
    use crate::models::{Field, FieldList, Query};

    fn executor(transport: Arc<MockTransport>, sink: Arc<CollectingSink>) -> RequestExecutor {
        RequestExecutor::new(
            transport,
            "https://ads.test/v1/",
            ApiToken::new("secret").unwrap(),
            Duration::from_secs(5),
            RetryPolicy::default().max_retries(1),
            Arc::new(RecordingSleeper::new()),
            sink,
        )
    }

    fn request() -> PageRequest {
        PageRequest::new(Query::term(Field::Bibcode, "X"), FieldList::summary(), 10)
    }

    #[test]
    fn test_classify_success() {
        let response = HttpResponse::new(200, search_body(3, &["A", "B"]))
            .with_header(RATE_LIMIT_HEADER, "4999");
        let result = classify(&response);

        assert!(result.is_success());
        assert_eq!(result.total_found, 3);
        assert_eq!(result.documents.len(), 2);
        assert_eq!(result.rate_limit_remaining, Some(4999));
    }

    #[test]
    fn test_classify_malformed_bodies() {
        for body in ["not json", r#"{"error": "x"}"#, r#"{"response": {"numFound": 1}}"#] {
            let result = classify(&HttpResponse::new(200, body));
            assert!(matches!(result.status, PageStatus::Malformed(_)), "{}", body);
            assert!(!result.status.is_retryable());
        }
    }

    #[test]
    fn test_classify_statuses() {
        assert_eq!(classify(&HttpResponse::new(429, "")).status, PageStatus::RateLimited);
        assert_eq!(classify(&HttpResponse::new(503, "")).status, PageStatus::ServerError(503));
        assert_eq!(classify(&HttpResponse::new(401, "Unauthorized")).status, PageStatus::HttpError(401));
    }

    #[tokio::test]
    async fn test_execute_sends_auth_and_params() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::new(200, search_body(1, &["X"])));
        let exec = executor(transport.clone(), Arc::new(CollectingSink::new()));

        let result = exec.execute(&request()).await;
        assert!(result.is_success());

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://ads.test/v1/search/query");
        assert_eq!(sent[0].headers[0], ("Authorization".to_string(), "Bearer secret".to_string()));
        assert_eq!(sent[0].param("q"), Some("bibcode:X"));
        assert_eq!(sent[0].param("fl"), Some("bibcode,title,abstract"));
        assert_eq!(sent[0].timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_network_error("connection refused");
        let exec = executor(transport, Arc::new(CollectingSink::new()));

        let result = exec.execute(&request()).await;
        assert!(matches!(result.status, PageStatus::NetworkError(_)));
        assert!(result.status.is_retryable());
    }

    #[tokio::test]
    async fn test_retry_emits_scheduled_event() {
        let transport = Arc::new(MockTransport::new());
        transport.push_status(503);
        transport.push_response(HttpResponse::new(200, search_body(1, &["X"])));
        let sink = Arc::new(CollectingSink::new());
        let exec = executor(transport.clone(), sink.clone());

        let outcome = exec.execute_with_retry(&request(), &WorkUnit::Count).await;

        assert!(outcome.value.is_success());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(transport.call_count(), 2);
        assert!(sink.events().iter().any(|e| matches!(
            e,
            HarvestEvent::RetryScheduled { remaining: 1, status: PageStatus::ServerError(503), .. }
        )));
    }
}
