//! Test doubles for the transport, sleeper and event seams.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::utils::{EventSink, HarvestEvent, Sleeper};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Responder = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

/// A transport that replays scripted responses and records every request.
///
/// Scripted responses are consumed first, in order. Once the script is empty
/// the responder (if any) answers; otherwise the call fails with a transport error.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Create a mock with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that answers every request with `responder`
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    /// Queue a response
    pub fn push_response(&self, response: HttpResponse) {
        lock(&self.script).push_back(Ok(response));
    }

    /// Queue an empty-bodied response with the given status
    pub fn push_status(&self, status: u16) {
        self.push_response(HttpResponse::new(status, ""));
    }

    /// Queue a connection failure
    pub fn push_network_error(&self, message: &str) {
        lock(&self.script)
            .push_back(Err(TransportError::Connect(message.to_string())));
    }

    /// Number of requests received
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("scripted", &lock(&self.script).len())
            .field("calls", &self.call_count())
            .field("responder", &self.responder.as_ref().map(|_| "Fn(&HttpRequest)"))
            .finish()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push(request.clone());

        if let Some(next) = lock(&self.script).pop_front() {
            return next;
        }
        match &self.responder {
            Some(responder) => responder(request),
            None => Err(TransportError::Other("no scripted response".to_string())),
        }
    }
}

/// A sleeper that records requested delays and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
    }
}

/// An event sink that keeps every event
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<HarvestEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HarvestEvent> {
        lock(&self.events).clone()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &HarvestEvent) {
        lock(&self.events).push(event.clone());
    }
}

/// A search response body with one document per bibcode
pub fn search_body(num_found: u64, bibcodes: &[&str]) -> String {
    let docs: Vec<_> = bibcodes
        .iter()
        .map(|b| {
            json!({
                "bibcode": b,
                "title": [format!("Title of {}", b)],
                "abstract": format!("Abstract of {}", b)
            })
        })
        .collect();

    json!({ "response": { "numFound": num_found, "docs": docs } }).to_string()
}
