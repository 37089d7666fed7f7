// crates/remotely-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for remotely-core integration tests.
// Purpose: Provide host records, scripted transports, and local HTTP servers.
// Dependencies: remotely-core, serde_json, tiny_http
// ============================================================================

//! ## Overview
//! Provides a `User` host record, a `Widget` target record, a scripted
//! transport that counts requests, a recording audit sink, and a one-shot
//! `tiny_http` server that captures the request it served.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]
#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use remotely_core::AppRegistry;
use remotely_core::AssociationCache;
use remotely_core::AssociationTable;
use remotely_core::AttributeSource;
use remotely_core::FetchAuditEvent;
use remotely_core::FetchAuditSink;
use remotely_core::FetchRequest;
use remotely_core::HttpTransport;
use remotely_core::RawResponse;
use remotely_core::RemoteHost;
use remotely_core::RemotelyError;
use remotely_core::RequestExecutor;
use remotely_core::Resolver;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Records
// ============================================================================

/// Target record served by the fake APIs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Widget {
    /// Remote identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
}

/// Creates a widget.
pub fn widget(id: u64, name: &str) -> Widget {
    Widget {
        id,
        name: name.to_string(),
    }
}

/// Local host record owning remote associations.
#[derive(Debug)]
pub struct User {
    /// Attribute values.
    attributes: Map<String, Value>,
    /// Associations shared by every user.
    associations: Arc<AssociationTable>,
    /// Per-instance resolved collections.
    cache: AssociationCache,
}

impl User {
    /// Creates a user from a JSON object of attributes.
    pub fn new(associations: &Arc<AssociationTable>, attributes: Value) -> Self {
        let Value::Object(attributes) = attributes else {
            panic!("user attributes must be an object");
        };
        Self {
            attributes,
            associations: Arc::clone(associations),
            cache: AssociationCache::new(),
        }
    }
}

impl AttributeSource for User {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }
}

impl RemoteHost for User {
    fn associations(&self) -> &AssociationTable {
        &self.associations
    }

    fn association_cache(&self) -> &AssociationCache {
        &self.cache
    }
}

// ============================================================================
// SECTION: Scripted Transport
// ============================================================================

/// Transport that replays queued responses and records every request.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    /// Responses returned in order, each after its delay.
    responses: Mutex<VecDeque<(RawResponse, Duration)>>,
    /// Requests received so far.
    requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport that answers with the given responses in order.
    pub fn new(responses: Vec<RawResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(
                responses.into_iter().map(|response| (response, Duration::ZERO)).collect(),
            ),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Queues another response.
    pub fn push(&self, response: RawResponse) {
        self.push_delayed(response, Duration::ZERO);
    }

    /// Queues a response that is returned only after `delay`.
    pub fn push_delayed(&self, response: RawResponse, delay: Duration) {
        self.responses.lock().unwrap().push_back((response, delay));
    }

    /// Returns the number of requests received.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Returns the URL of the most recent request.
    pub fn last_url(&self) -> String {
        self.requests.lock().unwrap().last().map(|request| request.url.to_string()).unwrap()
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&self, request: &FetchRequest) -> Result<RawResponse, RemotelyError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        let (response, delay) =
            next.ok_or_else(|| RemotelyError::Transport("no scripted response".to_string()))?;
        thread::sleep(delay);
        Ok(response)
    }
}

/// Builds a 200 JSON response.
pub fn json_response(value: &Value) -> RawResponse {
    RawResponse {
        status: 200,
        content_type: Some("application/json".to_string()),
        body: serde_json::to_vec(value).unwrap(),
    }
}

/// Builds a raw response with an explicit status and content type.
pub fn raw_response(status: u16, content_type: &str, body: &str) -> RawResponse {
    RawResponse {
        status,
        content_type: Some(content_type.to_string()),
        body: body.as_bytes().to_vec(),
    }
}

/// Creates a resolver over a registry and scripted transport.
pub fn scripted_resolver(
    registry: &Arc<AppRegistry>,
    transport: &Arc<ScriptedTransport>,
) -> Resolver {
    let transport: Arc<dyn HttpTransport> = Arc::clone(transport) as Arc<dyn HttpTransport>;
    Resolver::new(Arc::clone(registry), RequestExecutor::new(transport))
}

// ============================================================================
// SECTION: Audit Sink
// ============================================================================

/// Audit sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    /// Recorded events.
    events: Mutex<Vec<FetchAuditEvent>>,
}

impl RecordingAuditSink {
    /// Returns the recorded events.
    pub fn events(&self) -> Vec<FetchAuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl FetchAuditSink for RecordingAuditSink {
    fn record(&self, event: &FetchAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Local Server
// ============================================================================

/// Request observed by a one-shot server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    /// Request target, path and query.
    pub url: String,
    /// Authorization header value, when sent.
    pub authorization: Option<String>,
}

/// Serves one response on a local port and captures the request.
///
/// Returns the server base URL and a handle yielding the captured request.
pub fn serve_once(
    status: u16,
    content_type: &str,
    body: &str,
) -> (String, JoinHandle<Option<CapturedRequest>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let content_type = content_type.to_string();
    let body = body.to_string();
    let handle = thread::spawn(move || {
        let request = server.recv().ok()?;
        let captured = CapturedRequest {
            url: request.url().to_string(),
            authorization: request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Authorization"))
                .map(|header| header.value.as_str().to_string()),
        };
        let header = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()).unwrap();
        let response = Response::from_string(body).with_status_code(status).with_header(header);
        let _ = request.respond(response);
        Some(captured)
    });
    (format!("http://{addr}"), handle)
}
