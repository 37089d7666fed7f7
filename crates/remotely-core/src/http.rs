// crates/remotely-core/src/http.rs
// ============================================================================
// Module: Request Executor
// Description: Blocking HTTP GET transport and JSON response classification.
// Purpose: Perform one authenticated request per call and decode its body.
// Dependencies: reqwest, serde, serde_json, url
// ============================================================================

//! ## Overview
//! [`HttpTransport`] is the seam to the network: one blocking GET per call,
//! returning status, content type, and body. [`ReqwestTransport`] is the
//! production implementation. [`RequestExecutor`] wraps a transport and
//! classifies its responses:
//! - 2xx with an HTML content type, or a body that is not JSON, fails with
//!   [`RemotelyError::NonJsonResponse`] carrying the raw body;
//! - non-2xx fails with [`RemotelyError::Status`];
//! - otherwise the body is decoded into a [`serde_json::Value`].
//!
//! Invariants:
//! - Exactly one network round trip per call; no retries and no caching.
//! - Redirects are not followed, so a 3xx surfaces as a status error.
//! - Bodies are capped at [`HttpTransportConfig::max_response_bytes`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::RemotelyError;
use crate::registry::BasicAuth;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default response size limit in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// Configuration for the reqwest-backed transport.
///
/// # Invariants
/// - `timeout_ms` applies to the full request lifecycle.
/// - `max_response_bytes` is a hard upper bound on response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpTransportConfig {
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: "remotely/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Request / Response
// ============================================================================

/// A fully built GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Fully qualified URL, query included.
    pub url: Url,
    /// Credentials attached as basic auth, when configured.
    pub basic_auth: Option<BasicAuth>,
}

/// Raw response returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Content type header, when present.
    pub content_type: Option<String>,
    /// Response body bytes.
    pub body: Vec<u8>,
}

/// Decoded JSON response.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded body.
    pub value: Value,
    /// Body size in bytes.
    pub body_bytes: usize,
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Performs one blocking GET per call.
pub trait HttpTransport: Send + Sync {
    /// Sends the request and returns the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError::Transport`] when the request cannot complete and
    /// [`RemotelyError::ResponseTooLarge`] when the body exceeds limits.
    fn get(&self, request: &FetchRequest) -> Result<RawResponse, RemotelyError>;
}

/// Transport backed by a blocking reqwest client.
///
/// # Invariants
/// - Redirects are not followed.
/// - Responses exceeding configured limits fail closed.
#[derive(Clone)]
pub struct ReqwestTransport {
    /// Transport configuration, including limits.
    config: HttpTransportConfig,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError::Transport`] when the HTTP client cannot be created.
    pub fn new(config: HttpTransportConfig) -> Result<Self, RemotelyError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| RemotelyError::Transport(format!("http client build failed: {err}")))?;
        Ok(Self {
            config,
            client,
        })
    }

    /// Returns the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").field("config", &self.config).finish_non_exhaustive()
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, request: &FetchRequest) -> Result<RawResponse, RemotelyError> {
        let mut builder =
            self.client.get(request.url.as_str()).header(ACCEPT, "application/json");
        if let Some(auth) = &request.basic_auth {
            builder = builder.basic_auth(&auth.user, Some(&auth.password));
        }
        let mut response = builder
            .send()
            .map_err(|err| RemotelyError::Transport(format!("http request failed: {err}")))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = read_response_limited(&mut response, self.config.max_response_bytes)?;
        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(
    response: &mut Response,
    max_bytes: usize,
) -> Result<Vec<u8>, RemotelyError> {
    let max_bytes_u64 = u64::try_from(max_bytes).map_err(|_| {
        RemotelyError::Transport("response size limit exceeds u64".to_string())
    })?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(RemotelyError::ResponseTooLarge {
            max_bytes,
        });
    }
    let mut buf = Vec::new();
    let mut handle = response.take(max_bytes_u64.saturating_add(1));
    handle
        .read_to_end(&mut buf)
        .map_err(|err| RemotelyError::Transport(format!("failed to read response: {err}")))?;
    if buf.len() > max_bytes {
        return Err(RemotelyError::ResponseTooLarge {
            max_bytes,
        });
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Executes requests through a transport and decodes JSON bodies.
#[derive(Clone)]
pub struct RequestExecutor {
    /// Underlying transport.
    transport: Arc<dyn HttpTransport>,
}

impl RequestExecutor {
    /// Wraps a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
        }
    }

    /// Creates an executor over a default [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError::Transport`] when the HTTP client cannot be created.
    pub fn with_config(config: HttpTransportConfig) -> Result<Self, RemotelyError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new(config)?)))
    }

    /// Issues one GET and decodes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns transport, status, and non-JSON errors unchanged.
    pub fn fetch(&self, request: &FetchRequest) -> Result<JsonResponse, RemotelyError> {
        let raw = self.transport.get(request)?;
        let body_bytes = raw.body.len();
        let status = raw.status;
        let value = classify_response(raw)?;
        Ok(JsonResponse {
            status,
            value,
            body_bytes,
        })
    }
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor").finish_non_exhaustive()
    }
}

/// Classifies a raw response into a JSON value or an error.
///
/// # Errors
///
/// Returns [`RemotelyError::Status`] for non-2xx responses and
/// [`RemotelyError::NonJsonResponse`] for 2xx bodies that are HTML or not JSON.
pub fn classify_response(raw: RawResponse) -> Result<Value, RemotelyError> {
    if !(200 .. 300).contains(&raw.status) {
        return Err(RemotelyError::Status {
            status: raw.status,
            body: String::from_utf8_lossy(&raw.body).into_owned(),
        });
    }
    let is_html = raw
        .content_type
        .as_deref()
        .is_some_and(|content_type| content_type.to_ascii_lowercase().contains("text/html"));
    if !is_html && let Ok(value) = serde_json::from_slice::<Value>(&raw.body) {
        return Ok(value);
    }
    Err(RemotelyError::NonJsonResponse {
        body: String::from_utf8_lossy(&raw.body).into_owned(),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
