// crates/remotely-core/src/audit.rs
// ============================================================================
// Module: Fetch Audit Logging
// Description: Structured audit events for association resolution.
// Purpose: Emit JSON-line fetch logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The resolver emits one [`FetchAuditEvent`] per `resolve`/`reload` call,
//! cache hits included. Sinks are pluggable so deployments can route events
//! to their preferred logging pipeline. Credentials are never part of an
//! event: they travel as headers, not in the URL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome of one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Records were fetched over the network.
    Fetched,
    /// A fresh cached collection was returned.
    Cached,
    /// Resolution failed.
    Failed,
}

/// Fetch audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Association name.
    pub association: String,
    /// Resolved app name, when resolution got that far.
    pub app: Option<String>,
    /// Request URL, when built.
    pub url: Option<String>,
    /// Resolution outcome.
    pub outcome: FetchOutcome,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Number of records in the resulting collection.
    pub record_count: Option<usize>,
    /// Response body size in bytes.
    pub response_bytes: Option<usize>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

/// Inputs for building a [`FetchAuditEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAuditEventParams {
    /// Association name.
    pub association: String,
    /// Resolved app name.
    pub app: Option<String>,
    /// Request URL.
    pub url: Option<String>,
    /// Resolution outcome.
    pub outcome: FetchOutcome,
    /// HTTP status.
    pub status: Option<u16>,
    /// Number of records.
    pub record_count: Option<usize>,
    /// Response body size in bytes.
    pub response_bytes: Option<usize>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

impl FetchAuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(params: FetchAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "remote_fetch",
            timestamp_ms,
            association: params.association,
            app: params.app,
            url: params.url,
            outcome: params.outcome,
            status: params.status,
            record_count: params.record_count,
            response_bytes: params.response_bytes,
            error_kind: params.error_kind,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for fetch events.
pub trait FetchAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &FetchAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrAuditSink;

impl FetchAuditSink for StderrAuditSink {
    fn record(&self, event: &FetchAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
#[derive(Debug)]
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl FetchAuditSink for FileAuditSink {
    fn record(&self, event: &FetchAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl FetchAuditSink for NoopAuditSink {
    fn record(&self, _event: &FetchAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test assertions use unwrap for clarity.")]

    use std::fs;

    use serde_json::Value;

    use super::FetchAuditEvent;
    use super::FetchAuditEventParams;
    use super::FetchAuditSink;
    use super::FetchOutcome;
    use super::FileAuditSink;

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fetch.log");
        let sink = FileAuditSink::new(&path).unwrap();
        for outcome in [FetchOutcome::Fetched, FetchOutcome::Cached] {
            sink.record(&FetchAuditEvent::new(FetchAuditEventParams {
                association: "widgets".to_string(),
                app: Some("fun".to_string()),
                url: Some("http://fun.com/users/1/widgets".to_string()),
                outcome,
                status: Some(200),
                record_count: Some(2),
                response_bytes: Some(40),
                error_kind: None,
            }));
        }
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> =
            contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "remote_fetch");
        assert_eq!(lines[0]["outcome"], "fetched");
        assert_eq!(lines[1]["outcome"], "cached");
        assert_eq!(lines[1]["association"], "widgets");
    }
}
