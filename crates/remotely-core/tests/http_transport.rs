// crates/remotely-core/tests/http_transport.rs
// ============================================================================
// Module: HTTP Transport Tests
// Description: Reqwest transport behavior against a local tiny_http server.
// Purpose: Verify headers, classification, size limits, and end-to-end fetches.
// ============================================================================

//! ## Overview
//! Exercises [`ReqwestTransport`] over real sockets:
//! - basic auth is sent as an `Authorization` header;
//! - HTML and non-2xx responses are classified as errors;
//! - oversized bodies fail closed;
//! - a full resolution reaches the server with the expected path and query.

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

mod common;

use std::sync::Arc;

use remotely_core::AppRegistry;
use remotely_core::AssociationDecl;
use remotely_core::AssociationTable;
use remotely_core::BasicAuth;
use remotely_core::Collection;
use remotely_core::FetchRequest;
use remotely_core::HttpTransportConfig;
use remotely_core::RemotelyError;
use remotely_core::RequestExecutor;
use remotely_core::Resolver;
use serde_json::json;
use url::Url;

use crate::common::User;
use crate::common::Widget;
use crate::common::serve_once;
use crate::common::widget;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

/// Executor over a reqwest transport with a short timeout.
fn local_executor() -> RequestExecutor {
    RequestExecutor::with_config(HttpTransportConfig {
        timeout_ms: 5_000,
        ..HttpTransportConfig::default()
    })
    .unwrap()
}

/// Builds a GET request for a path on the local server.
fn request(base: &str, path: &str, basic_auth: Option<BasicAuth>) -> FetchRequest {
    FetchRequest {
        url: Url::parse(&format!("{base}{path}")).unwrap(),
        basic_auth,
    }
}

// ============================================================================
// SECTION: Transport
// ============================================================================

#[test]
fn json_response_decodes_and_sends_basic_auth() {
    let (base, handle) = serve_once(200, "application/json", r#"[{"id":1,"name":"a"}]"#);
    let executor = local_executor();

    let response = executor
        .fetch(&request(&base, "/widgets?page=1", Some(BasicAuth::new("user", "secret"))))
        .unwrap();
    let captured = handle.join().unwrap().unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.value, json!([{"id": 1, "name": "a"}]));
    assert_eq!(captured.url, "/widgets?page=1");
    assert_eq!(captured.authorization.as_deref(), Some("Basic dXNlcjpzZWNyZXQ="));
}

#[test]
fn request_without_credentials_sends_no_authorization() {
    let (base, handle) = serve_once(200, "application/json", "{}");
    let executor = local_executor();

    executor.fetch(&request(&base, "/", None)).unwrap();
    let captured = handle.join().unwrap().unwrap();

    assert_eq!(captured.authorization, None);
}

#[test]
fn html_success_is_rejected_with_body() {
    let (base, handle) = serve_once(200, "text/html", "<html>maintenance</html>");
    let executor = local_executor();

    let err = executor.fetch(&request(&base, "/widgets", None)).unwrap_err();
    handle.join().unwrap();

    assert_eq!(err, RemotelyError::NonJsonResponse {
        body: "<html>maintenance</html>".to_string(),
    });
}

#[test]
fn server_error_is_a_status_error() {
    let (base, handle) = serve_once(500, "application/json", r#"{"error":"boom"}"#);
    let executor = local_executor();

    let err = executor.fetch(&request(&base, "/widgets", None)).unwrap_err();
    handle.join().unwrap();

    assert_eq!(err.status(), Some(500));
}

#[test]
fn redirects_are_not_followed() {
    let (base, handle) = serve_once(302, "text/plain", "moved");
    let executor = local_executor();

    let err = executor.fetch(&request(&base, "/widgets", None)).unwrap_err();
    handle.join().unwrap();

    assert_eq!(err.status(), Some(302));
}

#[test]
fn oversized_body_fails_closed() {
    let body = format!("[{}]", vec!["1"; 64].join(","));
    let (base, handle) = serve_once(200, "application/json", &body);
    let executor = RequestExecutor::with_config(HttpTransportConfig {
        timeout_ms: 5_000,
        max_response_bytes: 16,
        ..HttpTransportConfig::default()
    })
    .unwrap();

    let err = executor.fetch(&request(&base, "/widgets", None)).unwrap_err();
    handle.join().unwrap();

    assert_eq!(err, RemotelyError::ResponseTooLarge {
        max_bytes: 16,
    });
}

#[test]
fn unreachable_host_is_a_transport_error() {
    let executor = RequestExecutor::with_config(HttpTransportConfig {
        timeout_ms: 500,
        ..HttpTransportConfig::default()
    })
    .unwrap();

    let err = executor.fetch(&request("http://127.0.0.1:1", "/widgets", None)).unwrap_err();

    assert_eq!(err.kind(), "transport");
}

// ============================================================================
// SECTION: End To End
// ============================================================================

#[test]
fn resolution_reaches_the_registered_app() {
    let (base, handle) =
        serve_once(200, "application/json; charset=utf-8", r#"{"widgets":[{"id":5,"name":"e"}]}"#);
    let registry = AppRegistry::new();
    registry
        .configure(|config| {
            config.app("local", &format!("{base}/api"))?.basic_auth("user", "secret");
            config.default_params([("format", "json")]);
            Ok(())
        })
        .unwrap();
    let registry = Arc::new(registry);
    let mut table = AssociationTable::new("users");
    table.declare(&registry, AssociationDecl::has_many("widgets").param("limit", "2")).unwrap();
    let resolver = Resolver::new(Arc::clone(&registry), local_executor());
    let user = User::new(&Arc::new(table), json!({"id": 7}));

    let widgets: Collection<Widget> = resolver.resolve(&user, "widgets").unwrap();
    let captured = handle.join().unwrap().unwrap();

    assert_eq!(widgets.to_vec(), vec![widget(5, "e")]);
    assert_eq!(captured.url, "/api/users/7/widgets?format=json&limit=2");
    assert_eq!(captured.authorization.as_deref(), Some("Basic dXNlcjpzZWNyZXQ="));
    assert_eq!(widgets.url().path(), "/api/users/7/widgets");
}
