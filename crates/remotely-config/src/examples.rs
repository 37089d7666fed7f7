// crates/remotely-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for remotely configuration. The output is static and is
//! checked against the loader by the test suite.

/// Returns a canonical example `remotely.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[[apps]]
name = "fun"
url = "http://fun.com/api"

[[apps]]
name = "games"
url = "games.example:8080"

[basic_auth]
user = "user"
password = "password"

[default_params]
token = "abc"

[http]
timeout_ms = 5000
max_response_bytes = 1048576
user_agent = "remotely/0.1"

[audit]
mode = "file"
path = "remotely-fetch.log"
"#,
    )
}
