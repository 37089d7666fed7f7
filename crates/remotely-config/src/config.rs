// crates/remotely-config/src/config.rs
// ============================================================================
// Module: Remotely Configuration
// Description: Configuration loading and validation for remote apps.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: remotely-core, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits
//! and validated before anything touches the registry. Applying a config is
//! atomic: either every app, credential, and default parameter lands in the
//! registry, or none does.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use remotely_core::AppEntry;
use remotely_core::AppRegistry;
use remotely_core::FetchAuditSink;
use remotely_core::FileAuditSink;
use remotely_core::HttpTransportConfig;
use remotely_core::NoopAuditSink;
use remotely_core::RequestExecutor;
use remotely_core::Resolver;
use remotely_core::StderrAuditSink;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "remotely.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "REMOTELY_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of registered apps.
pub(crate) const MAX_APPS: usize = 256;
/// Maximum length of an app name.
pub(crate) const MAX_APP_NAME_LENGTH: usize = 128;
/// Maximum number of default query parameters.
pub(crate) const MAX_DEFAULT_PARAMS: usize = 64;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Remotely configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemotelyConfig {
    /// Remote applications to register.
    #[serde(default)]
    pub apps: Vec<AppConfig>,
    /// Credentials attached to every request.
    #[serde(default)]
    pub basic_auth: Option<BasicAuthConfig>,
    /// Query parameters attached to every request.
    #[serde(default)]
    pub default_params: Option<BTreeMap<String, String>>,
    /// HTTP transport options.
    #[serde(default)]
    pub http: HttpTransportConfig,
    /// Fetch audit logging.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// One registered application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Registry name.
    pub name: String,
    /// Base URL; a missing scheme means `http`.
    pub url: String,
}

/// Basic-auth credentials.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuthConfig {
    /// Basic-auth user.
    pub user: String,
    /// Basic-auth password.
    pub password: String,
}

impl fmt::Debug for BasicAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where fetch audit events are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    /// Events are dropped.
    #[default]
    None,
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
}

/// Fetch audit logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub mode: AuditMode,
    /// Log file path for [`AuditMode::File`].
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates the audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.mode, &self.path) {
            (AuditMode::File, None) => Err(ConfigError::Invalid(
                "audit.path is required when audit.mode = file".to_string(),
            )),
            (AuditMode::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditMode::None | AuditMode::Stderr, Some(_)) => Err(ConfigError::Invalid(
                "audit.path is only allowed when audit.mode = file".to_string(),
            )),
            (AuditMode::None | AuditMode::Stderr, None) => Ok(()),
        }
    }
}

impl RemotelyConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path argument wins, then `REMOTELY_CONFIG`, then `remotely.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.apps.len() > MAX_APPS {
            return Err(ConfigError::Invalid(format!("apps exceeds max of {MAX_APPS}")));
        }
        let mut names = BTreeSet::new();
        for app in &self.apps {
            let name = app.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid("apps.name must be non-empty".to_string()));
            }
            if name.len() > MAX_APP_NAME_LENGTH {
                return Err(ConfigError::Invalid(format!("apps.name too long: {name}")));
            }
            if !names.insert(name) {
                return Err(ConfigError::Invalid(format!("duplicate app name: {name}")));
            }
            AppEntry::parse(name, &app.url)
                .map_err(|err| ConfigError::Invalid(format!("apps.{name}.url: {err}")))?;
        }
        if let Some(auth) = &self.basic_auth
            && auth.user.trim().is_empty()
        {
            return Err(ConfigError::Invalid("basic_auth.user must be non-empty".to_string()));
        }
        if let Some(params) = &self.default_params {
            if params.len() > MAX_DEFAULT_PARAMS {
                return Err(ConfigError::Invalid(format!(
                    "default_params exceeds max of {MAX_DEFAULT_PARAMS}"
                )));
            }
            if params.keys().any(|key| key.trim().is_empty()) {
                return Err(ConfigError::Invalid(
                    "default_params keys must be non-empty".to_string(),
                ));
            }
        }
        if self.http.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "http.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.http.max_response_bytes == 0 {
            return Err(ConfigError::Invalid(
                "http.max_response_bytes must be greater than zero".to_string(),
            ));
        }
        self.audit.validate()
    }

    /// Applies apps, credentials, and default parameters to a registry.
    ///
    /// Declarations are committed atomically; sections absent from the file
    /// leave the registry's current values in place.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the registry rejects an app.
    pub fn apply(&self, registry: &AppRegistry) -> Result<(), ConfigError> {
        registry
            .configure(|declare| {
                for app in &self.apps {
                    declare.app(app.name.trim(), &app.url)?;
                }
                if let Some(auth) = &self.basic_auth {
                    declare.basic_auth(auth.user.clone(), auth.password.clone());
                }
                if let Some(params) = &self.default_params {
                    declare.default_params(params.clone());
                }
                Ok(())
            })
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    /// Returns the HTTP transport options.
    #[must_use]
    pub fn transport_config(&self) -> HttpTransportConfig {
        self.http.clone()
    }

    /// Opens the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn audit_sink(&self) -> Result<Arc<dyn FetchAuditSink>, ConfigError> {
        match (self.audit.mode, &self.audit.path) {
            (AuditMode::File, Some(path)) => {
                let sink = FileAuditSink::new(Path::new(path.trim()))
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (AuditMode::File, None) => Err(ConfigError::Invalid(
                "audit.path is required when audit.mode = file".to_string(),
            )),
            (AuditMode::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditMode::None, _) => Ok(Arc::new(NoopAuditSink)),
        }
    }

    /// Applies the config to a registry and builds a resolver over it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when applying fails, the HTTP client cannot be
    /// built, or the audit sink cannot be opened.
    pub fn build_resolver(&self, registry: Arc<AppRegistry>) -> Result<Resolver, ConfigError> {
        self.apply(&registry)?;
        let executor = RequestExecutor::with_config(self.transport_config())
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(Resolver::new(registry, executor).with_audit_sink(self.audit_sink()?))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
