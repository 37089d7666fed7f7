// crates/remotely-core/src/registry.rs
// ============================================================================
// Module: App Registry
// Description: Named remote applications plus the global request context.
// Purpose: Resolve app names to base URLs and hold shared auth/params.
// Dependencies: url, serde
// ============================================================================

//! ## Overview
//! The [`AppRegistry`] maps application names to the base URL and default
//! path of a remote API, and carries the global request context (optional
//! basic-auth credentials and default query parameters). It is an explicit
//! object threaded through the resolver rather than ambient process state.
//! Invariants:
//! - Registering an existing name overwrites the prior entry.
//! - Every stored entry has a non-empty host and an explicit port.
//! - All mutation goes through a single exclusive lock; [`AppRegistry::reset`]
//!   and [`AppRegistry::configure`] are atomic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use serde::Deserialize;
use serde::Serialize;
use url::Url;

use crate::error::RemotelyError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Query parameters keyed by name; iteration order is stable.
pub type QueryParams = BTreeMap<String, String>;

/// Registered application name.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppName(String);

impl AppName {
    /// Creates a new app name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for AppName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AppName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A registered remote application.
///
/// # Invariants
/// - `base` is `scheme://host:port` with a non-empty host.
/// - `path` never ends with `/` (the root path is stored as empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEntry {
    /// Registered name.
    name: AppName,
    /// Scheme, host, and port of the API.
    base: String,
    /// Path prefix shared by every request to the app.
    path: String,
}

impl AppEntry {
    /// Parses an app URL into a registry entry.
    ///
    /// A URL without a scheme is treated as `http`.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError::InvalidUrl`] when the URL cannot be parsed and
    /// [`RemotelyError::UrlHost`] when it has no host.
    pub fn parse(name: impl Into<AppName>, raw_url: &str) -> Result<Self, RemotelyError> {
        let trimmed = raw_url.trim();
        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };
        let url = Url::parse(&candidate).map_err(|err| RemotelyError::InvalidUrl {
            url: raw_url.to_string(),
            reason: err.to_string(),
        })?;
        let host = url.host_str().filter(|host| !host.is_empty()).ok_or_else(|| {
            RemotelyError::UrlHost {
                url: raw_url.to_string(),
            }
        })?;
        let port = url.port_or_known_default().ok_or_else(|| RemotelyError::InvalidUrl {
            url: raw_url.to_string(),
            reason: "missing port for scheme".to_string(),
        })?;
        Ok(Self {
            name: name.into(),
            base: format!("{}://{host}:{port}", url.scheme()),
            path: url.path().trim_end_matches('/').to_string(),
        })
    }

    /// Returns the registered name.
    #[must_use]
    pub const fn name(&self) -> &AppName {
        &self.name
    }

    /// Returns `scheme://host:port`.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Returns the default path prefix.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Basic-auth credential pair attached to every request.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    /// Basic-auth user.
    pub user: String,
    /// Basic-auth password.
    pub password: String,
}

impl BasicAuth {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Snapshot of the global request context taken for one fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Credentials, when configured.
    pub basic_auth: Option<BasicAuth>,
    /// Default query parameters applied to every request.
    pub default_params: QueryParams,
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Mutable registry state guarded by the registry lock.
#[derive(Debug, Clone, Default)]
struct RegistryState {
    /// Registered apps keyed by name.
    apps: BTreeMap<AppName, AppEntry>,
    /// Global request context.
    context: RequestContext,
}

/// Registry of remote applications and the global request context.
///
/// # Invariants
/// - Reads never observe a partially applied [`AppRegistry::configure`] call.
#[derive(Debug, Default)]
pub struct AppRegistry {
    /// Registry state behind a single exclusive lock for writers.
    state: RwLock<RegistryState>,
}

impl AppRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an app, overwriting any entry with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError`] when the URL is invalid or has no host.
    pub fn register(
        &self,
        name: impl Into<AppName>,
        url: &str,
    ) -> Result<AppEntry, RemotelyError> {
        let entry = AppEntry::parse(name, url)?;
        self.write().apps.insert(entry.name.clone(), entry.clone());
        Ok(entry)
    }

    /// Looks up an app by name.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError::UnknownApp`] when the app is not registered.
    pub fn lookup(&self, name: &AppName) -> Result<AppEntry, RemotelyError> {
        self.read().apps.get(name).cloned().ok_or_else(|| RemotelyError::UnknownApp {
            app: name.to_string(),
        })
    }

    /// Resolves the app targeted by an association.
    ///
    /// An explicit name must be registered. An elided name resolves only when
    /// exactly one app is registered.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError::UnknownApp`], [`RemotelyError::RemoteApp`], or
    /// [`RemotelyError::NoRegisteredApps`].
    pub fn resolve_app(&self, name: Option<&AppName>) -> Result<AppEntry, RemotelyError> {
        if let Some(name) = name {
            return self.lookup(name);
        }
        let state = self.read();
        let mut apps = state.apps.values();
        match (apps.next(), apps.next()) {
            (Some(entry), None) => Ok(entry.clone()),
            (None, _) => Err(RemotelyError::NoRegisteredApps),
            (Some(_), Some(_)) => Err(RemotelyError::RemoteApp {
                registered: state.apps.len(),
            }),
        }
    }

    /// Returns a copy of every registered app.
    #[must_use]
    pub fn all(&self) -> BTreeMap<AppName, AppEntry> {
        self.read().apps.clone()
    }

    /// Returns the number of registered apps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().apps.len()
    }

    /// Returns true when no app is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().apps.is_empty()
    }

    /// Sets the basic-auth credentials used for every request.
    pub fn set_basic_auth(&self, user: impl Into<String>, password: impl Into<String>) {
        self.write().context.basic_auth = Some(BasicAuth::new(user, password));
    }

    /// Returns the configured basic-auth credentials.
    #[must_use]
    pub fn basic_auth(&self) -> Option<BasicAuth> {
        self.read().context.basic_auth.clone()
    }

    /// Replaces the default query parameters.
    pub fn set_default_params(&self, params: QueryParams) {
        self.write().context.default_params = params;
    }

    /// Returns the default query parameters.
    #[must_use]
    pub fn default_params(&self) -> QueryParams {
        self.read().context.default_params.clone()
    }

    /// Returns a snapshot of the global request context.
    #[must_use]
    pub fn request_context(&self) -> RequestContext {
        self.read().context.clone()
    }

    /// Clears apps, default parameters, and credentials in one step.
    pub fn reset(&self) {
        *self.write() = RegistryState::default();
    }

    /// Applies a sequence of declarations atomically.
    ///
    /// Declarations apply in call order; later setters overwrite earlier ones.
    /// When the closure fails, no declaration from this call is kept.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by the closure.
    pub fn configure<F>(&self, declarations: F) -> Result<(), RemotelyError>
    where
        F: FnOnce(&mut Configurator) -> Result<(), RemotelyError>,
    {
        let mut guard = self.write();
        let mut configurator = Configurator {
            state: guard.clone(),
        };
        declarations(&mut configurator)?;
        *guard = configurator.state;
        Ok(())
    }

    /// Acquires the read lock, recovering from poisoning.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires the write lock, recovering from poisoning.
    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Configurator
// ============================================================================

/// Declaration surface handed to [`AppRegistry::configure`].
#[derive(Debug)]
pub struct Configurator {
    /// Working copy committed when the closure succeeds.
    state: RegistryState,
}

impl Configurator {
    /// Registers an app.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError`] when the URL is invalid or has no host.
    pub fn app(&mut self, name: impl Into<AppName>, url: &str) -> Result<&mut Self, RemotelyError> {
        let entry = AppEntry::parse(name, url)?;
        self.state.apps.insert(entry.name.clone(), entry);
        Ok(self)
    }

    /// Sets the basic-auth credentials.
    pub fn basic_auth(
        &mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> &mut Self {
        self.state.context.basic_auth = Some(BasicAuth::new(user, password));
        self
    }

    /// Replaces the default query parameters.
    pub fn default_params<I, K, V>(&mut self, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.state.context.default_params =
            params.into_iter().map(|(key, value)| (key.into(), value.into())).collect();
        self
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
