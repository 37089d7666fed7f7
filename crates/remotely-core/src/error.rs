// crates/remotely-core/src/error.rs
// ============================================================================
// Module: Remotely Errors
// Description: Error taxonomy for association declaration and resolution.
// Purpose: Classify registry, URL, transport, and decoding failures.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every failure surfaced by the association engine is a [`RemotelyError`].
//! Declaration errors ([`RemotelyError::RemoteApp`],
//! [`RemotelyError::HasManyForeignKey`]) are raised when an association table
//! is built; the remaining variants are raised while resolving. None of them
//! are retried and resolution never yields partial results.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// Errors emitted by the remote association engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemotelyError {
    /// A registered or built URL has no host.
    #[error("url object missing host: {url}")]
    UrlHost {
        /// The offending URL.
        url: String,
    },
    /// An association elides its app while several apps are registered.
    #[error("no app specified for association with more than one app registered ({registered})")]
    RemoteApp {
        /// Number of registered apps at the time of the check.
        registered: usize,
    },
    /// An association elides its app while no app is registered.
    #[error("no app specified for association and no apps are registered")]
    NoRegisteredApps,
    /// An association names an app that was never registered.
    #[error("unknown app: {app}")]
    UnknownApp {
        /// Name of the missing app.
        app: String,
    },
    /// A foreign key was declared on an association that is not `has_many`.
    #[error("only has_many associations can use the foreign_key option: {association}")]
    HasManyForeignKey {
        /// Association that carried the option.
        association: String,
    },
    /// The same association name was declared twice on one host type.
    #[error("association already declared: {association}")]
    DuplicateAssociation {
        /// Duplicated association name.
        association: String,
    },
    /// The host type has no association with the requested name.
    #[error("association not declared: {association}")]
    UnknownAssociation {
        /// Requested association name.
        association: String,
    },
    /// A host attribute needed for URL construction is absent or not scalar.
    #[error("host attribute missing or not usable in a url: {attribute}")]
    MissingAttribute {
        /// Attribute name.
        attribute: String,
    },
    /// A URL failed to parse.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// A successful response carried a body that is not JSON.
    #[error("received a non-json response, expected json")]
    NonJsonResponse {
        /// Raw response body, kept for diagnostics.
        body: String,
    },
    /// The remote API answered with a non-success status.
    #[error("http status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// The request could not be completed.
    #[error("http transport failure: {0}")]
    Transport(String),
    /// The response body exceeded the configured size limit.
    #[error("http response exceeds size limit of {max_bytes} bytes")]
    ResponseTooLarge {
        /// Configured limit in bytes.
        max_bytes: usize,
    },
    /// The JSON shape does not match the association cardinality.
    #[error("response shape mismatch for {association}: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Association being resolved.
        association: String,
        /// Expected JSON shape.
        expected: &'static str,
        /// Observed JSON shape.
        found: &'static str,
    },
    /// A JSON object could not be converted into a target record.
    #[error("failed to build record {index} for {association}: {message}")]
    Record {
        /// Association being resolved.
        association: String,
        /// Position of the element in the response.
        index: usize,
        /// Conversion diagnostic.
        message: String,
    },
}

impl RemotelyError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UrlHost {
                ..
            } => "url_host",
            Self::RemoteApp {
                ..
            } => "remote_app",
            Self::NoRegisteredApps => "no_registered_apps",
            Self::UnknownApp {
                ..
            } => "unknown_app",
            Self::HasManyForeignKey {
                ..
            } => "has_many_foreign_key",
            Self::DuplicateAssociation {
                ..
            } => "duplicate_association",
            Self::UnknownAssociation {
                ..
            } => "unknown_association",
            Self::MissingAttribute {
                ..
            } => "missing_attribute",
            Self::InvalidUrl {
                ..
            } => "invalid_url",
            Self::NonJsonResponse {
                ..
            } => "non_json_response",
            Self::Status {
                ..
            } => "http_status",
            Self::Transport(_) => "transport",
            Self::ResponseTooLarge {
                ..
            } => "response_too_large",
            Self::ShapeMismatch {
                ..
            } => "shape_mismatch",
            Self::Record {
                ..
            } => "record",
        }
    }

    /// Returns the HTTP status carried by the error, when any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status {
                status, ..
            } => Some(*status),
            _ => None,
        }
    }
}
