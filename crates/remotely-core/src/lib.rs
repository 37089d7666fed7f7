// crates/remotely-core/src/lib.rs
// ============================================================================
// Module: Remotely Core
// Description: Remote association resolution and fetch engine.
// Purpose: Resolve declared relationships against registered HTTP APIs.
// Dependencies: reqwest, serde, serde_json, thiserror, url
// ============================================================================

//! ## Overview
//! Remotely lets a local record declare relationships whose targets live
//! behind registered HTTP APIs. A host type attaches an
//! [`AssociationTable`]; the [`Resolver`] turns an association name on a host
//! instance into a cached, reloadable [`Collection`] of typed records.
//!
//! Flow: host instance -> cache check -> [`AppRegistry`] app resolution ->
//! [`url_builder::build_url`] -> [`RequestExecutor`] -> JSON decoding ->
//! [`RemoteRecord`] instantiation -> [`Collection`] cached on the instance.
//!
//! Invariants:
//! - Declaration errors surface when the association table is built.
//! - Resolution performs at most one request and never yields partial results.
//! - Re-reading an association without reload serves the cached collection.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod association;
pub mod audit;
pub mod cache;
pub mod collection;
pub mod error;
pub mod http;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod url_builder;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use association::AssociationDecl;
pub use association::AssociationDescriptor;
pub use association::AssociationKind;
pub use association::AssociationTable;
pub use association::Cardinality;
pub use audit::FetchAuditEvent;
pub use audit::FetchAuditSink;
pub use audit::FetchOutcome;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use cache::AssociationCache;
pub use collection::Collection;
pub use error::RemotelyError;
pub use http::FetchRequest;
pub use http::HttpTransport;
pub use http::HttpTransportConfig;
pub use http::RawResponse;
pub use http::RequestExecutor;
pub use http::ReqwestTransport;
pub use record::AttributeSource;
pub use record::RemoteHost;
pub use record::RemoteRecord;
pub use registry::AppEntry;
pub use registry::AppName;
pub use registry::AppRegistry;
pub use registry::BasicAuth;
pub use registry::Configurator;
pub use registry::QueryParams;
pub use registry::RequestContext;
pub use resolver::FetchPlan;
pub use resolver::Resolver;
