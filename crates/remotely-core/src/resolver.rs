// crates/remotely-core/src/resolver.rs
// ============================================================================
// Module: Association Resolver
// Description: Resolves declared associations into cached collections.
// Purpose: Build the URL, fetch, decode, instantiate, and cache targets.
// Dependencies: serde_json, url
// ============================================================================

//! ## Overview
//! [`Resolver::resolve`] serves a fresh cached [`Collection`] when the host
//! instance has one; otherwise it looks up the descriptor, resolves the app,
//! builds the URL, performs one request, decodes the body according to the
//! association's cardinality, and caches the result on the instance.
//!
//! Response shapes:
//! - single associations (`has_one`, `belongs_to`) require a JSON object;
//! - `has_many` accepts a JSON array of objects, or an object holding such an
//!   array under the association's own name (`{"widgets": [...]}`).
//!
//! Invariants:
//! - One resolution performs at most one request; errors propagate unchanged.
//! - Either every element becomes a record or the resolution fails.
//! - The instance cache lock is never held across network I/O.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use url::Url;

use crate::association::AssociationDescriptor;
use crate::association::Cardinality;
use crate::audit::FetchAuditEvent;
use crate::audit::FetchAuditEventParams;
use crate::audit::FetchAuditSink;
use crate::audit::FetchOutcome;
use crate::audit::NoopAuditSink;
use crate::collection::Collection;
use crate::error::RemotelyError;
use crate::http::FetchRequest;
use crate::http::RequestExecutor;
use crate::record::AttributeSource;
use crate::record::RemoteHost;
use crate::record::RemoteRecord;
use crate::registry::AppRegistry;
use crate::registry::QueryParams;
use crate::url_builder::ParamLayers;
use crate::url_builder::build_url;

// ============================================================================
// SECTION: Fetch Plan
// ============================================================================

/// Inputs needed to (re)fetch one association.
///
/// Host attributes are captured when the plan is created, so a collection can
/// reload without access to the host instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    /// Association being fetched.
    descriptor: Arc<AssociationDescriptor>,
    /// Captured host attributes read by the path and foreign key.
    attributes: BTreeMap<String, Value>,
    /// Call-site query overrides.
    overrides: QueryParams,
}

impl FetchPlan {
    /// Captures the attributes the descriptor needs from a host.
    pub fn capture<S>(
        descriptor: Arc<AssociationDescriptor>,
        host: &S,
        overrides: QueryParams,
    ) -> Self
    where
        S: AttributeSource + ?Sized,
    {
        let attributes = descriptor
            .required_attributes()
            .iter()
            .filter_map(|name| host.attribute(name).map(|value| (name.clone(), value)))
            .collect();
        Self {
            descriptor,
            attributes,
            overrides,
        }
    }

    /// Returns the association name.
    #[must_use]
    pub fn association_name(&self) -> &str {
        self.descriptor.name()
    }

    /// Returns the association descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &Arc<AssociationDescriptor> {
        &self.descriptor
    }

    /// Returns the captured host attributes.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }
}

/// Records decoded from one successful fetch.
#[derive(Debug)]
pub(crate) struct Fetched<T> {
    /// Instantiated target records.
    pub(crate) records: Vec<T>,
    /// Request URL.
    pub(crate) url: Url,
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves associations for host instances.
///
/// Cloning is cheap; clones share the registry, executor, and audit sink.
#[derive(Clone)]
pub struct Resolver {
    /// App registry and global request context.
    registry: Arc<AppRegistry>,
    /// Request executor.
    executor: RequestExecutor,
    /// Audit sink for fetch events.
    audit: Arc<dyn FetchAuditSink>,
}

impl Resolver {
    /// Creates a resolver with a no-op audit sink.
    #[must_use]
    pub fn new(registry: Arc<AppRegistry>, executor: RequestExecutor) -> Self {
        Self {
            registry,
            executor,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn FetchAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the app registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<AppRegistry> {
        &self.registry
    }

    /// Resolves an association, serving a fresh cached collection when present.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError`] from descriptor lookup, app resolution, URL
    /// construction, the request, or decoding.
    pub fn resolve<T, H>(&self, host: &H, association: &str) -> Result<Collection<T>, RemotelyError>
    where
        T: RemoteRecord + Send + Sync + 'static,
        H: RemoteHost + ?Sized,
    {
        if let Some(cached) = host.association_cache().get::<T>(association)
            && cached.is_fresh()
        {
            self.audit.record(&FetchAuditEvent::new(FetchAuditEventParams {
                association: association.to_string(),
                app: None,
                url: Some(cached.url().to_string()),
                outcome: FetchOutcome::Cached,
                status: None,
                record_count: Some(cached.len()),
                response_bytes: None,
                error_kind: None,
            }));
            return Ok(cached);
        }
        self.fetch_into_cache(host, association, QueryParams::new())
    }

    /// Fetches an association with call-site query overrides.
    ///
    /// Always performs a request; the result replaces the cached collection.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError`] as for [`Resolver::resolve`].
    pub fn resolve_with<T, H>(
        &self,
        host: &H,
        association: &str,
        overrides: QueryParams,
    ) -> Result<Collection<T>, RemotelyError>
    where
        T: RemoteRecord + Send + Sync + 'static,
        H: RemoteHost + ?Sized,
    {
        self.fetch_into_cache(host, association, overrides)
    }

    /// Refetches an association unconditionally and replaces the cache entry.
    ///
    /// An existing cached collection is refreshed in place, so handles
    /// returned earlier observe the new records.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError`] as for [`Resolver::resolve`].
    pub fn reload<T, H>(&self, host: &H, association: &str) -> Result<Collection<T>, RemotelyError>
    where
        T: RemoteRecord + Send + Sync + 'static,
        H: RemoteHost + ?Sized,
    {
        self.fetch_into_cache(host, association, QueryParams::new())
    }

    /// Captures a plan from the host, fetches, and stores into its cache.
    fn fetch_into_cache<T, H>(
        &self,
        host: &H,
        association: &str,
        overrides: QueryParams,
    ) -> Result<Collection<T>, RemotelyError>
    where
        T: RemoteRecord + Send + Sync + 'static,
        H: RemoteHost + ?Sized,
    {
        let descriptor = match host.associations().lookup(association) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                self.record_failure(association, None, None, &err);
                return Err(err);
            }
        };
        let plan = FetchPlan::capture(descriptor, host, overrides);
        let fetched = self.fetch_records::<T>(&plan)?;
        Ok(host.association_cache().store(self, plan, fetched.records, fetched.url))
    }

    /// Performs steps app resolution through instantiation for a plan.
    pub(crate) fn fetch_records<T>(&self, plan: &FetchPlan) -> Result<Fetched<T>, RemotelyError>
    where
        T: RemoteRecord,
    {
        let descriptor = plan.descriptor();
        let app = match self.registry.resolve_app(descriptor.app()) {
            Ok(app) => app,
            Err(err) => {
                self.record_failure(descriptor.name(), None, None, &err);
                return Err(err);
            }
        };
        let app_name = Some(app.name().to_string());
        let context = self.registry.request_context();
        let url = descriptor.association_params(&plan.attributes).and_then(|association| {
            build_url(
                &app,
                descriptor.path_template(),
                &plan.attributes,
                ParamLayers {
                    defaults: &context.default_params,
                    association: &association,
                    overrides: &plan.overrides,
                },
            )
        });
        let url = match url {
            Ok(url) => url,
            Err(err) => {
                self.record_failure(descriptor.name(), app_name, None, &err);
                return Err(err);
            }
        };
        let request = FetchRequest {
            url,
            basic_auth: context.basic_auth,
        };
        let decoded = self.executor.fetch(&request).and_then(|response| {
            decode_records::<T>(descriptor, response.value)
                .map(|records| (records, response.status, response.body_bytes))
        });
        match decoded {
            Ok((records, status, body_bytes)) => {
                self.audit.record(&FetchAuditEvent::new(FetchAuditEventParams {
                    association: descriptor.name().to_string(),
                    app: app_name,
                    url: Some(request.url.to_string()),
                    outcome: FetchOutcome::Fetched,
                    status: Some(status),
                    record_count: Some(records.len()),
                    response_bytes: Some(body_bytes),
                    error_kind: None,
                }));
                Ok(Fetched {
                    records,
                    url: request.url,
                })
            }
            Err(err) => {
                self.record_failure(
                    descriptor.name(),
                    app_name,
                    Some(request.url.to_string()),
                    &err,
                );
                Err(err)
            }
        }
    }

    /// Emits a failure audit event.
    fn record_failure(
        &self,
        association: &str,
        app: Option<String>,
        url: Option<String>,
        err: &RemotelyError,
    ) {
        self.audit.record(&FetchAuditEvent::new(FetchAuditEventParams {
            association: association.to_string(),
            app,
            url,
            outcome: FetchOutcome::Failed,
            status: err.status(),
            record_count: None,
            response_bytes: None,
            error_kind: Some(err.kind()),
        }));
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes a JSON value into records according to the cardinality.
///
/// # Errors
///
/// Returns [`RemotelyError::ShapeMismatch`] for shapes that do not match and
/// [`RemotelyError::Record`] when an object does not describe a record.
pub fn decode_records<T>(
    descriptor: &AssociationDescriptor,
    value: Value,
) -> Result<Vec<T>, RemotelyError>
where
    T: RemoteRecord,
{
    let association = descriptor.name();
    match descriptor.cardinality() {
        Cardinality::Single => match value {
            Value::Object(object) => Ok(vec![instantiate(association, 0, object)?]),
            other => Err(shape_mismatch(association, "object", &other)),
        },
        Cardinality::Collection => {
            let items = match value {
                Value::Array(items) => items,
                Value::Object(mut object) => match object.remove(association) {
                    Some(Value::Array(items)) => items,
                    _ => return Err(shape_mismatch(association, "array", &Value::Object(object))),
                },
                other => return Err(shape_mismatch(association, "array", &other)),
            };
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Object(object) => instantiate(association, index, object),
                    other => Err(shape_mismatch(association, "object", &other)),
                })
                .collect()
        }
    }
}

/// Builds one record from a JSON object.
fn instantiate<T>(
    association: &str,
    index: usize,
    object: Map<String, Value>,
) -> Result<T, RemotelyError>
where
    T: RemoteRecord,
{
    T::from_attributes(object).map_err(|message| RemotelyError::Record {
        association: association.to_string(),
        index,
        message,
    })
}

/// Builds a shape mismatch error for a value.
fn shape_mismatch(association: &str, expected: &'static str, found: &Value) -> RemotelyError {
    RemotelyError::ShapeMismatch {
        association: association.to_string(),
        expected,
        found: json_shape(found),
    }
}

/// Returns a label for the JSON shape of a value.
const fn json_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        reason = "Test assertions use unwrap and panic for clarity."
    )]

    use serde::Deserialize;
    use serde_json::json;

    use super::decode_records;
    use crate::association::AssociationDecl;
    use crate::association::AssociationTable;
    use crate::error::RemotelyError;
    use crate::registry::AppRegistry;

    #[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
    struct Widget {
        id: u64,
        name: String,
    }

    fn table() -> AssociationTable {
        let registry = AppRegistry::new();
        registry.register("fun", "http://fun.com").unwrap();
        let mut table = AssociationTable::new("users");
        table
            .declare(&registry, AssociationDecl::has_many("widgets"))
            .unwrap()
            .declare(&registry, AssociationDecl::has_one("widget"))
            .unwrap();
        table
    }

    #[test]
    fn collection_accepts_bare_array() {
        let table = table();
        let records: Vec<Widget> = decode_records(
            &table.lookup("widgets").unwrap(),
            json!([{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]),
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "b");
    }

    #[test]
    fn collection_accepts_array_nested_under_association_name() {
        let table = table();
        let records: Vec<Widget> = decode_records(
            &table.lookup("widgets").unwrap(),
            json!({"widgets": [{"id": 1, "name": "a"}], "total": 1}),
        )
        .unwrap();
        assert_eq!(records, vec![Widget {
            id: 1,
            name: "a".to_string()
        }]);
    }

    #[test]
    fn collection_rejects_object_without_named_array() {
        let table = table();
        let err = decode_records::<Widget>(
            &table.lookup("widgets").unwrap(),
            json!({"items": [{"id": 1, "name": "a"}]}),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RemotelyError::ShapeMismatch {
                association: "widgets".to_string(),
                expected: "array",
                found: "object",
            }
        );
    }

    #[test]
    fn single_rejects_array() {
        let table = table();
        let err = decode_records::<Widget>(
            &table.lookup("widget").unwrap(),
            json!([{"id": 1, "name": "a"}]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "shape_mismatch");
    }

    #[test]
    fn one_bad_element_fails_the_whole_collection() {
        let table = table();
        let err = decode_records::<Widget>(
            &table.lookup("widgets").unwrap(),
            json!([{"id": 1, "name": "a"}, {"id": "oops"}]),
        )
        .unwrap_err();
        match err {
            RemotelyError::Record {
                index, ..
            } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_object_element_is_a_shape_mismatch() {
        let table = table();
        let err =
            decode_records::<Widget>(&table.lookup("widgets").unwrap(), json!([1, 2])).unwrap_err();
        assert_eq!(err.kind(), "shape_mismatch");
    }
}
