// crates/remotely-core/src/association.rs
// ============================================================================
// Module: Association Descriptors
// Description: Declarative remote relationships attached to a host type.
// Purpose: Validate declarations eagerly and describe how to fetch targets.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! A host type builds one [`AssociationTable`] and attaches it to its
//! instances. Each entry is an immutable [`AssociationDescriptor`] created
//! from an [`AssociationDecl`] by [`AssociationTable::declare`].
//!
//! Declaration fails fast:
//! - a `foreign_key` on anything but `has_many` is
//!   [`RemotelyError::HasManyForeignKey`];
//! - eliding the target app while more than one app is registered is
//!   [`RemotelyError::RemoteApp`].
//!
//! The app is re-resolved against the registry on every fetch, so an
//! explicitly named app only has to be registered by the time it is used.
//!
//! Default path templates, given the table's resource name:
//! - `has_many` / `has_one`: `/{resource}/{id}/{name}`;
//! - `has_many` with `foreign_key = fk`: `/{name}` plus `fk=<host id>`;
//! - `belongs_to`: `/{name}s/{<name>_id}`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::RemotelyError;
use crate::record::AttributeSource;
use crate::registry::AppName;
use crate::registry::AppRegistry;
use crate::registry::QueryParams;
use crate::url_builder::placeholder_names;
use crate::url_builder::render_attribute;
use crate::url_builder::validate_template;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Host attribute holding the record identity.
pub const IDENTITY_ATTRIBUTE: &str = "id";

// ============================================================================
// SECTION: Kinds
// ============================================================================

/// Relationship kind of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    /// One remote record owned by the host.
    HasOne,
    /// Many remote records owned by the host.
    HasMany,
    /// One remote record referenced by the host's `<name>_id` attribute.
    BelongsTo,
}

impl AssociationKind {
    /// Returns the response cardinality expected for the kind.
    #[must_use]
    pub const fn cardinality(self) -> Cardinality {
        match self {
            Self::HasMany => Cardinality::Collection,
            Self::HasOne | Self::BelongsTo => Cardinality::Single,
        }
    }

    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HasOne => "has_one",
            Self::HasMany => "has_many",
            Self::BelongsTo => "belongs_to",
        }
    }
}

/// Expected response cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// A single JSON object.
    Single,
    /// A JSON array of objects.
    Collection,
}

// ============================================================================
// SECTION: Declaration
// ============================================================================

/// Unvalidated association declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDecl {
    /// Association name.
    name: String,
    /// Relationship kind.
    kind: AssociationKind,
    /// Explicit target app.
    app: Option<AppName>,
    /// Explicit path template.
    path: Option<String>,
    /// Target-side foreign key attribute.
    foreign_key: Option<String>,
    /// Association-level query parameters.
    params: QueryParams,
}

impl AssociationDecl {
    /// Starts a declaration of the given kind.
    #[must_use]
    pub fn new(kind: AssociationKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            app: None,
            path: None,
            foreign_key: None,
            params: QueryParams::new(),
        }
    }

    /// Declares a `has_one` association.
    #[must_use]
    pub fn has_one(name: impl Into<String>) -> Self {
        Self::new(AssociationKind::HasOne, name)
    }

    /// Declares a `has_many` association.
    #[must_use]
    pub fn has_many(name: impl Into<String>) -> Self {
        Self::new(AssociationKind::HasMany, name)
    }

    /// Declares a `belongs_to` association.
    #[must_use]
    pub fn belongs_to(name: impl Into<String>) -> Self {
        Self::new(AssociationKind::BelongsTo, name)
    }

    /// Names the target app.
    #[must_use]
    pub fn app(mut self, app: impl Into<AppName>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Overrides the default path template.
    #[must_use]
    pub fn path(mut self, template: impl Into<String>) -> Self {
        self.path = Some(template.into());
        self
    }

    /// Sets the target-side foreign key (`has_many` only).
    #[must_use]
    pub fn foreign_key(mut self, attribute: impl Into<String>) -> Self {
        self.foreign_key = Some(attribute.into());
        self
    }

    /// Adds an association-level query parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Validated, immutable association descriptor.
///
/// # Invariants
/// - `foreign_key` is only set for [`AssociationKind::HasMany`].
/// - `path_template` has balanced placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDescriptor {
    /// Association name.
    name: String,
    /// Relationship kind.
    kind: AssociationKind,
    /// Explicit target app, re-resolved on every fetch.
    app: Option<AppName>,
    /// Path template relative to the app path.
    path_template: String,
    /// Target-side foreign key attribute.
    foreign_key: Option<String>,
    /// Association-level query parameters.
    params: QueryParams,
    /// Host attributes the template and foreign key read.
    required_attributes: Vec<String>,
}

impl AssociationDescriptor {
    /// Returns the association name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the relationship kind.
    #[must_use]
    pub const fn kind(&self) -> AssociationKind {
        self.kind
    }

    /// Returns the expected response cardinality.
    #[must_use]
    pub const fn cardinality(&self) -> Cardinality {
        self.kind.cardinality()
    }

    /// Returns the explicit target app, if any.
    #[must_use]
    pub const fn app(&self) -> Option<&AppName> {
        self.app.as_ref()
    }

    /// Returns the path template.
    #[must_use]
    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    /// Returns the target-side foreign key, if any.
    #[must_use]
    pub fn foreign_key(&self) -> Option<&str> {
        self.foreign_key.as_deref()
    }

    /// Returns the host attributes read while building the request.
    #[must_use]
    pub fn required_attributes(&self) -> &[String] {
        &self.required_attributes
    }

    /// Returns the association parameter layer for one host instance.
    ///
    /// The foreign key, when declared, is sent as `<foreign_key>=<host id>`.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError::MissingAttribute`] when the host has no identity.
    pub fn association_params<S>(&self, host: &S) -> Result<QueryParams, RemotelyError>
    where
        S: AttributeSource + ?Sized,
    {
        let mut params = self.params.clone();
        if let Some(foreign_key) = &self.foreign_key {
            params.insert(foreign_key.clone(), render_attribute(host, IDENTITY_ATTRIBUTE)?);
        }
        Ok(params)
    }
}

// ============================================================================
// SECTION: Table
// ============================================================================

/// Associations declared for one host type.
///
/// # Invariants
/// - Association names are unique within the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationTable {
    /// Resource name of the host type, used for default paths.
    resource: String,
    /// Descriptors keyed by association name.
    associations: BTreeMap<String, Arc<AssociationDescriptor>>,
}

impl AssociationTable {
    /// Creates an empty table for a host resource (for example `"users"`).
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            associations: BTreeMap::new(),
        }
    }

    /// Validates and adds a declaration.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError::HasManyForeignKey`], [`RemotelyError::RemoteApp`],
    /// [`RemotelyError::DuplicateAssociation`], or [`RemotelyError::InvalidUrl`]
    /// for a malformed path template (unterminated placeholder, dot segment,
    /// query, or fragment).
    pub fn declare(
        &mut self,
        registry: &AppRegistry,
        decl: AssociationDecl,
    ) -> Result<&mut Self, RemotelyError> {
        if decl.foreign_key.is_some() && decl.kind != AssociationKind::HasMany {
            return Err(RemotelyError::HasManyForeignKey {
                association: decl.name,
            });
        }
        if decl.app.is_none() {
            let registered = registry.len();
            if registered > 1 {
                return Err(RemotelyError::RemoteApp {
                    registered,
                });
            }
        }
        if self.associations.contains_key(&decl.name) {
            return Err(RemotelyError::DuplicateAssociation {
                association: decl.name,
            });
        }
        let path_template = decl.path.clone().unwrap_or_else(|| self.default_path(&decl));
        validate_template(&path_template)?;
        let mut required_attributes = placeholder_names(&path_template)?;
        if decl.foreign_key.is_some()
            && !required_attributes.iter().any(|name| name == IDENTITY_ATTRIBUTE)
        {
            required_attributes.push(IDENTITY_ATTRIBUTE.to_string());
        }
        let descriptor = AssociationDescriptor {
            name: decl.name.clone(),
            kind: decl.kind,
            app: decl.app,
            path_template,
            foreign_key: decl.foreign_key,
            params: decl.params,
            required_attributes,
        };
        self.associations.insert(decl.name, Arc::new(descriptor));
        Ok(self)
    }

    /// Returns the descriptor for an association, if declared.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<AssociationDescriptor>> {
        self.associations.get(name)
    }

    /// Returns the descriptor for an association.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError::UnknownAssociation`] when the name is not declared.
    pub fn lookup(&self, name: &str) -> Result<Arc<AssociationDescriptor>, RemotelyError> {
        self.associations.get(name).cloned().ok_or_else(|| RemotelyError::UnknownAssociation {
            association: name.to_string(),
        })
    }

    /// Returns the host resource name.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Iterates over declared association names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.associations.keys().map(String::as_str)
    }

    /// Returns the number of declared associations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.associations.len()
    }

    /// Returns true when nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }

    /// Derives the default path template for a declaration.
    fn default_path(&self, decl: &AssociationDecl) -> String {
        let name = &decl.name;
        match (decl.kind, &decl.foreign_key) {
            (AssociationKind::HasMany, Some(_)) => format!("/{name}"),
            (AssociationKind::HasMany | AssociationKind::HasOne, _) => {
                format!("/{}/{{{IDENTITY_ATTRIBUTE}}}/{name}", self.resource)
            }
            (AssociationKind::BelongsTo, _) => format!("/{name}s/{{{name}_id}}"),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test assertions use unwrap for clarity.")]

    use serde_json::Map;
    use serde_json::json;

    use super::AssociationDecl;
    use super::AssociationTable;
    use super::Cardinality;
    use crate::registry::AppRegistry;

    fn registry_with(apps: &[&str]) -> AppRegistry {
        let registry = AppRegistry::new();
        for app in apps {
            registry.register(*app, &format!("http://{app}.com")).unwrap();
        }
        registry
    }

    #[test]
    fn default_paths_follow_kind() {
        let registry = registry_with(&["fun"]);
        let mut table = AssociationTable::new("users");
        table
            .declare(&registry, AssociationDecl::has_many("widgets"))
            .unwrap()
            .declare(&registry, AssociationDecl::has_one("profile"))
            .unwrap()
            .declare(&registry, AssociationDecl::belongs_to("team"))
            .unwrap()
            .declare(&registry, AssociationDecl::has_many("things").foreign_key("owner_id"))
            .unwrap();
        assert_eq!(table.lookup("widgets").unwrap().path_template(), "/users/{id}/widgets");
        assert_eq!(table.lookup("profile").unwrap().path_template(), "/users/{id}/profile");
        assert_eq!(table.lookup("team").unwrap().path_template(), "/teams/{team_id}");
        assert_eq!(table.lookup("things").unwrap().path_template(), "/things");
        assert_eq!(table.lookup("profile").unwrap().cardinality(), Cardinality::Single);
        assert_eq!(table.lookup("things").unwrap().cardinality(), Cardinality::Collection);
    }

    #[test]
    fn foreign_key_becomes_query_parameter() {
        let registry = registry_with(&["fun"]);
        let mut table = AssociationTable::new("users");
        table
            .declare(
                &registry,
                AssociationDecl::has_many("things").foreign_key("owner_id").param("limit", "5"),
            )
            .unwrap();
        let descriptor = table.lookup("things").unwrap();
        let mut host = Map::new();
        host.insert("id".to_string(), json!(9));
        let params = descriptor.association_params(&host).unwrap();
        assert_eq!(params.get("owner_id").map(String::as_str), Some("9"));
        assert_eq!(params.get("limit").map(String::as_str), Some("5"));
        assert_eq!(descriptor.required_attributes(), ["id".to_string()]);
    }

    #[test]
    fn foreign_key_on_single_association_is_rejected() {
        let registry = registry_with(&["fun"]);
        let mut table = AssociationTable::new("users");
        let err = table
            .declare(&registry, AssociationDecl::has_one("profile").foreign_key("owner_id"))
            .unwrap_err();
        assert_eq!(err.kind(), "has_many_foreign_key");
        let err = table
            .declare(&registry, AssociationDecl::belongs_to("team").foreign_key("owner_id"))
            .unwrap_err();
        assert_eq!(err.kind(), "has_many_foreign_key");
        assert!(table.is_empty());
    }

    #[test]
    fn elided_app_requires_at_most_one_registered_app() {
        let mut table = AssociationTable::new("users");
        table.declare(&registry_with(&[]), AssociationDecl::has_many("a")).unwrap();
        table.declare(&registry_with(&["fun"]), AssociationDecl::has_many("b")).unwrap();
        let err = table
            .declare(&registry_with(&["fun", "games"]), AssociationDecl::has_many("c"))
            .unwrap_err();
        assert_eq!(err.kind(), "remote_app");
        table
            .declare(&registry_with(&["fun", "games"]), AssociationDecl::has_many("c").app("fun"))
            .unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = registry_with(&["fun"]);
        let mut table = AssociationTable::new("users");
        table.declare(&registry, AssociationDecl::has_many("widgets")).unwrap();
        let err = table.declare(&registry, AssociationDecl::has_one("widgets")).unwrap_err();
        assert_eq!(err.kind(), "duplicate_association");
    }

    #[test]
    fn unknown_association_lookup_fails() {
        let table = AssociationTable::new("users");
        assert_eq!(table.lookup("nope").unwrap_err().kind(), "unknown_association");
        assert!(table.get("nope").is_none());
    }

    #[test]
    fn malformed_path_templates_are_rejected() {
        let registry = registry_with(&["fun"]);
        let mut table = AssociationTable::new("users");
        let templates = ["/../../admin/{id}", "/users/./{id}", "/widgets/{id}?type=x", "/w#top"];
        for template in templates {
            let err = table
                .declare(&registry, AssociationDecl::has_many("widgets").path(template))
                .unwrap_err();
            assert_eq!(err.kind(), "invalid_url");
        }
        assert!(table.is_empty());
        table
            .declare(
                &registry,
                AssociationDecl::has_many("widgets").path("/widgets").param("type", "x"),
            )
            .unwrap();
        assert_eq!(table.len(), 1);
    }
}
