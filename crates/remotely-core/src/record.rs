// crates/remotely-core/src/record.rs
// ============================================================================
// Module: Record Capabilities
// Description: Narrow contracts between the engine and the host object model.
// Purpose: Read host attributes and build target records from JSON objects.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The engine never depends on a concrete object model. Host records expose
//! attribute reads plus their association table and cache; target records
//! are built from one flat JSON object.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;

use crate::association::AssociationTable;
use crate::cache::AssociationCache;

// ============================================================================
// SECTION: Host Capabilities
// ============================================================================

/// Read access to named attribute values.
pub trait AttributeSource {
    /// Returns the current value of the attribute, if present.
    fn attribute(&self, name: &str) -> Option<Value>;
}

impl AttributeSource for Map<String, Value> {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl AttributeSource for BTreeMap<String, Value> {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// A local record that owns remote associations.
///
/// Implementors attach an [`AssociationTable`] shared by every instance of the
/// type and an [`AssociationCache`] owned by the instance.
pub trait RemoteHost: AttributeSource {
    /// Returns the associations declared for the host type.
    fn associations(&self) -> &AssociationTable;

    /// Returns the per-instance cache of resolved collections.
    fn association_cache(&self) -> &AssociationCache;
}

// ============================================================================
// SECTION: Target Capabilities
// ============================================================================

/// A record type that can be built from one decoded JSON object.
pub trait RemoteRecord: Sized {
    /// Builds a record from the object's fields.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic message when the fields do not describe a record.
    fn from_attributes(attributes: Map<String, Value>) -> Result<Self, String>;
}

impl<T> RemoteRecord for T
where
    T: DeserializeOwned,
{
    fn from_attributes(attributes: Map<String, Value>) -> Result<Self, String> {
        serde_json::from_value(Value::Object(attributes)).map_err(|err| err.to_string())
    }
}
