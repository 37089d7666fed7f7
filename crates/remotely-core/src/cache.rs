// crates/remotely-core/src/cache.rs
// ============================================================================
// Module: Association Cache
// Description: Per-instance map of resolved collections.
// Purpose: Serve repeated association reads without network calls.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Each host instance owns one [`AssociationCache`], keyed by association
//! name. Entries are type-erased [`Collection`] handles. Storing into an
//! occupied slot of the same record type refreshes the existing collection in
//! place, so racing first resolutions converge on one shared collection
//! (last write wins) and earlier handles stay valid.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use url::Url;

use crate::collection::Collection;
use crate::resolver::FetchPlan;
use crate::resolver::Resolver;

// ============================================================================
// SECTION: Erased Entries
// ============================================================================

/// Type-erased view of a cached collection.
trait CachedCollection: Send + Sync {
    /// Marks the collection stale.
    fn invalidate(&self);

    /// Returns the collection as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T> CachedCollection for Collection<T>
where
    T: Send + Sync + 'static,
{
    fn invalidate(&self) {
        Self::invalidate(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Resolved collections owned by one host instance.
#[derive(Default)]
pub struct AssociationCache {
    /// Cached collections keyed by association name.
    entries: Mutex<BTreeMap<String, Box<dyn CachedCollection>>>,
}

impl AssociationCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached collection for an association, if it holds `T`.
    #[must_use]
    pub fn get<T>(&self, association: &str) -> Option<Collection<T>>
    where
        T: Send + Sync + 'static,
    {
        self.lock()
            .get(association)
            .and_then(|entry| entry.as_any().downcast_ref::<Collection<T>>())
            .cloned()
    }

    /// Returns true when an entry exists for the association.
    #[must_use]
    pub fn contains(&self, association: &str) -> bool {
        self.lock().contains_key(association)
    }

    /// Marks one cached collection stale. Returns false when nothing is cached.
    pub fn invalidate(&self, association: &str) -> bool {
        self.lock().get(association).map(|entry| entry.invalidate()).is_some()
    }

    /// Evicts one cached collection. Returns false when nothing was cached.
    pub fn evict(&self, association: &str) -> bool {
        self.lock().remove(association).is_some()
    }

    /// Evicts every cached collection.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Returns the number of cached associations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stores fetched records, refreshing an existing collection in place.
    ///
    /// A slot holding a different record type is replaced by a new collection.
    pub(crate) fn store<T>(
        &self,
        resolver: &Resolver,
        plan: FetchPlan,
        records: Vec<T>,
        url: Url,
    ) -> Collection<T>
    where
        T: Send + Sync + 'static,
    {
        let mut entries = self.lock();
        let association = plan.association_name().to_string();
        if let Some(existing) = entries
            .get(&association)
            .and_then(|entry| entry.as_any().downcast_ref::<Collection<T>>())
        {
            existing.replace(plan, records, url);
            return existing.clone();
        }
        let collection = Collection::new(resolver.clone(), plan, records, url);
        entries.insert(association, Box::new(collection.clone()));
        collection
    }

    /// Acquires the entry lock, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Box<dyn CachedCollection>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for AssociationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationCache")
            .field("associations", &self.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}
