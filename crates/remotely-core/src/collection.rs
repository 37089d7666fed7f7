// crates/remotely-core/src/collection.rs
// ============================================================================
// Module: Resolved Collection
// Description: Shared, reloadable view over fetched target records.
// Purpose: Expose remote records like an in-memory relationship.
// Dependencies: url
// ============================================================================

//! ## Overview
//! A [`Collection`] is a cheap-to-clone handle. Every clone observes the same
//! backing records, so [`Collection::reload`] refreshes the contents in place
//! and existing handles see the new records without going back through the
//! host. Reads take a snapshot of the current records, so iteration is finite
//! and restartable even while a reload runs.
//! Invariants:
//! - Contents are replaced wholesale; readers never observe a mix of two fetches.
//! - A collection starts fresh; [`Collection::invalidate`] marks it stale so
//!   the next resolution through the host refetches it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use url::Url;

use crate::error::RemotelyError;
use crate::record::RemoteRecord;
use crate::resolver::FetchPlan;
use crate::resolver::Resolver;

// ============================================================================
// SECTION: Collection
// ============================================================================

/// Mutable state behind a collection handle.
struct CollectionState<T> {
    /// Records from the most recent fetch.
    records: Arc<Vec<T>>,
    /// False once invalidated.
    fresh: bool,
    /// Request inputs used to refetch.
    plan: FetchPlan,
    /// URL of the most recent fetch.
    url: Url,
}

/// State shared by every clone of a collection.
struct Shared<T> {
    /// Resolver used for reloads.
    resolver: Resolver,
    /// Current contents.
    state: RwLock<CollectionState<T>>,
}

/// Ordered, read-only view over resolved target records.
pub struct Collection<T> {
    /// Shared state; clones point at the same allocation.
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Collection<T> {
    /// Creates a fresh collection from fetched records.
    pub(crate) fn new(resolver: Resolver, plan: FetchPlan, records: Vec<T>, url: Url) -> Self {
        Self {
            shared: Arc::new(Shared {
                resolver,
                state: RwLock::new(CollectionState {
                    records: Arc::new(records),
                    fresh: true,
                    plan,
                    url,
                }),
            }),
        }
    }

    /// Replaces the contents in place and marks the collection fresh.
    pub(crate) fn replace(&self, plan: FetchPlan, records: Vec<T>, url: Url) {
        let mut state = self.write();
        state.records = Arc::new(records);
        state.fresh = true;
        state.plan = plan;
        state.url = url;
    }

    /// Returns the association name the collection was resolved for.
    #[must_use]
    pub fn association(&self) -> String {
        self.read().plan.association_name().to_string()
    }

    /// Returns the URL of the most recent fetch.
    #[must_use]
    pub fn url(&self) -> Url {
        self.read().url.clone()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    /// Returns true when the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    /// Returns a snapshot of the current records.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.read().records)
    }

    /// Returns true until the collection is invalidated.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.read().fresh
    }

    /// Marks the collection stale; the next host resolution refetches it.
    pub fn invalidate(&self) {
        self.write().fresh = false;
    }

    /// Returns true when both handles share the same backing collection.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Returns a clone of the request plan.
    pub(crate) fn plan(&self) -> FetchPlan {
        self.read().plan.clone()
    }

    /// Acquires the read lock, recovering from poisoning.
    fn read(&self) -> RwLockReadGuard<'_, CollectionState<T>> {
        self.shared.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires the write lock, recovering from poisoning.
    fn write(&self) -> RwLockWriteGuard<'_, CollectionState<T>> {
        self.shared.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Collection<T> {
    /// Returns the record at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        self.read().records.get(index).cloned()
    }

    /// Returns the first record.
    #[must_use]
    pub fn first(&self) -> Option<T> {
        self.get(0)
    }

    /// Returns the records as an owned vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.read().records.as_ref().clone()
    }

    /// Iterates over a snapshot of the records.
    #[must_use]
    pub fn iter(&self) -> Iter<T> {
        Iter {
            records: self.snapshot(),
            index: 0,
        }
    }
}

impl<T> Collection<T>
where
    T: RemoteRecord + Send + Sync + 'static,
{
    /// Refetches the association and replaces the contents in place.
    ///
    /// The host attributes captured at the original resolution are reused;
    /// the app and global request context are re-read from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RemotelyError`] from the fetch; the previous contents are kept.
    pub fn reload(&self) -> Result<(), RemotelyError> {
        let plan = self.plan();
        let fetched = self.shared.resolver.fetch_records::<T>(&plan)?;
        self.replace(plan, fetched.records, fetched.url);
        Ok(())
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Collection")
            .field("association", &state.plan.association_name())
            .field("len", &state.records.len())
            .field("fresh", &state.fresh)
            .finish_non_exhaustive()
    }
}

impl<T: Clone> IntoIterator for &Collection<T> {
    type Item = T;
    type IntoIter = Iter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// SECTION: Iterator
// ============================================================================

/// Iterator over a snapshot of collection records.
#[derive(Debug, Clone)]
pub struct Iter<T> {
    /// Snapshot being iterated.
    records: Arc<Vec<T>>,
    /// Next position.
    index: usize,
}

impl<T: Clone> Iterator for Iter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.records.get(self.index).cloned()?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.records.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<T: Clone> ExactSizeIterator for Iter<T> {}
