//! Per-family registry of active phantoms.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::lifecycle::PhantomInstance;
use crate::channel::PhantomId;
use crate::world::ActorId;

/// Concurrent actor → active instances map.
///
/// An actor entry exists only while it owns at least one instance; removing
/// the last one deletes the entry.
pub struct ActivePhantomRegistry<S> {
    entries: DashMap<ActorId, HashMap<PhantomId, Arc<PhantomInstance<S>>>>,
}

impl<S> Default for ActivePhantomRegistry<S> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<S> ActivePhantomRegistry<S> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `instance` unless its owner already has one.
    ///
    /// The check and the insert happen under the same shard lock.
    pub fn insert_exclusive(&self, instance: Arc<PhantomInstance<S>>) -> bool {
        match self.entries.entry(instance.owner().clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().is_empty() {
                    existing.get_mut().insert(instance.id(), instance);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(HashMap::from([(instance.id(), instance)]));
                true
            }
        }
    }

    /// Removes one instance, deleting the actor entry when it was the last.
    pub fn remove(&self, owner: &ActorId, id: PhantomId) -> Option<Arc<PhantomInstance<S>>> {
        let removed = self
            .entries
            .get_mut(owner)
            .and_then(|mut instances| instances.remove(&id));
        self.entries.remove_if(owner, |_, instances| instances.is_empty());
        removed
    }

    /// Instances owned by `owner`.
    #[must_use]
    pub fn for_actor(&self, owner: &ActorId) -> Vec<Arc<PhantomInstance<S>>> {
        self.entries
            .get(owner)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `owner` has an instance.
    #[must_use]
    pub fn is_active_for(&self, owner: &ActorId) -> bool {
        self.entries.get(owner).is_some_and(|m| !m.is_empty())
    }

    /// Every registered instance, ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<PhantomInstance<S>>> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .flat_map(|e| e.value().values().cloned().collect::<Vec<_>>())
            .collect();
        all.sort_by_key(|i| i.id());
        all
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.value().len()).sum()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of actors with an entry.
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.entries.len()
    }
}

impl<S> std::fmt::Debug for ActivePhantomRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivePhantomRegistry")
            .field("actors", &self.entries.len())
            .finish_non_exhaustive()
    }
}
