//! Phantom families and the shared lifecycle they run on.
//!
//! A phantom is a long-lived illusion stepped every sub-tick: a rendered
//! figure (stalker, lurker) or a set of real creatures whose view is puppeted
//! (stare, follow). Each family is a [`PhantomFamily`] driven by its own
//! [`PhantomManager`]; the engine holds the managers as [`PhantomDriver`]
//! trait objects so it can advance and release them uniformly.

pub mod claims;
pub mod figure;
pub mod follow;
pub mod ids;
pub mod lifecycle;
pub mod lurker;
pub mod puppet;
pub mod registry;
pub mod stalker;
pub mod stare;

use std::fmt::Debug;

pub use claims::SubjectClaims;
pub use ids::PhantomIdAllocator;
pub use lifecycle::{
    DespawnReason, LifecyclePhase, PhantomFamily, PhantomInstance, PhantomManager, StepOutcome,
};
pub use registry::ActivePhantomRegistry;

use crate::world::ActorId;

/// Object-safe view of a [`PhantomManager`].
pub trait PhantomDriver: Send + Sync + Debug {
    /// Family name.
    fn family_name(&self) -> &'static str;

    /// Advances every instance by one sub-tick.
    fn advance(&self);

    /// Despawns everything owned by `owner`; returns how many were removed.
    fn release_actor(&self, owner: &ActorId, reason: DespawnReason) -> usize;

    /// Despawns every instance; returns how many were removed.
    fn release_all(&self, reason: DespawnReason) -> usize;

    /// Number of live instances.
    fn active_count(&self) -> usize;

    /// Whether `owner` has an instance.
    fn is_active_for(&self, owner: &ActorId) -> bool;
}

impl<F: PhantomFamily> PhantomDriver for PhantomManager<F> {
    fn family_name(&self) -> &'static str {
        self.family().name()
    }

    fn advance(&self) {
        Self::advance(self);
    }

    fn release_actor(&self, owner: &ActorId, reason: DespawnReason) -> usize {
        Self::release_actor(self, owner, reason)
    }

    fn release_all(&self, reason: DespawnReason) -> usize {
        Self::release_all(self, reason)
    }

    fn active_count(&self) -> usize {
        self.registry().len()
    }

    fn is_active_for(&self, owner: &ActorId) -> bool {
        Self::is_active_for(self, owner)
    }
}
