//! Shared collaborators handed to every effect.
//!
//! One [`EffectContext`] is built per engine and shared by `Arc`. It carries
//! the host interfaces, the live configuration, and the engine-wide services
//! (sequence runner, id allocator, creature claims, appearance cache, event
//! stream) so effects never reach for globals.

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};

use crate::appearance::AppearanceCache;
use crate::channel::RenderChannel;
use crate::config::ConfigHandle;
use crate::observability::EventEmitter;
use crate::phantom::claims::SubjectClaims;
use crate::phantom::ids::PhantomIdAllocator;
use crate::sequence::SequenceRunner;
use crate::world::WorldView;

/// Collaborators and engine-wide services.
pub struct EffectContext {
    world: Arc<dyn WorldView>,
    channel: Arc<dyn RenderChannel>,
    config: ConfigHandle,
    appearances: Arc<AppearanceCache>,
    events: Arc<EventEmitter>,
    sequences: SequenceRunner,
    ids: PhantomIdAllocator,
    claims: SubjectClaims,
    rng: Mutex<StdRng>,
}

impl EffectContext {
    /// Creates a context with an entropy-seeded rng, no appearance source
    /// and a discarding event stream.
    #[must_use]
    pub fn new(world: Arc<dyn WorldView>, channel: Arc<dyn RenderChannel>, config: ConfigHandle) -> Self {
        Self {
            world,
            channel,
            config,
            appearances: Arc::new(AppearanceCache::disabled()),
            events: Arc::new(EventEmitter::noop()),
            sequences: SequenceRunner::new(),
            ids: PhantomIdAllocator::new(),
            claims: SubjectClaims::new(),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Reseeds the rng so runs are reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Replaces the appearance cache.
    #[must_use]
    pub fn with_appearances(mut self, appearances: Arc<AppearanceCache>) -> Self {
        self.appearances = appearances;
        self
    }

    /// Replaces the event stream.
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = events;
        self
    }

    /// Host world view.
    #[must_use]
    pub fn world(&self) -> &dyn WorldView {
        self.world.as_ref()
    }

    /// Render channel.
    #[must_use]
    pub fn channel(&self) -> &dyn RenderChannel {
        self.channel.as_ref()
    }

    /// Live configuration.
    #[must_use]
    pub const fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Appearance cache.
    #[must_use]
    pub fn appearances(&self) -> &Arc<AppearanceCache> {
        &self.appearances
    }

    /// Event stream.
    #[must_use]
    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Delayed-step runner.
    #[must_use]
    pub const fn sequences(&self) -> &SequenceRunner {
        &self.sequences
    }

    /// Phantom id allocator.
    #[must_use]
    pub const fn ids(&self) -> &PhantomIdAllocator {
        &self.ids
    }

    /// Creature claims shared by the puppeting families.
    #[must_use]
    pub const fn claims(&self) -> &SubjectClaims {
        &self.claims
    }

    /// Runs `f` with exclusive access to the shared rng.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    /// Bernoulli draw with probability `p`.
    pub fn chance(&self, p: f64) -> bool {
        self.with_rng(|rng| rng.random_bool(p.clamp(0.0, 1.0)))
    }

    /// Uniform draw in `[0, 1)`.
    pub fn roll(&self) -> f64 {
        self.with_rng(|rng| rng.random::<f64>())
    }

    /// Picks one element uniformly.
    pub fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        self.with_rng(|rng| items.choose(rng))
    }

    /// Shuffles `items` in place.
    pub fn shuffle<T>(&self, items: &mut [T]) {
        self.with_rng(|rng| items.shuffle(rng));
    }
}

impl std::fmt::Debug for EffectContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectContext")
            .field("world", &self.world)
            .field("channel", &self.channel)
            .field("sequences", &self.sequences.total_pending())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::channel::recording::RecordingChannel;
    use crate::world::memory::InMemoryWorld;

    /// World, channel and a seeded context wired together.
    pub struct Harness {
        pub world: Arc<InMemoryWorld>,
        pub channel: Arc<RecordingChannel>,
        pub cx: Arc<EffectContext>,
    }

    pub fn harness(seed: u64) -> Harness {
        harness_with(seed, ConfigHandle::default())
    }

    pub fn harness_with(seed: u64, config: ConfigHandle) -> Harness {
        let world = Arc::new(InMemoryWorld::flat());
        let channel = Arc::new(RecordingChannel::new());
        let cx = Arc::new(
            EffectContext::new(
                Arc::clone(&world) as Arc<dyn WorldView>,
                Arc::clone(&channel) as Arc<dyn RenderChannel>,
                config,
            )
            .with_seed(seed),
        );
        Harness { world, channel, cx }
    }

    fn context(seed: u64) -> EffectContext {
        EffectContext::new(
            Arc::new(InMemoryWorld::flat()),
            Arc::new(RecordingChannel::new()),
            ConfigHandle::default(),
        )
        .with_seed(seed)
    }

    #[test]
    fn seeded_contexts_draw_identically() {
        let a = context(42);
        let b = context(42);
        let draws_a: Vec<f64> = (0..5).map(|_| a.roll()).collect();
        let draws_b: Vec<f64> = (0..5).map(|_| b.roll()).collect();
        assert_eq!(draws_a, draws_b);
    }

    #[test]
    fn chance_extremes() {
        let cx = context(1);
        assert!(!cx.chance(0.0));
        assert!(cx.chance(1.0));
        assert!(cx.chance(7.0));
    }

    #[test]
    fn pick_from_empty_is_none() {
        let cx = context(3);
        let empty: [u8; 0] = [];
        assert!(cx.pick(&empty).is_none());
        assert_eq!(cx.pick(&[5]), Some(&5));
    }
}
