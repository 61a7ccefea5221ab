//! Per-actor cooldown bookkeeping.
//!
//! Two independent gates: one expiry per (actor, effect key) and a single
//! global expiry per actor that blocks every effect. State is created lazily
//! and removed outright on clear or disconnect, so a departed actor leaves
//! nothing behind.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::clock::{Clock, duration_to_ms};
use crate::world::ActorId;

/// Concurrency-safe cooldown store.
///
/// A cooldown is active while `now < expiry`. Zero durations are ignored.
pub struct CooldownGate {
    clock: Arc<dyn Clock>,
    effects: DashMap<ActorId, HashMap<String, u64>>,
    global: DashMap<ActorId, u64>,
}

impl CooldownGate {
    /// Creates an empty gate reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            effects: DashMap::new(),
            global: DashMap::new(),
        }
    }

    /// Whether `key` is cooling down for `actor`.
    #[must_use]
    pub fn is_on_cooldown(&self, actor: &ActorId, key: &str) -> bool {
        self.remaining(actor, key).is_some()
    }

    /// Whether the global cooldown is active for `actor`.
    #[must_use]
    pub fn is_on_global_cooldown(&self, actor: &ActorId) -> bool {
        self.global_remaining(actor).is_some()
    }

    /// Time left on `key` for `actor`, `None` when not cooling down.
    #[must_use]
    pub fn remaining(&self, actor: &ActorId, key: &str) -> Option<Duration> {
        let now = self.clock.now_ms();
        let key = key.to_ascii_lowercase();
        self.effects
            .get(actor)
            .and_then(|m| m.get(&key).copied())
            .and_then(|expiry| remaining_ms(now, expiry))
    }

    /// Time left on the global cooldown for `actor`.
    #[must_use]
    pub fn global_remaining(&self, actor: &ActorId) -> Option<Duration> {
        let now = self.clock.now_ms();
        self.global
            .get(actor)
            .and_then(|expiry| remaining_ms(now, *expiry))
    }

    /// Starts a cooldown for `key`. A zero duration does nothing.
    pub fn apply_cooldown(&self, actor: &ActorId, key: &str, duration: Duration) {
        let ms = duration_to_ms(duration);
        if ms == 0 {
            return;
        }
        let expiry = self.clock.now_ms().saturating_add(ms);
        self.effects
            .entry(actor.clone())
            .or_default()
            .insert(key.to_ascii_lowercase(), expiry);
        debug!(actor = %actor, effect = key, cooldown_ms = ms, "effect cooldown applied");
    }

    /// Starts the global cooldown. A zero duration does nothing.
    pub fn apply_global_cooldown(&self, actor: &ActorId, duration: Duration) {
        let ms = duration_to_ms(duration);
        if ms == 0 {
            return;
        }
        let expiry = self.clock.now_ms().saturating_add(ms);
        self.global.insert(actor.clone(), expiry);
        debug!(actor = %actor, cooldown_ms = ms, "global cooldown applied");
    }

    /// Clears one effect cooldown, or every cooldown of `actor` when `key` is `None`.
    ///
    /// Clearing something that is not there is a no-op.
    pub fn clear(&self, actor: &ActorId, key: Option<&str>) {
        match key {
            Some(key) => {
                let key = key.to_ascii_lowercase();
                if let Some(mut m) = self.effects.get_mut(actor) {
                    m.remove(&key);
                }
                self.effects.remove_if(actor, |_, m| m.is_empty());
            }
            None => {
                self.effects.remove(actor);
                self.global.remove(actor);
            }
        }
    }

    /// Drops every cooldown for every actor.
    pub fn clear_all(&self) {
        self.effects.clear();
        self.global.clear();
    }

    /// Forgets `actor` entirely.
    pub fn remove_actor(&self, actor: &ActorId) {
        self.effects.remove(actor);
        self.global.remove(actor);
    }

    /// Number of actors with any cooldown state.
    #[must_use]
    pub fn tracked_actors(&self) -> usize {
        let mut ids: Vec<ActorId> = self.effects.iter().map(|e| e.key().clone()).collect();
        ids.extend(self.global.iter().map(|e| e.key().clone()));
        ids.sort();
        ids.dedup();
        ids.len()
    }
}

fn remaining_ms(now: u64, expiry: u64) -> Option<Duration> {
    (now < expiry).then(|| Duration::from_millis(expiry - now))
}

impl std::fmt::Debug for CooldownGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooldownGate")
            .field("effect_actors", &self.effects.len())
            .field("global_actors", &self.global.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;

    fn gate() -> (Arc<ManualClock>, CooldownGate) {
        let clock = Arc::new(ManualClock::new(0));
        let gate = CooldownGate::new(Arc::clone(&clock) as Arc<dyn Clock>);
        (clock, gate)
    }

    #[test]
    fn test_cooldown_expires_exactly_at_expiry() {
        let (clock, gate) = gate();
        let a = ActorId::new("a");
        gate.apply_cooldown(&a, "footstep", Duration::from_secs(30));
        assert!(gate.is_on_cooldown(&a, "footstep"));
        clock.set_ms(29_999);
        assert!(gate.is_on_cooldown(&a, "footstep"));
        clock.set_ms(30_000);
        assert!(!gate.is_on_cooldown(&a, "footstep"));
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let (_clock, gate) = gate();
        let a = ActorId::new("a");
        gate.apply_cooldown(&a, "Footstep", Duration::from_secs(1));
        assert!(gate.is_on_cooldown(&a, "FOOTSTEP"));
    }

    #[test]
    fn test_zero_duration_is_ignored() {
        let (_clock, gate) = gate();
        let a = ActorId::new("a");
        gate.apply_cooldown(&a, "footstep", Duration::ZERO);
        gate.apply_global_cooldown(&a, Duration::ZERO);
        assert!(!gate.is_on_cooldown(&a, "footstep"));
        assert!(!gate.is_on_global_cooldown(&a));
        assert_eq!(gate.tracked_actors(), 0);
    }

    #[test]
    fn test_clear_single_key_removes_empty_actor_entry() {
        let (_clock, gate) = gate();
        let a = ActorId::new("a");
        gate.apply_cooldown(&a, "footstep", Duration::from_secs(5));
        gate.clear(&a, Some("footstep"));
        assert!(!gate.is_on_cooldown(&a, "footstep"));
        assert_eq!(gate.tracked_actors(), 0);
    }

    #[test]
    fn test_clear_without_key_clears_global_too() {
        let (_clock, gate) = gate();
        let a = ActorId::new("a");
        gate.apply_cooldown(&a, "footstep", Duration::from_secs(5));
        gate.apply_global_cooldown(&a, Duration::from_secs(5));
        gate.clear(&a, None);
        assert!(!gate.is_on_cooldown(&a, "footstep"));
        assert!(!gate.is_on_global_cooldown(&a));
    }

    #[test]
    fn test_clear_missing_entry_is_noop() {
        let (_clock, gate) = gate();
        let a = ActorId::new("ghost");
        gate.clear(&a, Some("nothing"));
        gate.clear(&a, None);
        gate.remove_actor(&a);
        assert_eq!(gate.tracked_actors(), 0);
    }

    #[test]
    fn test_remove_actor_and_clear_all() {
        let (_clock, gate) = gate();
        let a = ActorId::new("a");
        let b = ActorId::new("b");
        gate.apply_cooldown(&a, "x", Duration::from_secs(5));
        gate.apply_global_cooldown(&b, Duration::from_secs(5));
        assert_eq!(gate.tracked_actors(), 2);
        gate.remove_actor(&a);
        assert_eq!(gate.tracked_actors(), 1);
        gate.clear_all();
        assert_eq!(gate.tracked_actors(), 0);
    }

    #[test]
    fn test_remaining_reports_time_left() {
        let (clock, gate) = gate();
        let a = ActorId::new("a");
        gate.apply_global_cooldown(&a, Duration::from_secs(5));
        clock.advance(Duration::from_secs(2));
        assert_eq!(gate.global_remaining(&a), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_concurrent_apply_and_remove() {
        let (_clock, gate) = gate();
        let gate = Arc::new(gate);
        let mut handles = Vec::new();
        for i in 0..8 {
            let gate = Arc::clone(&gate);
            handles.push(thread::spawn(move || {
                let a = ActorId::new(format!("a{}", i % 2));
                for _ in 0..200 {
                    gate.apply_cooldown(&a, "k", Duration::from_secs(1));
                    gate.remove_actor(&a);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(gate.tracked_actors(), 0);
    }
}
