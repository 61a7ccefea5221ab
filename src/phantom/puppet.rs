//! Borrowing real creatures for the puppeting families.
//!
//! A puppeted creature is claimed in [`SubjectClaims`](super::SubjectClaims)
//! and has its autonomy switched off so its real position stays put while
//! the owner is shown something else. [`release`] undoes both, once.

use tracing::debug;

use crate::context::EffectContext;
use crate::geometry::Vec3;
use crate::world::{ActorId, ActorSnapshot, CreatureId, CreatureSnapshot};

/// Height on the owner that puppeted creatures look at.
pub const OWNER_FOCUS_HEIGHT: f64 = 1.44;

/// A creature borrowed for the lifetime of one phantom.
#[derive(Debug, Clone, PartialEq)]
pub struct Puppet {
    /// Borrowed creature.
    pub creature: CreatureId,
    /// Autonomy flag before the creature was borrowed.
    pub was_autonomous: bool,
    /// Position the owner currently sees.
    pub view_position: Vec3,
    /// Sub-tick age at which this puppet is let go.
    pub release_at: u64,
    released: bool,
}

impl Puppet {
    /// Whether [`release`] already ran for this puppet.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }
}

/// Passive, unclaimed creatures within `radius` of the owner.
#[must_use]
pub fn candidates(cx: &EffectContext, owner: &ActorSnapshot, radius: f64) -> Vec<CreatureSnapshot> {
    cx.world()
        .nearby_creatures(&owner.world, owner.position, radius)
        .into_iter()
        .filter(|c| c.passive && !cx.claims().is_claimed(c.id))
        .collect()
}

/// Claims up to `count` of `candidates` for `family` and switches their
/// autonomy off. `release_at` gives each puppet its own release age.
pub fn acquire(
    cx: &EffectContext,
    family: &'static str,
    owner: &ActorId,
    mut candidates: Vec<CreatureSnapshot>,
    count: usize,
    mut release_at: impl FnMut() -> u64,
) -> Vec<Puppet> {
    cx.shuffle(&mut candidates);
    let mut puppets = Vec::with_capacity(count);
    for creature in candidates {
        if puppets.len() == count {
            break;
        }
        if !cx.claims().try_claim(creature.id, family, owner) {
            continue;
        }
        if !cx.world().set_creature_autonomy(creature.id, false) {
            cx.claims().release(creature.id, family);
            continue;
        }
        puppets.push(Puppet {
            creature: creature.id,
            was_autonomous: creature.autonomous,
            view_position: creature.position,
            release_at: release_at(),
            released: false,
        });
    }
    puppets
}

/// Restores the creature's autonomy and drops the claim. Idempotent.
pub fn release(cx: &EffectContext, family: &'static str, puppet: &mut Puppet) {
    if puppet.released {
        return;
    }
    puppet.released = true;
    if !cx.world().set_creature_autonomy(puppet.creature, puppet.was_autonomous) {
        debug!(family, creature = %puppet.creature, "creature gone before restore");
    }
    cx.claims().release(puppet.creature, family);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::harness;
    use crate::world::{WorldId, WorldView};

    #[test]
    fn acquire_claims_and_freezes() {
        let h = harness(1);
        let steve = ActorId::new("steve");
        h.world
            .place_actor("steve", &WorldId::overworld(), Vec3::new(0.0, 64.0, 0.0));
        let cow = h
            .world
            .add_creature("cow", &WorldId::overworld(), Vec3::new(5.0, 64.0, 0.0), true);
        h.world
            .add_creature("zombie", &WorldId::overworld(), Vec3::new(6.0, 64.0, 0.0), false);

        let snapshot = h.world.actor(&steve).unwrap();
        let found = candidates(&h.cx, &snapshot, 32.0);
        assert_eq!(found.len(), 1);

        let mut puppets = acquire(&h.cx, "animal_stare", &steve, found, 3, || 50);
        assert_eq!(puppets.len(), 1);
        assert!(h.cx.claims().is_claimed(cow));
        assert!(!h.world.creature(cow).unwrap().autonomous);
        assert!(candidates(&h.cx, &snapshot, 32.0).is_empty());

        release(&h.cx, "animal_stare", &mut puppets[0]);
        release(&h.cx, "animal_stare", &mut puppets[0]);
        assert!(h.world.creature(cow).unwrap().autonomous);
        assert!(!h.cx.claims().is_claimed(cow));
    }

    #[test]
    fn claimed_elsewhere_is_skipped() {
        let h = harness(2);
        let steve = ActorId::new("steve");
        h.world
            .place_actor("steve", &WorldId::overworld(), Vec3::new(0.0, 64.0, 0.0));
        let pig = h
            .world
            .add_creature("pig", &WorldId::overworld(), Vec3::new(3.0, 64.0, 0.0), true);
        let snapshot = h.world.actor(&steve).unwrap();
        let found = candidates(&h.cx, &snapshot, 32.0);

        assert!(h.cx.claims().try_claim(pig, "animal_follow", &steve));
        let puppets = acquire(&h.cx, "animal_stare", &steve, found, 2, || 10);
        assert!(puppets.is_empty());
        assert!(h.world.creature(pig).unwrap().autonomous);
    }
}
