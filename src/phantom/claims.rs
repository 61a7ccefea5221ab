//! Exclusive claims on real creatures.
//!
//! A creature puppeted by one family (staring, following) must not be picked
//! up by another until it is released. Claims are shared by every family that
//! borrows real creatures.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::world::{ActorId, CreatureId};

/// Who currently holds a creature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Claiming family.
    pub family: &'static str,
    /// Actor the illusion is shown to.
    pub owner: ActorId,
}

/// Concurrent creature → claim map.
#[derive(Debug, Default)]
pub struct SubjectClaims {
    claims: DashMap<CreatureId, Claim>,
}

impl SubjectClaims {
    /// Creates an empty claim table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `creature` for `family`; `false` when someone else holds it.
    pub fn try_claim(&self, creature: CreatureId, family: &'static str, owner: &ActorId) -> bool {
        match self.claims.entry(creature) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Claim {
                    family,
                    owner: owner.clone(),
                });
                true
            }
        }
    }

    /// Releases `creature` if `family` holds it.
    pub fn release(&self, creature: CreatureId, family: &'static str) -> bool {
        self.claims
            .remove_if(&creature, |_, claim| claim.family == family)
            .is_some()
    }

    /// Whether anyone holds `creature`.
    #[must_use]
    pub fn is_claimed(&self, creature: CreatureId) -> bool {
        self.claims.contains_key(&creature)
    }

    /// Current holder of `creature`.
    #[must_use]
    pub fn holder(&self, creature: CreatureId) -> Option<Claim> {
        self.claims.get(&creature).map(|c| c.clone())
    }

    /// Number of claimed creatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether nothing is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive_across_families() {
        let claims = SubjectClaims::new();
        let steve = ActorId::new("steve");
        assert!(claims.try_claim(CreatureId(1), "animal_stare", &steve));
        assert!(!claims.try_claim(CreatureId(1), "animal_follow", &steve));
        assert_eq!(claims.holder(CreatureId(1)).unwrap().family, "animal_stare");
    }

    #[test]
    fn release_requires_matching_family() {
        let claims = SubjectClaims::new();
        let steve = ActorId::new("steve");
        claims.try_claim(CreatureId(2), "animal_stare", &steve);
        assert!(!claims.release(CreatureId(2), "animal_follow"));
        assert!(claims.is_claimed(CreatureId(2)));
        assert!(claims.release(CreatureId(2), "animal_stare"));
        assert!(claims.is_empty());
        assert!(claims.try_claim(CreatureId(2), "animal_follow", &steve));
    }
}
