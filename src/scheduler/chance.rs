//! Per-actor trigger probability.
//!
//! The chance for a pass is the configured base probability multiplied by
//! every environmental factor that currently holds for the actor, then
//! clamped to `[0, max-calculated-chance]`.

use serde::Serialize;

use crate::config::ChanceConfig;
use crate::world::{ActorSnapshot, Realm, WorldView, is_isolated};

/// Surface reference used outside the overworld.
pub const DEFAULT_SEA_LEVEL: i32 = 63;

const DARK_LIGHT: u8 = 5;
const DIM_LIGHT: u8 = 8;
const DEEP_DEPTH: i32 = 10;
const SHALLOW_DEPTH: i32 = 5;
const NIGHT_START: u64 = 13_000;
const NIGHT_END: u64 = 23_000;

/// Light tier of the actor's position. Tiers are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LightTier {
    /// Light below 5.
    Dark,
    /// Light below 8.
    Dim,
    /// Anything brighter.
    Lit,
}

/// Depth tier relative to the surface reference. Tiers are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthTier {
    /// More than 10 below.
    Deep,
    /// More than 5 below.
    Shallow,
    /// At or near the surface.
    Surface,
}

/// Environmental facts that shape the chance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnvironmentContext {
    /// Light tier.
    pub light: LightTier,
    /// Depth tier.
    pub depth: DepthTier,
    /// Nobody else nearby.
    pub isolated: bool,
    /// World time strictly inside the night window.
    pub night: bool,
    /// Realm the actor is in.
    pub realm: Realm,
}

impl EnvironmentContext {
    /// Reads the environment around `actor`.
    #[must_use]
    pub fn observe(world: &dyn WorldView, actor: &ActorSnapshot, isolation_radius: f64) -> Self {
        let light = if actor.light < DARK_LIGHT {
            LightTier::Dark
        } else if actor.light < DIM_LIGHT {
            LightTier::Dim
        } else {
            LightTier::Lit
        };

        let sea = match actor.realm {
            Realm::Overworld => world.sea_level(&actor.world),
            Realm::Nether | Realm::End => DEFAULT_SEA_LEVEL,
        };
        let y = actor.position.y;
        let depth = if y < f64::from(sea - DEEP_DEPTH) {
            DepthTier::Deep
        } else if y < f64::from(sea - SHALLOW_DEPTH) {
            DepthTier::Shallow
        } else {
            DepthTier::Surface
        };

        Self {
            light,
            depth,
            isolated: is_isolated(world, actor, isolation_radius),
            night: actor.world_time > NIGHT_START && actor.world_time < NIGHT_END,
            realm: actor.realm,
        }
    }
}

/// Chance of a trigger this pass for an actor in `env`.
#[must_use]
pub fn compute_chance(base: f64, chances: &ChanceConfig, env: &EnvironmentContext) -> f64 {
    let m = &chances.multipliers;
    let mut chance = base;

    chance *= match env.light {
        LightTier::Dark => m.darkness,
        LightTier::Dim => m.dimness,
        LightTier::Lit => 1.0,
    };
    chance *= match env.depth {
        DepthTier::Deep => m.underground_deep,
        DepthTier::Shallow => m.underground_shallow,
        DepthTier::Surface => 1.0,
    };
    if env.isolated {
        chance *= m.isolated;
    }
    if env.night {
        chance *= m.night;
    }
    chance *= match env.realm {
        Realm::Nether => m.nether,
        Realm::End => m.the_end,
        Realm::Overworld => 1.0,
    };

    if chance.is_nan() {
        return 0.0;
    }
    chance.clamp(0.0, chances.max_calculated_chance.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Multipliers;
    use crate::geometry::Vec3;
    use crate::world::WorldId;
    use crate::world::memory::InMemoryWorld;
    use proptest::prelude::*;

    const EPS: f64 = 1e-12;

    fn quiet() -> EnvironmentContext {
        EnvironmentContext {
            light: LightTier::Lit,
            depth: DepthTier::Surface,
            isolated: false,
            night: false,
            realm: Realm::Overworld,
        }
    }

    #[test]
    fn neutral_environment_keeps_base() {
        let chances = ChanceConfig::default();
        assert!((compute_chance(0.02, &chances, &quiet()) - 0.02).abs() < EPS);
    }

    #[test]
    fn dark_isolated_night_multiplies() {
        let chances = ChanceConfig::default();
        let env = EnvironmentContext {
            light: LightTier::Dark,
            isolated: true,
            night: true,
            ..quiet()
        };
        let expected = 0.02 * 2.0 * 1.75 * 1.6;
        assert!((compute_chance(0.02, &chances, &env) - expected).abs() < EPS);
    }

    #[test]
    fn chance_is_capped() {
        let chances = ChanceConfig::default();
        let env = EnvironmentContext {
            light: LightTier::Dark,
            depth: DepthTier::Deep,
            isolated: true,
            night: true,
            realm: Realm::Nether,
        };
        assert!((compute_chance(0.3, &chances, &env) - 0.35).abs() < EPS);
    }

    #[test]
    fn observe_reads_tiers() {
        let world = InMemoryWorld::flat();
        world.place_actor("a", &WorldId::overworld(), Vec3::new(0.0, 64.0, 0.0));
        let id = crate::world::ActorId::new("a");

        world.update_actor(&id, |a| {
            a.light = 6;
            a.position.y = 55.0;
            a.world_time = 18_000;
        });
        let env = EnvironmentContext::observe(&world, &world.actor(&id).unwrap(), 64.0);
        assert_eq!(env.light, LightTier::Dim);
        assert_eq!(env.depth, DepthTier::Shallow);
        assert!(env.night);
        assert!(env.isolated);

        world.update_actor(&id, |a| {
            a.light = 2;
            a.position.y = 40.0;
            a.world_time = 23_000;
        });
        let env = EnvironmentContext::observe(&world, &world.actor(&id).unwrap(), 64.0);
        assert_eq!(env.light, LightTier::Dark);
        assert_eq!(env.depth, DepthTier::Deep);
        assert!(!env.night);
    }

    #[test]
    fn company_breaks_isolation() {
        let world = InMemoryWorld::flat();
        world.place_actor("a", &WorldId::overworld(), Vec3::new(0.0, 64.0, 0.0));
        world.place_actor("b", &WorldId::overworld(), Vec3::new(30.0, 64.0, 0.0));
        let a = world.actor(&crate::world::ActorId::new("a")).unwrap();
        assert!(!EnvironmentContext::observe(&world, &a, 64.0).isolated);
        assert!(EnvironmentContext::observe(&world, &a, 16.0).isolated);
    }

    fn any_env() -> impl Strategy<Value = EnvironmentContext> {
        (
            prop_oneof![Just(LightTier::Dark), Just(LightTier::Dim), Just(LightTier::Lit)],
            prop_oneof![Just(DepthTier::Deep), Just(DepthTier::Shallow), Just(DepthTier::Surface)],
            any::<bool>(),
            any::<bool>(),
            prop_oneof![Just(Realm::Overworld), Just(Realm::Nether), Just(Realm::End)],
        )
            .prop_map(|(light, depth, isolated, night, realm)| EnvironmentContext {
                light,
                depth,
                isolated,
                night,
                realm,
            })
    }

    proptest! {
        #[test]
        fn chance_stays_within_bounds(
            base in 0.0f64..=1.0,
            cap in 0.0f64..=1.0,
            factor in 0.0f64..10.0,
            env in any_env(),
        ) {
            let chances = ChanceConfig {
                multipliers: Multipliers {
                    darkness: factor,
                    dimness: factor,
                    underground_deep: factor,
                    underground_shallow: factor,
                    isolated: factor,
                    night: factor,
                    nether: factor,
                    the_end: factor,
                },
                max_calculated_chance: cap,
                ..ChanceConfig::default()
            };
            let chance = compute_chance(base, &chances, &env);
            prop_assert!((0.0..=cap).contains(&chance));
        }

        #[test]
        fn neutral_multipliers_only_cap(base in 0.0f64..=1.0, env in any_env()) {
            let chances = ChanceConfig {
                multipliers: Multipliers::neutral(),
                ..ChanceConfig::default()
            };
            let chance = compute_chance(base, &chances, &env);
            prop_assert!((chance - base.min(0.35)).abs() < EPS);
        }
    }
}
