mod common;

use std::time::Duration;

use common::{TestHost, quiet_config};
use phantasm::config::{EffectSettings, EngineConfig, Multipliers};
use phantasm::engine::builtin_effects;
use phantasm::scheduler::{EnvironmentContext, LightTier, compute_chance};
use phantasm::world::{GameMode, WorldView};

fn eager_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.scheduler.interval_ticks = 20;
    config.scheduler.base_event_probability = 1.0;
    config.chances.max_calculated_chance = 1.0;
    config
}

#[test]
fn dark_and_alone_matches_documented_example() {
    let host = TestHost::with_config(quiet_config());
    let steve = host.join("steve", 0.5, 0.5);
    host.world.update_actor(&steve, |a| a.light = 3);

    let mut config = EngineConfig::default();
    config.chances.multipliers = Multipliers {
        darkness: 2.0,
        isolated: 1.75,
        ..Multipliers::neutral()
    };
    config.chances.max_calculated_chance = 1.0;

    let snapshot = host.world.actor(&steve).unwrap();
    let env = EnvironmentContext::observe(
        &*host.world,
        &snapshot,
        config.chances.isolation_radius,
    );
    assert_eq!(env.light, LightTier::Dark);
    assert!(env.isolated);
    assert!(!env.night);

    let chance = compute_chance(0.02, &config.chances, &env);
    assert!((chance - 0.07).abs() < 1e-12, "chance {chance}");
}

#[test]
fn company_within_radius_lowers_the_chance() {
    let host = TestHost::with_config(quiet_config());
    let steve = host.join("steve", 0.5, 0.5);
    let config = EngineConfig::default();
    let alone = {
        let snapshot = host.world.actor(&steve).unwrap();
        let env = EnvironmentContext::observe(&*host.world, &snapshot, 64.0);
        compute_chance(0.02, &config.chances, &env)
    };

    host.join("alex", 20.5, 0.5);
    let snapshot = host.world.actor(&steve).unwrap();
    let env = EnvironmentContext::observe(&*host.world, &snapshot, 64.0);
    let together = compute_chance(0.02, &config.chances, &env);
    assert!(together < alone);
    assert!((together - 0.02).abs() < 1e-12);
}

#[test]
fn pass_runs_on_interval_boundaries_only() {
    let host = TestHost::with_config(eager_config());
    host.join("steve", 0.5, 0.5);
    host.join("alex", 400.5, 0.5);

    for _ in 0..19 {
        assert!(host.engine.tick().is_none());
    }
    let summary = host.engine.tick().expect("pass on tick 20");
    assert_eq!(summary.rolled, 2);
    assert_eq!(summary.hits, 2);
    assert_eq!(summary.triggered.len(), 2);
    assert_eq!(host.engine.scheduler_stats().passes, 1);
}

#[test]
fn global_cooldown_spaces_out_scheduled_triggers() {
    let host = TestHost::with_config(eager_config());
    host.join("steve", 0.5, 0.5);

    host.ticks(200);
    let stats = host.engine.scheduler_stats();
    assert_eq!(stats.passes, 10);
    assert_eq!(stats.rolled, 1, "later passes skip the roll");
    assert_eq!(stats.triggered.values().sum::<u64>(), 1);

    host.advance(Duration::from_secs(6));
    host.ticks(20);
    let stats = host.engine.scheduler_stats();
    assert_eq!(stats.rolled, 2);
    assert_eq!(stats.triggered.values().sum::<u64>(), 2);
}

#[test]
fn only_interactive_living_actors_are_rolled() {
    let host = TestHost::with_config(eager_config());
    let steve = host.join("steve", 0.5, 0.5);
    let alex = host.join("alex", 400.5, 0.5);
    let sam = host.join("sam", 800.5, 0.5);
    host.world.update_actor(&steve, |a| a.mode = GameMode::Spectator);
    host.world.update_actor(&alex, |a| a.mode = GameMode::Creative);
    host.world.update_actor(&sam, |a| a.alive = false);

    host.ticks(100);
    let stats = host.engine.scheduler_stats();
    assert_eq!(stats.passes, 5);
    assert_eq!(stats.rolled, 0);
    assert!(host.channel.calls().is_empty());
}

#[test]
fn disabled_effects_are_never_scheduled() {
    let mut config = eager_config();
    for descriptor in builtin_effects() {
        if descriptor.key() != "fake_chat" {
            config.effects.insert(
                descriptor.key().to_string(),
                EffectSettings {
                    enabled: false,
                    ..EffectSettings::default()
                },
            );
        }
    }
    let host = TestHost::with_config(config);
    host.join("steve", 0.5, 0.5);

    for _ in 0..5 {
        host.ticks(20);
        host.advance(Duration::from_secs(60));
    }
    let stats = host.engine.scheduler_stats();
    assert_eq!(stats.triggered.len(), 1);
    assert_eq!(stats.triggered.get("fake_chat"), Some(&5));
}

#[test]
fn quiet_configuration_never_triggers() {
    let host = TestHost::with_config(quiet_config());
    host.join("steve", 0.5, 0.5);
    host.ticks(2_000);
    let stats = host.engine.scheduler_stats();
    assert_eq!(stats.passes, 20);
    assert_eq!(stats.rolled, 20);
    assert_eq!(stats.hits, 0);
    assert!(host.channel.calls().is_empty());
}
