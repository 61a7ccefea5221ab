mod common;

use std::collections::HashMap;
use std::time::Duration;

use common::{TestHost, quiet_config};
use phantasm::TriggerOutcome;
use phantasm::geometry::Vec3;
use phantasm::world::{CreatureId, WorldId, WorldView};

fn cows_near(host: &TestHost, x: f64, z: f64) -> Vec<CreatureId> {
    host.world
        .nearby_creatures(&WorldId::overworld(), Vec3::new(x, 64.0, z), 64.0)
        .into_iter()
        .map(|c| c.id)
        .collect()
}

fn all_autonomous(host: &TestHost, cows: &[CreatureId]) -> bool {
    cows.iter()
        .all(|c| host.world.creature(*c).is_some_and(|c| c.autonomous))
}

fn active(host: &TestHost, family: &str) -> usize {
    host.engine
        .active_phantoms()
        .get(family)
        .copied()
        .unwrap_or_default()
}

#[test]
fn stare_runs_to_completion_on_host_ticks() {
    let host = TestHost::with_config(quiet_config());
    let steve = host.join("steve", 0.5, 0.5);
    host.herd(0.5, 0.5, 6);
    let cows = cows_near(&host, 0.5, 0.5);

    assert!(host.engine.trigger(&steve, "animal_stare", false).is_triggered());
    assert_eq!(active(&host, "animal_stare"), 1);
    let claimed = host.engine.context().claims().len();
    assert!((1..=3).contains(&claimed));
    assert!(!all_autonomous(&host, &cows));

    host.ticks(100);
    assert_eq!(active(&host, "animal_stare"), 0);
    assert!(host.engine.context().claims().is_empty());
    assert!(all_autonomous(&host, &cows));
}

#[test]
fn second_phantom_of_a_family_is_rejected_silently() {
    let host = TestHost::with_config(quiet_config());
    let steve = host.join("steve", 0.5, 0.5);
    host.herd(0.5, 0.5, 6);

    assert!(host.engine.trigger(&steve, "animal_stare", false).is_triggered());
    let claimed = host.engine.context().claims().len();
    host.advance(Duration::from_secs(60));
    host.channel.clear();

    assert_eq!(
        host.engine.trigger(&steve, "animal_stare", false),
        TriggerOutcome::PreconditionFailed
    );
    assert!(matches!(
        host.engine.trigger(&steve, "animal_stare", true),
        TriggerOutcome::ExecutionFailed { .. }
    ));
    assert!(host.channel.calls().is_empty());
    assert_eq!(host.engine.context().claims().len(), claimed);
    assert_eq!(active(&host, "animal_stare"), 1);
}

#[test]
fn families_never_share_a_creature() {
    let host = TestHost::with_config(quiet_config());
    let steve = host.join("steve", 0.5, 0.5);
    host.herd(0.5, 0.5, 1);
    let cow = cows_near(&host, 0.5, 0.5)[0];

    assert!(host.engine.trigger(&steve, "animal_stare", false).is_triggered());
    host.advance(Duration::from_secs(6));

    assert_eq!(
        host.engine.trigger(&steve, "animal_follow", false),
        TriggerOutcome::PreconditionFailed
    );
    // Forced, it finds no subject and quietly does nothing.
    assert!(host.engine.trigger(&steve, "animal_follow", true).is_triggered());
    assert_eq!(active(&host, "animal_follow"), 0);
    let holder = host.engine.context().claims().holder(cow).unwrap();
    assert_eq!(holder.family, "animal_stare");
}

#[test]
fn lurker_expires_at_its_lifespan() {
    let host = TestHost::with_config(quiet_config());
    let steve = host.join("steve", 0.5, 0.5);

    assert!(host.engine.trigger(&steve, "null_spawn", true).is_triggered());
    assert_eq!(host.channel.count("spawn_phantom"), 1);

    host.ticks(399);
    assert_eq!(active(&host, "null_spawn"), 1);
    assert_eq!(host.channel.count("remove_phantom"), 0);

    host.ticks(1);
    assert_eq!(active(&host, "null_spawn"), 0);
    assert_eq!(host.channel.count("remove_phantom"), 1);
}

#[test]
fn disconnect_tears_down_without_signalling_owner() {
    let host = TestHost::with_config(quiet_config());
    let steve = host.join("steve", 0.5, 0.5);
    host.herd(0.5, 0.5, 4);
    let cows = cows_near(&host, 0.5, 0.5);

    assert!(host.engine.trigger(&steve, "animal_stare", false).is_triggered());
    assert!(host.engine.trigger(&steve, "fake_join_leave", true).is_triggered());
    assert!(host.engine.context().sequences().pending_for(&steve) > 0);

    host.world.remove_actor(&steve);
    host.channel.clear();
    assert_eq!(host.engine.on_actor_disconnected(&steve), 1);

    assert_eq!(host.engine.context().sequences().pending_for(&steve), 0);
    assert!(!host.engine.dispatcher().cooldowns().is_on_cooldown(&steve, "animal_stare"));
    assert!(!host.engine.dispatcher().cooldowns().is_on_global_cooldown(&steve));
    assert!(host.engine.context().claims().is_empty());
    assert!(all_autonomous(&host, &cows));

    assert_eq!(host.engine.on_actor_disconnected(&steve), 0);
    host.ticks(400);
    assert!(host.channel.calls().iter().all(|c| c.viewer() != &steve));
}

#[test]
fn disconnect_leaves_other_owners_alone() {
    let host = TestHost::with_config(quiet_config());
    let steve = host.join("steve", 0.5, 0.5);
    let alex = host.join("alex", 500.5, 0.5);

    assert!(host.engine.trigger(&steve, "null_spawn", true).is_triggered());
    assert!(host.engine.trigger(&alex, "null_spawn", true).is_triggered());
    assert_eq!(active(&host, "null_spawn"), 2);

    host.world.remove_actor(&steve);
    assert_eq!(host.engine.on_actor_disconnected(&steve), 1);
    assert_eq!(active(&host, "null_spawn"), 1);
}

#[test]
fn disconnect_interleaves_safely_with_ticking() {
    let host = TestHost::with_config(quiet_config());
    let mut owners = Vec::new();
    let mut cows = Vec::new();
    for i in 0..4_u32 {
        let x = f64::from(i) * 500.0 + 0.5;
        let owner = host.join(&format!("p{i}"), x, 0.5);
        host.world.update_actor(&owner, |a| a.world_time = 18_000);
        host.herd(x, 0.5, 3);
        cows.extend(cows_near(&host, x, 0.5));
        owners.push(owner);
    }

    for owner in &owners {
        for key in ["animal_stare", "stalker", "null_spawn"] {
            assert!(host.engine.trigger(owner, key, true).is_triggered(), "{key}");
        }
    }
    let before: usize = host.engine.active_phantoms().values().sum();
    assert!(before >= owners.len() * 2, "active {before}");
    let figures = host.channel.count("spawn_phantom");

    let released = std::thread::scope(|s| {
        let ticking = s.spawn(|| host.ticks(30));
        let released: usize = owners
            .iter()
            .map(|o| host.engine.on_actor_disconnected(o))
            .sum();
        ticking.join().unwrap();
        released
    });

    assert_eq!(released, before);
    assert_eq!(host.engine.active_phantoms().values().sum::<usize>(), 0);
    assert!(host.engine.context().claims().is_empty());
    assert!(all_autonomous(&host, &cows));
    assert_eq!(host.channel.count("remove_phantom"), figures);

    // Nothing refers to a figure once it has been removed.
    let mut removed_at = HashMap::new();
    for (i, call) in host.channel.calls().iter().enumerate() {
        let Some(id) = call.phantom() else { continue };
        if let Some(at) = removed_at.get(&id) {
            panic!("call {i} ({}) after removal at {at}", call.op());
        }
        if call.op() == "remove_phantom" {
            removed_at.insert(id, i);
        }
    }
}
