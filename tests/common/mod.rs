//! Shared integration-test harness: an engine over an in-memory world and a
//! recording channel, plus helpers for running the `phantasm` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Arc;
use std::time::Duration;

use phantasm::channel::RenderChannel;
use phantasm::channel::recording::RecordingChannel;
use phantasm::clock::{Clock, ManualClock};
use phantasm::config::EngineConfig;
use phantasm::engine::{EngineBuilder, IllusionEngine};
use phantasm::geometry::Vec3;
use phantasm::world::memory::InMemoryWorld;
use phantasm::world::{ActorId, WorldId, WorldView};

/// An engine wired to inspectable collaborators.
pub struct TestHost {
    pub world: Arc<InMemoryWorld>,
    pub channel: Arc<RecordingChannel>,
    pub clock: Arc<ManualClock>,
    pub engine: Arc<IllusionEngine>,
}

impl TestHost {
    /// Host with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Host with `config` and a fixed seed.
    pub fn with_config(config: EngineConfig) -> Self {
        let world = Arc::new(InMemoryWorld::flat());
        let channel = Arc::new(RecordingChannel::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let engine = EngineBuilder::new(
            Arc::clone(&world) as Arc<dyn WorldView>,
            Arc::clone(&channel) as Arc<dyn RenderChannel>,
        )
        .config(Arc::new(config))
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .seed(1234)
        .build();
        Self {
            world,
            channel,
            clock,
            engine: Arc::new(engine),
        }
    }

    /// Places a participant on the surface at `(x, z)`, looking +z.
    pub fn join(&self, name: &str, x: f64, z: f64) -> ActorId {
        self.world
            .place_actor(name, &WorldId::overworld(), Vec3::new(x, 64.0, z));
        ActorId::new(name)
    }

    /// Adds passive animals off to the side of `(x, z)`, outside the +z gaze.
    pub fn herd(&self, x: f64, z: f64, count: usize) {
        for i in 0..count {
            #[allow(clippy::cast_precision_loss)]
            let dx = 10.0 + i as f64 * 2.0;
            self.world
                .add_creature("cow", &WorldId::overworld(), Vec3::new(x + dx, 64.0, z), true);
        }
    }

    /// Runs `n` host ticks.
    pub fn ticks(&self, n: u64) {
        for _ in 0..n {
            self.engine.tick();
        }
    }

    /// Moves the cooldown clock forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

/// Configuration under which the scheduler never fires on its own.
pub fn quiet_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.scheduler.base_event_probability = 0.0;
    config
}

/// Path to a test fixture.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Runs the `phantasm` binary with `args` and waits for it.
pub fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_phantasm"))
        .args(args)
        .env_remove("PHANTASM_CONFIG")
        .env_remove("PHANTASM_LOG_LEVEL")
        .output()
        .expect("failed to run phantasm")
}
