//! `simulate` command
//!
//! Runs the engine against an in-memory world with a handful of scripted
//! participants and prints what happened. Useful for tuning chances and
//! cooldowns without a host attached.

use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_4;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::appearance::{AppearanceCache, AppearanceSource, FixedAppearanceSource, PHANTOM_DISPLAY_NAME};
use crate::channel::RenderChannel;
use crate::channel::recording::RecordingChannel;
use crate::cli::args::{OutputFormat, SimulateArgs};
use crate::clock::{Clock, ManualClock};
use crate::config::{ConfigLoader, EngineConfig, LoaderOptions};
use crate::engine::{EngineBuilder, IllusionEngine, builtin_effects};
use crate::error::PhantasmError;
use crate::geometry::{BlockPos, Vec3};
use crate::observability::{EventEmitter, init_metrics};
use crate::world::memory::InMemoryWorld;
use crate::world::{ActorId, WorldId, WorldView};

const SPACING: i32 = 300;
const LIGHT_LEVELS: [u8; 4] = [15, 6, 3, 11];
const DAY_LENGTH: u64 = 24_000;
const TURN_EVERY_TICKS: u64 = 40;
const SIMULATED_TEXTURES: &str = "simulated-texture-payload";

/// What a simulation run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Participants simulated.
    pub actors: u16,
    /// Host ticks processed.
    pub ticks: u64,
    /// Scheduler passes run.
    pub passes: u64,
    /// Chance rolls made.
    pub rolls: u64,
    /// Rolls that hit.
    pub hits: u64,
    /// Scheduled triggers per effect key.
    pub triggered: BTreeMap<String, u64>,
    /// Render calls issued.
    pub render_calls: usize,
    /// Phantoms still alive when the run ended.
    pub phantoms_released: usize,
    /// Events written to the event stream.
    pub events: u64,
}

/// Run a simulation and print the report.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the event file
/// cannot be created, metrics cannot be installed, or the driver fails.
pub async fn run(args: &SimulateArgs) -> Result<(), PhantasmError> {
    let config = load_config(args.config.as_deref())?;
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
    }
    let events = Arc::new(match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    });

    let world = Arc::new(InMemoryWorld::flat());
    populate(&world, args.actors);
    let channel = Arc::new(RecordingChannel::new());
    let source: Arc<dyn AppearanceSource> = Arc::new(FixedAppearanceSource::new([(
        PHANTOM_DISPLAY_NAME.to_string(),
        SIMULATED_TEXTURES.to_string(),
    )]));

    // Without the real-time driver, simulated time is what cooldowns see.
    let clock = Arc::new(ManualClock::new(0));
    let mut builder = EngineBuilder::new(
        Arc::clone(&world) as Arc<dyn WorldView>,
        Arc::clone(&channel) as Arc<dyn RenderChannel>,
    )
    .config(config)
    .appearances(Arc::new(AppearanceCache::new(Some(source), PHANTOM_DISPLAY_NAME)))
    .events(Arc::clone(&events));
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    if !args.realtime {
        builder = builder.clock(Arc::clone(&clock) as Arc<dyn Clock>);
    }
    let engine = Arc::new(builder.build());

    info!(actors = args.actors, ticks = args.ticks, realtime = args.realtime, "simulation starting");
    if args.realtime {
        drive_realtime(&engine, &world, args.ticks).await?;
    } else {
        engine.context().appearances().prefetch();
        drive_fast(&engine, &world, &clock, args.ticks);
    }
    let released = engine.shutdown("simulation finished").await?;

    let stats = engine.scheduler_stats();
    let report = SimulationReport {
        actors: args.actors,
        ticks: engine.tick_count(),
        passes: stats.passes,
        rolls: stats.rolled,
        hits: stats.hits,
        triggered: stats.triggered,
        render_calls: channel.calls().len(),
        phantoms_released: released,
        events: events.event_count(),
    };

    match args.format {
        OutputFormat::Human => print!("{}", render_report(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Arc<EngineConfig>, PhantasmError> {
    let Some(path) = path else {
        return Ok(Arc::new(EngineConfig::default()));
    };
    let loader = ConfigLoader::new(LoaderOptions {
        known_effects: Some(
            builtin_effects()
                .iter()
                .map(|d| d.key().to_string())
                .collect(),
        ),
        ..LoaderOptions::default()
    });
    let loaded = loader.load(path)?;
    for warning in &loaded.warnings {
        warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(loaded.config)
}

// ============================================================================
// Scripted world
// ============================================================================

/// Places `count` participants far apart, each with animals, a few items and
/// a pane of glass nearby. Light and time of day vary per participant.
pub fn populate(world: &InMemoryWorld, count: u16) {
    let overworld = WorldId::overworld();
    for i in 0..count {
        let name = format!("actor-{i}");
        let base_x = i32::from(i) * SPACING;
        let x = f64::from(base_x) + 0.5;
        world.place_actor(&name, &overworld, Vec3::new(x, 64.0, 0.5));

        let id = ActorId::new(name);
        world.update_actor(&id, |a| {
            a.light = LIGHT_LEVELS[usize::from(i) % LIGHT_LEVELS.len()];
            a.world_time = (6_000 + u64::from(i) * 5_000) % DAY_LENGTH;
        });
        for (dx, dz) in [(8.0, 6.0), (-7.0, 9.0), (5.0, -10.0)] {
            world.add_creature("cow", &overworld, Vec3::new(x + dx, 64.0, 0.5 + dz), true);
        }
        for (slot, item) in [(9, "bread"), (10, "torch"), (20, "cobblestone"), (36, "compass")] {
            world.set_inventory_slot(&id, slot, Some(item));
        }
        world.set_block(&overworld, BlockPos::new(base_x + 4, 64, 5), "glass");
    }
}

/// Advances the scripted world by one tick: time passes and participants
/// turn a little every so often.
pub fn animate(world: &InMemoryWorld, tick: u64) {
    let turn = tick % TURN_EVERY_TICKS == 0;
    for id in world.connected_actors() {
        world.update_actor(&id, |a| {
            a.world_time = (a.world_time + 1) % DAY_LENGTH;
            if turn {
                let yaw = a.look.x.atan2(a.look.z) + FRAC_PI_4;
                a.look = Vec3::new(yaw.sin(), 0.0, yaw.cos());
            }
        });
    }
}

fn drive_fast(engine: &IllusionEngine, world: &InMemoryWorld, clock: &ManualClock, ticks: u64) {
    for tick in 1..=ticks {
        animate(world, tick);
        clock.advance(engine.context().config().current().scheduler.tick_duration);
        engine.tick();
    }
}

async fn drive_realtime(
    engine: &Arc<IllusionEngine>,
    world: &InMemoryWorld,
    ticks: u64,
) -> Result<(), PhantasmError> {
    engine.start()?;
    let period = engine.context().config().current().scheduler.tick_duration;
    let mut interval = tokio::time::interval(period);
    let mut seen = 0;
    while seen < ticks {
        interval.tick().await;
        let now = engine.tick_count();
        for tick in seen + 1..=now {
            animate(world, tick);
        }
        seen = now;
    }
    Ok(())
}

fn render_report(report: &SimulationReport) -> String {
    let mut out = format!(
        "simulated {} ticks for {} actors\n  scheduler passes: {}, rolls: {}, hits: {}\n",
        report.ticks, report.actors, report.passes, report.rolls, report.hits
    );
    if report.triggered.is_empty() {
        out.push_str("  no effects triggered\n");
    } else {
        out.push_str("  effects triggered:\n");
        let width = report.triggered.keys().map(String::len).max().unwrap_or(0);
        for (key, count) in &report.triggered {
            out.push_str(&format!("    {key:<width$}  {count}\n"));
        }
    }
    out.push_str(&format!(
        "  render calls: {}\n  phantoms released at shutdown: {}\n  events: {}\n",
        report.render_calls, report.phantoms_released, report.events
    ));
    out
}
