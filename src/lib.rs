//! `Phantasm` - illusion scheduling and lifecycle engine
//!
//! Decides when a participant experiences a transient, purely client-side
//! illusion, which one, how long it lasts, and guarantees nothing lingers
//! once its owner is gone. Rendering is delegated to a
//! [`RenderChannel`](channel::RenderChannel) and world facts come from a
//! [`WorldView`](world::WorldView).

pub mod appearance;
pub mod channel;
pub mod cli;
pub mod clock;
pub mod config;
pub mod context;
pub mod cooldown;
pub mod dispatch;
pub mod effect;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod observability;
pub mod phantom;
pub mod scheduler;
pub mod sequence;
pub mod world;

pub use dispatch::TriggerOutcome;
pub use engine::{EngineBuilder, IllusionEngine};
pub use error::{PhantasmError, Result};
