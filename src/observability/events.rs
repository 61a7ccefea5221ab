//! Structured event stream for `Phantasm`.
//!
//! Discrete, typed events emitted while the engine runs. Events are
//! serialized as newline-delimited JSON (JSONL) with a monotonically
//! increasing sequence number for ordering.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during engine operation.
///
/// Each variant is tagged with `"type"` when serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The tick driver started.
    EngineStarted {
        /// When the driver started.
        timestamp: DateTime<Utc>,
        /// Number of registered effects.
        effects: usize,
        /// Scheduler period in milliseconds.
        interval_ms: u64,
    },

    /// The engine shut down.
    EngineStopped {
        /// When the engine stopped.
        timestamp: DateTime<Utc>,
        /// Human-readable stop reason.
        reason: String,
    },

    /// An effect ran for an actor.
    EffectTriggered {
        /// When the effect ran.
        timestamp: DateTime<Utc>,
        /// Target actor.
        actor: String,
        /// Effect key.
        effect: String,
        /// Whether cooldowns and preconditions were bypassed.
        forced: bool,
    },

    /// A phantom became active.
    PhantomSpawned {
        /// When the phantom spawned.
        timestamp: DateTime<Utc>,
        /// Owning actor.
        actor: String,
        /// Phantom family.
        family: String,
        /// Synthetic id.
        phantom_id: i32,
    },

    /// A phantom was removed.
    PhantomDespawned {
        /// When cleanup ran.
        timestamp: DateTime<Utc>,
        /// Owning actor.
        actor: String,
        /// Phantom family.
        family: String,
        /// Synthetic id.
        phantom_id: i32,
        /// Why the phantom went away.
        reason: String,
        /// Sub-ticks the phantom lived.
        age_ticks: u64,
    },

    /// A new configuration was installed.
    ConfigReloaded {
        /// When the reload happened.
        timestamp: DateTime<Utc>,
        /// Whether the driver had to be restarted.
        driver_restarted: bool,
        /// Number of normalization warnings.
        warnings: usize,
    },

    /// An actor's state was torn down after disconnect.
    ActorDisconnected {
        /// When the notification was processed.
        timestamp: DateTime<Utc>,
        /// Departed actor.
        actor: String,
        /// Phantoms despawned as a result.
        phantoms_removed: usize,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) increments the sequence counter,
/// serializes the event as one JSON line, and flushes. Serialization or I/O
/// failures are dropped so observability never interferes with a tick.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        let mut w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(line) = serde_json::to_string(&envelope) {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
