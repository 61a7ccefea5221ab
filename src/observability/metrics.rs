//! Metrics collection for `Phantasm`.
//!
//! Prometheus-compatible metrics with label cardinality protection and typed
//! convenience functions. Every function is a silent no-op until
//! [`init_metrics`] installs a recorder.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::PhantasmError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Effect keys that may appear as label values.
///
/// Anything else (admin typos, host-registered extras) is bucketed as
/// `"__unknown__"` so label cardinality stays bounded.
const KNOWN_EFFECTS: [&str; 20] = [
    "action_bar",
    "animal_follow",
    "animal_stare",
    "block_flicker",
    "block_vanish",
    "fake_chat",
    "fake_damage",
    "fake_join_leave",
    "fake_window_break",
    "footstep",
    "ghost_block",
    "inventory_shift",
    "item_durability",
    "misplaced_sound",
    "null_spawn",
    "peripheral_particle",
    "persistent_particle",
    "stalker",
    "visual_interact",
    "visual_structure",
];

/// Sanitizes an effect key for use as a metrics label.
#[must_use]
pub fn sanitize_effect_label(key: &str) -> &str {
    if KNOWN_EFFECTS.contains(&key) {
        key
    } else {
        "__unknown__"
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `PhantasmError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), PhantasmError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| PhantasmError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "phantasm_triggers_total",
        "Trigger attempts by effect and outcome"
    );
    describe_counter!(
        "phantasm_scheduler_rolls_total",
        "Scheduler chance rolls by result"
    );
    describe_histogram!(
        "phantasm_computed_chance",
        "Per-actor trigger chance after multipliers and cap"
    );
    describe_counter!(
        "phantasm_phantom_spawns_total",
        "Phantoms spawned by family"
    );
    describe_counter!(
        "phantasm_phantom_despawns_total",
        "Phantoms despawned by family and reason"
    );
    describe_gauge!(
        "phantasm_phantoms_active",
        "Currently active phantoms by family"
    );
    describe_counter!(
        "phantasm_channel_errors_total",
        "Render calls that failed, by operation"
    );
    describe_counter!(
        "phantasm_disconnects_total",
        "Disconnect notifications processed"
    );
    describe_counter!(
        "phantasm_sequences_dropped_total",
        "Pending sequences discarded because their owner left, by path"
    );
}

/// Records the outcome of one dispatch.
pub fn record_trigger(effect: &str, outcome: &'static str) {
    counter!(
        "phantasm_triggers_total",
        "effect" => sanitize_effect_label(effect).to_owned(),
        "outcome" => outcome,
    )
    .increment(1);
}

/// Records one scheduler roll and the chance it was rolled against.
pub fn record_roll(chance: f64, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("phantasm_scheduler_rolls_total", "result" => result).increment(1);
    histogram!("phantasm_computed_chance").record(chance);
}

/// Records a phantom spawn.
pub fn record_spawn(family: &'static str) {
    counter!("phantasm_phantom_spawns_total", "family" => family).increment(1);
}

/// Records a phantom despawn.
pub fn record_despawn(family: &'static str, reason: &'static str) {
    counter!(
        "phantasm_phantom_despawns_total",
        "family" => family,
        "reason" => reason,
    )
    .increment(1);
}

/// Sets the number of active phantoms of a family.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_phantoms(family: &'static str, count: usize) {
    gauge!("phantasm_phantoms_active", "family" => family).set(count as f64);
}

/// Records a failed render call.
pub fn record_channel_error(operation: &'static str) {
    counter!("phantasm_channel_errors_total", "operation" => operation).increment(1);
}

/// Records a processed disconnect.
pub fn record_disconnect() {
    counter!("phantasm_disconnects_total").increment(1);
}

/// Records sequences discarded for a departed owner. `path` is
/// `"disconnect"` when the host reported it and `"tick"` when a sub-tick
/// found the owner gone first.
pub fn record_sequences_dropped(path: &'static str, count: usize) {
    counter!("phantasm_sequences_dropped_total", "path" => path).increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_known_effect_returns_original() {
        assert_eq!(sanitize_effect_label("stalker"), "stalker");
    }

    #[test]
    fn sanitize_unknown_effect_returns_unknown() {
        assert_eq!(sanitize_effect_label("stalkr"), "__unknown__");
        assert_eq!(sanitize_effect_label(""), "__unknown__");
        assert_eq!(sanitize_effect_label(&"x".repeat(10_000)), "__unknown__");
    }

    #[test]
    fn known_effects_are_sorted_and_unique() {
        let mut sorted = KNOWN_EFFECTS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, KNOWN_EFFECTS.to_vec());
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_trigger("footstep", "triggered");
        record_roll(0.07, true);
        record_spawn("stalker");
        record_despawn("stalker", "timeout");
        set_active_phantoms("stalker", 2);
        record_channel_error("spawn_phantom");
        record_disconnect();
        record_sequences_dropped("tick", 2);
    }
}
