//! Delayed render steps for one-shot effects.
//!
//! A [`TimedSequence`] is a small state machine: an ordered list of steps,
//! each waiting a number of sub-ticks after the previous one. The
//! [`SequenceRunner`] advances every pending sequence once per sub-tick and
//! performs the steps that came due. Sequences are keyed by owner so a
//! disconnect drops them without sending anything.

use std::collections::VecDeque;

use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::{MessageSlot, RenderChannel};
use crate::error::ChannelError;
use crate::geometry::{BlockPos, Vec3};
use crate::observability::metrics;
use crate::world::{ActorId, WorldView};

/// One render action performed when its delay elapses.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceStep {
    /// Positional sound.
    Sound {
        /// Sound kind.
        kind: String,
        /// Where the sound plays.
        position: Vec3,
        /// Volume.
        volume: f32,
        /// Pitch.
        pitch: f32,
    },
    /// Restore a block to its real appearance.
    ClearBlock(BlockPos),
    /// Restore several blocks at once.
    ClearBlocks(Vec<BlockPos>),
    /// Particle burst.
    Particles {
        /// Particle kind.
        kind: String,
        /// Where the burst appears.
        position: Vec3,
        /// Particles in the burst.
        count: u32,
        /// Random spread around `position`.
        spread: f32,
    },
    /// Restore inventory slots to their real content.
    ClearSlots(Vec<u16>),
    /// Remove a fake roster entry.
    RemoveRoster(Uuid),
    /// Ephemeral message.
    Message(MessageSlot, String),
}

impl SequenceStep {
    fn perform(&self, viewer: &ActorId, channel: &dyn RenderChannel) -> Result<(), ChannelError> {
        match self {
            Self::Sound {
                kind,
                position,
                volume,
                pitch,
            } => channel.play_sound(viewer, kind, *position, *volume, *pitch),
            Self::ClearBlock(pos) => channel.clear_block_override(viewer, *pos),
            Self::ClearBlocks(positions) => {
                let mut result = Ok(());
                for pos in positions {
                    if let Err(e) = channel.clear_block_override(viewer, *pos) {
                        if result.is_ok() {
                            result = Err(e);
                        }
                    }
                }
                result
            }
            Self::Particles {
                kind,
                position,
                count,
                spread,
            } => channel.spawn_particles(viewer, kind, *position, *count, *spread),
            Self::ClearSlots(slots) => {
                // Every slot is attempted; the first failure is reported.
                let mut result = Ok(());
                for slot in slots {
                    if let Err(e) = channel.clear_inventory_slot_override(viewer, *slot) {
                        if result.is_ok() {
                            result = Err(e);
                        }
                    }
                }
                result
            }
            Self::RemoveRoster(identity) => channel.remove_roster_entry(viewer, *identity),
            Self::Message(slot, text) => channel.send_ephemeral_message(viewer, *slot, text),
        }
    }

    const fn operation(&self) -> &'static str {
        match self {
            Self::Sound { .. } => "sound",
            Self::ClearBlock(_) | Self::ClearBlocks(_) => "clear_block",
            Self::Particles { .. } => "particles",
            Self::ClearSlots(_) => "clear_slot",
            Self::RemoveRoster(_) => "roster_remove",
            Self::Message(..) => "message",
        }
    }
}

/// Ordered delayed steps owned by one effect invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSequence {
    label: &'static str,
    steps: VecDeque<(u64, SequenceStep)>,
}

impl TimedSequence {
    /// Starts an empty sequence; `label` names the effect in logs.
    #[must_use]
    pub const fn new(label: &'static str) -> Self {
        Self {
            label,
            steps: VecDeque::new(),
        }
    }

    /// Appends a step that runs `delay` sub-ticks after the previous one.
    ///
    /// A delay of zero still waits for the next sub-tick.
    #[must_use]
    pub fn then(mut self, delay: u64, step: SequenceStep) -> Self {
        self.steps.push_back((delay.max(1), step));
        self
    }

    /// Remaining steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether every step has run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Counts one sub-tick down and pops every step that came due.
    fn advance(&mut self, due: &mut Vec<SequenceStep>) {
        if let Some((remaining, _)) = self.steps.front_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        while self.steps.front().is_some_and(|(remaining, _)| *remaining == 0) {
            if let Some((_, step)) = self.steps.pop_front() {
                due.push(step);
            }
        }
    }
}

/// Advances pending sequences for every owner.
#[derive(Debug, Default)]
pub struct SequenceRunner {
    pending: DashMap<ActorId, Vec<TimedSequence>>,
}

impl SequenceRunner {
    /// Creates an empty runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a sequence for `owner`. Empty sequences are ignored.
    pub fn schedule(&self, owner: &ActorId, sequence: TimedSequence) {
        if sequence.is_empty() {
            return;
        }
        debug!(actor = %owner, effect = sequence.label, steps = sequence.len(), "sequence scheduled");
        self.pending.entry(owner.clone()).or_default().push(sequence);
    }

    /// Runs one sub-tick: due steps are performed for connected owners, and
    /// disconnected owners lose their sequences silently.
    pub fn advance(&self, world: &dyn WorldView, channel: &dyn RenderChannel) {
        let mut due: Vec<(ActorId, &'static str, SequenceStep)> = Vec::new();
        let mut gone: Vec<ActorId> = Vec::new();

        for mut entry in self.pending.iter_mut() {
            if !world.is_connected(entry.key()) {
                gone.push(entry.key().clone());
                continue;
            }
            let owner = entry.key().clone();
            let mut steps = Vec::new();
            for sequence in entry.value_mut().iter_mut() {
                sequence.advance(&mut steps);
                due.extend(steps.drain(..).map(|s| (owner.clone(), sequence.label, s)));
            }
            entry.value_mut().retain(|s| !s.is_empty());
        }
        self.pending.retain(|_, sequences| !sequences.is_empty());
        for owner in gone {
            let dropped = self.drop_actor(&owner);
            if dropped > 0 {
                metrics::record_sequences_dropped("tick", dropped);
                info!(actor = %owner, sequences = dropped, "owner gone; pending sequences discarded");
            }
        }

        for (owner, label, step) in due {
            if let Err(e) = step.perform(&owner, channel) {
                metrics::record_channel_error(step.operation());
                warn!(actor = %owner, effect = label, error = %e, "delayed render step failed");
            }
        }
    }

    /// Discards every sequence owned by `owner` without sending anything.
    pub fn drop_actor(&self, owner: &ActorId) -> usize {
        let dropped = self.pending.remove(owner).map_or(0, |(_, s)| s.len());
        if dropped > 0 {
            debug!(actor = %owner, dropped, "pending sequences discarded");
        }
        dropped
    }

    /// Sequences pending for `owner`.
    #[must_use]
    pub fn pending_for(&self, owner: &ActorId) -> usize {
        self.pending.get(owner).map_or(0, |s| s.len())
    }

    /// Sequences pending across all owners.
    #[must_use]
    pub fn total_pending(&self) -> usize {
        self.pending.iter().map(|e| e.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::recording::RecordingChannel;
    use crate::world::WorldId;
    use crate::world::memory::InMemoryWorld;

    fn setup() -> (InMemoryWorld, RecordingChannel, ActorId) {
        let world = InMemoryWorld::flat();
        world.place_actor("steve", &WorldId::overworld(), Vec3::new(0.5, 64.0, 0.5));
        (world, RecordingChannel::new(), ActorId::new("steve"))
    }

    #[test]
    fn steps_fire_after_cumulative_delays() {
        let (world, channel, steve) = setup();
        let runner = SequenceRunner::new();
        runner.schedule(
            &steve,
            TimedSequence::new("test")
                .then(3, SequenceStep::ClearBlock(BlockPos::new(0, 63, 0)))
                .then(2, SequenceStep::Message(MessageSlot::Chat, "bye".into())),
        );

        for _ in 0..2 {
            runner.advance(&world, &channel);
        }
        assert_eq!(channel.count("clear_block"), 0);
        runner.advance(&world, &channel);
        assert_eq!(channel.count("clear_block"), 1);
        runner.advance(&world, &channel);
        assert_eq!(channel.count("message"), 0);
        runner.advance(&world, &channel);
        assert_eq!(channel.count("message"), 1);
        assert_eq!(runner.total_pending(), 0);
    }

    #[test]
    fn disconnect_discards_without_signals() {
        let (world, channel, steve) = setup();
        let runner = SequenceRunner::new();
        runner.schedule(
            &steve,
            TimedSequence::new("test").then(1, SequenceStep::ClearSlots(vec![9, 10])),
        );
        world.remove_actor(&steve);
        runner.advance(&world, &channel);
        assert!(channel.calls().is_empty());
        assert_eq!(runner.pending_for(&steve), 0);
    }

    #[test]
    fn departed_owner_is_dropped_once() {
        let (world, channel, steve) = setup();
        world.place_actor("alex", &WorldId::overworld(), Vec3::new(50.5, 64.0, 0.5));
        let alex = ActorId::new("alex");
        let runner = SequenceRunner::new();
        for owner in [&steve, &steve, &alex] {
            runner.schedule(
                owner,
                TimedSequence::new("test").then(2, SequenceStep::ClearBlock(BlockPos::new(0, 64, 0))),
            );
        }
        world.remove_actor(&steve);

        runner.advance(&world, &channel);
        assert_eq!(runner.pending_for(&steve), 0);
        assert_eq!(runner.total_pending(), 1);
        assert_eq!(runner.drop_actor(&steve), 0);

        runner.advance(&world, &channel);
        assert_eq!(channel.calls().len(), 1);
        assert!(channel.calls().iter().all(|c| c.viewer() == &alex));
    }

    #[test]
    fn drop_actor_reports_count() {
        let (_world, _channel, steve) = setup();
        let runner = SequenceRunner::new();
        let seq = TimedSequence::new("test").then(10, SequenceStep::RemoveRoster(Uuid::new_v4()));
        runner.schedule(&steve, seq.clone());
        runner.schedule(&steve, seq);
        assert_eq!(runner.drop_actor(&steve), 2);
        assert_eq!(runner.drop_actor(&steve), 0);
    }

    #[test]
    fn failed_step_does_not_block_later_steps() {
        let (world, channel, steve) = setup();
        channel.fail_operation("clear_block");
        let runner = SequenceRunner::new();
        runner.schedule(
            &steve,
            TimedSequence::new("test")
                .then(1, SequenceStep::ClearBlock(BlockPos::new(1, 63, 1)))
                .then(1, SequenceStep::Message(MessageSlot::ActionBar, "...".into())),
        );
        runner.advance(&world, &channel);
        runner.advance(&world, &channel);
        assert_eq!(channel.count("message"), 1);
    }

    #[test]
    fn empty_sequence_is_ignored() {
        let (_world, _channel, steve) = setup();
        let runner = SequenceRunner::new();
        runner.schedule(&steve, TimedSequence::new("nothing"));
        assert_eq!(runner.total_pending(), 0);
    }
}
