//! A render channel that records every call.
//!
//! Used by the simulator to summarize what participants would have seen,
//! and by the tests to assert on exact signal sequences. Individual
//! operations can be made to fail to exercise the error paths.

use std::sync::{Mutex, PoisonError};

use dashmap::DashSet;
use serde::Serialize;
use uuid::Uuid;

use super::{Animation, Appearance, MessageSlot, PhantomId, RenderChannel};
use crate::error::ChannelError;
use crate::geometry::{BlockPos, Orientation, Vec3};
use crate::world::{ActorId, CreatureId};

/// One recorded render call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderCall {
    /// `spawn_phantom_actor`
    SpawnPhantom {
        /// Viewer.
        viewer: ActorId,
        /// Phantom id.
        id: PhantomId,
        /// Display name of the appearance.
        name: String,
        /// Spawn position.
        position: Vec3,
    },
    /// `move_phantom_actor`
    MovePhantom {
        /// Viewer.
        viewer: ActorId,
        /// Phantom id.
        id: PhantomId,
        /// New position.
        position: Vec3,
        /// New orientation.
        orientation: Orientation,
    },
    /// `equip_phantom_actor`
    EquipPhantom {
        /// Viewer.
        viewer: ActorId,
        /// Phantom id.
        id: PhantomId,
        /// Held item.
        item: Option<String>,
    },
    /// `animate_phantom_actor`
    AnimatePhantom {
        /// Viewer.
        viewer: ActorId,
        /// Phantom id.
        id: PhantomId,
        /// Animation.
        animation: Animation,
    },
    /// `remove_phantom_actor`
    RemovePhantom {
        /// Viewer.
        viewer: ActorId,
        /// Phantom id.
        id: PhantomId,
    },
    /// `move_creature_view`
    MoveCreatureView {
        /// Viewer.
        viewer: ActorId,
        /// Creature.
        creature: CreatureId,
        /// Shown position.
        position: Vec3,
    },
    /// `play_sound`
    Sound {
        /// Viewer.
        viewer: ActorId,
        /// Sound kind.
        kind: String,
        /// Source position.
        position: Vec3,
    },
    /// `show_block_override`
    ShowBlock {
        /// Viewer.
        viewer: ActorId,
        /// Block.
        position: BlockPos,
        /// Shown material.
        visual_state: String,
    },
    /// `clear_block_override`
    ClearBlock {
        /// Viewer.
        viewer: ActorId,
        /// Block.
        position: BlockPos,
    },
    /// `show_inventory_slot_override`
    ShowSlot {
        /// Viewer.
        viewer: ActorId,
        /// Slot index.
        slot: u16,
        /// Shown item.
        item: Option<String>,
    },
    /// `clear_inventory_slot_override`
    ClearSlot {
        /// Viewer.
        viewer: ActorId,
        /// Slot index.
        slot: u16,
    },
    /// `show_item_damage`
    ShowItemDamage {
        /// Viewer.
        viewer: ActorId,
        /// Slot index.
        slot: u16,
        /// Shown damage.
        damage: u16,
    },
    /// `spawn_particles`
    Particles {
        /// Viewer.
        viewer: ActorId,
        /// Particle kind.
        kind: String,
        /// Burst center.
        position: Vec3,
        /// Particle count.
        count: u32,
    },
    /// `show_hurt_flash`
    HurtFlash {
        /// Viewer.
        viewer: ActorId,
    },
    /// `send_ephemeral_message`
    Message {
        /// Viewer.
        viewer: ActorId,
        /// Message slot.
        slot: MessageSlot,
        /// Text.
        text: String,
    },
    /// `send_roster_entry`
    RosterAdd {
        /// Viewer.
        viewer: ActorId,
        /// Roster identity.
        identity: Uuid,
        /// Display name.
        display_name: String,
    },
    /// `remove_roster_entry`
    RosterRemove {
        /// Viewer.
        viewer: ActorId,
        /// Roster identity.
        identity: Uuid,
    },
}

impl RenderCall {
    /// Operation name, matching the `op` tag used in serialized output.
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::SpawnPhantom { .. } => "spawn_phantom",
            Self::MovePhantom { .. } => "move_phantom",
            Self::EquipPhantom { .. } => "equip_phantom",
            Self::AnimatePhantom { .. } => "animate_phantom",
            Self::RemovePhantom { .. } => "remove_phantom",
            Self::MoveCreatureView { .. } => "move_creature_view",
            Self::Sound { .. } => "sound",
            Self::ShowBlock { .. } => "show_block",
            Self::ClearBlock { .. } => "clear_block",
            Self::ShowSlot { .. } => "show_slot",
            Self::ClearSlot { .. } => "clear_slot",
            Self::ShowItemDamage { .. } => "show_item_damage",
            Self::Particles { .. } => "particles",
            Self::HurtFlash { .. } => "hurt_flash",
            Self::Message { .. } => "message",
            Self::RosterAdd { .. } => "roster_add",
            Self::RosterRemove { .. } => "roster_remove",
        }
    }

    /// Viewer the call was addressed to.
    #[must_use]
    pub const fn viewer(&self) -> &ActorId {
        match self {
            Self::SpawnPhantom { viewer, .. }
            | Self::MovePhantom { viewer, .. }
            | Self::EquipPhantom { viewer, .. }
            | Self::AnimatePhantom { viewer, .. }
            | Self::RemovePhantom { viewer, .. }
            | Self::MoveCreatureView { viewer, .. }
            | Self::Sound { viewer, .. }
            | Self::ShowBlock { viewer, .. }
            | Self::ClearBlock { viewer, .. }
            | Self::ShowSlot { viewer, .. }
            | Self::ClearSlot { viewer, .. }
            | Self::ShowItemDamage { viewer, .. }
            | Self::Particles { viewer, .. }
            | Self::HurtFlash { viewer }
            | Self::Message { viewer, .. }
            | Self::RosterAdd { viewer, .. }
            | Self::RosterRemove { viewer, .. } => viewer,
        }
    }

    /// Phantom the call refers to, for calls about a phantom figure.
    #[must_use]
    pub const fn phantom(&self) -> Option<PhantomId> {
        match self {
            Self::SpawnPhantom { id, .. }
            | Self::MovePhantom { id, .. }
            | Self::EquipPhantom { id, .. }
            | Self::AnimatePhantom { id, .. }
            | Self::RemovePhantom { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Channel that appends every call to an in-memory log.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    calls: Mutex<Vec<RenderCall>>,
    failing: DashSet<&'static str>,
}

impl RecordingChannel {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call of the named operation fail.
    pub fn fail_operation(&self, op: &'static str) {
        self.failing.insert(op);
    }

    /// Lets a previously failing operation succeed again.
    pub fn restore_operation(&self, op: &'static str) {
        self.failing.remove(op);
    }

    /// Snapshot of all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded calls with the given operation name.
    #[must_use]
    pub fn count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.op() == op)
            .count()
    }

    /// Drops every recorded call.
    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, call: RenderCall) -> Result<(), ChannelError> {
        let op = call.op();
        if self.failing.contains(op) {
            return Err(ChannelError::Rejected(format!("{op} disabled")));
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        Ok(())
    }
}

impl RenderChannel for RecordingChannel {
    fn spawn_phantom_actor(
        &self,
        viewer: &ActorId,
        id: PhantomId,
        appearance: &Appearance,
        position: Vec3,
        _orientation: Orientation,
    ) -> Result<(), ChannelError> {
        self.record(RenderCall::SpawnPhantom {
            viewer: viewer.clone(),
            id,
            name: appearance.display_name.clone(),
            position,
        })
    }

    fn move_phantom_actor(
        &self,
        viewer: &ActorId,
        id: PhantomId,
        position: Vec3,
        orientation: Orientation,
    ) -> Result<(), ChannelError> {
        self.record(RenderCall::MovePhantom {
            viewer: viewer.clone(),
            id,
            position,
            orientation,
        })
    }

    fn equip_phantom_actor(
        &self,
        viewer: &ActorId,
        id: PhantomId,
        item: Option<&str>,
    ) -> Result<(), ChannelError> {
        self.record(RenderCall::EquipPhantom {
            viewer: viewer.clone(),
            id,
            item: item.map(str::to_string),
        })
    }

    fn animate_phantom_actor(
        &self,
        viewer: &ActorId,
        id: PhantomId,
        animation: Animation,
    ) -> Result<(), ChannelError> {
        self.record(RenderCall::AnimatePhantom {
            viewer: viewer.clone(),
            id,
            animation,
        })
    }

    fn remove_phantom_actor(&self, viewer: &ActorId, id: PhantomId) -> Result<(), ChannelError> {
        self.record(RenderCall::RemovePhantom {
            viewer: viewer.clone(),
            id,
        })
    }

    fn move_creature_view(
        &self,
        viewer: &ActorId,
        creature: CreatureId,
        position: Vec3,
        _orientation: Orientation,
    ) -> Result<(), ChannelError> {
        self.record(RenderCall::MoveCreatureView {
            viewer: viewer.clone(),
            creature,
            position,
        })
    }

    fn play_sound(
        &self,
        viewer: &ActorId,
        kind: &str,
        position: Vec3,
        _volume: f32,
        _pitch: f32,
    ) -> Result<(), ChannelError> {
        self.record(RenderCall::Sound {
            viewer: viewer.clone(),
            kind: kind.to_string(),
            position,
        })
    }

    fn show_block_override(
        &self,
        viewer: &ActorId,
        position: BlockPos,
        visual_state: &str,
    ) -> Result<(), ChannelError> {
        self.record(RenderCall::ShowBlock {
            viewer: viewer.clone(),
            position,
            visual_state: visual_state.to_string(),
        })
    }

    fn clear_block_override(&self, viewer: &ActorId, position: BlockPos) -> Result<(), ChannelError> {
        self.record(RenderCall::ClearBlock {
            viewer: viewer.clone(),
            position,
        })
    }

    fn show_inventory_slot_override(
        &self,
        viewer: &ActorId,
        slot: u16,
        visual_item: Option<&str>,
    ) -> Result<(), ChannelError> {
        self.record(RenderCall::ShowSlot {
            viewer: viewer.clone(),
            slot,
            item: visual_item.map(str::to_string),
        })
    }

    fn clear_inventory_slot_override(
        &self,
        viewer: &ActorId,
        slot: u16,
    ) -> Result<(), ChannelError> {
        self.record(RenderCall::ClearSlot {
            viewer: viewer.clone(),
            slot,
        })
    }

    fn show_item_damage(&self, viewer: &ActorId, slot: u16, damage: u16) -> Result<(), ChannelError> {
        self.record(RenderCall::ShowItemDamage {
            viewer: viewer.clone(),
            slot,
            damage,
        })
    }

    fn spawn_particles(
        &self,
        viewer: &ActorId,
        kind: &str,
        position: Vec3,
        count: u32,
        _spread: f32,
    ) -> Result<(), ChannelError> {
        self.record(RenderCall::Particles {
            viewer: viewer.clone(),
            kind: kind.to_string(),
            position,
            count,
        })
    }

    fn show_hurt_flash(&self, viewer: &ActorId) -> Result<(), ChannelError> {
        self.record(RenderCall::HurtFlash {
            viewer: viewer.clone(),
        })
    }

    fn send_ephemeral_message(
        &self,
        viewer: &ActorId,
        slot: MessageSlot,
        text: &str,
    ) -> Result<(), ChannelError> {
        self.record(RenderCall::Message {
            viewer: viewer.clone(),
            slot,
            text: text.to_string(),
        })
    }

    fn send_roster_entry(
        &self,
        viewer: &ActorId,
        identity: Uuid,
        display_name: &str,
    ) -> Result<(), ChannelError> {
        self.record(RenderCall::RosterAdd {
            viewer: viewer.clone(),
            identity,
            display_name: display_name.to_string(),
        })
    }

    fn remove_roster_entry(&self, viewer: &ActorId, identity: Uuid) -> Result<(), ChannelError> {
        self.record(RenderCall::RosterRemove {
            viewer: viewer.clone(),
            identity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let ch = RecordingChannel::new();
        let viewer = ActorId::new("a");
        ch.remove_phantom_actor(&viewer, PhantomId(-5)).unwrap();
        ch.send_ephemeral_message(&viewer, MessageSlot::Chat, "hi")
            .unwrap();
        let calls = ch.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].op(), "remove_phantom");
        assert_eq!(calls[1].viewer(), &viewer);
        assert_eq!(ch.count("message"), 1);
    }

    #[test]
    fn failing_operation_is_not_recorded() {
        let ch = RecordingChannel::new();
        let viewer = ActorId::new("a");
        ch.fail_operation("sound");
        let err = ch
            .play_sound(&viewer, "step", Vec3::ZERO, 1.0, 1.0)
            .unwrap_err();
        assert!(matches!(err, ChannelError::Rejected(_)));
        assert_eq!(ch.count("sound"), 0);

        ch.restore_operation("sound");
        ch.play_sound(&viewer, "step", Vec3::ZERO, 1.0, 1.0).unwrap();
        assert_eq!(ch.count("sound"), 1);
    }

    #[test]
    fn serializes_with_op_tag() {
        let call = RenderCall::RemovePhantom {
            viewer: ActorId::new("a"),
            id: PhantomId(1),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["op"], "remove_phantom");
    }

    #[test]
    fn roster_identity_serializes_as_text() {
        let identity = Uuid::new_v4();
        let call = RenderCall::RosterRemove {
            viewer: ActorId::new("a"),
            identity,
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["op"], "roster_remove");
        assert_eq!(json["identity"], identity.to_string());
    }
}
