//! Rendering channel consumed by effects.
//!
//! Every call targets a single viewer and paints something only that viewer
//! perceives. Calls are fire-and-forget from the engine's point of view: a
//! failure is returned as a [`ChannelError`], logged by the caller, and never
//! retried.

pub mod recording;

use std::fmt::{self, Debug};

use serde::Serialize;
use uuid::Uuid;

use crate::error::ChannelError;
use crate::geometry::{BlockPos, Orientation, Vec3};
use crate::world::{ActorId, CreatureId};

/// Synthetic entity id for a rendered phantom.
///
/// Allocated from a range that never overlaps host entity ids.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PhantomId(pub i32);

impl fmt::Display for PhantomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a rendered figure looks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Appearance {
    /// Roster identity of the figure.
    pub profile_id: Uuid,
    /// Name shown above the figure and in the roster.
    pub display_name: String,
    /// Opaque skin payload, when one was resolved.
    pub textures: Option<String>,
}

impl Appearance {
    /// An appearance with a fresh identity and no custom textures.
    #[must_use]
    pub fn plain(display_name: impl Into<String>) -> Self {
        Self {
            profile_id: Uuid::new_v4(),
            display_name: display_name.into(),
            textures: None,
        }
    }
}

/// Where an ephemeral message is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSlot {
    /// The chat log.
    Chat,
    /// The single line above the hotbar.
    ActionBar,
}

/// A one-off animation on a rendered figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Animation {
    /// Main-hand swing.
    SwingArm,
}

/// Client-scoped rendering operations.
pub trait RenderChannel: Send + Sync + Debug {
    /// Shows a figure that exists only for `viewer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn spawn_phantom_actor(
        &self,
        viewer: &ActorId,
        id: PhantomId,
        appearance: &Appearance,
        position: Vec3,
        orientation: Orientation,
    ) -> Result<(), ChannelError>;

    /// Moves or turns a rendered figure.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn move_phantom_actor(
        &self,
        viewer: &ActorId,
        id: PhantomId,
        position: Vec3,
        orientation: Orientation,
    ) -> Result<(), ChannelError>;

    /// Sets or clears the item held by a rendered figure.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn equip_phantom_actor(
        &self,
        viewer: &ActorId,
        id: PhantomId,
        item: Option<&str>,
    ) -> Result<(), ChannelError>;

    /// Plays an animation on a rendered figure.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn animate_phantom_actor(
        &self,
        viewer: &ActorId,
        id: PhantomId,
        animation: Animation,
    ) -> Result<(), ChannelError>;

    /// Removes a rendered figure.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn remove_phantom_actor(&self, viewer: &ActorId, id: PhantomId) -> Result<(), ChannelError>;

    /// Shows a real creature at a position other than its true one.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn move_creature_view(
        &self,
        viewer: &ActorId,
        creature: CreatureId,
        position: Vec3,
        orientation: Orientation,
    ) -> Result<(), ChannelError>;

    /// Plays a positional sound.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn play_sound(
        &self,
        viewer: &ActorId,
        kind: &str,
        position: Vec3,
        volume: f32,
        pitch: f32,
    ) -> Result<(), ChannelError>;

    /// Shows a block as a different material.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn show_block_override(
        &self,
        viewer: &ActorId,
        position: BlockPos,
        visual_state: &str,
    ) -> Result<(), ChannelError>;

    /// Restores the real appearance of a block.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn clear_block_override(&self, viewer: &ActorId, position: BlockPos) -> Result<(), ChannelError>;

    /// Shows a different item in an inventory slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn show_inventory_slot_override(
        &self,
        viewer: &ActorId,
        slot: u16,
        visual_item: Option<&str>,
    ) -> Result<(), ChannelError>;

    /// Restores the real content of an inventory slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn clear_inventory_slot_override(&self, viewer: &ActorId, slot: u16)
    -> Result<(), ChannelError>;

    /// Shows the durability bar of the item in `slot` at a different wear.
    /// Cleared by [`clear_inventory_slot_override`](Self::clear_inventory_slot_override).
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn show_item_damage(&self, viewer: &ActorId, slot: u16, damage: u16) -> Result<(), ChannelError>;

    /// Emits a small burst of particles.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn spawn_particles(
        &self,
        viewer: &ActorId,
        kind: &str,
        position: Vec3,
        count: u32,
        spread: f32,
    ) -> Result<(), ChannelError>;

    /// Plays the viewer's own hurt flash without changing their health.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn show_hurt_flash(&self, viewer: &ActorId) -> Result<(), ChannelError>;

    /// Shows a message that is not part of any real conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn send_ephemeral_message(
        &self,
        viewer: &ActorId,
        slot: MessageSlot,
        text: &str,
    ) -> Result<(), ChannelError>;

    /// Adds an entry to the viewer's participant roster.
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn send_roster_entry(
        &self,
        viewer: &ActorId,
        identity: Uuid,
        display_name: &str,
    ) -> Result<(), ChannelError>;

    /// Removes a roster entry added by [`send_roster_entry`](Self::send_roster_entry).
    ///
    /// # Errors
    ///
    /// Returns an error if the send was rejected.
    fn remove_roster_entry(&self, viewer: &ActorId, identity: Uuid) -> Result<(), ChannelError>;
}
