//! Rendering shared by the humanoid figure families.

use tracing::debug;

use super::lifecycle::PhantomInstance;
use crate::channel::Appearance;
use crate::context::EffectContext;
use crate::error::ChannelError;
use crate::geometry::{Orientation, Vec3, orientation_towards};
use crate::observability::metrics;
use crate::world::WorldId;

/// Height of a figure's head above its feet.
pub const FIGURE_HEAD_HEIGHT: f64 = 1.6;

/// Sub-ticks the figure's roster entry stays listed after the spawn.
pub const ROSTER_LINGER_TICKS: u64 = 20;

/// Where a figure stands and how it looks.
#[derive(Debug, Clone)]
pub struct FigureState {
    /// World the figure stands in.
    pub world: WorldId,
    /// Feet position.
    pub position: Vec3,
    /// Current facing.
    pub orientation: Orientation,
    /// Roster identity and skin.
    pub appearance: Appearance,
    /// Main-hand item.
    pub item: Option<&'static str>,
    /// Whether the roster entry is still listed.
    pub roster_listed: bool,
}

impl FigureState {
    /// Head position, the point observers look at.
    #[must_use]
    pub const fn head(&self) -> Vec3 {
        self.position.raised(FIGURE_HEAD_HEIGHT)
    }
}

/// Lists the figure in the roster, shows it and hands it its item.
///
/// # Errors
///
/// Returns the first rejected signal.
pub fn show<S>(
    cx: &EffectContext,
    instance: &PhantomInstance<S>,
    figure: &mut FigureState,
) -> Result<(), ChannelError> {
    let owner = instance.owner();
    let channel = cx.channel();
    channel.send_roster_entry(
        owner,
        figure.appearance.profile_id,
        &figure.appearance.display_name,
    )?;
    figure.roster_listed = true;
    channel.spawn_phantom_actor(
        owner,
        instance.id(),
        &figure.appearance,
        figure.position,
        figure.orientation,
    )?;
    if figure.item.is_some() {
        channel.equip_phantom_actor(owner, instance.id(), figure.item)?;
    }
    Ok(())
}

/// Withdraws the roster entry once it has lingered long enough. A rejected
/// send is only noted; the entry is not retried.
pub fn unlist_when_due<S>(cx: &EffectContext, instance: &PhantomInstance<S>, figure: &mut FigureState) {
    if !figure.roster_listed || instance.age() < ROSTER_LINGER_TICKS {
        return;
    }
    figure.roster_listed = false;
    if let Err(e) = cx
        .channel()
        .remove_roster_entry(instance.owner(), figure.appearance.profile_id)
    {
        note_send_failure(instance, "roster_remove", &e);
    }
}

/// Turns the figure towards `target`. A rejected send is only noted.
pub fn face<S>(cx: &EffectContext, instance: &PhantomInstance<S>, figure: &mut FigureState, target: Vec3) {
    let orientation = orientation_towards(figure.head(), target);
    turn(cx, instance, figure, orientation);
}

/// Applies `orientation` to the figure. A rejected send is only noted.
pub fn turn<S>(
    cx: &EffectContext,
    instance: &PhantomInstance<S>,
    figure: &mut FigureState,
    orientation: Orientation,
) {
    figure.orientation = orientation;
    if let Err(e) = cx.channel().move_phantom_actor(
        instance.owner(),
        instance.id(),
        figure.position,
        figure.orientation,
    ) {
        note_send_failure(instance, "move_phantom", &e);
    }
}

/// Removes the figure, and its roster entry if still listed.
///
/// Both signals are attempted; the first failure is returned.
///
/// # Errors
///
/// Returns the first rejected signal.
pub fn hide<S>(
    cx: &EffectContext,
    instance: &PhantomInstance<S>,
    figure: &mut FigureState,
) -> Result<(), ChannelError> {
    let removed = cx.channel().remove_phantom_actor(instance.owner(), instance.id());
    if !figure.roster_listed {
        return removed;
    }
    figure.roster_listed = false;
    let unlisted = cx
        .channel()
        .remove_roster_entry(instance.owner(), figure.appearance.profile_id);
    removed.and(unlisted)
}

/// Logs and counts a rejected per-tick signal.
pub fn note_send_failure<S>(instance: &PhantomInstance<S>, operation: &'static str, error: &ChannelError) {
    metrics::record_channel_error(operation);
    debug!(
        actor = %instance.owner(),
        family = instance.family(),
        phantom_id = %instance.id(),
        operation,
        error = %error,
        "per-tick signal rejected"
    );
}
