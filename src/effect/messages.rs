//! Text illusions: whispered chat, action-bar lines and a fake participant
//! briefly joining the session.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::catalog::{ACTION_BAR_MESSAGES, CHAT_MESSAGES};
use super::{EffectBehavior, EffectDescriptor};
use crate::appearance::PHANTOM_DISPLAY_NAME;
use crate::channel::MessageSlot;
use crate::context::EffectContext;
use crate::error::EffectError;
use crate::sequence::{SequenceStep, TimedSequence};
use crate::world::ActorId;

/// Key of the whispered chat effect.
pub const FAKE_CHAT_KEY: &str = "fake_chat";

/// Key of the action-bar effect.
pub const ACTION_BAR_KEY: &str = "action_bar";

/// Key of the fake join/leave effect.
pub const JOIN_LEAVE_KEY: &str = "fake_join_leave";

/// Sub-ticks the fake participant stays listed.
pub const ROSTER_DURATION_TICKS: u64 = 7200;

/// Sub-ticks between the roster removal and the leave line.
pub const LEAVE_MESSAGE_DELAY_TICKS: u64 = 5;

// ============================================================================
// Single-line messages
// ============================================================================

/// One line from a pool, shown in a fixed slot.
///
/// The pool comes from `effects.<key>.messages` when configured and from the
/// built-in table otherwise. The configuration is read on every trigger so a
/// reload takes effect immediately.
#[derive(Debug)]
pub struct MessageEffect {
    descriptor: EffectDescriptor,
    slot: MessageSlot,
    defaults: &'static [&'static str],
    cx: Arc<EffectContext>,
}

impl MessageEffect {
    /// The whispered chat effect.
    #[must_use]
    pub fn fake_chat(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                FAKE_CHAT_KEY,
                "Shows a whispered chat line only the player can see.",
                Duration::from_secs(30),
            ),
            slot: MessageSlot::Chat,
            defaults: CHAT_MESSAGES,
            cx,
        }
    }

    /// The action-bar effect.
    #[must_use]
    pub fn action_bar(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                ACTION_BAR_KEY,
                "Shows a cryptic line above the hotbar.",
                Duration::from_secs(60),
            ),
            slot: MessageSlot::ActionBar,
            defaults: ACTION_BAR_MESSAGES,
            cx,
        }
    }

    /// Slot this effect writes to.
    #[must_use]
    pub const fn slot(&self) -> MessageSlot {
        self.slot
    }

    fn pick_line(&self) -> Option<String> {
        let config = self.cx.config().current();
        match config.effect_messages(self.descriptor.key()) {
            Some(configured) => self.cx.pick(configured).cloned(),
            None => self.cx.pick(self.defaults).map(|s| (*s).to_string()),
        }
    }
}

impl EffectBehavior for MessageEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self.cx.world().is_connected(actor))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        if !self.cx.world().is_connected(actor) {
            return Err(EffectError::ActorUnavailable(actor.to_string()));
        }
        let Some(line) = self.pick_line() else {
            return Ok(());
        };
        debug!(actor = %actor, effect = self.descriptor.key(), line = %line, "ephemeral message");
        self.cx
            .channel()
            .send_ephemeral_message(actor, self.slot, &line)?;
        Ok(())
    }
}

// ============================================================================
// Join / leave
// ============================================================================

/// A participant who never existed joins, lingers in the roster and leaves.
#[derive(Debug)]
pub struct JoinLeaveEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl JoinLeaveEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                JOIN_LEAVE_KEY,
                "A fake participant joins the game, then leaves much later.",
                Duration::from_secs(3 * 60),
            ),
            cx,
        }
    }
}

impl EffectBehavior for JoinLeaveEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self.cx.world().is_connected(actor))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        if !self.cx.world().is_connected(actor) {
            return Err(EffectError::ActorUnavailable(actor.to_string()));
        }
        let appearance = self.cx.appearances().appearance_for(PHANTOM_DISPLAY_NAME);
        let channel = self.cx.channel();
        channel.send_roster_entry(actor, appearance.profile_id, &appearance.display_name)?;
        if let Err(e) = channel.send_ephemeral_message(
            actor,
            MessageSlot::Chat,
            &format!("{} joined the game", appearance.display_name),
        ) {
            // No join line, no roster entry.
            let _ = channel.remove_roster_entry(actor, appearance.profile_id);
            return Err(e.into());
        }

        self.cx.sequences().schedule(
            actor,
            TimedSequence::new(JOIN_LEAVE_KEY)
                .then(
                    ROSTER_DURATION_TICKS,
                    SequenceStep::RemoveRoster(appearance.profile_id),
                )
                .then(
                    LEAVE_MESSAGE_DELAY_TICKS,
                    SequenceStep::Message(
                        MessageSlot::Chat,
                        format!("{} left the game", appearance.display_name),
                    ),
                ),
        );
        debug!(actor = %actor, effect = JOIN_LEAVE_KEY, identity = %appearance.profile_id, "fake participant joined");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::recording::RenderCall;
    use crate::config::{ConfigHandle, EffectSettings, EngineConfig};
    use crate::context::tests::{Harness, harness, harness_with};
    use crate::geometry::Vec3;
    use crate::world::WorldId;

    fn place(h: &Harness) -> ActorId {
        h.world
            .place_actor("alex", &WorldId::overworld(), Vec3::new(0.5, 64.0, 0.5));
        ActorId::new("alex")
    }

    fn messages(h: &Harness) -> Vec<(MessageSlot, String)> {
        h.channel
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                RenderCall::Message { slot, text, .. } => Some((slot, text)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn chat_line_comes_from_builtin_pool() {
        let h = harness(1);
        let alex = place(&h);
        let effect = MessageEffect::fake_chat(Arc::clone(&h.cx));
        effect.trigger(&alex).unwrap();
        let (slot, text) = messages(&h).pop().unwrap();
        assert_eq!(slot, MessageSlot::Chat);
        assert!(CHAT_MESSAGES.contains(&text.as_str()));
    }

    #[test]
    fn configured_pool_overrides_builtin() {
        let mut config = EngineConfig::default();
        config.effects.insert(
            ACTION_BAR_KEY.to_string(),
            EffectSettings {
                messages: vec!["...only this...".to_string()],
                ..EffectSettings::default()
            },
        );
        let h = harness_with(2, ConfigHandle::new(Arc::new(config)));
        let alex = place(&h);
        let effect = MessageEffect::action_bar(Arc::clone(&h.cx));
        for _ in 0..3 {
            effect.trigger(&alex).unwrap();
        }
        assert!(
            messages(&h)
                .iter()
                .all(|(slot, text)| *slot == MessageSlot::ActionBar && text == "...only this...")
        );
    }

    #[test]
    fn offline_actor_is_not_eligible() {
        let h = harness(3);
        let effect = MessageEffect::fake_chat(Arc::clone(&h.cx));
        let ghost = ActorId::new("ghost");
        assert!(!effect.can_trigger(&ghost).unwrap());
        assert!(effect.trigger(&ghost).is_err());
        assert!(h.channel.calls().is_empty());
    }

    #[test]
    fn join_then_leave_on_schedule() {
        let h = harness(4);
        let alex = place(&h);
        let effect = JoinLeaveEffect::new(Arc::clone(&h.cx));
        effect.trigger(&alex).unwrap();
        assert_eq!(h.channel.count("roster_add"), 1);
        assert_eq!(
            messages(&h),
            vec![(MessageSlot::Chat, format!("{PHANTOM_DISPLAY_NAME} joined the game"))]
        );

        let advance = |n: u64| {
            for _ in 0..n {
                h.cx.sequences().advance(h.cx.world(), h.cx.channel());
            }
        };
        advance(ROSTER_DURATION_TICKS - 1);
        assert_eq!(h.channel.count("roster_remove"), 0);
        advance(1);
        assert_eq!(h.channel.count("roster_remove"), 1);
        advance(LEAVE_MESSAGE_DELAY_TICKS);
        assert_eq!(
            messages(&h).pop().unwrap().1,
            format!("{PHANTOM_DISPLAY_NAME} left the game")
        );
    }

    #[test]
    fn failed_join_line_withdraws_roster_entry() {
        let h = harness(5);
        let alex = place(&h);
        h.channel.fail_operation("message");
        let effect = JoinLeaveEffect::new(Arc::clone(&h.cx));
        assert!(effect.trigger(&alex).is_err());
        assert_eq!(h.channel.count("roster_add"), 1);
        assert_eq!(h.channel.count("roster_remove"), 1);
        assert_eq!(h.cx.sequences().pending_for(&alex), 0);
    }
}
