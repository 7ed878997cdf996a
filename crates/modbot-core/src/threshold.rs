//! Role promotion by control-user reactions.
//!
//! When enough control users react to a message with the configured emoji,
//! the message author receives the configured role. There is no lock around
//! the count-then-grant sequence; the grant is skipped when the author
//! already holds the role, so concurrent events degrade to one grant.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    audit::AuditEvent,
    context::BotContext,
    domain::{EmojiRef, RoleId, ServerId, UserId},
    platform::ReactionEvent,
    Result,
};

/// Per-server threshold configuration. At most one per server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSettings {
    pub server_id: ServerId,
    pub assign_role: Option<RoleId>,
    pub threshold: u32,
    pub emoji: Option<EmojiRef>,
}

impl ControlSettings {
    pub fn unset(server_id: ServerId) -> Self {
        Self {
            server_id,
            assign_role: None,
            threshold: 0,
            emoji: None,
        }
    }

    /// Inactive until role, threshold and emoji are all set.
    pub fn is_configured(&self) -> bool {
        self.assign_role.is_some_and(|r| r.0 != 0) && self.threshold > 0 && self.emoji.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ThresholdOutcome {
    NotControlUser,
    EmojiMismatch,
    NotConfigured,
    BelowThreshold { count: usize },
    AlreadyHeld { author: UserId },
    Granted { author: UserId, role: RoleId },
}

#[derive(Clone)]
pub struct ThresholdRoleAssigner {
    ctx: BotContext,
}

impl ThresholdRoleAssigner {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    pub async fn on_reaction_add(&self, reaction: &ReactionEvent) -> Result<ThresholdOutcome> {
        let server = reaction.server_id;

        if !self.ctx.control.is_control_user(server, reaction.user_id)? {
            return Ok(ThresholdOutcome::NotControlUser);
        }

        let Some(settings) = self.ctx.control.settings(server)? else {
            return Ok(ThresholdOutcome::NotConfigured);
        };
        if settings
            .emoji
            .as_ref()
            .is_some_and(|e| *e != reaction.emoji)
        {
            return Ok(ThresholdOutcome::EmojiMismatch);
        }
        let (Some(role), Some(emoji), true) = (
            settings.assign_role,
            settings.emoji.as_ref(),
            settings.is_configured(),
        ) else {
            return Ok(ThresholdOutcome::NotConfigured);
        };

        let msg = reaction.message();
        let reactors = self.ctx.platform.list_reactors(msg, emoji).await?;
        let control: HashSet<UserId> = self.ctx.control.control_users(server)?.into_iter().collect();
        let count = reactors.iter().filter(|u| control.contains(u)).count();
        if count < settings.threshold as usize {
            debug!(%server, message = %msg.message_id, count, threshold = settings.threshold, "below threshold");
            return Ok(ThresholdOutcome::BelowThreshold { count });
        }

        let author = self.ctx.platform.message_author(msg).await?;
        let held = self.ctx.platform.member_roles(server, author).await?;
        if held.contains(&role) {
            return Ok(ThresholdOutcome::AlreadyHeld { author });
        }

        self.ctx.platform.grant_role(server, author, role).await?;
        info!(%server, user = %author, %role, count, "threshold reached; role granted");
        self.ctx.audit.record(AuditEvent::role_granted(
            server,
            author,
            role,
            msg.message_id,
            count,
        ));
        Ok(ThresholdOutcome::Granted { author, role })
    }

    // ============== Control management ==============

    pub fn settings(&self, server: ServerId) -> Result<ControlSettings> {
        Ok(self
            .ctx
            .control
            .settings(server)?
            .unwrap_or_else(|| ControlSettings::unset(server)))
    }

    pub fn set_settings(&self, settings: &ControlSettings) -> Result<()> {
        self.ctx.control.upsert_settings(settings)?;
        info!(
            server = %settings.server_id,
            configured = settings.is_configured(),
            threshold = settings.threshold,
            "control settings updated"
        );
        Ok(())
    }

    pub fn add_control_user(&self, server: ServerId, user: UserId) -> Result<bool> {
        self.ctx.control.add_control_user(server, user)
    }

    pub fn remove_control_user(&self, server: ServerId, user: UserId) -> Result<bool> {
        self.ctx.control.remove_control_user(server, user)
    }

    pub fn control_users(&self, server: ServerId) -> Result<Vec<UserId>> {
        self.ctx.control.control_users(server)
    }
}
