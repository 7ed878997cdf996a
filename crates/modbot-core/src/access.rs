//! Command access decisions: owner and admin bypass, user or role grants,
//! then optional channel or category scoping.

use std::sync::Arc;

use tracing::debug;

use crate::{
    config::Config,
    domain::{AclMode, ChannelId, EntityRef, RoleId, ServerId, UserId},
    rights::PermissionStore,
};

/// Everything one authorization decision needs, supplied by the caller.
#[derive(Clone, Debug)]
pub struct AccessRequest<'a> {
    pub server: ServerId,
    pub actor: UserId,
    pub actor_roles: &'a [RoleId],
    pub actor_is_admin: bool,
    pub command_prefix: &'a str,
    pub channel: ChannelId,
    pub category: Option<ChannelId>,
    pub strict_by_channel: bool,
}

#[derive(Clone)]
pub struct AccessResolver {
    cfg: Arc<Config>,
    rights: PermissionStore,
}

impl AccessResolver {
    pub fn new(cfg: Arc<Config>, rights: PermissionStore) -> Self {
        Self { cfg, rights }
    }

    /// Evaluate one authorization decision. Never errors: storage failures deny.
    pub fn can_execute(&self, req: &AccessRequest<'_>) -> bool {
        if self.cfg.is_owner(req.actor) || req.actor_is_admin {
            return true;
        }

        let prefix = req.command_prefix;
        let user_allowed = self
            .rights
            .is_allowed(req.server, EntityRef::user(req.actor), prefix);
        let role_allowed = req
            .actor_roles
            .iter()
            .any(|r| self.rights.is_allowed(req.server, EntityRef::role(*r), prefix));
        let base_allowed = user_allowed || role_allowed;

        let scoped = req.strict_by_channel
            && self.rights.acl_mode(req.server) == AclMode::Scoped
            && self.rights.has_location_rights(req.server, prefix);

        let allowed = if scoped {
            let channel_allowed = self
                .rights
                .is_allowed(req.server, EntityRef::channel(req.channel), prefix)
                || req.category.is_some_and(|c| {
                    self.rights
                        .is_allowed(req.server, EntityRef::category(c), prefix)
                });
            base_allowed && channel_allowed
        } else {
            base_allowed
        };

        debug!(
            server = %req.server,
            actor = %req.actor,
            prefix,
            user_allowed,
            role_allowed,
            scoped,
            allowed,
            "access decision"
        );
        allowed
    }
}
