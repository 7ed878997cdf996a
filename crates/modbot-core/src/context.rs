use std::sync::Arc;

use crate::{
    access::AccessResolver,
    audit::AuditLogger,
    config::Config,
    platform::{ChatPlatform, TimedPlatform},
    rights::PermissionStore,
    store::{ControlRepository, RightsRepository, VoteRepository},
};

/// Everything a handler needs, constructed once and passed explicitly.
///
/// There is no process-wide settings singleton: tests build their own
/// context around in-memory stores and a fake platform.
#[derive(Clone)]
pub struct BotContext {
    pub cfg: Arc<Config>,
    pub rights: PermissionStore,
    pub votes: Arc<dyn VoteRepository>,
    pub control: Arc<dyn ControlRepository>,
    /// Already bounded by `cfg.platform_timeout`.
    pub platform: Arc<dyn ChatPlatform>,
    pub audit: Arc<AuditLogger>,
}

impl BotContext {
    pub fn new(
        cfg: Arc<Config>,
        rights: Arc<dyn RightsRepository>,
        votes: Arc<dyn VoteRepository>,
        control: Arc<dyn ControlRepository>,
        platform: Arc<dyn ChatPlatform>,
    ) -> Self {
        let platform: Arc<dyn ChatPlatform> =
            Arc::new(TimedPlatform::new(platform, cfg.platform_timeout));
        let audit = Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        ));
        Self {
            cfg,
            rights: PermissionStore::new(rights),
            votes,
            control,
            platform,
            audit,
        }
    }

    pub fn access(&self) -> AccessResolver {
        AccessResolver::new(self.cfg.clone(), self.rights.clone())
    }
}
