//! Per-server command allow-lists.
//!
//! A right exists or it does not; there are no deny rows. Every read that
//! fails at the storage layer is reported as "not allowed" and every write
//! that fails as "no-op".

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    domain::{AclMode, EntityKind, EntityRef, ServerId},
    store::RightsRepository,
    Result,
};

/// A persisted grant for one entity to run one command prefix on one server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandRight {
    pub server_id: ServerId,
    pub command_prefix: String,
    pub entity: EntityRef,
    pub created_at: DateTime<Utc>,
}

/// Prefixes are matched case-insensitively and without surrounding blanks.
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().to_lowercase()
}

#[derive(Clone)]
pub struct PermissionStore {
    repo: Arc<dyn RightsRepository>,
}

impl PermissionStore {
    pub fn new(repo: Arc<dyn RightsRepository>) -> Self {
        Self { repo }
    }

    pub fn is_allowed(&self, server: ServerId, entity: EntityRef, prefix: &str) -> bool {
        let prefix = normalize_prefix(prefix);
        match self.repo.contains(server, &prefix, entity) {
            Ok(v) => v,
            Err(e) => {
                warn!(%server, %entity, prefix = %prefix, error = %e, "rights lookup failed; denying");
                false
            }
        }
    }

    /// Grant a right. `false` if it was already granted (or the write failed).
    pub fn allow(&self, server: ServerId, entity: EntityRef, prefix: &str) -> bool {
        let right = CommandRight {
            server_id: server,
            command_prefix: normalize_prefix(prefix),
            entity,
            created_at: Utc::now(),
        };
        if right.command_prefix.is_empty() {
            return false;
        }
        match self.repo.insert(&right) {
            Ok(inserted) => {
                debug!(%server, %entity, prefix = %right.command_prefix, inserted, "allow");
                inserted
            }
            Err(e) => {
                warn!(%server, %entity, prefix = %right.command_prefix, error = %e, "allow failed");
                false
            }
        }
    }

    /// Revoke a right. `false` if it was not granted (or the write failed).
    pub fn deny(&self, server: ServerId, entity: EntityRef, prefix: &str) -> bool {
        let prefix = normalize_prefix(prefix);
        match self.repo.remove(server, &prefix, entity) {
            Ok(removed) => {
                debug!(%server, %entity, prefix = %prefix, removed, "deny");
                removed
            }
            Err(e) => {
                warn!(%server, %entity, prefix = %prefix, error = %e, "deny failed");
                false
            }
        }
    }

    pub fn list_allowed(&self, server: ServerId, prefix: &str, kind: EntityKind) -> Vec<u64> {
        let prefix = normalize_prefix(prefix);
        self.repo.list(server, &prefix, kind).unwrap_or_else(|e| {
            warn!(%server, %kind, prefix = %prefix, error = %e, "rights listing failed");
            Vec::new()
        })
    }

    /// Whether any channel or category restriction exists for `prefix`.
    pub fn has_location_rights(&self, server: ServerId, prefix: &str) -> bool {
        [EntityKind::Channel, EntityKind::Category]
            .into_iter()
            .any(|kind| !self.list_allowed(server, prefix, kind).is_empty())
    }

    pub fn list_server(&self, server: ServerId) -> Vec<CommandRight> {
        self.repo.list_server(server).unwrap_or_else(|e| {
            warn!(%server, error = %e, "rights listing failed");
            Vec::new()
        })
    }

    /// Falls back to the default mode when storage is unavailable.
    pub fn acl_mode(&self, server: ServerId) -> AclMode {
        self.repo.acl_mode(server).unwrap_or_else(|e| {
            warn!(%server, error = %e, "acl mode lookup failed");
            AclMode::default()
        })
    }

    pub fn set_acl_mode(&self, server: ServerId, mode: AclMode) -> Result<()> {
        self.repo.set_acl_mode(server, mode)
    }
}
