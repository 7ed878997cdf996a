//! Persistence ports.
//!
//! Implementations: [`MemoryStore`] here and `modbot_sqlite::SqliteStore`.
//! Repositories never cache across calls; every check re-reads current state.

pub mod memory;

use chrono::{DateTime, Utc};

use crate::{
    domain::{AclMode, EntityKind, EntityRef, MessageId, RoleId, ServerId, UserId, VoteId},
    rights::CommandRight,
    threshold::ControlSettings,
    votes::{NewVote, NewVotePoint, Vote, VoteState},
    Result,
};

pub use memory::MemoryStore;

/// One generic allow-list keyed by `(server, prefix, kind, id)`.
pub trait RightsRepository: Send + Sync {
    fn contains(&self, server: ServerId, prefix: &str, entity: EntityRef) -> Result<bool>;
    /// Insert a right. `false` when the tuple already exists.
    fn insert(&self, right: &CommandRight) -> Result<bool>;
    /// Remove a right. `false` when the tuple did not exist.
    fn remove(&self, server: ServerId, prefix: &str, entity: EntityRef) -> Result<bool>;
    fn list(&self, server: ServerId, prefix: &str, kind: EntityKind) -> Result<Vec<u64>>;
    fn list_server(&self, server: ServerId) -> Result<Vec<CommandRight>>;

    fn acl_mode(&self, server: ServerId) -> Result<AclMode>;
    fn set_acl_mode(&self, server: ServerId, mode: AclMode) -> Result<()>;
}

pub trait VoteRepository: Send + Sync {
    fn insert_draft(
        &self,
        vote: &NewVote,
        points: &[NewVotePoint],
        role_filter: &[RoleId],
    ) -> Result<VoteId>;
    fn get(&self, id: VoteId) -> Result<Option<Vote>>;
    fn find_active_by_message(&self, message: MessageId) -> Result<Option<Vote>>;
    /// Draft → Active: set the message id on the vote and its role-filter rows.
    /// `false` when the vote is not a draft.
    fn activate(&self, id: VoteId, message: MessageId) -> Result<bool>;
    /// Compare-and-set state change. `false` when the current state is not in `from`.
    fn transition(&self, id: VoteId, from: &[VoteState], to: VoteState) -> Result<bool>;
    /// Compare-and-set to Deleted that also drops the vote's points and
    /// role-filter rows, all or nothing. `false` when the state is not in `from`.
    fn delete(&self, id: VoteId, from: &[VoteState]) -> Result<bool>;
    fn list_expired(&self, server: ServerId, now: DateTime<Utc>) -> Result<Vec<Vote>>;
    fn servers_with_active_votes(&self) -> Result<Vec<ServerId>>;
}

pub trait ControlRepository: Send + Sync {
    fn settings(&self, server: ServerId) -> Result<Option<ControlSettings>>;
    fn upsert_settings(&self, settings: &ControlSettings) -> Result<()>;
    fn is_control_user(&self, server: ServerId, user: UserId) -> Result<bool>;
    /// `false` when the user already was a control user.
    fn add_control_user(&self, server: ServerId, user: UserId) -> Result<bool>;
    /// `false` when the user was not a control user.
    fn remove_control_user(&self, server: ServerId, user: UserId) -> Result<bool>;
    fn control_users(&self, server: ServerId) -> Result<Vec<UserId>>;
}
