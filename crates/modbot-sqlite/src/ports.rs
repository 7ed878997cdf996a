use chrono::{DateTime, Utc};
use modbot_core::{
    domain::{AclMode, EntityKind, EntityRef, MessageId, RoleId, ServerId, UserId, VoteId},
    rights::CommandRight,
    store::{ControlRepository, RightsRepository, VoteRepository},
    threshold::ControlSettings,
    votes::{NewVote, NewVotePoint, Vote, VoteState},
    Error, Result,
};

use crate::SqliteStore;

fn storage(e: anyhow::Error) -> Error {
    Error::Storage(format!("{e:#}"))
}

impl RightsRepository for SqliteStore {
    fn contains(&self, server: ServerId, prefix: &str, entity: EntityRef) -> Result<bool> {
        self.right_exists(server, prefix, entity).map_err(storage)
    }

    fn insert(&self, right: &CommandRight) -> Result<bool> {
        self.insert_right(right).map_err(storage)
    }

    fn remove(&self, server: ServerId, prefix: &str, entity: EntityRef) -> Result<bool> {
        self.delete_right(server, prefix, entity).map_err(storage)
    }

    fn list(&self, server: ServerId, prefix: &str, kind: EntityKind) -> Result<Vec<u64>> {
        self.list_right_ids(server, prefix, kind).map_err(storage)
    }

    fn list_server(&self, server: ServerId) -> Result<Vec<CommandRight>> {
        self.list_server_rights(server).map_err(storage)
    }

    fn acl_mode(&self, server: ServerId) -> Result<AclMode> {
        self.get_acl_mode(server).map_err(storage)
    }

    fn set_acl_mode(&self, server: ServerId, mode: AclMode) -> Result<()> {
        self.put_acl_mode(server, mode).map_err(storage)
    }
}

impl VoteRepository for SqliteStore {
    fn insert_draft(
        &self,
        vote: &NewVote,
        points: &[NewVotePoint],
        role_filter: &[RoleId],
    ) -> Result<VoteId> {
        self.insert_vote_draft(vote, points, role_filter)
            .map_err(storage)
    }

    fn get(&self, id: VoteId) -> Result<Option<Vote>> {
        self.get_vote(id).map_err(storage)
    }

    fn find_active_by_message(&self, message: MessageId) -> Result<Option<Vote>> {
        self.get_active_vote_by_message(message).map_err(storage)
    }

    fn activate(&self, id: VoteId, message: MessageId) -> Result<bool> {
        self.activate_vote(id, message).map_err(storage)
    }

    fn transition(&self, id: VoteId, from: &[VoteState], to: VoteState) -> Result<bool> {
        self.transition_vote(id, from, to).map_err(storage)
    }

    fn delete(&self, id: VoteId, from: &[VoteState]) -> Result<bool> {
        self.delete_vote(id, from).map_err(storage)
    }

    fn list_expired(&self, server: ServerId, now: DateTime<Utc>) -> Result<Vec<Vote>> {
        self.list_expired_votes(server, now).map_err(storage)
    }

    fn servers_with_active_votes(&self) -> Result<Vec<ServerId>> {
        self.list_servers_with_active_votes().map_err(storage)
    }
}

impl ControlRepository for SqliteStore {
    fn settings(&self, server: ServerId) -> Result<Option<ControlSettings>> {
        self.get_control_settings(server).map_err(storage)
    }

    fn upsert_settings(&self, settings: &ControlSettings) -> Result<()> {
        self.put_control_settings(settings).map_err(storage)
    }

    fn is_control_user(&self, server: ServerId, user: UserId) -> Result<bool> {
        self.control_user_exists(server, user).map_err(storage)
    }

    fn add_control_user(&self, server: ServerId, user: UserId) -> Result<bool> {
        self.insert_control_user(server, user).map_err(storage)
    }

    fn remove_control_user(&self, server: ServerId, user: UserId) -> Result<bool> {
        self.delete_control_user(server, user).map_err(storage)
    }

    fn control_users(&self, server: ServerId) -> Result<Vec<UserId>> {
        self.list_control_users(server).map_err(storage)
    }
}
