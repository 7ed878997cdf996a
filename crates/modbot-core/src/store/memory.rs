use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};

use crate::{
    domain::{AclMode, EntityKind, EntityRef, MessageId, RoleId, ServerId, UserId, VoteId},
    errors::Error,
    rights::CommandRight,
    store::{ControlRepository, RightsRepository, VoteRepository},
    threshold::ControlSettings,
    votes::{NewVote, NewVotePoint, Vote, VotePoint, VoteState},
    Result,
};

/// Process-local store implementing every repository port.
///
/// Used by tests and by deployments that do not need durability.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    rights: BTreeMap<(ServerId, String, EntityRef), DateTime<Utc>>,
    acl_modes: HashMap<ServerId, AclMode>,

    next_vote_id: i64,
    next_point_id: i64,
    votes: BTreeMap<VoteId, Vote>,

    control: HashMap<ServerId, ControlSettings>,
    control_users: BTreeSet<(ServerId, UserId)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| Error::Storage(format!("memory store lock poisoned: {e}")))
    }
}

fn right_key(server: ServerId, prefix: &str, entity: EntityRef) -> (ServerId, String, EntityRef) {
    (server, prefix.to_string(), entity)
}

impl RightsRepository for MemoryStore {
    fn contains(&self, server: ServerId, prefix: &str, entity: EntityRef) -> Result<bool> {
        Ok(self
            .lock()?
            .rights
            .contains_key(&right_key(server, prefix, entity)))
    }

    fn insert(&self, right: &CommandRight) -> Result<bool> {
        let mut st = self.lock()?;
        let key = right_key(right.server_id, &right.command_prefix, right.entity);
        if st.rights.contains_key(&key) {
            return Ok(false);
        }
        st.rights.insert(key, right.created_at);
        Ok(true)
    }

    fn remove(&self, server: ServerId, prefix: &str, entity: EntityRef) -> Result<bool> {
        Ok(self
            .lock()?
            .rights
            .remove(&right_key(server, prefix, entity))
            .is_some())
    }

    fn list(&self, server: ServerId, prefix: &str, kind: EntityKind) -> Result<Vec<u64>> {
        let st = self.lock()?;
        Ok(st
            .rights
            .keys()
            .filter(|(s, p, e)| *s == server && p == prefix && e.kind == kind)
            .map(|(_, _, e)| e.id)
            .collect())
    }

    fn list_server(&self, server: ServerId) -> Result<Vec<CommandRight>> {
        let st = self.lock()?;
        Ok(st
            .rights
            .iter()
            .filter(|((s, _, _), _)| *s == server)
            .map(|((s, p, e), created_at)| CommandRight {
                server_id: *s,
                command_prefix: p.clone(),
                entity: *e,
                created_at: *created_at,
            })
            .collect())
    }

    fn acl_mode(&self, server: ServerId) -> Result<AclMode> {
        Ok(self
            .lock()?
            .acl_modes
            .get(&server)
            .copied()
            .unwrap_or_default())
    }

    fn set_acl_mode(&self, server: ServerId, mode: AclMode) -> Result<()> {
        self.lock()?.acl_modes.insert(server, mode);
        Ok(())
    }
}

impl VoteRepository for MemoryStore {
    fn insert_draft(
        &self,
        vote: &NewVote,
        points: &[NewVotePoint],
        role_filter: &[RoleId],
    ) -> Result<VoteId> {
        let mut st = self.lock()?;
        st.next_vote_id += 1;
        let id = VoteId(st.next_vote_id);

        let mut stored_points = Vec::with_capacity(points.len());
        for p in points {
            st.next_point_id += 1;
            stored_points.push(VotePoint {
                id: st.next_point_id,
                vote_id: id,
                label: p.label.clone(),
                emoji: p.emoji.clone(),
            });
        }

        let mut roles = role_filter.to_vec();
        roles.sort();
        roles.dedup();

        st.votes.insert(
            id,
            Vote {
                id,
                server_id: vote.server_id,
                channel_id: vote.channel_id,
                message_id: None,
                text: vote.text.clone(),
                finish_time: vote.finish_time,
                is_exceptional: vote.is_exceptional,
                has_default: vote.has_default,
                win_threshold: vote.win_threshold,
                state: VoteState::Draft,
                points: stored_points,
                role_filter: roles,
            },
        );
        Ok(id)
    }

    fn get(&self, id: VoteId) -> Result<Option<Vote>> {
        Ok(self.lock()?.votes.get(&id).cloned())
    }

    fn find_active_by_message(&self, message: MessageId) -> Result<Option<Vote>> {
        Ok(self
            .lock()?
            .votes
            .values()
            .find(|v| v.state == VoteState::Active && v.message_id == Some(message))
            .cloned())
    }

    fn activate(&self, id: VoteId, message: MessageId) -> Result<bool> {
        let mut st = self.lock()?;
        let Some(vote) = st.votes.get_mut(&id) else {
            return Ok(false);
        };
        if vote.state != VoteState::Draft {
            return Ok(false);
        }
        vote.message_id = Some(message);
        vote.state = VoteState::Active;
        Ok(true)
    }

    fn transition(&self, id: VoteId, from: &[VoteState], to: VoteState) -> Result<bool> {
        let mut st = self.lock()?;
        match st.votes.get_mut(&id) {
            Some(vote) if from.contains(&vote.state) => {
                vote.state = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete(&self, id: VoteId, from: &[VoteState]) -> Result<bool> {
        let mut st = self.lock()?;
        match st.votes.get_mut(&id) {
            Some(vote) if from.contains(&vote.state) => {
                vote.state = VoteState::Deleted;
                vote.points.clear();
                vote.role_filter.clear();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn list_expired(&self, server: ServerId, now: DateTime<Utc>) -> Result<Vec<Vote>> {
        Ok(self
            .lock()?
            .votes
            .values()
            .filter(|v| v.server_id == server && v.is_expired_at(now))
            .cloned()
            .collect())
    }

    fn servers_with_active_votes(&self) -> Result<Vec<ServerId>> {
        let st = self.lock()?;
        let servers: BTreeSet<ServerId> = st
            .votes
            .values()
            .filter(|v| v.state == VoteState::Active)
            .map(|v| v.server_id)
            .collect();
        Ok(servers.into_iter().collect())
    }
}

impl ControlRepository for MemoryStore {
    fn settings(&self, server: ServerId) -> Result<Option<ControlSettings>> {
        Ok(self.lock()?.control.get(&server).cloned())
    }

    fn upsert_settings(&self, settings: &ControlSettings) -> Result<()> {
        self.lock()?
            .control
            .insert(settings.server_id, settings.clone());
        Ok(())
    }

    fn is_control_user(&self, server: ServerId, user: UserId) -> Result<bool> {
        Ok(self.lock()?.control_users.contains(&(server, user)))
    }

    fn add_control_user(&self, server: ServerId, user: UserId) -> Result<bool> {
        Ok(self.lock()?.control_users.insert((server, user)))
    }

    fn remove_control_user(&self, server: ServerId, user: UserId) -> Result<bool> {
        Ok(self.lock()?.control_users.remove(&(server, user)))
    }

    fn control_users(&self, server: ServerId) -> Result<Vec<UserId>> {
        Ok(self
            .lock()?
            .control_users
            .iter()
            .filter(|(s, _)| *s == server)
            .map(|(_, u)| *u)
            .collect())
    }
}
