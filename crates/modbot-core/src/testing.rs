//! Shared fakes for unit tests.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    config::Config,
    context::BotContext,
    domain::{
        AclMode, ChannelId, EmojiRef, EntityKind, EntityRef, MessageId, MessageRef, RoleId,
        ServerId, UserId, VoteId,
    },
    errors::Error,
    platform::ChatPlatform,
    rights::CommandRight,
    store::{ControlRepository, MemoryStore, RightsRepository, VoteRepository},
    threshold::ControlSettings,
    votes::{NewVote, NewVotePoint, Vote, VoteState},
    Result,
};

pub const OWNER: UserId = UserId(1);
pub const BOT: UserId = UserId(1000);

pub fn tmp_path(prefix: &str, ext: &str) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    let pid = std::process::id();
    let n = SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("{prefix}-{pid}-{ts}-{n}.{ext}"))
}

pub fn test_config() -> Config {
    Config {
        bot_owners: vec![OWNER],
        bot_user_id: Some(BOT),
        database_path: ":memory:".into(),
        platform_timeout: Duration::from_secs(1),
        sweep_interval: Duration::from_millis(20),
        default_vote_emoji: EmojiRef::Unicode("🚫".into()),
        default_vote_label: "Against all".into(),
        audit_log_path: tmp_path("modbot-test-audit", "log"),
        audit_log_json: true,
    }
}

pub struct Harness {
    pub ctx: BotContext,
    pub platform: Arc<FakePlatform>,
    pub store: Arc<MemoryStore>,
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    harness_with_votes(store.clone(), store)
}

/// Vote reads succeed while activation and deletion fail.
pub fn harness_with_failing_vote_writes() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let votes = Arc::new(FailingVoteWrites(store.clone()));
    harness_with_votes(votes, store)
}

fn harness_with_votes(votes: Arc<dyn VoteRepository>, store: Arc<MemoryStore>) -> Harness {
    let platform = Arc::new(FakePlatform::new());
    let ctx = BotContext::new(
        Arc::new(test_config()),
        store.clone(),
        votes,
        store.clone(),
        platform.clone(),
    );
    Harness {
        ctx,
        platform,
        store,
    }
}

// ============== Platform ==============

pub struct FakePlatform {
    next_id: Mutex<u64>,
    sent: Mutex<Vec<(ChannelId, String)>>,
    edits: Mutex<Vec<(MessageRef, String)>>,
    added: Mutex<Vec<(MessageRef, EmojiRef)>>,
    removed: Mutex<Vec<(MessageRef, UserId, EmojiRef)>>,
    reactions: Mutex<HashMap<(MessageRef, EmojiRef), Vec<UserId>>>,
    roles: Mutex<HashMap<(ServerId, UserId), Vec<RoleId>>>,
    authors: Mutex<HashMap<MessageRef, UserId>>,
    categories: Mutex<HashMap<ChannelId, ChannelId>>,
    granted: Mutex<Vec<(ServerId, UserId, RoleId)>>,
    reactor_delay: Mutex<Option<Duration>>,
    fail_reactors: AtomicBool,
    fail_roles: AtomicBool,
    list_calls: AtomicUsize,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            added: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            reactions: Mutex::new(HashMap::new()),
            roles: Mutex::new(HashMap::new()),
            authors: Mutex::new(HashMap::new()),
            categories: Mutex::new(HashMap::new()),
            granted: Mutex::new(Vec::new()),
            reactor_delay: Mutex::new(None),
            fail_reactors: AtomicBool::new(false),
            fail_roles: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Record `user` as a reactor without going through the port.
    pub fn react(&self, msg: MessageRef, emoji: &EmojiRef, user: UserId) {
        let mut map = self.reactions.lock().unwrap();
        let users = map.entry((msg, emoji.clone())).or_default();
        if !users.contains(&user) {
            users.push(user);
        }
    }

    pub fn reactors(&self, msg: MessageRef, emoji: &EmojiRef) -> Vec<UserId> {
        self.reactions
            .lock()
            .unwrap()
            .get(&(msg, emoji.clone()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_roles(&self, server: ServerId, user: UserId, roles: Vec<RoleId>) {
        self.roles.lock().unwrap().insert((server, user), roles);
    }

    pub fn set_author(&self, msg: MessageRef, author: UserId) {
        self.authors.lock().unwrap().insert(msg, author);
    }

    pub fn set_category(&self, channel: ChannelId, category: ChannelId) {
        self.categories.lock().unwrap().insert(channel, category);
    }

    pub fn set_reactor_delay(&self, delay: Duration) {
        *self.reactor_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_list_reactors(&self, fail: bool) {
        self.fail_reactors.store(fail, Ordering::SeqCst);
    }

    pub fn fail_member_roles(&self, fail: bool) {
        self.fail_roles.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn edits(&self) -> Vec<String> {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn added_reactions(&self) -> Vec<(MessageRef, EmojiRef)> {
        self.added.lock().unwrap().clone()
    }

    pub fn removed_reactions(&self) -> Vec<(MessageRef, UserId, EmojiRef)> {
        self.removed.lock().unwrap().clone()
    }

    pub fn granted_roles(&self) -> Vec<(ServerId, UserId, RoleId)> {
        self.granted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<MessageId> {
        self.sent.lock().unwrap().push((channel, text.to_string()));
        let mut guard = self.next_id.lock().unwrap();
        let id = *guard;
        *guard += 1;
        Ok(MessageId(id))
    }

    async fn edit_message(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.edits.lock().unwrap().push((msg, text.to_string()));
        Ok(())
    }

    async fn add_reaction(&self, msg: MessageRef, emoji: &EmojiRef) -> Result<()> {
        self.added.lock().unwrap().push((msg, emoji.clone()));
        self.react(msg, emoji, BOT);
        Ok(())
    }

    async fn remove_reaction(&self, msg: MessageRef, user: UserId, emoji: &EmojiRef) -> Result<()> {
        self.removed
            .lock()
            .unwrap()
            .push((msg, user, emoji.clone()));
        if let Some(users) = self.reactions.lock().unwrap().get_mut(&(msg, emoji.clone())) {
            users.retain(|u| *u != user);
        }
        Ok(())
    }

    async fn list_reactors(&self, msg: MessageRef, emoji: &EmojiRef) -> Result<Vec<UserId>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.reactor_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if self.fail_reactors.load(Ordering::SeqCst) {
            return Err(Error::External("reactor fetch failed".to_string()));
        }
        Ok(self.reactors(msg, emoji))
    }

    async fn member_roles(&self, server: ServerId, user: UserId) -> Result<Vec<RoleId>> {
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(Error::External("member lookup failed".to_string()));
        }
        Ok(self
            .roles
            .lock()
            .unwrap()
            .get(&(server, user))
            .cloned()
            .unwrap_or_default())
    }

    async fn grant_role(&self, server: ServerId, user: UserId, role: RoleId) -> Result<()> {
        self.granted.lock().unwrap().push((server, user, role));
        let mut roles = self.roles.lock().unwrap();
        let held = roles.entry((server, user)).or_default();
        if !held.contains(&role) {
            held.push(role);
        }
        Ok(())
    }

    async fn message_author(&self, msg: MessageRef) -> Result<UserId> {
        self.authors
            .lock()
            .unwrap()
            .get(&msg)
            .copied()
            .ok_or_else(|| Error::External(format!("message {} not found", msg.message_id)))
    }

    async fn channel_category(&self, channel: ChannelId) -> Result<Option<ChannelId>> {
        Ok(self.categories.lock().unwrap().get(&channel).copied())
    }
}

// ============== Storage ==============

/// Every call fails, for fail-closed checks.
pub struct BrokenStore;

fn broken<T>() -> Result<T> {
    Err(Error::Storage("store unavailable".to_string()))
}

impl RightsRepository for BrokenStore {
    fn contains(&self, _: ServerId, _: &str, _: EntityRef) -> Result<bool> {
        broken()
    }
    fn insert(&self, _: &CommandRight) -> Result<bool> {
        broken()
    }
    fn remove(&self, _: ServerId, _: &str, _: EntityRef) -> Result<bool> {
        broken()
    }
    fn list(&self, _: ServerId, _: &str, _: EntityKind) -> Result<Vec<u64>> {
        broken()
    }
    fn list_server(&self, _: ServerId) -> Result<Vec<CommandRight>> {
        broken()
    }
    fn acl_mode(&self, _: ServerId) -> Result<AclMode> {
        broken()
    }
    fn set_acl_mode(&self, _: ServerId, _: AclMode) -> Result<()> {
        broken()
    }
}

impl VoteRepository for BrokenStore {
    fn insert_draft(&self, _: &NewVote, _: &[NewVotePoint], _: &[RoleId]) -> Result<VoteId> {
        broken()
    }
    fn get(&self, _: VoteId) -> Result<Option<Vote>> {
        broken()
    }
    fn find_active_by_message(&self, _: MessageId) -> Result<Option<Vote>> {
        broken()
    }
    fn activate(&self, _: VoteId, _: MessageId) -> Result<bool> {
        broken()
    }
    fn transition(&self, _: VoteId, _: &[VoteState], _: VoteState) -> Result<bool> {
        broken()
    }
    fn delete(&self, _: VoteId, _: &[VoteState]) -> Result<bool> {
        broken()
    }
    fn list_expired(&self, _: ServerId, _: DateTime<Utc>) -> Result<Vec<Vote>> {
        broken()
    }
    fn servers_with_active_votes(&self) -> Result<Vec<ServerId>> {
        broken()
    }
}

pub struct FailingVoteWrites(pub Arc<MemoryStore>);

impl VoteRepository for FailingVoteWrites {
    fn insert_draft(&self, v: &NewVote, p: &[NewVotePoint], r: &[RoleId]) -> Result<VoteId> {
        self.0.insert_draft(v, p, r)
    }
    fn get(&self, id: VoteId) -> Result<Option<Vote>> {
        self.0.get(id)
    }
    fn find_active_by_message(&self, message: MessageId) -> Result<Option<Vote>> {
        self.0.find_active_by_message(message)
    }
    fn activate(&self, _: VoteId, _: MessageId) -> Result<bool> {
        Err(Error::Storage("disk full".to_string()))
    }
    fn transition(&self, id: VoteId, from: &[VoteState], to: VoteState) -> Result<bool> {
        self.0.transition(id, from, to)
    }
    fn delete(&self, _: VoteId, _: &[VoteState]) -> Result<bool> {
        Err(Error::Storage("disk full".to_string()))
    }
    fn list_expired(&self, server: ServerId, now: DateTime<Utc>) -> Result<Vec<Vote>> {
        self.0.list_expired(server, now)
    }
    fn servers_with_active_votes(&self) -> Result<Vec<ServerId>> {
        self.0.servers_with_active_votes()
    }
}

impl ControlRepository for BrokenStore {
    fn settings(&self, _: ServerId) -> Result<Option<ControlSettings>> {
        broken()
    }
    fn upsert_settings(&self, _: &ControlSettings) -> Result<()> {
        broken()
    }
    fn is_control_user(&self, _: ServerId, _: UserId) -> Result<bool> {
        broken()
    }
    fn add_control_user(&self, _: ServerId, _: UserId) -> Result<bool> {
        broken()
    }
    fn remove_control_user(&self, _: ServerId, _: UserId) -> Result<bool> {
        broken()
    }
    fn control_users(&self, _: ServerId) -> Result<Vec<UserId>> {
        broken()
    }
}
