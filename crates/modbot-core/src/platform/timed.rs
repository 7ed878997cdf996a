use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::warn;

use crate::{
    domain::{ChannelId, EmojiRef, MessageId, MessageRef, RoleId, ServerId, UserId},
    errors::Error,
    platform::port::ChatPlatform,
    Result,
};

/// ChatPlatform decorator that bounds every call by a fixed wait.
///
/// A call that outlives the bound is abandoned and reported as
/// [`Error::Timeout`]. Nothing is retried here or anywhere above.
pub struct TimedPlatform {
    inner: Arc<dyn ChatPlatform>,
    limit: Duration,
}

impl TimedPlatform {
    pub fn new(inner: Arc<dyn ChatPlatform>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    async fn bounded<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match timeout(self.limit, fut).await {
            Ok(res) => res,
            Err(_) => {
                warn!(op, limit_ms = self.limit.as_millis() as u64, "platform call timed out");
                Err(Error::Timeout {
                    op,
                    after: self.limit,
                })
            }
        }
    }
}

#[async_trait]
impl ChatPlatform for TimedPlatform {
    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<MessageId> {
        self.bounded("send_message", self.inner.send_message(channel, text))
            .await
    }

    async fn edit_message(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.bounded("edit_message", self.inner.edit_message(msg, text))
            .await
    }

    async fn add_reaction(&self, msg: MessageRef, emoji: &EmojiRef) -> Result<()> {
        self.bounded("add_reaction", self.inner.add_reaction(msg, emoji))
            .await
    }

    async fn remove_reaction(
        &self,
        msg: MessageRef,
        user: UserId,
        emoji: &EmojiRef,
    ) -> Result<()> {
        self.bounded(
            "remove_reaction",
            self.inner.remove_reaction(msg, user, emoji),
        )
        .await
    }

    async fn list_reactors(&self, msg: MessageRef, emoji: &EmojiRef) -> Result<Vec<UserId>> {
        self.bounded("list_reactors", self.inner.list_reactors(msg, emoji))
            .await
    }

    async fn member_roles(&self, server: ServerId, user: UserId) -> Result<Vec<RoleId>> {
        self.bounded("member_roles", self.inner.member_roles(server, user))
            .await
    }

    async fn grant_role(&self, server: ServerId, user: UserId, role: RoleId) -> Result<()> {
        self.bounded("grant_role", self.inner.grant_role(server, user, role))
            .await
    }

    async fn message_author(&self, msg: MessageRef) -> Result<UserId> {
        self.bounded("message_author", self.inner.message_author(msg))
            .await
    }

    async fn channel_category(&self, channel: ChannelId) -> Result<Option<ChannelId>> {
        self.bounded("channel_category", self.inner.channel_category(channel))
            .await
    }
}
