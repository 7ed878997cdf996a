use async_trait::async_trait;

use crate::{
    domain::{ChannelId, EmojiRef, MessageId, MessageRef, RoleId, ServerId, UserId},
    Result,
};

/// Cross-platform chat port.
///
/// Every call is fallible; callers wrap implementations in [`TimedPlatform`]
/// so no call blocks the event path for longer than the configured bound.
///
/// [`TimedPlatform`]: crate::platform::TimedPlatform
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<MessageId>;
    async fn edit_message(&self, msg: MessageRef, text: &str) -> Result<()>;

    async fn add_reaction(&self, msg: MessageRef, emoji: &EmojiRef) -> Result<()>;
    /// Remove one user's reaction with `emoji` from `msg`.
    async fn remove_reaction(&self, msg: MessageRef, user: UserId, emoji: &EmojiRef)
        -> Result<()>;
    /// Everyone currently reacting to `msg` with `emoji`.
    async fn list_reactors(&self, msg: MessageRef, emoji: &EmojiRef) -> Result<Vec<UserId>>;

    async fn member_roles(&self, server: ServerId, user: UserId) -> Result<Vec<RoleId>>;
    async fn grant_role(&self, server: ServerId, user: UserId, role: RoleId) -> Result<()>;

    async fn message_author(&self, msg: MessageRef) -> Result<UserId>;
    /// Parent category of a channel, if any.
    async fn channel_category(&self, channel: ChannelId) -> Result<Option<ChannelId>>;
}
