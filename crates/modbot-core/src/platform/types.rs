use crate::domain::{ChannelId, EmojiRef, MessageId, MessageRef, ServerId, UserId};

/// A reaction-add (or reaction-remove) notification from the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionEvent {
    pub server_id: ServerId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub emoji: EmojiRef,
}

impl ReactionEvent {
    pub fn message(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            message_id: self.message_id,
        }
    }
}
