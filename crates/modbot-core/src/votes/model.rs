use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChannelId, EmojiRef, MessageId, MessageRef, RoleId, ServerId, VoteId},
    errors::Error,
    Result,
};

/// Draft → Active → {Completed, Expired, Deleted}.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteState {
    Draft,
    Active,
    Completed,
    Expired,
    Deleted,
}

impl VoteState {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteState::Draft => "draft",
            VoteState::Active => "active",
            VoteState::Completed => "completed",
            VoteState::Expired => "expired",
            VoteState::Deleted => "deleted",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            VoteState::Completed | VoteState::Expired | VoteState::Deleted
        )
    }
}

impl FromStr for VoteState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(VoteState::Draft),
            "active" => Ok(VoteState::Active),
            "completed" => Ok(VoteState::Completed),
            "expired" => Ok(VoteState::Expired),
            "deleted" => Ok(VoteState::Deleted),
            other => Err(Error::Storage(format!("unknown vote state: {other}"))),
        }
    }
}

impl fmt::Display for VoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VotePoint {
    pub id: i64,
    pub vote_id: VoteId,
    pub label: String,
    pub emoji: EmojiRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewVotePoint {
    pub label: String,
    pub emoji: EmojiRef,
}

impl NewVotePoint {
    pub fn new(label: impl Into<String>, emoji: EmojiRef) -> Self {
        Self {
            label: label.into(),
            emoji,
        }
    }
}

/// Everything needed to persist a draft vote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewVote {
    pub server_id: ServerId,
    pub channel_id: ChannelId,
    pub text: String,
    pub finish_time: Option<DateTime<Utc>>,
    pub is_exceptional: bool,
    pub has_default: bool,
    pub win_threshold: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub id: VoteId,
    pub server_id: ServerId,
    pub channel_id: ChannelId,
    /// `None` until the vote is activated.
    pub message_id: Option<MessageId>,
    pub text: String,
    pub finish_time: Option<DateTime<Utc>>,
    pub is_exceptional: bool,
    pub has_default: bool,
    pub win_threshold: u32,
    pub state: VoteState,
    pub points: Vec<VotePoint>,
    pub role_filter: Vec<RoleId>,
}

/// One selectable reaction of a vote, in display order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteOption {
    pub label: String,
    pub emoji: EmojiRef,
    pub is_default: bool,
}

impl Vote {
    pub fn has_timer(&self) -> bool {
        self.finish_time.is_some()
    }

    /// Whether the implicit default option takes part in the vote.
    pub fn uses_default(&self) -> bool {
        self.has_default || self.win_threshold > 0
    }

    pub fn message(&self) -> Option<MessageRef> {
        self.message_id.map(|message_id| MessageRef {
            channel_id: self.channel_id,
            message_id,
        })
    }

    /// Selectable options: the implicit default (if any) at index 0, then the points.
    pub fn options(&self, default_emoji: &EmojiRef, default_label: &str) -> Vec<VoteOption> {
        let mut out = Vec::with_capacity(self.points.len() + 1);
        if self.uses_default() {
            out.push(VoteOption {
                label: default_label.to_string(),
                emoji: default_emoji.clone(),
                is_default: true,
            });
        }
        out.extend(self.points.iter().map(|p| VoteOption {
            label: p.label.clone(),
            emoji: p.emoji.clone(),
            is_default: false,
        }));
        out
    }

    pub fn is_valid_emoji(&self, emoji: &EmojiRef, default_emoji: &EmojiRef) -> bool {
        self.points.iter().any(|p| &p.emoji == emoji)
            || (self.uses_default() && emoji == default_emoji)
    }

    /// Empty role filter means anyone may vote.
    pub fn admits_roles(&self, roles: &[RoleId]) -> bool {
        self.role_filter.is_empty() || roles.iter().any(|r| self.role_filter.contains(r))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.state == VoteState::Active && self.finish_time.is_some_and(|t| t <= now)
    }
}
