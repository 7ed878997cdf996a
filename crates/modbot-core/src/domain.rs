use std::{fmt, str::FromStr, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(
    /// Server (guild) id.
    ServerId
);
snowflake!(
    /// Member / user id.
    UserId
);
snowflake!(RoleId);
snowflake!(
    /// Text channel or category id. Categories are channels on the platform.
    ChannelId
);
snowflake!(MessageId);

/// Persisted vote id (storage generated).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoteId(pub i64);

impl fmt::Display for VoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stable reference to a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

// ============== Rights ==============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Role,
    Channel,
    Category,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::User,
        EntityKind::Role,
        EntityKind::Channel,
        EntityKind::Category,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Role => "role",
            EntityKind::Channel => "channel",
            EntityKind::Category => "category",
        }
    }

    /// Channel and category grants scope *where* a command runs, not *who* runs it.
    pub fn is_location(self) -> bool {
        matches!(self, EntityKind::Channel | EntityKind::Category)
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" | "member" => Ok(EntityKind::User),
            "role" => Ok(EntityKind::Role),
            "channel" => Ok(EntityKind::Channel),
            "category" => Ok(EntityKind::Category),
            other => Err(Error::Misconfigured(format!("unknown entity kind: {other}"))),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged `(kind, id)` pair a command right is granted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: u64,
}

impl EntityRef {
    pub fn user(id: UserId) -> Self {
        Self {
            kind: EntityKind::User,
            id: id.0,
        }
    }

    pub fn role(id: RoleId) -> Self {
        Self {
            kind: EntityKind::Role,
            id: id.0,
        }
    }

    pub fn channel(id: ChannelId) -> Self {
        Self {
            kind: EntityKind::Channel,
            id: id.0,
        }
    }

    pub fn category(id: ChannelId) -> Self {
        Self {
            kind: EntityKind::Category,
            id: id.0,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Whether channel/category scoping is enforced on top of user/role grants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclMode {
    Classic,
    #[default]
    Scoped,
}

impl AclMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AclMode::Classic => "classic",
            AclMode::Scoped => "scoped",
        }
    }
}

impl FromStr for AclMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "classic" => Ok(AclMode::Classic),
            "scoped" | "channel" => Ok(AclMode::Scoped),
            other => Err(Error::Misconfigured(format!("unknown acl mode: {other}"))),
        }
    }
}

// ============== Emoji ==============

/// A reaction emoji: a unicode sequence or a platform custom emoji id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmojiRef {
    Unicode(String),
    Custom(u64),
}

fn custom_emoji_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^<a?:[A-Za-z0-9_~]+:([0-9]+)>$").expect("valid regex"))
}

impl EmojiRef {
    /// Parse `"👍"`, a bare custom emoji id, or a `<:name:id>` / `<a:name:id>` mention.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(caps) = custom_emoji_re().captures(raw) {
            return caps[1].parse().ok().map(EmojiRef::Custom);
        }
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            return raw.parse().ok().map(EmojiRef::Custom);
        }
        Some(EmojiRef::Unicode(raw.to_string()))
    }

    /// Storage form: the unicode text, or the custom id as decimal digits.
    pub fn to_storage(&self) -> String {
        match self {
            EmojiRef::Unicode(s) => s.clone(),
            EmojiRef::Custom(id) => id.to_string(),
        }
    }
}

impl fmt::Display for EmojiRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmojiRef::Unicode(s) => f.write_str(s),
            EmojiRef::Custom(id) => write!(f, "<:e:{id}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_emoji_forms() {
        assert_eq!(
            EmojiRef::parse("👍"),
            Some(EmojiRef::Unicode("👍".to_string()))
        );
        assert_eq!(
            EmojiRef::parse("<:yes:123456>"),
            Some(EmojiRef::Custom(123456))
        );
        assert_eq!(EmojiRef::parse("<a:dance:42>"), Some(EmojiRef::Custom(42)));
        assert_eq!(EmojiRef::parse(" 987 "), Some(EmojiRef::Custom(987)));
        assert_eq!(EmojiRef::parse("   "), None);
    }

    #[test]
    fn storage_form_parses_back() {
        for e in [EmojiRef::Unicode("✅".into()), EmojiRef::Custom(77)] {
            assert_eq!(EmojiRef::parse(&e.to_storage()), Some(e));
        }
    }

    #[test]
    fn entity_kind_and_acl_mode_from_str() {
        assert_eq!("Role".parse::<EntityKind>().unwrap(), EntityKind::Role);
        assert_eq!("member".parse::<EntityKind>().unwrap(), EntityKind::User);
        assert!("planet".parse::<EntityKind>().is_err());
        assert_eq!("CLASSIC".parse::<AclMode>().unwrap(), AclMode::Classic);
        assert_eq!(AclMode::default(), AclMode::Scoped);
    }
}
