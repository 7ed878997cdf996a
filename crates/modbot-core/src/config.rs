use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{EmojiRef, UserId},
    errors::Error,
    Result,
};

/// Typed configuration, loaded from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Identity
    pub bot_owners: Vec<UserId>,
    pub bot_user_id: Option<UserId>,

    // Storage
    pub database_path: PathBuf,

    // Collaborator bounds
    pub platform_timeout: Duration,
    pub sweep_interval: Duration,

    // Votes
    pub default_vote_emoji: EmojiRef,
    pub default_vote_label: String,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_owners = parse_csv_u64(env_str("BOT_OWNERS"))
            .into_iter()
            .map(UserId)
            .collect::<Vec<_>>();
        if bot_owners.is_empty() {
            return Err(Error::Config(
                "BOT_OWNERS environment variable is required".to_string(),
            ));
        }
        let bot_user_id = env_u64("BOT_USER_ID").map(UserId);

        let database_path =
            PathBuf::from(env_str("DATABASE_PATH").unwrap_or("modbot.sqlite3".to_string()));

        let platform_timeout =
            Duration::from_millis(env_u64("PLATFORM_TIMEOUT_MS").unwrap_or(5_000).max(1));
        let sweep_interval =
            Duration::from_secs(env_u64("VOTE_SWEEP_INTERVAL_SECS").unwrap_or(30).max(1));

        let raw_emoji = env_str("DEFAULT_VOTE_EMOJI").unwrap_or("🚫".to_string());
        let default_vote_emoji = EmojiRef::parse(&raw_emoji)
            .ok_or_else(|| Error::Config("DEFAULT_VOTE_EMOJI must not be empty".to_string()))?;
        let default_vote_label = env_str("DEFAULT_VOTE_LABEL")
            .and_then(non_empty)
            .unwrap_or("Against all".to_string());

        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/modbot-audit.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(true);

        Ok(Self {
            bot_owners,
            bot_user_id,
            database_path,
            platform_timeout,
            sweep_interval,
            default_vote_emoji,
            default_vote_label,
            audit_log_path,
            audit_log_json,
        })
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        self.bot_owners.contains(&user)
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (key, val) in contents.lines().filter_map(dotenv_entry) {
        // Variables already in the environment win over the file.
        if env::var_os(key).is_none() {
            env::set_var(key, val);
        }
    }
}

/// `KEY=value`, `KEY="value"` or `export KEY='value'`; blanks and `#` comments yield `None`.
fn dotenv_entry(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, val) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let val = val.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| val.strip_prefix(*q)?.strip_suffix(*q))
        .unwrap_or(val);
    Some((key, unquoted))
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_csv_u64(v: Option<String>) -> Vec<u64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<u64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
