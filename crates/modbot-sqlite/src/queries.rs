use crate::SqliteStore;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use modbot_core::{
    domain::{AclMode, ChannelId, EmojiRef, EntityKind, EntityRef, MessageId, RoleId, ServerId, UserId, VoteId},
    rights::CommandRight,
    threshold::ControlSettings,
    votes::{NewVote, NewVotePoint, Vote, VotePoint, VoteState},
};
use rusqlite::{types::ToSql, Connection};

const VOTE_COLUMNS: &str = "id, server_id, channel_id, message_id, text, has_timer, finish_at_ms, \
                            is_exceptional, has_default, win_threshold, state";

impl SqliteStore {
    // -- Command rights --

    pub fn right_exists(&self, server: ServerId, prefix: &str, entity: EntityRef) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM command_rights
                 WHERE server_id = ?1 AND command_prefix = ?2 AND entity_kind = ?3 AND entity_id = ?4)",
                rusqlite::params![
                    sql_id(server.0),
                    prefix,
                    entity.kind.as_str(),
                    sql_id(entity.id)
                ],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    /// `false` when the right already existed (the unique key absorbs the insert).
    pub fn insert_right(&self, right: &CommandRight) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO command_rights
                 (server_id, command_prefix, entity_kind, entity_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    sql_id(right.server_id.0),
                    right.command_prefix,
                    right.entity.kind.as_str(),
                    sql_id(right.entity.id),
                    right.created_at,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_right(&self, server: ServerId, prefix: &str, entity: EntityRef) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM command_rights
                 WHERE server_id = ?1 AND command_prefix = ?2 AND entity_kind = ?3 AND entity_id = ?4",
                rusqlite::params![
                    sql_id(server.0),
                    prefix,
                    entity.kind.as_str(),
                    sql_id(entity.id)
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn list_right_ids(&self, server: ServerId, prefix: &str, kind: EntityKind) -> Result<Vec<u64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT entity_id FROM command_rights
                 WHERE server_id = ?1 AND command_prefix = ?2 AND entity_kind = ?3
                 ORDER BY entity_id",
            )?;
            let ids = stmt
                .query_map(
                    rusqlite::params![sql_id(server.0), prefix, kind.as_str()],
                    |row| row.get::<_, i64>(0),
                )?
                .map(|r| r.map(from_sql_id))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    pub fn list_server_rights(&self, server: ServerId) -> Result<Vec<CommandRight>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT command_prefix, entity_kind, entity_id, created_at FROM command_rights
                 WHERE server_id = ?1
                 ORDER BY command_prefix, entity_kind, entity_id",
            )?;
            let rows = stmt
                .query_map([sql_id(server.0)], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, DateTime<Utc>>(3)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(command_prefix, kind, id, created_at)| -> Result<CommandRight> {
                    Ok(CommandRight {
                        server_id: server,
                        command_prefix,
                        entity: EntityRef {
                            kind: kind.parse::<EntityKind>()?,
                            id: from_sql_id(id),
                        },
                        created_at,
                    })
                })
                .collect()
        })
    }

    pub fn get_acl_mode(&self, server: ServerId) -> Result<AclMode> {
        self.with_conn(|conn| {
            let mode: Option<String> = conn
                .query_row(
                    "SELECT acl_mode FROM server_settings WHERE server_id = ?1",
                    [sql_id(server.0)],
                    |row| row.get(0),
                )
                .optional()?;
            match mode {
                Some(m) => Ok(m.parse::<AclMode>()?),
                None => Ok(AclMode::default()),
            }
        })
    }

    pub fn put_acl_mode(&self, server: ServerId, mode: AclMode) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO server_settings (server_id, acl_mode) VALUES (?1, ?2)
                 ON CONFLICT(server_id) DO UPDATE SET acl_mode = excluded.acl_mode",
                rusqlite::params![sql_id(server.0), mode.as_str()],
            )?;
            Ok(())
        })
    }

    // -- Votes --

    pub fn insert_vote_draft(
        &self,
        vote: &NewVote,
        points: &[NewVotePoint],
        role_filter: &[RoleId],
    ) -> Result<VoteId> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO votes
                 (server_id, channel_id, text, has_timer, finish_at_ms, is_exceptional, has_default, win_threshold, state)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'draft')",
                rusqlite::params![
                    sql_id(vote.server_id.0),
                    sql_id(vote.channel_id.0),
                    vote.text,
                    vote.finish_time.is_some(),
                    vote.finish_time.map(|t| t.timestamp_millis()),
                    vote.is_exceptional,
                    vote.has_default,
                    vote.win_threshold,
                ],
            )?;
            let id = tx.last_insert_rowid();

            for (position, p) in points.iter().enumerate() {
                let (emoji_id, emoji_name) = emoji_columns(&p.emoji);
                tx.execute(
                    "INSERT INTO vote_points (vote_id, position, label, emoji_id, emoji_name)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![id, position as i64, p.label, emoji_id, emoji_name],
                )?;
            }
            for role in role_filter {
                tx.execute(
                    "INSERT OR IGNORE INTO vote_roles (vote_id, role_id) VALUES (?1, ?2)",
                    rusqlite::params![id, sql_id(role.0)],
                )?;
            }

            tx.commit()?;
            Ok(VoteId(id))
        })
    }

    pub fn get_vote(&self, id: VoteId) -> Result<Option<Vote>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {VOTE_COLUMNS} FROM votes WHERE id = ?1");
            let row = conn.query_row(&sql, [id.0], read_vote_row).optional()?;
            row.map(|r| {
                let roles = query_roles(conn, "vote_id", r.id)?;
                hydrate_vote(conn, r, roles)
            })
            .transpose()
        })
    }

    /// Role filter rows are looked up through their denormalised message id.
    pub fn get_active_vote_by_message(&self, message: MessageId) -> Result<Option<Vote>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {VOTE_COLUMNS} FROM votes WHERE message_id = ?1 AND state = 'active' LIMIT 1"
            );
            let row = conn
                .query_row(&sql, [sql_id(message.0)], read_vote_row)
                .optional()?;
            row.map(|r| {
                let roles = query_roles(conn, "message_id", sql_id(message.0))?;
                hydrate_vote(conn, r, roles)
            })
            .transpose()
        })
    }

    pub fn activate_vote(&self, id: VoteId, message: MessageId) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE votes SET message_id = ?2, state = 'active' WHERE id = ?1 AND state = 'draft'",
                rusqlite::params![id.0, sql_id(message.0)],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            tx.execute(
                "UPDATE vote_roles SET message_id = ?2 WHERE vote_id = ?1",
                rusqlite::params![id.0, sql_id(message.0)],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn transition_vote(&self, id: VoteId, from: &[VoteState], to: VoteState) -> Result<bool> {
        self.with_conn(|conn| update_state(conn, id, from, to))
    }

    /// Move the vote to `deleted` and drop its points and role rows in one
    /// transaction. `false` (nothing written) when the state is not in `from`.
    pub fn delete_vote(&self, id: VoteId, from: &[VoteState]) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !update_state(&tx, id, from, VoteState::Deleted)? {
                return Ok(false);
            }
            tx.execute("DELETE FROM vote_points WHERE vote_id = ?1", [id.0])?;
            tx.execute("DELETE FROM vote_roles WHERE vote_id = ?1", [id.0])?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn list_expired_votes(&self, server: ServerId, now: DateTime<Utc>) -> Result<Vec<Vote>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {VOTE_COLUMNS} FROM votes
                 WHERE server_id = ?1 AND state = 'active' AND has_timer = 1 AND finish_at_ms <= ?2
                 ORDER BY finish_at_ms, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![sql_id(server.0), now.timestamp_millis()],
                    read_vote_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|r| {
                    let roles = query_roles(conn, "vote_id", r.id)?;
                    hydrate_vote(conn, r, roles)
                })
                .collect()
        })
    }

    pub fn list_servers_with_active_votes(&self) -> Result<Vec<ServerId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT server_id FROM votes WHERE state = 'active' ORDER BY server_id",
            )?;
            let servers = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .map(|r| r.map(|id| ServerId(from_sql_id(id))))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(servers)
        })
    }

    // -- Threshold control --

    pub fn get_control_settings(&self, server: ServerId) -> Result<Option<ControlSettings>> {
        self.with_conn(|conn| {
            let settings = conn
                .query_row(
                    "SELECT assign_role_id, threshold, emoji_id, emoji_name
                     FROM control_settings WHERE server_id = ?1",
                    [sql_id(server.0)],
                    |row| {
                        let role: i64 = row.get(0)?;
                        Ok(ControlSettings {
                            server_id: server,
                            assign_role: (role != 0).then(|| RoleId(from_sql_id(role))),
                            threshold: row.get(1)?,
                            emoji: emoji_from_columns(row.get(2)?, row.get(3)?),
                        })
                    },
                )
                .optional()?;
            Ok(settings)
        })
    }

    pub fn put_control_settings(&self, settings: &ControlSettings) -> Result<()> {
        let (emoji_id, emoji_name) = settings
            .emoji
            .as_ref()
            .map(emoji_columns)
            .unwrap_or((None, None));
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO control_settings (server_id, assign_role_id, threshold, emoji_id, emoji_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(server_id) DO UPDATE SET
                     assign_role_id = excluded.assign_role_id,
                     threshold = excluded.threshold,
                     emoji_id = excluded.emoji_id,
                     emoji_name = excluded.emoji_name",
                rusqlite::params![
                    sql_id(settings.server_id.0),
                    settings.assign_role.map_or(0, |r| sql_id(r.0)),
                    settings.threshold,
                    emoji_id,
                    emoji_name,
                ],
            )?;
            Ok(())
        })
    }

    pub fn control_user_exists(&self, server: ServerId, user: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM control_users WHERE server_id = ?1 AND user_id = ?2)",
                rusqlite::params![sql_id(server.0), sql_id(user.0)],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    pub fn insert_control_user(&self, server: ServerId, user: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO control_users (server_id, user_id) VALUES (?1, ?2)",
                rusqlite::params![sql_id(server.0), sql_id(user.0)],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_control_user(&self, server: ServerId, user: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM control_users WHERE server_id = ?1 AND user_id = ?2",
                rusqlite::params![sql_id(server.0), sql_id(user.0)],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn list_control_users(&self, server: ServerId) -> Result<Vec<UserId>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT user_id FROM control_users WHERE server_id = ?1 ORDER BY user_id")?;
            let users = stmt
                .query_map([sql_id(server.0)], |row| row.get::<_, i64>(0))?
                .map(|r| r.map(|id| UserId(from_sql_id(id))))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }
}

// -- Row mapping --

struct VoteRow {
    id: i64,
    server_id: i64,
    channel_id: i64,
    message_id: i64,
    text: String,
    has_timer: bool,
    finish_at_ms: Option<i64>,
    is_exceptional: bool,
    has_default: bool,
    win_threshold: u32,
    state: String,
}

fn read_vote_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VoteRow> {
    Ok(VoteRow {
        id: row.get(0)?,
        server_id: row.get(1)?,
        channel_id: row.get(2)?,
        message_id: row.get(3)?,
        text: row.get(4)?,
        has_timer: row.get(5)?,
        finish_at_ms: row.get(6)?,
        is_exceptional: row.get(7)?,
        has_default: row.get(8)?,
        win_threshold: row.get(9)?,
        state: row.get(10)?,
    })
}

fn hydrate_vote(conn: &Connection, row: VoteRow, role_filter: Vec<RoleId>) -> Result<Vote> {
    let finish_time = match (row.has_timer, row.finish_at_ms) {
        (true, Some(ms)) => Some(
            DateTime::<Utc>::from_timestamp_millis(ms)
                .ok_or_else(|| anyhow!("vote {} has an invalid finish time: {ms}", row.id))?,
        ),
        _ => None,
    };

    Ok(Vote {
        id: VoteId(row.id),
        server_id: ServerId(from_sql_id(row.server_id)),
        channel_id: ChannelId(from_sql_id(row.channel_id)),
        message_id: (row.message_id != 0).then(|| MessageId(from_sql_id(row.message_id))),
        text: row.text,
        finish_time,
        is_exceptional: row.is_exceptional,
        has_default: row.has_default,
        win_threshold: row.win_threshold,
        state: row.state.parse()?,
        points: query_points(conn, row.id)?,
        role_filter,
    })
}

/// Compare-and-set on `votes.state`.
fn update_state(conn: &Connection, id: VoteId, from: &[VoteState], to: VoteState) -> Result<bool> {
    if from.is_empty() {
        return Ok(false);
    }
    let placeholders: Vec<String> = (0..from.len()).map(|i| format!("?{}", i + 3)).collect();
    let sql = format!(
        "UPDATE votes SET state = ?2 WHERE id = ?1 AND state IN ({})",
        placeholders.join(", ")
    );
    let to_str = to.as_str();
    let from_strs: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(from.len() + 2);
    params.push(&id.0);
    params.push(&to_str);
    params.extend(from_strs.iter().map(|s| s as &dyn ToSql));

    let changed = conn.execute(&sql, params.as_slice())?;
    Ok(changed > 0)
}

fn query_points(conn: &Connection, vote_id: i64) -> Result<Vec<VotePoint>> {
    let mut stmt = conn.prepare(
        "SELECT id, label, emoji_id, emoji_name FROM vote_points
         WHERE vote_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map([vote_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, label, emoji_id, emoji_name)| -> Result<VotePoint> {
            let emoji = emoji_from_columns(emoji_id, emoji_name)
                .ok_or_else(|| anyhow!("vote point {id} has no emoji"))?;
            Ok(VotePoint {
                id,
                vote_id: VoteId(vote_id),
                label,
                emoji,
            })
        })
        .collect()
}

/// `column` is either `vote_id` or the denormalised `message_id`.
fn query_roles(conn: &Connection, column: &str, key: i64) -> Result<Vec<RoleId>> {
    let sql = format!("SELECT role_id FROM vote_roles WHERE {column} = ?1 ORDER BY role_id");
    let mut stmt = conn.prepare(&sql)?;
    let roles = stmt
        .query_map([key], |row| row.get::<_, i64>(0))?
        .map(|r| r.map(|id| RoleId(from_sql_id(id))))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(roles)
}

fn sql_id(id: u64) -> i64 {
    id as i64
}

fn from_sql_id(id: i64) -> u64 {
    id as u64
}

/// Custom emoji are stored by id, unicode emoji by name.
fn emoji_columns(emoji: &EmojiRef) -> (Option<i64>, Option<String>) {
    match emoji {
        EmojiRef::Custom(id) => (Some(sql_id(*id)), None),
        EmojiRef::Unicode(name) => (None, Some(name.clone())),
    }
}

fn emoji_from_columns(id: Option<i64>, name: Option<String>) -> Option<EmojiRef> {
    match (id, name) {
        (Some(id), _) => Some(EmojiRef::Custom(from_sql_id(id))),
        (None, Some(name)) if !name.is_empty() => Some(EmojiRef::Unicode(name)),
        _ => None,
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
