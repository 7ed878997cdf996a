use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Snowflake ids are stored as `INTEGER` (bit-cast from `u64`).
/// `message_id = 0` marks a draft vote. Vote child rows carry no foreign
/// keys: deleting a vote purges them explicitly.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS command_rights (
            server_id       INTEGER NOT NULL,
            command_prefix  TEXT NOT NULL,
            entity_kind     TEXT NOT NULL,
            entity_id       INTEGER NOT NULL,
            created_at      TEXT NOT NULL,
            UNIQUE(server_id, command_prefix, entity_kind, entity_id)
        );

        CREATE INDEX IF NOT EXISTS idx_rights_lookup
            ON command_rights(server_id, command_prefix, entity_kind);

        CREATE TABLE IF NOT EXISTS server_settings (
            server_id   INTEGER PRIMARY KEY,
            acl_mode    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS votes (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            server_id       INTEGER NOT NULL,
            channel_id      INTEGER NOT NULL,
            message_id      INTEGER NOT NULL DEFAULT 0,
            text            TEXT NOT NULL,
            has_timer       INTEGER NOT NULL DEFAULT 0,
            finish_at_ms    INTEGER,
            is_exceptional  INTEGER NOT NULL DEFAULT 0,
            has_default     INTEGER NOT NULL DEFAULT 0,
            win_threshold   INTEGER NOT NULL DEFAULT 0,
            state           TEXT NOT NULL DEFAULT 'draft'
        );

        CREATE INDEX IF NOT EXISTS idx_votes_message
            ON votes(message_id);
        CREATE INDEX IF NOT EXISTS idx_votes_state
            ON votes(state, server_id, finish_at_ms);

        CREATE TABLE IF NOT EXISTS vote_points (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            vote_id     INTEGER NOT NULL,
            position    INTEGER NOT NULL,
            label       TEXT NOT NULL,
            emoji_id    INTEGER,
            emoji_name  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_vote_points_vote
            ON vote_points(vote_id, position);

        CREATE TABLE IF NOT EXISTS vote_roles (
            vote_id     INTEGER NOT NULL,
            role_id     INTEGER NOT NULL,
            message_id  INTEGER NOT NULL DEFAULT 0,
            UNIQUE(vote_id, role_id)
        );

        CREATE INDEX IF NOT EXISTS idx_vote_roles_message
            ON vote_roles(message_id);

        CREATE TABLE IF NOT EXISTS control_settings (
            server_id       INTEGER PRIMARY KEY,
            assign_role_id  INTEGER NOT NULL DEFAULT 0,
            threshold       INTEGER NOT NULL DEFAULT 0,
            emoji_id        INTEGER,
            emoji_name      TEXT
        );

        CREATE TABLE IF NOT EXISTS control_users (
            server_id   INTEGER NOT NULL,
            user_id     INTEGER NOT NULL,
            PRIMARY KEY (server_id, user_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
