//! Embedded schema migration for the relational half of the store.

use rusqlite::Connection;

use agentdb_core::errors::{AgentDbResult, StorageError};

pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS episodes (
    id          TEXT PRIMARY KEY,
    task_id     TEXT NOT NULL,
    start_time  INTEGER NOT NULL,
    end_time    INTEGER,
    metadata    TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_episodes_task_time ON episodes(task_id, start_time);
CREATE INDEX IF NOT EXISTS idx_episodes_start_time ON episodes(start_time);
CREATE INDEX IF NOT EXISTS idx_episodes_end_time ON episodes(end_time);

CREATE TABLE IF NOT EXISTS episode_links (
    source_id   TEXT NOT NULL REFERENCES episodes(id) ON DELETE CASCADE,
    target_id   TEXT NOT NULL REFERENCES episodes(id) ON DELETE CASCADE,
    link_type   TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    PRIMARY KEY (source_id, target_id)
);

CREATE INDEX IF NOT EXISTS idx_episode_links_target ON episode_links(target_id);
";

pub(crate) fn sql_err(err: rusqlite::Error) -> agentdb_core::errors::AgentDbError {
    StorageError::sqlite(err.to_string()).into()
}

/// Applies pragmas and creates the schema. WAL journaling keeps readers
/// unblocked during the store's write transactions.
pub(crate) fn migrate(conn: &Connection, busy_timeout_ms: u64) -> AgentDbResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL").map_err(sql_err)?;
    conn.pragma_update(None, "synchronous", "NORMAL").map_err(sql_err)?;
    conn.pragma_update(None, "foreign_keys", "ON").map_err(sql_err)?;
    conn.pragma_update(None, "busy_timeout", busy_timeout_ms as i64)
        .map_err(sql_err)?;
    conn.execute_batch(SCHEMA).map_err(sql_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn, 1_000).unwrap();
        migrate(&conn, 1_000).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('episodes', 'episode_links')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
