use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (topics + message links)");
        conn.execute_batch(
            "
            CREATE TABLE topics (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL UNIQUE,
                thread_id       INTEGER NOT NULL DEFAULT 0,
                is_banned       INTEGER NOT NULL DEFAULT 0,
                verification    INTEGER NOT NULL DEFAULT 0,
                challenge_id    INTEGER NOT NULL DEFAULT 0,
                challenge_sent  INTEGER NOT NULL DEFAULT 0,
                language_code   TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX idx_topics_thread ON topics(thread_id);

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                topic_id        INTEGER NOT NULL,
                user_msg_id     INTEGER NOT NULL,
                topic_msg_id    INTEGER NOT NULL,
                created_at      INTEGER NOT NULL,
                UNIQUE(topic_id, user_msg_id),
                UNIQUE(topic_id, topic_msg_id)
            );

            CREATE INDEX idx_messages_created ON messages(created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
