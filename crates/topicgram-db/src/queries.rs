use crate::Database;
use crate::models::{MessageLink, Topic, Verification};
use anyhow::Result;
use rusqlite::{Connection, Row};

const TOPIC_COLUMNS: &str =
    "id, user_id, thread_id, is_banned, verification, challenge_id, challenge_sent, language_code";

impl Database {
    // -- Topics --

    pub fn find_topic_by_user(&self, user_id: i64) -> Result<Option<Topic>> {
        self.with_conn(|conn| query_topic(conn, "user_id", user_id))
    }

    /// Reverse lookup by platform thread id. Thread 0 is the general channel
    /// and never belongs to a user.
    pub fn find_topic_by_thread(&self, thread_id: i32) -> Result<Option<Topic>> {
        if thread_id == 0 {
            return Ok(None);
        }
        self.with_conn(|conn| query_topic(conn, "thread_id", thread_id as i64))
    }

    /// Inserts the row when it has no id yet (and assigns it), otherwise
    /// updates it in place.
    pub fn save_topic(&self, topic: &mut Topic) -> Result<()> {
        self.with_conn_mut(|conn| {
            if topic.is_persisted() {
                conn.execute(
                    "UPDATE topics SET user_id = ?1, thread_id = ?2, is_banned = ?3, verification = ?4,
                        challenge_id = ?5, challenge_sent = ?6, language_code = ?7
                     WHERE id = ?8",
                    rusqlite::params![
                        topic.user_id,
                        topic.thread_id,
                        topic.is_banned,
                        topic.verification.as_i64(),
                        topic.challenge_id as i64,
                        topic.challenge_sent,
                        topic.language_code,
                        topic.id,
                    ],
                )?;
            } else {
                conn.execute(
                    "INSERT INTO topics (user_id, thread_id, is_banned, verification, challenge_id, challenge_sent, language_code)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        topic.user_id,
                        topic.thread_id,
                        topic.is_banned,
                        topic.verification.as_i64(),
                        topic.challenge_id as i64,
                        topic.challenge_sent,
                        topic.language_code,
                    ],
                )?;
                topic.id = conn.last_insert_rowid();
            }
            Ok(())
        })
    }

    /// Removes the row. Unsaved rows are a no-op.
    pub fn delete_topic(&self, topic: &mut Topic) -> Result<()> {
        if !topic.is_persisted() {
            return Ok(());
        }
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM topics WHERE id = ?1", [topic.id])?;
            Ok(())
        })?;
        topic.id = 0;
        Ok(())
    }

    /// Resets `Pending` rows whose challenge was issued at or before `cutoff`
    /// (unix seconds) back to `NotSent`. Returns the number of rows touched.
    pub fn reset_expired_challenges(&self, cutoff: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE topics SET verification = ?1, challenge_id = 0, challenge_sent = 0
                 WHERE verification = ?2 AND challenge_sent != 0 AND challenge_sent <= ?3",
                rusqlite::params![
                    Verification::NotSent.as_i64(),
                    Verification::Pending.as_i64(),
                    cutoff
                ],
            )?;
            Ok(n)
        })
    }

    // -- Message links --

    pub fn insert_links(&self, links: &[MessageLink]) -> Result<()> {
        if links.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().timestamp();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO messages (topic_id, user_msg_id, topic_msg_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for link in links {
                    stmt.execute(rusqlite::params![
                        link.topic_id,
                        link.user_msg_id,
                        link.topic_msg_id,
                        now
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn insert_link(&self, link: MessageLink) -> Result<()> {
        self.insert_links(&[link])
    }

    /// Finds the link whose user-side id is `user_msg_id`.
    pub fn find_link_by_user_msg(&self, topic_id: i64, user_msg_id: i32) -> Result<Option<MessageLink>> {
        self.with_conn(|conn| query_link(conn, topic_id, "user_msg_id", user_msg_id))
    }

    /// Finds the link whose topic-side id is `topic_msg_id`.
    pub fn find_link_by_topic_msg(&self, topic_id: i64, topic_msg_id: i32) -> Result<Option<MessageLink>> {
        self.with_conn(|conn| query_link(conn, topic_id, "topic_msg_id", topic_msg_id))
    }

    pub fn delete_links_for_topic(&self, topic_id: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM messages WHERE topic_id = ?1", [topic_id])?;
            Ok(n)
        })
    }

    pub fn count_links_for_topic(&self, topic_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE topic_id = ?1",
                [topic_id],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
    }

    /// Retention sweep: drops links created at or before `cutoff` (unix seconds).
    pub fn delete_links_older_than(&self, cutoff: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM messages WHERE created_at <= ?1", [cutoff])?;
            Ok(n)
        })
    }
}

fn query_topic(conn: &Connection, column: &str, value: i64) -> Result<Option<Topic>> {
    let sql = format!("SELECT {} FROM topics WHERE {} = ?1 LIMIT 1", TOPIC_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt.query_row([value], topic_from_row).optional()?;

    Ok(row)
}

fn topic_from_row(row: &Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        user_id: row.get(1)?,
        thread_id: row.get(2)?,
        is_banned: row.get(3)?,
        verification: Verification::from_i64(row.get(4)?),
        challenge_id: row.get::<_, i64>(5)? as u64,
        challenge_sent: row.get(6)?,
        language_code: row.get(7)?,
    })
}

fn query_link(conn: &Connection, topic_id: i64, column: &str, msg_id: i32) -> Result<Option<MessageLink>> {
    let sql = format!(
        "SELECT topic_id, user_msg_id, topic_msg_id FROM messages WHERE topic_id = ?1 AND {} = ?2",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row(rusqlite::params![topic_id, msg_id], |row| {
            Ok(MessageLink {
                topic_id: row.get(0)?,
                user_msg_id: row.get(1)?,
                topic_msg_id: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_inserts_then_updates() {
        let db = Database::open_in_memory().unwrap();

        let mut topic = Topic::new(555);
        topic.language_code = "en".into();
        db.save_topic(&mut topic).unwrap();
        assert!(topic.is_persisted());

        topic.thread_id = 17;
        topic.begin_challenge(u64::MAX - 3, 1_700_000_000);
        db.save_topic(&mut topic).unwrap();

        let by_user = db.find_topic_by_user(555).unwrap().unwrap();
        assert_eq!(by_user, topic);
        let by_thread = db.find_topic_by_thread(17).unwrap().unwrap();
        assert_eq!(by_thread.id, topic.id);
        assert_eq!(by_thread.challenge_id, u64::MAX - 3);
    }

    #[test]
    fn general_channel_has_no_owner() {
        let db = Database::open_in_memory().unwrap();
        let mut topic = Topic::new(1);
        db.save_topic(&mut topic).unwrap();

        // the row has thread 0, but thread 0 never resolves
        assert!(db.find_topic_by_thread(0).unwrap().is_none());
    }

    #[test]
    fn links_resolve_in_both_directions() {
        let db = Database::open_in_memory().unwrap();
        db.insert_links(&[MessageLink::new(3, 10, 100), MessageLink::new(3, 11, 101)])
            .unwrap();

        let forward = db.find_link_by_user_msg(3, 11).unwrap().unwrap();
        assert_eq!(forward.topic_msg_id, 101);
        let backward = db.find_link_by_topic_msg(3, 100).unwrap().unwrap();
        assert_eq!(backward.user_msg_id, 10);

        // scoped to the owning topic
        assert!(db.find_link_by_user_msg(4, 10).unwrap().is_none());
    }

    #[test]
    fn duplicate_user_side_id_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_link(MessageLink::new(1, 5, 50)).unwrap();
        assert!(db.insert_link(MessageLink::new(1, 5, 51)).is_err());
    }

    #[test]
    fn retention_sweep_removes_old_links() {
        let db = Database::open_in_memory().unwrap();
        db.insert_link(MessageLink::new(1, 5, 50)).unwrap();

        let future = chrono::Utc::now().timestamp() + 10;
        assert_eq!(db.delete_links_older_than(future).unwrap(), 1);
        assert_eq!(db.count_links_for_topic(1).unwrap(), 0);
    }

    #[test]
    fn expired_challenges_fall_back_to_not_sent() {
        let db = Database::open_in_memory().unwrap();
        let mut stale = Topic::new(1);
        stale.begin_challenge(7, 1_000);
        db.save_topic(&mut stale).unwrap();
        let mut fresh = Topic::new(2);
        fresh.begin_challenge(8, 5_000);
        db.save_topic(&mut fresh).unwrap();

        assert_eq!(db.reset_expired_challenges(2_000).unwrap(), 1);

        let stale = db.find_topic_by_user(1).unwrap().unwrap();
        assert_eq!(stale.verification, Verification::NotSent);
        assert_eq!((stale.challenge_id, stale.challenge_sent), (0, 0));
        let fresh = db.find_topic_by_user(2).unwrap().unwrap();
        assert_eq!(fresh.verification, Verification::Pending);
    }
}
