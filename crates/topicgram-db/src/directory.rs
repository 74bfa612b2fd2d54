//! Directory state transitions shared by the command, lifecycle and
//! blocked-recipient paths.
//!
//! Callers hold the engine's directory lock around the read that produced
//! `topic` and the transition itself.

use anyhow::Result;
use tracing::debug;

use crate::Database;
use crate::models::{Topic, Verification};

/// What a transition did to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Saved,
    Deleted,
}

impl Database {
    /// Bans the user. The topic id is left untouched.
    pub fn ban_topic(&self, topic: &mut Topic) -> Result<Transition> {
        topic.is_banned = true;
        topic.verification = Verification::NotSent;
        topic.clear_challenge();
        self.save_topic(topic)?;
        debug!("Banned user {} (row {})", topic.user_id, topic.id);
        Ok(Transition::Saved)
    }

    /// Lifts a ban. A row without an open topic carries nothing worth
    /// keeping and is removed.
    pub fn unban_topic(&self, topic: &mut Topic) -> Result<Transition> {
        topic.is_banned = false;
        if !topic.has_thread() {
            self.delete_topic(topic)?;
            debug!("Unbanned user {}, row removed", topic.user_id);
            return Ok(Transition::Deleted);
        }

        topic.verification = Verification::Completed;
        topic.clear_challenge();
        self.save_topic(topic)?;
        debug!("Unbanned user {} (thread {})", topic.user_id, topic.thread_id);
        Ok(Transition::Saved)
    }

    /// Drops the topic and its links. The row survives only while it still
    /// carries a ban or an outstanding challenge.
    pub fn terminate_topic(&self, topic: &mut Topic) -> Result<Transition> {
        if topic.is_persisted() {
            let removed = self.delete_links_for_topic(topic.id)?;
            debug!("Deleted {} message links of row {}", removed, topic.id);
        }
        topic.thread_id = 0;

        if topic.is_banned || topic.verification == Verification::Pending {
            self.save_topic(topic)?;
            Ok(Transition::Saved)
        } else {
            self.delete_topic(topic)?;
            Ok(Transition::Deleted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageLink;

    fn saved(db: &Database, user_id: i64, thread_id: i32) -> Topic {
        let mut topic = Topic::new(user_id);
        topic.thread_id = thread_id;
        topic.verification = Verification::Completed;
        db.save_topic(&mut topic).unwrap();
        topic
    }

    #[test]
    fn ban_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let mut topic = saved(&db, 555, 12);
        topic.begin_challenge(99, 1_000);

        db.ban_topic(&mut topic).unwrap();
        let once = db.find_topic_by_user(555).unwrap().unwrap();
        db.ban_topic(&mut topic).unwrap();
        let twice = db.find_topic_by_user(555).unwrap().unwrap();

        assert_eq!(once, twice);
        assert!(twice.is_banned);
        assert_eq!(twice.verification, Verification::NotSent);
        assert_eq!((twice.challenge_id, twice.challenge_sent), (0, 0));
        assert_eq!(twice.thread_id, 12);
    }

    #[test]
    fn ban_creates_row_for_unknown_user() {
        let db = Database::open_in_memory().unwrap();
        let mut topic = Topic::new(777);

        assert_eq!(db.ban_topic(&mut topic).unwrap(), Transition::Saved);
        assert!(db.find_topic_by_user(777).unwrap().unwrap().is_banned);
    }

    #[test]
    fn unban_without_thread_deletes_row() {
        let db = Database::open_in_memory().unwrap();
        let mut topic = saved(&db, 1, 0);
        db.ban_topic(&mut topic).unwrap();

        assert_eq!(db.unban_topic(&mut topic).unwrap(), Transition::Deleted);
        assert!(db.find_topic_by_user(1).unwrap().is_none());
    }

    #[test]
    fn unban_with_thread_restores_completed() {
        let db = Database::open_in_memory().unwrap();
        let mut topic = saved(&db, 1, 40);
        db.ban_topic(&mut topic).unwrap();

        assert_eq!(db.unban_topic(&mut topic).unwrap(), Transition::Saved);
        let row = db.find_topic_by_thread(40).unwrap().unwrap();
        assert!(!row.is_banned);
        assert_eq!(row.verification, Verification::Completed);
    }

    #[test]
    fn terminate_clears_links_and_removes_plain_row() {
        let db = Database::open_in_memory().unwrap();
        let mut topic = saved(&db, 2, 50);
        db.insert_links(&[MessageLink::new(topic.id, 1, 2), MessageLink::new(topic.id, 3, 4)])
            .unwrap();
        let row_id = topic.id;

        assert_eq!(db.terminate_topic(&mut topic).unwrap(), Transition::Deleted);
        assert_eq!(db.count_links_for_topic(row_id).unwrap(), 0);
        assert!(db.find_topic_by_user(2).unwrap().is_none());
    }

    #[test]
    fn terminate_keeps_banned_row_without_thread() {
        let db = Database::open_in_memory().unwrap();
        let mut topic = saved(&db, 3, 60);
        db.ban_topic(&mut topic).unwrap();
        db.insert_link(MessageLink::new(topic.id, 1, 2)).unwrap();

        assert_eq!(db.terminate_topic(&mut topic).unwrap(), Transition::Saved);
        let row = db.find_topic_by_user(3).unwrap().unwrap();
        assert!(row.is_banned);
        assert_eq!(row.thread_id, 0);
        assert_eq!(db.count_links_for_topic(row.id).unwrap(), 0);
    }

    #[test]
    fn terminate_keeps_pending_row() {
        let db = Database::open_in_memory().unwrap();
        let mut topic = saved(&db, 4, 70);
        topic.begin_challenge(5, 1_000);
        db.save_topic(&mut topic).unwrap();

        assert_eq!(db.terminate_topic(&mut topic).unwrap(), Transition::Saved);
        let row = db.find_topic_by_user(4).unwrap().unwrap();
        assert_eq!(row.verification, Verification::Pending);
        assert!(!row.has_thread());
    }
}
