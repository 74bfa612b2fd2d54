use std::sync::Arc;
use std::time::Duration;

use topicgram_db::Database;
use tracing::{info, warn};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Daily housekeeping: drops message links past `retention` and returns
/// stale challenges to the not-sent state.
pub async fn run_cleanup_loop(db: Arc<Database>, retention: Duration, challenge_validity: Duration) {
    let mut interval = tokio::time::interval(DAY);

    loop {
        interval.tick().await;

        match sweep(&db, retention, challenge_validity) {
            Ok((links, challenges)) => {
                if links > 0 || challenges > 0 {
                    info!(
                        "Cleanup: removed {} message links, reset {} expired challenges",
                        links, challenges
                    );
                }
            }
            Err(e) => {
                warn!("Cleanup error: {:#}", e);
            }
        }
    }
}

fn sweep(db: &Database, retention: Duration, challenge_validity: Duration) -> anyhow::Result<(usize, usize)> {
    let now = chrono::Utc::now().timestamp();
    let links = db.delete_links_older_than(now - retention.as_secs() as i64)?;
    let challenges = db.reset_expired_challenges(now - challenge_validity.as_secs() as i64)?;
    Ok((links, challenges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicgram_db::{Topic, Verification};

    #[test]
    fn sweep_resets_only_expired_challenges() {
        let db = Database::open_in_memory().unwrap();
        let now = chrono::Utc::now().timestamp();

        let mut stale = Topic::new(1);
        stale.begin_challenge(11, now - 600);
        db.save_topic(&mut stale).unwrap();

        let mut fresh = Topic::new(2);
        fresh.begin_challenge(22, now);
        db.save_topic(&mut fresh).unwrap();

        let (_, reset) = sweep(&db, DAY, Duration::from_secs(60)).unwrap();
        assert_eq!(reset, 1);

        let stale = db.find_topic_by_user(1).unwrap().unwrap();
        assert_eq!(stale.verification, Verification::NotSent);
        assert_eq!(stale.challenge_id, 0);
        let fresh = db.find_topic_by_user(2).unwrap().unwrap();
        assert_eq!(fresh.verification, Verification::Pending);
    }
}
