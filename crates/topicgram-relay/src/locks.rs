//! Two-level lock hierarchy.
//!
//! 1. `identity`: reader/writer lock over the engine's own identity. Relay
//!    paths read it; only a group migration writes it.
//! 2. `directory`: one mutex serializing every read-modify-write of a
//!    directory row, across all users.
//!
//! Always taken in that order; [`Locks::directory`] enforces it by
//! acquiring both.

use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tracing::info;

/// Who the engine is and which group it serves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub group_id: i64,
    pub bot_id: i64,
    pub bot_username: String,
}

pub struct Locks {
    identity: RwLock<Identity>,
    directory: Mutex<()>,
}

/// Held for the whole of a directory read-modify-write.
pub struct DirectoryGuard<'a> {
    pub identity: RwLockReadGuard<'a, Identity>,
    _directory: MutexGuard<'a, ()>,
}

impl Locks {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: RwLock::new(identity),
            directory: Mutex::new(()),
        }
    }

    /// Copy of the current identity; no lock is held afterwards.
    pub async fn identity(&self) -> Identity {
        self.identity.read().await.clone()
    }

    pub async fn directory(&self) -> DirectoryGuard<'_> {
        let identity = self.identity.read().await;
        let directory = self.directory.lock().await;
        DirectoryGuard {
            identity,
            _directory: directory,
        }
    }

    /// Moves the engine to group `to` if it currently serves `from`.
    pub async fn migrate(&self, from: i64, to: i64) -> bool {
        let mut identity = self.identity.write().await;
        if identity.group_id != from {
            return false;
        }
        identity.group_id = to;
        info!("Group migrated from {} to {}, update TOPICGRAM_GROUP_ID", from, to);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn identity() -> Identity {
        Identity {
            group_id: -1,
            bot_id: 42,
            bot_username: "topicbot".into(),
        }
    }

    #[tokio::test]
    async fn migration_only_from_current_group() {
        let locks = Locks::new(identity());
        assert!(!locks.migrate(-7, -1002).await);
        assert_eq!(locks.identity().await.group_id, -1);

        assert!(locks.migrate(-1, -1002).await);
        assert_eq!(locks.identity().await.group_id, -1002);
    }

    #[tokio::test(start_paused = true)]
    async fn directory_sections_do_not_overlap() {
        let locks = Arc::new(Locks::new(identity()));
        let active = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let active = active.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.directory().await;
                let now = active.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                assert_eq!(now, 0);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn migration_waits_for_readers() {
        let locks = Arc::new(Locks::new(identity()));
        let guard = locks.directory().await;

        let migrating = tokio::spawn({
            let locks = locks.clone();
            async move { locks.migrate(-1, -2).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!migrating.is_finished());
        assert_eq!(guard.identity.group_id, -1);

        drop(guard);
        assert!(migrating.await.unwrap());
        assert_eq!(locks.identity().await.group_id, -2);
    }
}
