//! Collapses the per-item updates of one user-submitted bundle into a
//! single ordered batch.
//!
//! The first item of a bundle registers it and waits for the bundle's
//! window to expire; later items are appended and return immediately.
//! Expiry removes the bundle and fires its completion signal exactly once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use topicgram_types::Message;
use tracing::debug;

/// How long a bundle collects items.
pub const BUNDLE_WINDOW: Duration = Duration::from_secs(3);

pub enum Collected {
    /// All items of the bundle, ascending by message id.
    Flush(Vec<Message>),
    /// Appended to a bundle another task will flush.
    Suppressed,
}

struct Bundle {
    items: Mutex<Vec<Message>>,
}

#[derive(Clone)]
pub struct MediaGroups {
    inner: Arc<MediaGroupsInner>,
}

struct MediaGroupsInner {
    window: Duration,
    bundles: Mutex<HashMap<String, Arc<Bundle>>>,
}

impl MediaGroups {
    pub fn new(window: Duration) -> Self {
        Self {
            inner: Arc::new(MediaGroupsInner {
                window,
                bundles: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Adds `msg` to the bundle `key`. Only the task that opened the bundle
    /// gets [`Collected::Flush`], after the window closes.
    pub async fn collect(&self, key: &str, msg: Message) -> Collected {
        let (bundle, done) = {
            let mut bundles = self.inner.bundles.lock().await;
            if let Some(bundle) = bundles.get(key) {
                bundle.items.lock().await.push(msg);
                return Collected::Suppressed;
            }

            let bundle = Arc::new(Bundle {
                items: Mutex::new(vec![msg]),
            });
            bundles.insert(key.to_string(), bundle.clone());
            (bundle, self.expire_later(key.to_string()))
        };

        // Sender is never dropped unfired: the expiry task owns it.
        let _ = done.await;

        let mut items = std::mem::take(&mut *bundle.items.lock().await);
        items.sort_by_key(|m| m.message_id);
        debug!("Bundle {} closed with {} items", key, items.len());
        Collected::Flush(items)
    }

    fn expire_later(&self, key: String) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.window).await;
            inner.bundles.lock().await.remove(&key);
            let _ = tx.send(());
        });
        rx
    }

    /// Bundles still collecting.
    pub async fn pending(&self) -> usize {
        self.inner.bundles.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::JoinSet;

    fn item(id: i32) -> Message {
        Message {
            message_id: id,
            media_group_id: Some("g".into()),
            ..Message::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn one_flush_per_bundle_sorted_by_id() {
        for n in 1..=10 {
            let groups = MediaGroups::new(BUNDLE_WINDOW);
            let mut tasks = JoinSet::new();
            // arrive in reverse order
            for id in (1..=n).rev() {
                let groups = groups.clone();
                tasks.spawn(async move { groups.collect("g", item(id)).await });
            }

            let mut flushes = Vec::new();
            let mut suppressed = 0;
            while let Some(res) = tasks.join_next().await {
                match res.unwrap() {
                    Collected::Flush(items) => flushes.push(items),
                    Collected::Suppressed => suppressed += 1,
                }
            }

            assert_eq!(flushes.len(), 1, "n = {}", n);
            assert_eq!(suppressed, n - 1);
            let ids: Vec<i32> = flushes[0].iter().map(|m| m.message_id).collect();
            assert_eq!(ids, (1..=n).collect::<Vec<_>>());
            assert_eq!(groups.pending().await, 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn single_item_waits_for_the_window() {
        let groups = MediaGroups::new(BUNDLE_WINDOW);
        let start = tokio::time::Instant::now();

        let Collected::Flush(items) = groups.collect("solo", item(1)).await else {
            panic!("single item must flush");
        };
        assert_eq!(items.len(), 1);
        assert!(start.elapsed() >= BUNDLE_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn late_item_opens_a_new_bundle() {
        let groups = MediaGroups::new(BUNDLE_WINDOW);
        let first = groups.collect("g", item(1)).await;
        assert!(matches!(first, Collected::Flush(ref items) if items.len() == 1));

        let second = groups.collect("g", item(2)).await;
        assert!(matches!(second, Collected::Flush(ref items) if items[0].message_id == 2));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let groups = MediaGroups::new(BUNDLE_WINDOW);
        let a = tokio::spawn({
            let groups = groups.clone();
            async move { groups.collect("a", item(1)).await }
        });
        let b = tokio::spawn({
            let groups = groups.clone();
            async move { groups.collect("b", item(2)).await }
        });

        assert!(matches!(a.await.unwrap(), Collected::Flush(_)));
        assert!(matches!(b.await.unwrap(), Collected::Flush(_)));
    }
}
