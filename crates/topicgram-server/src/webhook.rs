use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use lru::LruCache;
use topicgram_relay::Relay;
use topicgram_types::Update;
use tracing::{debug, warn};

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Recent update ids kept for de-duplication.
const SEEN_CAPACITY: NonZeroUsize = NonZeroUsize::new(4096).unwrap();

#[derive(Clone)]
pub struct WebhookState {
    inner: Arc<WebhookInner>,
}

struct WebhookInner {
    relay: Relay,
    secret: String,
    seen: Mutex<LruCache<i64, ()>>,
}

impl WebhookState {
    pub fn new(relay: Relay, secret: String) -> Self {
        Self {
            inner: Arc::new(WebhookInner {
                relay,
                secret,
                seen: Mutex::new(LruCache::new(SEEN_CAPACITY)),
            }),
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == self.inner.secret)
    }

    /// True the first time `update_id` is seen.
    fn first_sighting(&self, update_id: i64) -> bool {
        let mut seen = match self.inner.seen.lock() {
            Ok(seen) => seen,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.put(update_id, ()).is_none()
    }
}

/// POST handler. Every accepted update is handled on its own task and the
/// platform gets its answer right away.
pub async fn receive(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if !state.authorized(&headers) {
        warn!("Webhook call with a missing or wrong secret token");
        return (StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Unparseable update: {}", e);
            return (StatusCode::OK, "OK");
        }
    };

    if !state.first_sighting(update.update_id) {
        debug!("Update {} delivered again, skipping", update.update_id);
        return (StatusCode::OK, "OK");
    }

    state.inner.relay.dispatch(update);
    (StatusCode::OK, "OK")
}
