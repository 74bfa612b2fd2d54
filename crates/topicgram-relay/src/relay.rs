use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use topicgram_db::{Database, MessageLink, Topic};
use topicgram_types::{Message, ReplyParameters, Update};
use tracing::{debug, error, warn};

use crate::captcha::CaptchaPolicy;
use crate::classify::{Lifecycle, MessageClass, classify};
use crate::error::{LinkPurpose, RelayError, Result, TransportError, ValidationError};
use crate::locks::{Identity, Locks};
use crate::media;
use crate::media_group::{BUNDLE_WINDOW, Collected, MediaGroups};
use crate::text::{Formatter, Notice};
use crate::transport::{Target, Transport};

/// Engine settings. Built by the binary; the engine never reads the
/// environment.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Signs challenge answers. The bot token in production.
    pub secret: String,
    /// Language of text posted into the group.
    pub language: String,
    pub captcha: CaptchaPolicy,
    pub challenge_validity: Duration,
    pub bundle_window: Duration,
}

impl RelayConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            language: "en".into(),
            captcha: CaptchaPolicy::default(),
            challenge_validity: Duration::from_secs(60),
            bundle_window: BUNDLE_WINDOW,
        }
    }
}

/// Which way a relay goes; decides how ids land in a [`MessageLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    ToTopic,
    ToUser,
}

/// The relay engine. Cheap to clone; every clone drives the same state.
#[derive(Clone)]
pub struct Relay {
    pub(crate) inner: Arc<RelayInner>,
}

pub(crate) struct RelayInner {
    pub(crate) config: RelayConfig,
    pub(crate) db: Arc<Database>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) formatter: Arc<dyn Formatter>,
    pub(crate) locks: Locks,
    pub(crate) media_groups: MediaGroups,
}

impl Relay {
    pub fn new(
        config: RelayConfig,
        identity: Identity,
        db: Arc<Database>,
        transport: Arc<dyn Transport>,
        formatter: Arc<dyn Formatter>,
    ) -> Self {
        let media_groups = MediaGroups::new(config.bundle_window);
        Self {
            inner: Arc::new(RelayInner {
                config,
                db,
                transport,
                formatter,
                locks: Locks::new(identity),
                media_groups,
            }),
        }
    }

    pub async fn identity(&self) -> Identity {
        self.inner.locks.identity().await
    }

    /// Handles `update` on its own task. A panic while handling is logged
    /// and stays confined to that update.
    pub fn dispatch(&self, update: Update) -> JoinHandle<()> {
        let relay = self.clone();
        tokio::spawn(async move {
            let update_id = update.update_id;
            let task = tokio::spawn(async move { relay.handle_update(update).await });
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!("Update {} handler panicked: {}", update_id, e);
                } else {
                    warn!("Update {} handler cancelled", update_id);
                }
            }
        })
    }

    pub async fn handle_update(&self, update: Update) {
        let Some((chat_id, is_forum, is_private)) = update
            .chat()
            .map(|c| (c.id, c.is_forum, c.is_private()))
        else {
            return;
        };
        let Some(sender_lang) = update.sender().map(|u| u.language().to_string()) else {
            return;
        };

        if let Some(msg) = &update.message {
            if let MessageClass::Lifecycle(Lifecycle::Migrated { from, to }) = classify(msg) {
                self.inner.locks.migrate(from, to).await;
                return;
            }
        }

        let group_id = self.inner.locks.identity().await.group_id;
        if chat_id == group_id {
            if !is_forum {
                self.notify(&Target::chat(chat_id), &sender_lang, Notice::TopicRequired)
                    .await;
                return;
            }
            if let Some(msg) = update.edited_message {
                self.topic_edit(msg).await;
            } else if let Some(msg) = update.message {
                self.topic_message(msg).await;
            }
        } else if is_private {
            if let Some(msg) = update.edited_message {
                self.user_edit(msg).await;
            } else if let Some(msg) = update.message {
                self.user_message(msg).await;
            } else if let Some(callback) = update.callback_query {
                self.user_verification(callback).await;
            }
        }
    }

    // -- Shared plumbing for the user and topic flows --

    /// Returns the bundle `msg` completes, `Some(vec![msg])` when it is not
    /// part of one, or `None` when another task flushes its bundle.
    pub(crate) async fn bundle(&self, msg: Message) -> Option<Vec<Message>> {
        let Some(group) = msg.media_group_id.clone() else {
            return Some(vec![msg]);
        };
        let key = format!("{}:{}", msg.chat.id, group);
        match self.inner.media_groups.collect(&key, msg).await {
            Collected::Flush(items) => Some(items),
            Collected::Suppressed => None,
        }
    }

    /// Sends a rendered notice; failures are logged, never propagated.
    pub(crate) async fn notify(&self, target: &Target, language: &str, notice: Notice) -> Option<i32> {
        let text = self.inner.formatter.render(language, &notice);
        match self.inner.transport.send_text(target, &text, None).await {
            Ok(message_id) => Some(message_id),
            Err(e) => {
                warn!("Failed to send {:?} to chat {}: {}", notice, target.chat_id, e);
                None
            }
        }
    }

    /// Turns a flow's failure into the one notice its origin gets.
    pub(crate) async fn report(&self, target: &Target, language: &str, err: RelayError) {
        let notice = match &err {
            RelayError::Storage(e) => {
                error!("Storage failure: {:#}", e);
                Notice::DatabaseError
            }
            RelayError::Transport(TransportError::Platform { code, message }) => {
                warn!("Platform rejected relay ({}): {}", code, message);
                Notice::Platform {
                    message: message.clone(),
                }
            }
            RelayError::Transport(TransportError::Network(e)) => {
                error!("Transport failure: {}", e);
                Notice::Error
            }
            RelayError::Validation(v) => {
                debug!("Rejected update: {}", v);
                match v {
                    ValidationError::Unsupported => Notice::Unsupported,
                    ValidationError::MissingLink(LinkPurpose::Reply) => Notice::ReplyTargetMissing,
                    ValidationError::MissingLink(LinkPurpose::Edit) => Notice::FailedToEdit,
                    ValidationError::LengthMismatch { .. } => {
                        error!("Relay result count does not match source: {}", v);
                        Notice::Error
                    }
                    ValidationError::BadArgument(kind) => Notice::Usage(*kind),
                }
            }
        };
        self.notify(target, language, notice).await;
    }

    pub(crate) async fn delete_quietly(&self, chat_id: i64, message_id: i32) {
        if let Err(e) = self.inner.transport.delete(chat_id, message_id).await {
            debug!("Failed to delete message {} in {}: {}", message_id, chat_id, e);
        }
    }

    pub(crate) async fn drop_platform_topic(&self, group_id: i64, thread_id: i32) {
        if let Err(e) = self.inner.transport.delete_topic(group_id, thread_id).await {
            warn!("Failed to delete thread {}: {}", thread_id, e);
        }
    }

    pub(crate) fn challenge_expired(&self, topic: &Topic) -> bool {
        let age = chrono::Utc::now().timestamp() - topic.challenge_sent;
        age > self.inner.config.challenge_validity.as_secs() as i64
    }

    /// Relays `items` (one message or a flushed bundle) to `target` and
    /// records one link per item.
    pub(crate) async fn relay_items(
        &self,
        items: &[Message],
        mut target: Target,
        topic: &Topic,
        direction: Direction,
    ) -> Result<()> {
        let first = &items[0];
        let from_chat = first.chat.id;
        let bundled = first.media_group_id.is_some();
        let source: Vec<i32> = items.iter().map(|m| m.message_id).collect();
        let transport = &self.inner.transport;

        let relayed = if first.is_forwarded() {
            if bundled {
                transport.forward_batch(&target, from_chat, &source).await?
            } else {
                vec![transport.forward(&target, from_chat, first.message_id).await?]
            }
        } else {
            target.reply = self.translate_reply(first, topic, direction)?;
            if bundled {
                let album = media::album(items)?;
                transport.send_media_group(&target, &album).await?
            } else {
                vec![transport.copy(&target, from_chat, first.message_id).await?]
            }
        };

        if relayed.len() != source.len() {
            return Err(ValidationError::LengthMismatch {
                expected: source.len(),
                got: relayed.len(),
            }
            .into());
        }

        let links: Vec<MessageLink> = source
            .iter()
            .zip(&relayed)
            .map(|(&src, &dst)| match direction {
                Direction::ToTopic => MessageLink::new(topic.id, src, dst),
                Direction::ToUser => MessageLink::new(topic.id, dst, src),
            })
            .collect();
        self.inner.db.insert_links(&links)?;

        debug!("Relayed {} message(s) {:?} for user {}", links.len(), direction, topic.user_id);
        Ok(())
    }

    /// Points a reply at the counterpart of the message replied to.
    fn translate_reply(
        &self,
        msg: &Message,
        topic: &Topic,
        direction: Direction,
    ) -> Result<Option<ReplyParameters>> {
        let Some(parent) = msg.reply_to_message.as_deref() else {
            return Ok(None);
        };

        let counterpart = match direction {
            Direction::ToTopic => self
                .inner
                .db
                .find_link_by_user_msg(topic.id, parent.message_id)?
                .map(|l| l.topic_msg_id),
            Direction::ToUser => {
                // Inside a topic every message replies to the thread root.
                if parent.message_id == msg.thread_id() {
                    return Ok(None);
                }
                self.inner
                    .db
                    .find_link_by_topic_msg(topic.id, parent.message_id)?
                    .map(|l| l.user_msg_id)
            }
        };
        let Some(message_id) = counterpart else {
            return Err(ValidationError::MissingLink(LinkPurpose::Reply).into());
        };

        let mut reply = ReplyParameters {
            message_id,
            ..ReplyParameters::default()
        };
        if let Some(quote) = msg.quote.as_ref().filter(|q| q.is_manual) {
            reply.quote = Some(quote.text.clone());
            reply.quote_entities = quote.entities.clone();
            reply.quote_position = Some(quote.position);
        }
        Ok(Some(reply))
    }
}
