//! User-side flows: private messages, their edits and challenge answers.

use topicgram_db::{Topic, Verification};
use topicgram_types::{CallbackQuery, Message, User};
use tracing::{debug, info, warn};

use crate::captcha;
use crate::classify::{MessageClass, classify};
use crate::commands::{self, CommandKind, Parsed};
use crate::error::{LinkPurpose, Result, ValidationError};
use crate::media;
use crate::relay::{Direction, Relay};
use crate::text::Notice;
use crate::transport::Target;

impl Relay {
    pub(crate) async fn user_message(&self, msg: Message) {
        let Some(from) = msg.from.clone() else {
            return;
        };
        let lang = from.language().to_string();

        let Some(items) = self.bundle(msg).await else {
            return;
        };
        let first = &items[0];
        let here = Target::chat(first.chat.id).replying_to(first.message_id);

        match classify(first) {
            MessageClass::Service => {
                self.delete_quietly(first.chat.id, first.message_id).await;
                return;
            }
            MessageClass::Ignored | MessageClass::Lifecycle(_) => return,
            MessageClass::Unsupported => {
                self.notify(&here, &lang, Notice::Unsupported).await;
                return;
            }
            MessageClass::Content(_) => {}
        }

        let identity = self.inner.locks.identity().await;
        if let Parsed::Known(cmd) = commands::parse(first.text(), &identity.bot_username) {
            if matches!(cmd.kind, CommandKind::Start | CommandKind::Help) {
                self.notify(&here, &lang, Notice::Welcome).await;
                return;
            }
        }

        if let Err(err) = self.user_content(&from, &items, &here).await {
            self.report(&here, &lang, err).await;
        }
    }

    async fn user_content(&self, from: &User, items: &[Message], here: &Target) -> Result<()> {
        let first = &items[0];
        let lang = from.language();

        let guard = self.inner.locks.directory().await;
        let group_id = guard.identity.group_id;
        let db = &self.inner.db;

        let mut topic = db
            .find_topic_by_user(from.id)?
            .unwrap_or_else(|| Topic::new(from.id));

        let mut dirty = false;
        if !lang.is_empty() && topic.language_code != lang {
            topic.language_code = lang.to_string();
            dirty = true;
        }

        if topic.verification == Verification::Pending && self.challenge_expired(&topic) {
            topic.verification = Verification::NotSent;
            topic.clear_challenge();
            dirty = true;
        }

        match topic.verification {
            Verification::NotSent => {
                if self.should_challenge(from).await {
                    return self.send_challenge(&mut topic, here, lang, group_id).await;
                }
                topic.verification = Verification::Completed;
                dirty = true;
            }
            Verification::Pending => {
                if dirty {
                    db.save_topic(&mut topic)?;
                }
                self.notify(here, lang, Notice::CaptchaNotCompleted).await;
                return Ok(());
            }
            Verification::Completed => {}
        }

        if topic.is_banned {
            if dirty {
                db.save_topic(&mut topic)?;
            }
            self.notify(here, lang, Notice::Banned).await;
            return Ok(());
        }

        if !topic.has_thread() {
            if !self.open_topic(&mut topic, from, here, group_id).await? {
                return Ok(());
            }
        } else if dirty {
            db.save_topic(&mut topic)?;
        }

        if first.has_protected_content {
            self.notify(here, lang, Notice::ForwardForbidden).await;
            return Ok(());
        }

        let target = Target::topic(group_id, topic.thread_id);
        self.relay_items(items, target, &topic, Direction::ToTopic)
            .await
    }

    async fn should_challenge(&self, from: &User) -> bool {
        let policy = &self.inner.config.captcha;
        if policy.account_bypass(from) {
            return false;
        }

        let profile = if policy.wants_profile() {
            match self.inner.transport.get_chat(from.id).await {
                Ok(chat) => Some(chat),
                Err(e) => {
                    warn!("Profile lookup for user {} failed: {}", from.id, e);
                    None
                }
            }
        } else {
            None
        };
        policy.should_challenge(from, profile.as_ref())
    }

    async fn send_challenge(
        &self,
        topic: &mut Topic,
        here: &Target,
        lang: &str,
        group_id: i64,
    ) -> Result<()> {
        let config = &self.inner.config;
        let challenge_id = captcha::new_challenge_id();
        let challenge = captcha::issue(&config.secret, challenge_id);

        let notice = Notice::Captcha {
            problem: challenge.problem.clone(),
            minutes: (config.challenge_validity.as_secs() / 60).max(1),
        };
        let text = self.inner.formatter.render(lang, &notice);
        self.inner
            .transport
            .send_text(here, &text, Some(&challenge.keyboard()))
            .await?;

        topic.begin_challenge(challenge_id, chrono::Utc::now().timestamp());
        self.inner.db.save_topic(topic)?;
        debug!("Challenge issued to user {}", topic.user_id);

        if topic.has_thread() {
            let thread = Target::topic(group_id, topic.thread_id);
            self.notify(&thread, &config.language, Notice::CaptchaSent)
                .await;
        }
        Ok(())
    }

    /// Creates the user's topic, introduces the user in it and pins the
    /// introduction. Returns false when the platform refused the topic.
    async fn open_topic(
        &self,
        topic: &mut Topic,
        from: &User,
        here: &Target,
        group_id: i64,
    ) -> Result<bool> {
        let group_lang = &self.inner.config.language;
        let name = from.full_name();

        let thread_id = match self.inner.transport.create_topic(group_id, &name).await {
            Ok(thread_id) => thread_id,
            Err(e) => {
                warn!("Failed to create a topic for user {}: {}", from.id, e);
                self.inner.db.save_topic(topic)?;
                self.notify(
                    &Target::chat(group_id),
                    group_lang,
                    Notice::TopicCreateFailed { user_side: false },
                )
                .await;
                self.notify(here, from.language(), Notice::TopicCreateFailed { user_side: true })
                    .await;
                return Ok(false);
            }
        };

        topic.thread_id = thread_id;
        self.inner.db.save_topic(topic)?;
        info!("Opened thread {} for user {}", thread_id, from.id);

        let intro = Notice::Intro {
            name,
            username: from.username.clone(),
            user_id: from.id,
        };
        if let Some(message_id) = self
            .notify(&Target::topic(group_id, thread_id), group_lang, intro)
            .await
        {
            if let Err(e) = self.inner.transport.pin(group_id, message_id).await {
                warn!("Failed to pin intro in thread {}: {}", thread_id, e);
            }
        }
        Ok(true)
    }

    pub(crate) async fn user_verification(&self, callback: CallbackQuery) {
        let Some(payload) = callback.data.as_deref().filter(|d| !d.is_empty()) else {
            return;
        };
        let Some(challenge_msg) = callback.message.as_ref() else {
            return;
        };
        let here = Target::chat(challenge_msg.chat.id).replying_to(challenge_msg.message_id);

        if let Err(err) = self
            .verify_answer(&callback.from, challenge_msg, payload, &here)
            .await
        {
            self.report(&here, callback.from.language(), err).await;
        }
    }

    async fn verify_answer(
        &self,
        from: &User,
        challenge_msg: &Message,
        payload: &str,
        here: &Target,
    ) -> Result<()> {
        let lang = from.language();
        let guard = self.inner.locks.directory().await;
        let group_id = guard.identity.group_id;
        let db = &self.inner.db;

        let topic = db.find_topic_by_user(from.id)?;
        self.delete_quietly(challenge_msg.chat.id, challenge_msg.message_id)
            .await;

        let Some(mut topic) =
            topic.filter(|t| t.verification == Verification::Pending && t.challenge_id != 0)
        else {
            debug!("Stale challenge answer from user {}", from.id);
            return Ok(());
        };

        let challenge_id = topic.challenge_id;
        let expired = self.challenge_expired(&topic);
        topic.clear_challenge();

        if topic.is_banned {
            topic.verification = Verification::NotSent;
            db.save_topic(&mut topic)?;
            self.notify(here, lang, Notice::Banned).await;
            return Ok(());
        }

        if expired || !captcha::verify(&self.inner.config.secret, challenge_id, payload) {
            topic.verification = Verification::NotSent;
            db.save_topic(&mut topic)?;
            debug!("User {} failed verification (expired: {})", from.id, expired);
            self.notify(here, lang, Notice::CaptchaFailed).await;
            return Ok(());
        }

        topic.verification = Verification::Completed;
        db.save_topic(&mut topic)?;
        info!("User {} passed verification", from.id);
        self.notify(here, lang, Notice::CaptchaCompleted).await;

        if topic.has_thread() {
            let thread = Target::topic(group_id, topic.thread_id);
            self.notify(&thread, &self.inner.config.language, Notice::UserVerified)
                .await;
        }
        Ok(())
    }

    pub(crate) async fn user_edit(&self, msg: Message) {
        let Some(from) = msg.from.as_ref() else {
            return;
        };
        let lang = from.language();
        let here = Target::chat(msg.chat.id).replying_to(msg.message_id);

        match classify(&msg) {
            MessageClass::Service => {
                self.delete_quietly(msg.chat.id, msg.message_id).await;
                return;
            }
            MessageClass::Ignored | MessageClass::Lifecycle(_) => return,
            MessageClass::Unsupported => {
                self.notify(&here, lang, Notice::Unsupported).await;
                return;
            }
            MessageClass::Content(_) => {}
        }

        if let Err(err) = self.mirror_user_edit(&msg, from.id, lang, &here).await {
            self.report(&here, lang, err).await;
        }
    }

    async fn mirror_user_edit(&self, msg: &Message, user_id: i64, lang: &str, here: &Target) -> Result<()> {
        let guard = self.inner.locks.directory().await;
        let group_id = guard.identity.group_id;
        let db = &self.inner.db;

        let Some(topic) = db
            .find_topic_by_user(user_id)?
            .filter(|t| t.has_thread() && t.verification == Verification::Completed)
        else {
            return Err(ValidationError::MissingLink(LinkPurpose::Edit).into());
        };
        if topic.is_banned {
            self.notify(here, lang, Notice::Banned).await;
            return Ok(());
        }

        let link = db
            .find_link_by_user_msg(topic.id, msg.message_id)?
            .ok_or(ValidationError::MissingLink(LinkPurpose::Edit))?;
        let action = media::edit_action(msg)?;
        self.inner
            .transport
            .edit(group_id, link.topic_msg_id, &action)
            .await?;
        Ok(())
    }
}
