//! Group-side flows: operator messages inside topics, administrative
//! commands and topic lifecycle events.

use topicgram_db::{Topic, Verification};
use topicgram_types::Message;
use tracing::{debug, info, warn};

use crate::classify::{Lifecycle, MessageClass, classify};
use crate::commands::{self, Command, CommandKind, Parsed};
use crate::error::{LinkPurpose, Result, ValidationError};
use crate::locks::Identity;
use crate::media;
use crate::relay::{Direction, Relay};
use crate::text::Notice;
use crate::transport::Target;

impl Relay {
    pub(crate) async fn topic_message(&self, msg: Message) {
        let lang = msg
            .from
            .as_ref()
            .map(|u| u.language().to_string())
            .unwrap_or_default();
        let chat_id = msg.chat.id;
        let thread_id = msg.thread_id();
        let here = Target::topic(chat_id, thread_id).replying_to(msg.message_id);

        let identity = self.inner.locks.identity().await;
        let from_self = msg.sender_id() == identity.bot_id;

        let unsupported = match classify(&msg) {
            MessageClass::Service => {
                self.delete_quietly(chat_id, msg.message_id).await;
                return;
            }
            MessageClass::Ignored | MessageClass::Lifecycle(Lifecycle::Migrated { .. }) => return,
            MessageClass::Lifecycle(event) => {
                self.delete_quietly(chat_id, msg.message_id).await;
                if from_self || thread_id == 0 {
                    return;
                }
                let thread = Target::topic(chat_id, thread_id);
                let reopened = event == Lifecycle::TopicReopened;
                if let Err(err) = self.topic_state_changed(thread_id, reopened, &lang, &thread).await {
                    self.report(&thread, &lang, err).await;
                }
                return;
            }
            MessageClass::Content(_) | MessageClass::Unsupported if from_self => return,
            MessageClass::Content(_) => false,
            MessageClass::Unsupported => true,
        };

        if thread_id == 0 {
            self.general_command(&msg, &identity, &lang, &here).await;
            return;
        }

        let Some(items) = self.bundle(msg).await else {
            return;
        };
        if let Err(err) = self
            .topic_content(&items, unsupported, &identity.bot_username, &lang, &here)
            .await
        {
            self.report(&here, &lang, err).await;
        }
    }

    /// A topic was closed (ban) or reopened (unban) by an operator.
    async fn topic_state_changed(
        &self,
        thread_id: i32,
        reopened: bool,
        lang: &str,
        thread: &Target,
    ) -> Result<()> {
        let _guard = self.inner.locks.directory().await;
        let db = &self.inner.db;

        let Some(mut topic) = db.find_topic_by_thread(thread_id)? else {
            return Ok(());
        };
        let user_id = topic.user_id;

        if reopened {
            if !topic.is_banned {
                return Ok(());
            }
            db.unban_topic(&mut topic)?;
            info!("User {} unbanned by reopening thread {}", user_id, thread_id);
            self.notify(thread, lang, Notice::UserUnbanned { user_id }).await;
        } else {
            if topic.is_banned {
                return Ok(());
            }
            // The thread id stays so that reopening finds the row again.
            db.ban_topic(&mut topic)?;
            info!("User {} banned by closing thread {}", user_id, thread_id);
            self.notify(&Target::chat(user_id), &topic.language_code, Notice::Banned)
                .await;
            self.notify(thread, lang, Notice::UserBanned { user_id }).await;
        }
        Ok(())
    }

    /// Commands in the general channel take the user id as argument.
    async fn general_command(&self, msg: &Message, identity: &Identity, lang: &str, here: &Target) {
        let cmd = match commands::parse(msg.text(), &identity.bot_username) {
            Parsed::NotCommand | Parsed::Unknown { addressed: false } => return,
            Parsed::Unknown { addressed: true } => {
                self.notify(here, lang, Notice::UnknownCommand).await;
                return;
            }
            Parsed::Known(cmd) if !cmd.kind.is_administrative() => {
                if cmd.addressed {
                    self.notify(here, lang, Notice::UnknownCommand).await;
                }
                return;
            }
            Parsed::Known(cmd) => cmd,
        };

        let result = match cmd.arg.parse::<i64>() {
            Ok(user_id) if user_id != 0 => self.command_by_id(cmd.kind, user_id, lang, here).await,
            _ => Err(ValidationError::BadArgument(cmd.kind).into()),
        };
        if let Err(err) = result {
            self.report(here, lang, err).await;
        }
    }

    async fn command_by_id(&self, kind: CommandKind, user_id: i64, lang: &str, here: &Target) -> Result<()> {
        let guard = self.inner.locks.directory().await;
        let group_id = guard.identity.group_id;
        let db = &self.inner.db;
        let existing = db.find_topic_by_user(user_id)?;

        match kind {
            CommandKind::Ban => {
                let mut topic = existing.unwrap_or_else(|| Topic::new(user_id));
                if topic.is_banned {
                    self.notify(here, lang, Notice::AlreadyBanned { user_id }).await;
                    return Ok(());
                }
                if topic.has_thread() {
                    self.drop_platform_topic(group_id, topic.thread_id).await;
                    db.delete_links_for_topic(topic.id)?;
                    topic.thread_id = 0;
                }
                db.ban_topic(&mut topic)?;
                info!("User {} banned", user_id);
                self.notify(here, lang, Notice::UserBanned { user_id }).await;
            }
            CommandKind::Unban => {
                if let Some(mut topic) = existing {
                    if topic.has_thread() {
                        if let Err(e) = self.inner.transport.reopen_topic(group_id, topic.thread_id).await {
                            debug!("Reopen of thread {} failed: {}", topic.thread_id, e);
                        }
                    }
                    db.unban_topic(&mut topic)?;
                    info!("User {} unbanned", user_id);
                }
                self.notify(here, lang, Notice::UserUnbanned { user_id }).await;
            }
            CommandKind::Terminate => {
                if let Some(mut topic) = existing {
                    if topic.has_thread() {
                        self.drop_platform_topic(group_id, topic.thread_id).await;
                    }
                    db.terminate_topic(&mut topic)?;
                    info!("Conversation with user {} terminated", user_id);
                }
                self.notify(here, lang, Notice::Success).await;
            }
            CommandKind::Start | CommandKind::Help => {}
        }
        Ok(())
    }

    async fn topic_content(
        &self,
        items: &[Message],
        unsupported: bool,
        bot_username: &str,
        lang: &str,
        here: &Target,
    ) -> Result<()> {
        let first = &items[0];
        let thread_id = first.thread_id();

        let guard = self.inner.locks.directory().await;
        let group_id = guard.identity.group_id;
        let db = &self.inner.db;

        let Some(mut topic) = db.find_topic_by_thread(thread_id)? else {
            debug!("Thread {} belongs to no user", thread_id);
            return Ok(());
        };
        if unsupported {
            return Err(ValidationError::Unsupported.into());
        }

        match commands::parse(first.text(), bot_username) {
            Parsed::Known(cmd) if cmd.kind.is_administrative() => {
                return self.topic_command(cmd.kind, topic, group_id, lang, here).await;
            }
            Parsed::Known(Command { addressed: true, .. }) | Parsed::Unknown { addressed: true } => {
                self.notify(here, lang, Notice::UnknownCommand).await;
                return Ok(());
            }
            _ => {}
        }

        if first.has_protected_content {
            self.notify(here, lang, Notice::ForwardForbidden).await;
            return Ok(());
        }

        // An operator answering vouches for the user.
        if topic.verification != Verification::Completed && !topic.is_banned {
            topic.verification = Verification::Completed;
            topic.clear_challenge();
            db.save_topic(&mut topic)?;
        }

        let target = Target::chat(topic.user_id);
        match self.relay_items(items, target, &topic, Direction::ToUser).await {
            Err(err) if err.is_blocked() => self.recipient_blocked(&mut topic, group_id, lang).await,
            other => other,
        }
    }

    /// Bare commands inside a topic act on that topic's user.
    async fn topic_command(
        &self,
        kind: CommandKind,
        mut topic: Topic,
        group_id: i64,
        lang: &str,
        here: &Target,
    ) -> Result<()> {
        let db = &self.inner.db;
        let user_id = topic.user_id;
        let general = Target::chat(group_id);
        let user_chat = Target::chat(user_id);

        match kind {
            CommandKind::Ban => {
                if topic.is_banned {
                    self.notify(here, lang, Notice::AlreadyBanned { user_id }).await;
                    return Ok(());
                }
                self.drop_platform_topic(group_id, topic.thread_id).await;
                db.delete_links_for_topic(topic.id)?;
                topic.thread_id = 0;
                db.ban_topic(&mut topic)?;
                info!("User {} banned", user_id);
                self.notify(&user_chat, &topic.language_code, Notice::Banned)
                    .await;
                self.notify(&general, lang, Notice::UserBanned { user_id }).await;
            }
            CommandKind::Unban => {
                if !topic.is_banned {
                    self.notify(here, lang, Notice::UserUnbanned { user_id }).await;
                    return Ok(());
                }
                if let Err(e) = self.inner.transport.reopen_topic(group_id, topic.thread_id).await {
                    debug!("Reopen of thread {} failed: {}", topic.thread_id, e);
                }
                db.unban_topic(&mut topic)?;
                info!("User {} unbanned", user_id);
                self.notify(here, lang, Notice::UserUnbanned { user_id }).await;
            }
            CommandKind::Terminate => {
                self.drop_platform_topic(group_id, topic.thread_id).await;
                db.terminate_topic(&mut topic)?;
                info!("Conversation with user {} terminated", user_id);
                if !topic.is_banned {
                    self.notify(&user_chat, &topic.language_code, Notice::Terminated)
                        .await;
                }
                self.notify(&general, lang, Notice::Success).await;
            }
            CommandKind::Start | CommandKind::Help => {}
        }
        Ok(())
    }

    /// The user blocked the bot: drop the topic and tell the operators.
    async fn recipient_blocked(&self, topic: &mut Topic, group_id: i64, lang: &str) -> Result<()> {
        let user_id = topic.user_id;
        warn!("User {} blocked the bot, removing thread {}", user_id, topic.thread_id);

        self.drop_platform_topic(group_id, topic.thread_id).await;
        self.inner.db.terminate_topic(topic)?;
        self.notify(&Target::chat(group_id), lang, Notice::Blocked { user_id })
            .await;
        Ok(())
    }

    pub(crate) async fn topic_edit(&self, msg: Message) {
        let thread_id = msg.thread_id();
        if thread_id == 0 {
            return;
        }
        let lang = msg
            .from
            .as_ref()
            .map(|u| u.language().to_string())
            .unwrap_or_default();
        let chat_id = msg.chat.id;
        let here = Target::topic(chat_id, thread_id).replying_to(msg.message_id);

        let identity = self.inner.locks.identity().await;
        let from_self = msg.sender_id() == identity.bot_id;

        let unsupported = match classify(&msg) {
            MessageClass::Service => {
                self.delete_quietly(chat_id, msg.message_id).await;
                return;
            }
            MessageClass::Ignored | MessageClass::Lifecycle(_) => return,
            MessageClass::Content(_) | MessageClass::Unsupported if from_self => return,
            MessageClass::Content(_) => false,
            MessageClass::Unsupported => true,
        };

        if let Err(err) = self.mirror_topic_edit(&msg, unsupported, &lang).await {
            self.report(&here, &lang, err).await;
        }
    }

    async fn mirror_topic_edit(&self, msg: &Message, unsupported: bool, lang: &str) -> Result<()> {
        let guard = self.inner.locks.directory().await;
        let group_id = guard.identity.group_id;
        let db = &self.inner.db;

        let Some(mut topic) = db.find_topic_by_thread(msg.thread_id())? else {
            return Ok(());
        };
        if unsupported {
            return Err(ValidationError::Unsupported.into());
        }

        let link = db
            .find_link_by_topic_msg(topic.id, msg.message_id)?
            .ok_or(ValidationError::MissingLink(LinkPurpose::Edit))?;
        let action = media::edit_action(msg)?;

        match self
            .inner
            .transport
            .edit(topic.user_id, link.user_msg_id, &action)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_blocked() => self.recipient_blocked(&mut topic, group_id, lang).await,
            Err(e) => Err(e.into()),
        }
    }
}
