//! One classifier for new and edited messages on both sides.

use topicgram_types::Message;

/// Relayable content kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Animation,
    Audio,
    Document,
    Photo,
    Sticker,
    Video,
    VideoNote,
    Voice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    TopicClosed,
    TopicReopened,
    /// The supervisory group moved to a new id.
    Migrated { from: i64, to: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Platform side effect (title change, pin, join, ...); deleted on sight.
    Service,
    /// Dropped without a trace.
    Ignored,
    Lifecycle(Lifecycle),
    Content(ContentKind),
    Unsupported,
}

pub fn classify(msg: &Message) -> MessageClass {
    if is_service(msg) {
        return MessageClass::Service;
    }
    if msg.web_app_data.is_some() || msg.reply_markup.is_some() || msg.forum_topic_created.is_some() {
        return MessageClass::Ignored;
    }
    if let Some(lifecycle) = lifecycle(msg) {
        return MessageClass::Lifecycle(lifecycle);
    }
    match content_kind(msg) {
        Some(kind) => MessageClass::Content(kind),
        None => MessageClass::Unsupported,
    }
}

fn is_service(msg: &Message) -> bool {
    msg.new_chat_title.as_deref().is_some_and(|t| !t.is_empty())
        || msg.new_chat_photo.is_some()
        || msg.delete_chat_photo
        || msg.group_chat_created
        || msg.supergroup_chat_created
        || msg.channel_chat_created
        || msg.new_chat_members.is_some()
        || msg.left_chat_member.is_some()
        || msg.pinned_message.is_some()
        || msg.message_auto_delete_timer_changed.is_some()
        || msg.connected_website.as_deref().is_some_and(|w| !w.is_empty())
        || msg.successful_payment.is_some()
        || msg.write_access_allowed.is_some()
        || msg.forum_topic_edited.is_some()
        || msg.general_forum_topic_hidden.is_some()
        || msg.general_forum_topic_unhidden.is_some()
        || msg.video_chat_scheduled.is_some()
        || msg.video_chat_started.is_some()
        || msg.video_chat_ended.is_some()
        || msg.video_chat_participants_invited.is_some()
}

fn lifecycle(msg: &Message) -> Option<Lifecycle> {
    if let Some(to) = msg.migrate_to_chat_id.filter(|&id| id != 0) {
        return Some(Lifecycle::Migrated {
            from: msg.chat.id,
            to,
        });
    }
    if let Some(from) = msg.migrate_from_chat_id.filter(|&id| id != 0) {
        return Some(Lifecycle::Migrated {
            from,
            to: msg.chat.id,
        });
    }
    if msg.forum_topic_closed.is_some() {
        return Some(Lifecycle::TopicClosed);
    }
    if msg.forum_topic_reopened.is_some() {
        return Some(Lifecycle::TopicReopened);
    }
    None
}

fn content_kind(msg: &Message) -> Option<ContentKind> {
    let kind = if !msg.text().is_empty() {
        ContentKind::Text
    } else if msg.animation.is_some() {
        ContentKind::Animation
    } else if msg.audio.is_some() {
        ContentKind::Audio
    } else if msg.document.is_some() {
        ContentKind::Document
    } else if msg.photo.is_some() {
        ContentKind::Photo
    } else if msg.sticker.is_some() {
        ContentKind::Sticker
    } else if msg.video.is_some() {
        ContentKind::Video
    } else if msg.video_note.is_some() {
        ContentKind::VideoNote
    } else if msg.voice.is_some() {
        ContentKind::Voice
    } else {
        return None;
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use topicgram_types::MediaFile;

    fn message() -> Message {
        Message::default()
    }

    #[test]
    fn service_wins_over_content() {
        let mut msg = message();
        msg.text = Some("hi".into());
        msg.pinned_message = Some(json!({}));
        assert_eq!(classify(&msg), MessageClass::Service);
    }

    #[test]
    fn topic_creation_echo_is_ignored() {
        let mut msg = message();
        msg.forum_topic_created = Some(json!({"name": "Ada"}));
        assert_eq!(classify(&msg), MessageClass::Ignored);
    }

    #[test]
    fn migration_both_directions() {
        let mut old = message();
        old.chat.id = -1;
        old.migrate_to_chat_id = Some(-1002);
        assert_eq!(
            classify(&old),
            MessageClass::Lifecycle(Lifecycle::Migrated { from: -1, to: -1002 })
        );

        let mut new = message();
        new.chat.id = -1002;
        new.migrate_from_chat_id = Some(-1);
        assert_eq!(
            classify(&new),
            MessageClass::Lifecycle(Lifecycle::Migrated { from: -1, to: -1002 })
        );
    }

    #[test]
    fn content_kinds() {
        let mut msg = message();
        msg.voice = Some(MediaFile::default());
        assert_eq!(classify(&msg), MessageClass::Content(ContentKind::Voice));

        msg.text = Some("caption-less text".into());
        assert_eq!(classify(&msg), MessageClass::Content(ContentKind::Text));
    }

    #[test]
    fn empty_message_is_unsupported() {
        let mut msg = message();
        msg.text = Some(String::new());
        assert_eq!(classify(&msg), MessageClass::Unsupported);
    }
}
