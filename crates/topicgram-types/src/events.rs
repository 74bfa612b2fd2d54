use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Chat, MediaFile, MessageEntity, PhotoSize, TextQuote, User};

/// One inbound update as delivered by the platform webhook.
/// Exactly one of the payload fields is expected to be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// The conversation the update originated in.
    pub fn chat(&self) -> Option<&Chat> {
        if let Some(msg) = self.message.as_ref().or(self.edited_message.as_ref()) {
            return Some(&msg.chat);
        }
        self.callback_query
            .as_ref()
            .and_then(|cb| cb.message.as_ref())
            .map(|msg| &msg.chat)
    }

    /// The account that caused the update.
    pub fn sender(&self) -> Option<&User> {
        if let Some(msg) = self.message.as_ref().or(self.edited_message.as_ref()) {
            return msg.from.as_ref();
        }
        self.callback_query.as_ref().map(|cb| &cb.from)
    }
}

/// A pressed inline-keyboard button.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,

    // -- Content --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<MessageEntity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_entities: Option<Vec<MessageEntity>>,
    #[serde(default)]
    pub show_caption_above_media: bool,
    #[serde(default)]
    pub has_media_spoiler: bool,
    #[serde(default)]
    pub has_protected_content: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<MediaFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<MediaFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<MediaFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_note: Option<MediaFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<MediaFile>,

    // -- Reply / forward context --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_origin: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message: Option<Box<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<TextQuote>,

    // -- Service side effects --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_chat_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_chat_photo: Option<Value>,
    #[serde(default)]
    pub delete_chat_photo: bool,
    #[serde(default)]
    pub group_chat_created: bool,
    #[serde(default)]
    pub supergroup_chat_created: bool,
    #[serde(default)]
    pub channel_chat_created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_chat_members: Option<Vec<User>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_chat_member: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_auto_delete_timer_changed: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_payment: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_access_allowed: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forum_topic_edited: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_forum_topic_hidden: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_forum_topic_unhidden: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_chat_scheduled: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_chat_started: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_chat_ended: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_chat_participants_invited: Option<Value>,

    // -- Ignored payloads --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_app_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forum_topic_created: Option<Value>,

    // -- Topic lifecycle / container migration --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forum_topic_closed: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forum_topic_reopened: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_to_chat_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_from_chat_id: Option<i64>,
}

impl Message {
    /// Sub-channel the message was posted in; 0 is the general channel.
    pub fn thread_id(&self) -> i32 {
        self.message_thread_id.unwrap_or_default()
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    pub fn sender_id(&self) -> i64 {
        self.from.as_ref().map_or(0, |u| u.id)
    }

    pub fn is_forwarded(&self) -> bool {
        self.forward_origin.is_some()
    }

    /// Largest photo size by file size, which is what gets re-sent.
    pub fn best_photo(&self) -> Option<&PhotoSize> {
        self.photo
            .as_ref()
            .and_then(|sizes| sizes.iter().max_by_key(|p| p.file_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bundled_photo_update() {
        let raw = r#"{
            "update_id": 42,
            "message": {
                "message_id": 7,
                "from": {"id": 555, "is_bot": false, "first_name": "Ada", "language_code": "en"},
                "chat": {"id": 555, "type": "private", "first_name": "Ada"},
                "date": 1700000000,
                "media_group_id": "g-1",
                "photo": [
                    {"file_id": "small", "width": 90, "height": 90, "file_size": 100},
                    {"file_id": "large", "width": 800, "height": 800, "file_size": 9000}
                ],
                "caption": "look"
            }
        }"#;

        let update: Update = serde_json::from_str(raw).unwrap();
        let msg = update.message.as_ref().unwrap();
        assert_eq!(msg.media_group_id.as_deref(), Some("g-1"));
        assert_eq!(msg.best_photo().unwrap().file_id, "large");
        assert_eq!(update.sender().unwrap().id, 555);
        assert!(update.chat().unwrap().is_private());
        assert_eq!(msg.thread_id(), 0);
    }

    #[test]
    fn callback_update_resolves_chat_through_message() {
        let raw = r#"{
            "update_id": 43,
            "callback_query": {
                "id": "cb",
                "from": {"id": 9, "first_name": "Bo"},
                "message": {"message_id": 3, "chat": {"id": 9, "type": "private"}},
                "data": "abc"
            }
        }"#;

        let update: Update = serde_json::from_str(raw).unwrap();
        assert_eq!(update.chat().unwrap().id, 9);
        assert_eq!(update.sender().unwrap().first_name, "Bo");
    }
}
