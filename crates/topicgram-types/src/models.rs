use serde::{Deserialize, Serialize};

/// A platform account: either an end-user or the bot itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
}

impl User {
    /// First and last name joined by a space, used as the topic title.
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }

    pub fn language(&self) -> &str {
        self.language_code.as_deref().unwrap_or_default()
    }
}

/// A conversation. `getChat` returns the same shape with the optional
/// full-info fields populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub is_forum: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_usernames: Option<Vec<String>>,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }

    pub fn active_username_count(&self) -> usize {
        self.active_usernames.as_ref().map_or(0, Vec::len)
    }
}

/// Membership record returned by `getChatMember`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMember {
    pub status: String,
    #[serde(default)]
    pub can_delete_messages: bool,
    #[serde(default)]
    pub can_pin_messages: bool,
    #[serde(default)]
    pub can_manage_topics: bool,
}

impl ChatMember {
    pub fn is_administrator(&self) -> bool {
        self.status == "administrator"
    }
}

/// Formatting annotation over a UTF-16 range of a text or caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: i32,
    pub length: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_emoji_id: Option<String>,
}

impl MessageEntity {
    pub fn new(kind: &str, offset: i32, length: i32) -> Self {
        Self {
            kind: kind.to_string(),
            offset,
            length,
            url: None,
            language: None,
            custom_emoji_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    #[serde(default)]
    pub file_size: i64,
}

/// Any single-file attachment (animation, audio, document, sticker, video,
/// video note, voice). Fields that a given kind lacks stay at their default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaFile {
    pub file_id: String,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    #[serde(default)]
    pub duration: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PhotoSize>,
}

/// Quoted fragment of the message being replied to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextQuote {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<MessageEntity>>,
    #[serde(default)]
    pub position: i32,
    /// Set when the sender selected the quote by hand rather than the client
    /// quoting the whole message.
    #[serde(default)]
    pub is_manual: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumTopic {
    pub message_thread_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MessageId {
    pub message_id: i32,
}
