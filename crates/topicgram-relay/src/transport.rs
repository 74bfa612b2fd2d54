use topicgram_types::{
    Chat, ChatMember, InlineKeyboardMarkup, InputMedia, MessageEntity, ReplyParameters,
};

use crate::error::TransportError;
use crate::text::Text;

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Destination of an outbound message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Target {
    pub chat_id: i64,
    /// Forum thread; `None` is the chat itself (or the general channel).
    pub thread_id: Option<i32>,
    pub reply: Option<ReplyParameters>,
}

impl Target {
    pub fn chat(chat_id: i64) -> Self {
        Self {
            chat_id,
            ..Self::default()
        }
    }

    /// Thread 0 addresses the general channel.
    pub fn topic(chat_id: i64, thread_id: i32) -> Self {
        Self {
            chat_id,
            thread_id: (thread_id != 0).then_some(thread_id),
            reply: None,
        }
    }

    pub fn replying_to(mut self, message_id: i32) -> Self {
        self.reply = Some(ReplyParameters {
            message_id,
            allow_sending_without_reply: true,
            ..ReplyParameters::default()
        });
        self
    }
}

/// New content for an already relayed message.
#[derive(Debug, Clone, PartialEq)]
pub enum EditAction {
    Text {
        text: String,
        entities: Option<Vec<MessageEntity>>,
    },
    Media(InputMedia),
    Caption {
        caption: Option<String>,
        entities: Option<Vec<MessageEntity>>,
    },
}

/// Outbound message primitives the engine relies on.
///
/// In production: the Bot API client.
/// In tests: a recording mock.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Returns the id of the sent message.
    async fn send_text(
        &self,
        target: &Target,
        text: &Text,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> TransportResult<i32>;

    async fn forward(&self, target: &Target, from_chat: i64, message_id: i32) -> TransportResult<i32>;

    /// Forwards several messages at once; ids come back in input order.
    async fn forward_batch(
        &self,
        target: &Target,
        from_chat: i64,
        message_ids: &[i32],
    ) -> TransportResult<Vec<i32>>;

    /// Re-sends a message without the forward header.
    async fn copy(&self, target: &Target, from_chat: i64, message_id: i32) -> TransportResult<i32>;

    async fn send_media_group(&self, target: &Target, media: &[InputMedia]) -> TransportResult<Vec<i32>>;

    async fn edit(&self, chat_id: i64, message_id: i32, action: &EditAction) -> TransportResult<()>;

    async fn delete(&self, chat_id: i64, message_id: i32) -> TransportResult<()>;

    /// Returns the new thread id.
    async fn create_topic(&self, chat_id: i64, name: &str) -> TransportResult<i32>;

    async fn reopen_topic(&self, chat_id: i64, thread_id: i32) -> TransportResult<()>;

    async fn delete_topic(&self, chat_id: i64, thread_id: i32) -> TransportResult<()>;

    async fn pin(&self, chat_id: i64, message_id: i32) -> TransportResult<()>;

    async fn get_chat(&self, chat_id: i64) -> TransportResult<Chat>;

    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> TransportResult<ChatMember>;
}
