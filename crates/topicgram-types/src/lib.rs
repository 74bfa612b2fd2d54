//! Bot-platform wire model shared by the relay engine, the HTTP client and
//! the webhook receiver.
//!
//! - `events`: inbound updates (messages, edits, button callbacks)
//! - `models`: accounts, chats, attachments and formatting entities
//! - `api`: outbound request pieces and the response envelope

pub mod api;
pub mod events;
pub mod models;

pub use api::{
    ApiResponse, BotCommand, InlineKeyboardButton, InlineKeyboardMarkup, InputMedia,
    InputMediaKind, ReplyParameters,
};
pub use events::{CallbackQuery, Message, Update};
pub use models::{
    Chat, ChatMember, ForumTopic, MediaFile, MessageEntity, MessageId, PhotoSize, TextQuote, User,
};
