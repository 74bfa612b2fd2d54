//! JSON bodies of the Bot API methods in use. Unset optionals are left out
//! so the platform applies its own defaults.

use serde::Serialize;
use topicgram_types::{
    BotCommand, InlineKeyboardMarkup, InputMedia, MessageEntity, ReplyParameters,
};

#[derive(Serialize)]
pub(crate) struct SendMessage<'a> {
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i32>,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<&'a [MessageEntity]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parameters: Option<&'a ReplyParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Serialize)]
pub(crate) struct ForwardMessage {
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i32>,
    pub from_chat_id: i64,
    pub message_id: i32,
}

#[derive(Serialize)]
pub(crate) struct ForwardMessages<'a> {
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i32>,
    pub from_chat_id: i64,
    pub message_ids: &'a [i32],
}

#[derive(Serialize)]
pub(crate) struct CopyMessage<'a> {
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i32>,
    pub from_chat_id: i64,
    pub message_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parameters: Option<&'a ReplyParameters>,
}

#[derive(Serialize)]
pub(crate) struct SendMediaGroup<'a> {
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i32>,
    pub media: &'a [InputMedia],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parameters: Option<&'a ReplyParameters>,
}

#[derive(Serialize)]
pub(crate) struct EditMessageText<'a> {
    pub chat_id: i64,
    pub message_id: i32,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<&'a Vec<MessageEntity>>,
}

#[derive(Serialize)]
pub(crate) struct EditMessageMedia<'a> {
    pub chat_id: i64,
    pub message_id: i32,
    pub media: &'a InputMedia,
}

#[derive(Serialize)]
pub(crate) struct EditMessageCaption<'a> {
    pub chat_id: i64,
    pub message_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_entities: Option<&'a Vec<MessageEntity>>,
}

#[derive(Serialize)]
pub(crate) struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

#[derive(Serialize)]
pub(crate) struct PinChatMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub disable_notification: bool,
}

#[derive(Serialize)]
pub(crate) struct CreateForumTopic<'a> {
    pub chat_id: i64,
    pub name: &'a str,
}

/// Reopen and delete address a topic the same way.
#[derive(Serialize)]
pub(crate) struct TopicRef {
    pub chat_id: i64,
    pub message_thread_id: i32,
}

#[derive(Serialize)]
pub(crate) struct ChatRef {
    pub chat_id: i64,
}

#[derive(Serialize)]
pub(crate) struct GetChatMember {
    pub chat_id: i64,
    pub user_id: i64,
}

#[derive(Serialize)]
pub(crate) struct SetWebhook<'a> {
    pub url: &'a str,
    pub secret_token: &'a str,
    pub max_connections: u32,
    pub allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum BotCommandScope {
    Chat { chat_id: i64 },
}

#[derive(Serialize)]
pub(crate) struct SetMyCommands<'a> {
    pub commands: &'a [BotCommand],
    pub scope: BotCommandScope,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_omits_unset_fields() {
        let body = SendMessage {
            chat_id: 5,
            message_thread_id: None,
            text: "hi",
            entities: None,
            reply_parameters: None,
            reply_markup: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"chat_id": 5, "text": "hi"}));
    }

    #[test]
    fn copy_into_thread_with_reply() {
        let reply = ReplyParameters {
            message_id: 9,
            allow_sending_without_reply: true,
            ..ReplyParameters::default()
        };
        let body = CopyMessage {
            chat_id: -100,
            message_thread_id: Some(7),
            from_chat_id: 5,
            message_id: 3,
            reply_parameters: Some(&reply),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["message_thread_id"], 7);
        assert_eq!(json["reply_parameters"]["message_id"], 9);
        assert_eq!(json["reply_parameters"]["allow_sending_without_reply"], true);
        assert!(json["reply_parameters"].get("quote").is_none());
    }

    #[test]
    fn command_scope_is_tagged() {
        let body = SetMyCommands {
            commands: &[],
            scope: BotCommandScope::Chat { chat_id: -100 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["scope"], serde_json::json!({"type": "chat", "chat_id": -100}));
    }
}
