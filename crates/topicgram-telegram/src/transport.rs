use topicgram_relay::transport::TransportResult;
use topicgram_relay::{EditAction, Target, Text, Transport};
use topicgram_types::{
    Chat, ChatMember, ForumTopic, InlineKeyboardMarkup, InputMedia, MessageId,
};

use crate::client::BotClient;
use crate::requests::{
    ChatRef, CopyMessage, CreateForumTopic, EditMessageCaption, EditMessageMedia,
    EditMessageText, ForwardMessage, ForwardMessages, GetChatMember, MessageRef,
    PinChatMessage, SendMediaGroup, SendMessage, TopicRef,
};

impl BotClient {
    async fn topic_call(&self, method: &str, chat_id: i64, thread_id: i32) -> TransportResult<()> {
        let params = TopicRef {
            chat_id,
            message_thread_id: thread_id,
        };
        let _: bool = self.call(method, &params).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for BotClient {
    async fn send_text(
        &self,
        target: &Target,
        text: &Text,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> TransportResult<i32> {
        let params = SendMessage {
            chat_id: target.chat_id,
            message_thread_id: target.thread_id,
            text: &text.text,
            entities: (!text.entities.is_empty()).then_some(text.entities.as_slice()),
            reply_parameters: target.reply.as_ref(),
            reply_markup: markup,
        };
        let sent: MessageId = self.call("sendMessage", &params).await?;
        Ok(sent.message_id)
    }

    async fn forward(&self, target: &Target, from_chat: i64, message_id: i32) -> TransportResult<i32> {
        let params = ForwardMessage {
            chat_id: target.chat_id,
            message_thread_id: target.thread_id,
            from_chat_id: from_chat,
            message_id,
        };
        let sent: MessageId = self.call("forwardMessage", &params).await?;
        Ok(sent.message_id)
    }

    async fn forward_batch(
        &self,
        target: &Target,
        from_chat: i64,
        message_ids: &[i32],
    ) -> TransportResult<Vec<i32>> {
        let params = ForwardMessages {
            chat_id: target.chat_id,
            message_thread_id: target.thread_id,
            from_chat_id: from_chat,
            message_ids,
        };
        let sent: Vec<MessageId> = self.call("forwardMessages", &params).await?;
        Ok(sent.into_iter().map(|m| m.message_id).collect())
    }

    async fn copy(&self, target: &Target, from_chat: i64, message_id: i32) -> TransportResult<i32> {
        let params = CopyMessage {
            chat_id: target.chat_id,
            message_thread_id: target.thread_id,
            from_chat_id: from_chat,
            message_id,
            reply_parameters: target.reply.as_ref(),
        };
        let sent: MessageId = self.call("copyMessage", &params).await?;
        Ok(sent.message_id)
    }

    async fn send_media_group(&self, target: &Target, media: &[InputMedia]) -> TransportResult<Vec<i32>> {
        let params = SendMediaGroup {
            chat_id: target.chat_id,
            message_thread_id: target.thread_id,
            media,
            reply_parameters: target.reply.as_ref(),
        };
        let sent: Vec<MessageId> = self.call("sendMediaGroup", &params).await?;
        Ok(sent.into_iter().map(|m| m.message_id).collect())
    }

    async fn edit(&self, chat_id: i64, message_id: i32, action: &EditAction) -> TransportResult<()> {
        // Edits answer with the message or `true`; neither is needed.
        let _: serde_json::Value = match action {
            EditAction::Text { text, entities } => {
                let params = EditMessageText {
                    chat_id,
                    message_id,
                    text,
                    entities: entities.as_ref(),
                };
                self.call("editMessageText", &params).await?
            }
            EditAction::Media(media) => {
                let params = EditMessageMedia {
                    chat_id,
                    message_id,
                    media,
                };
                self.call("editMessageMedia", &params).await?
            }
            EditAction::Caption { caption, entities } => {
                let params = EditMessageCaption {
                    chat_id,
                    message_id,
                    caption: caption.as_deref(),
                    caption_entities: entities.as_ref(),
                };
                self.call("editMessageCaption", &params).await?
            }
        };
        Ok(())
    }

    async fn delete(&self, chat_id: i64, message_id: i32) -> TransportResult<()> {
        let _: bool = self
            .call("deleteMessage", &MessageRef { chat_id, message_id })
            .await?;
        Ok(())
    }

    async fn create_topic(&self, chat_id: i64, name: &str) -> TransportResult<i32> {
        let topic: ForumTopic = self
            .call("createForumTopic", &CreateForumTopic { chat_id, name })
            .await?;
        Ok(topic.message_thread_id)
    }

    async fn reopen_topic(&self, chat_id: i64, thread_id: i32) -> TransportResult<()> {
        self.topic_call("reopenForumTopic", chat_id, thread_id).await
    }

    async fn delete_topic(&self, chat_id: i64, thread_id: i32) -> TransportResult<()> {
        self.topic_call("deleteForumTopic", chat_id, thread_id).await
    }

    async fn pin(&self, chat_id: i64, message_id: i32) -> TransportResult<()> {
        let params = PinChatMessage {
            chat_id,
            message_id,
            disable_notification: true,
        };
        let _: bool = self.call("pinChatMessage", &params).await?;
        Ok(())
    }

    async fn get_chat(&self, chat_id: i64) -> TransportResult<Chat> {
        self.call("getChat", &ChatRef { chat_id }).await
    }

    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> TransportResult<ChatMember> {
        self.call("getChatMember", &GetChatMember { chat_id, user_id })
            .await
    }
}
