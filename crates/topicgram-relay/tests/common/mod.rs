#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use topicgram_db::Database;
use topicgram_relay::transport::TransportResult;
use topicgram_relay::{
    EditAction, Formatter, Identity, Notice, Relay, RelayConfig, Target, Text, Transport,
    TransportError,
};
use topicgram_types::{
    Chat, ChatMember, InlineKeyboardMarkup, InputMedia, Message, Update, User,
};

pub const GROUP: i64 = -100_200;
pub const BOT_ID: i64 = 42;
pub const BOT_USERNAME: &str = "topicbot";
pub const SECRET: &str = "123:test-token";
pub const OPERATOR: i64 = 7;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SendText {
        target: Target,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    },
    Forward {
        target: Target,
        from_chat: i64,
        message_id: i32,
    },
    ForwardBatch {
        target: Target,
        from_chat: i64,
        message_ids: Vec<i32>,
    },
    Copy {
        target: Target,
        from_chat: i64,
        message_id: i32,
    },
    SendMediaGroup {
        target: Target,
        media: Vec<InputMedia>,
    },
    Edit {
        chat_id: i64,
        message_id: i32,
        action: EditAction,
    },
    Delete {
        chat_id: i64,
        message_id: i32,
    },
    CreateTopic {
        chat_id: i64,
        name: String,
    },
    ReopenTopic {
        chat_id: i64,
        thread_id: i32,
    },
    DeleteTopic {
        chat_id: i64,
        thread_id: i32,
    },
    Pin {
        chat_id: i64,
        message_id: i32,
    },
    GetChat {
        chat_id: i64,
    },
}

/// Records every call. Message ids count up from 1000, thread ids from 100.
pub struct MockTransport {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<&'static str, TransportError>>,
    profile: Mutex<Chat>,
    next_message: AtomicI32,
    next_thread: AtomicI32,
    short_batches: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            profile: Mutex::new(Chat::default()),
            next_message: AtomicI32::new(1000),
            next_thread: AtomicI32::new(100),
            short_batches: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Every later call of `method` fails with `err`.
    pub fn fail(&self, method: &'static str, err: TransportError) {
        self.failures.lock().unwrap().insert(method, err);
    }

    /// Batch sends report one message id fewer than they were given.
    pub fn short_batches(&self) {
        self.short_batches.store(true, Ordering::SeqCst);
    }

    pub fn set_profile(&self, chat: Chat) {
        *self.profile.lock().unwrap() = chat;
    }

    /// Texts sent to `chat_id`, in order.
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SendText { target, text, .. } if target.chat_id == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, method: &'static str, call: Call) -> TransportResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn message_id(&self) -> i32 {
        self.next_message.fetch_add(1, Ordering::SeqCst)
    }

    fn batch_ids(&self, len: usize) -> Vec<i32> {
        let len = if self.short_batches.load(Ordering::SeqCst) {
            len.saturating_sub(1)
        } else {
            len
        };
        (0..len).map(|_| self.message_id()).collect()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send_text(
        &self,
        target: &Target,
        text: &Text,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> TransportResult<i32> {
        self.record(
            "send_text",
            Call::SendText {
                target: target.clone(),
                text: text.text.clone(),
                markup: markup.cloned(),
            },
        )?;
        Ok(self.message_id())
    }

    async fn forward(&self, target: &Target, from_chat: i64, message_id: i32) -> TransportResult<i32> {
        self.record(
            "forward",
            Call::Forward {
                target: target.clone(),
                from_chat,
                message_id,
            },
        )?;
        Ok(self.message_id())
    }

    async fn forward_batch(
        &self,
        target: &Target,
        from_chat: i64,
        message_ids: &[i32],
    ) -> TransportResult<Vec<i32>> {
        self.record(
            "forward_batch",
            Call::ForwardBatch {
                target: target.clone(),
                from_chat,
                message_ids: message_ids.to_vec(),
            },
        )?;
        Ok(self.batch_ids(message_ids.len()))
    }

    async fn copy(&self, target: &Target, from_chat: i64, message_id: i32) -> TransportResult<i32> {
        self.record(
            "copy",
            Call::Copy {
                target: target.clone(),
                from_chat,
                message_id,
            },
        )?;
        Ok(self.message_id())
    }

    async fn send_media_group(&self, target: &Target, media: &[InputMedia]) -> TransportResult<Vec<i32>> {
        self.record(
            "send_media_group",
            Call::SendMediaGroup {
                target: target.clone(),
                media: media.to_vec(),
            },
        )?;
        Ok(self.batch_ids(media.len()))
    }

    async fn edit(&self, chat_id: i64, message_id: i32, action: &EditAction) -> TransportResult<()> {
        self.record(
            "edit",
            Call::Edit {
                chat_id,
                message_id,
                action: action.clone(),
            },
        )
    }

    async fn delete(&self, chat_id: i64, message_id: i32) -> TransportResult<()> {
        self.record("delete", Call::Delete { chat_id, message_id })
    }

    async fn create_topic(&self, chat_id: i64, name: &str) -> TransportResult<i32> {
        self.record(
            "create_topic",
            Call::CreateTopic {
                chat_id,
                name: name.to_string(),
            },
        )?;
        Ok(self.next_thread.fetch_add(1, Ordering::SeqCst))
    }

    async fn reopen_topic(&self, chat_id: i64, thread_id: i32) -> TransportResult<()> {
        self.record("reopen_topic", Call::ReopenTopic { chat_id, thread_id })
    }

    async fn delete_topic(&self, chat_id: i64, thread_id: i32) -> TransportResult<()> {
        self.record("delete_topic", Call::DeleteTopic { chat_id, thread_id })
    }

    async fn pin(&self, chat_id: i64, message_id: i32) -> TransportResult<()> {
        self.record("pin", Call::Pin { chat_id, message_id })
    }

    async fn get_chat(&self, chat_id: i64) -> TransportResult<Chat> {
        self.record("get_chat", Call::GetChat { chat_id })?;
        let mut chat = self.profile.lock().unwrap().clone();
        chat.id = chat_id;
        Ok(chat)
    }

    async fn get_chat_member(&self, _chat_id: i64, _user_id: i64) -> TransportResult<ChatMember> {
        Ok(ChatMember {
            status: "administrator".into(),
            can_delete_messages: true,
            can_pin_messages: true,
            can_manage_topics: true,
        })
    }
}

/// Renders notices as their debug form so tests can match on them.
pub struct DebugFormatter;

impl Formatter for DebugFormatter {
    fn render(&self, _language: &str, notice: &Notice) -> Text {
        Text::plain(format!("{:?}", notice))
    }
}

pub struct Harness {
    pub relay: Relay,
    pub db: Arc<Database>,
    pub transport: Arc<MockTransport>,
}

pub fn harness() -> Harness {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let transport = Arc::new(MockTransport::new());
    let identity = Identity {
        group_id: GROUP,
        bot_id: BOT_ID,
        bot_username: BOT_USERNAME.into(),
    };
    let relay = Relay::new(
        RelayConfig::new(SECRET),
        identity,
        db.clone(),
        transport.clone(),
        Arc::new(DebugFormatter),
    );
    Harness { relay, db, transport }
}

pub fn user(id: i64) -> User {
    User {
        id,
        first_name: "Ada".into(),
        last_name: Some("Lovelace".into()),
        username: Some("ada".into()),
        language_code: Some("en".into()),
        ..User::default()
    }
}

pub fn private_chat(id: i64) -> Chat {
    Chat {
        id,
        kind: "private".into(),
        ..Chat::default()
    }
}

pub fn group_chat() -> Chat {
    Chat {
        id: GROUP,
        kind: "supergroup".into(),
        is_forum: true,
        ..Chat::default()
    }
}

/// A text message from user `user_id` in their private chat.
pub fn user_text(user_id: i64, message_id: i32, text: &str) -> Message {
    Message {
        message_id,
        from: Some(user(user_id)),
        chat: private_chat(user_id),
        text: Some(text.into()),
        ..Message::default()
    }
}

/// A text message from the operator inside `thread_id` of the group.
pub fn operator_text(thread_id: i32, message_id: i32, text: &str) -> Message {
    Message {
        message_id,
        message_thread_id: (thread_id != 0).then_some(thread_id),
        from: Some(user(OPERATOR)),
        chat: group_chat(),
        text: Some(text.into()),
        ..Message::default()
    }
}

pub fn message_update(msg: Message) -> Update {
    Update {
        update_id: 1,
        message: Some(msg),
        ..Update::default()
    }
}

pub fn edit_update(msg: Message) -> Update {
    Update {
        update_id: 2,
        edited_message: Some(msg),
        ..Update::default()
    }
}

pub fn blocked() -> TransportError {
    TransportError::Platform {
        code: 403,
        message: "Forbidden: bot was blocked by the user".into(),
    }
}
