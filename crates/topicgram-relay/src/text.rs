//! User-facing text. The engine only names what it wants to say
//! ([`Notice`]); a [`Formatter`] turns that into localized text plus
//! formatting entities.

use topicgram_types::MessageEntity;

use crate::commands::CommandKind;

/// Rendered text with entities. Entity offsets and lengths are in UTF-16
/// code units, as the platform counts them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Text {
    pub text: String,
    pub entities: Vec<MessageEntity>,
}

impl Text {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
        }
    }
}

/// Appends fragments while tracking the UTF-16 length of the text so far.
#[derive(Debug, Default)]
pub struct TextBuilder {
    text: String,
    entities: Vec<MessageEntity>,
    utf16_len: i32,
}

fn utf16_len(s: &str) -> i32 {
    s.encode_utf16().count() as i32
}

impl TextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plain(mut self, s: &str) -> Self {
        self.text.push_str(s);
        self.utf16_len += utf16_len(s);
        self
    }

    /// Appends `s` covered by an entity of `kind` ("bold", "code", ...).
    pub fn styled(mut self, kind: &str, s: &str) -> Self {
        let len = utf16_len(s);
        if len > 0 {
            self.entities
                .push(MessageEntity::new(kind, self.utf16_len, len));
        }
        self.text.push_str(s);
        self.utf16_len += len;
        self
    }

    pub fn bold(self, s: &str) -> Self {
        self.styled("bold", s)
    }

    pub fn code(self, s: &str) -> Self {
        self.styled("code", s)
    }

    /// Link to a user's profile.
    pub fn mention(mut self, s: &str, user_id: i64) -> Self {
        let len = utf16_len(s);
        if len > 0 {
            let mut entity = MessageEntity::new("text_link", self.utf16_len, len);
            entity.url = Some(format!("tg://user?id={}", user_id));
            self.entities.push(entity);
        }
        self.text.push_str(s);
        self.utf16_len += len;
        self
    }

    pub fn build(self) -> Text {
        Text {
            text: self.text,
            entities: self.entities,
        }
    }
}

/// Everything the engine may need to tell either side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Welcome,
    /// Challenge prompt; `problem` is e.g. "37 + 12 = ?".
    Captcha { problem: String, minutes: u64 },
    CaptchaNotCompleted,
    CaptchaFailed,
    CaptchaCompleted,
    /// Into the user's topic: a challenge went out.
    CaptchaSent,
    /// Into the user's topic: the challenge was passed.
    UserVerified,
    Banned,
    Terminated,
    UserBanned { user_id: i64 },
    /// A ban on a user that is banned already; nothing changed.
    AlreadyBanned { user_id: i64 },
    UserUnbanned { user_id: i64 },
    Blocked { user_id: i64 },
    Success,
    /// First message of a new topic.
    Intro {
        name: String,
        username: Option<String>,
        user_id: i64,
    },
    TopicCreateFailed { user_side: bool },
    TopicRequired,
    Unsupported,
    ForwardForbidden,
    FailedToEdit,
    ReplyTargetMissing,
    UnknownCommand,
    Usage(CommandKind),
    DatabaseError,
    Error,
    /// Raw platform error message, relayed as-is.
    Platform { message: String },
}

pub trait Formatter: Send + Sync {
    fn render(&self, language: &str, notice: &Notice) -> Text;
}

/// Built-in catalog: English and Simplified Chinese, English as fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lang {
    En,
    Zh,
}

impl Lang {
    fn pick(code: &str) -> Self {
        if code.to_ascii_lowercase().starts_with("zh") {
            Lang::Zh
        } else {
            Lang::En
        }
    }
}

impl Formatter for Catalog {
    fn render(&self, language: &str, notice: &Notice) -> Text {
        match Lang::pick(language) {
            Lang::En => english(notice),
            Lang::Zh => chinese(notice),
        }
    }
}

fn english(notice: &Notice) -> Text {
    let b = TextBuilder::new();
    match notice {
        Notice::Welcome => b
            .bold("Hello!")
            .plain(" Send a message here and it will reach the team. Replies arrive in this chat.")
            .build(),
        Notice::Captcha { problem, minutes } => b
            .plain("Please verify that you are human. Solve ")
            .code(problem)
            .plain(&format!(" and press the right answer within {} minute(s).", minutes))
            .build(),
        Notice::CaptchaNotCompleted => b.plain("Please complete the verification first.").build(),
        Notice::CaptchaFailed => b
            .plain("Verification failed. Send a new message to get another challenge.")
            .build(),
        Notice::CaptchaCompleted => b.plain("Verification completed. You can chat now.").build(),
        Notice::CaptchaSent => b.plain("A verification challenge was sent to the user.").build(),
        Notice::UserVerified => b.plain("The user passed verification.").build(),
        Notice::Banned => b.plain("You have been banned.").build(),
        Notice::Terminated => b.plain("The conversation has been closed.").build(),
        Notice::UserBanned { user_id } => b
            .plain("User ")
            .code(&user_id.to_string())
            .plain(" is banned.")
            .build(),
        Notice::AlreadyBanned { user_id } => b
            .plain("User ")
            .code(&user_id.to_string())
            .plain(" is already banned.")
            .build(),
        Notice::UserUnbanned { user_id } => b
            .plain("User ")
            .code(&user_id.to_string())
            .plain(" is unbanned.")
            .build(),
        Notice::Blocked { user_id } => b
            .plain("User ")
            .code(&user_id.to_string())
            .plain(" blocked the bot; the topic was removed.")
            .build(),
        Notice::Success => b.plain("Done.").build(),
        Notice::Intro {
            name,
            username,
            user_id,
        } => intro(b, "User: ", "Username: ", "ID: ", name, username.as_deref(), *user_id),
        Notice::TopicCreateFailed { user_side: true } => b
            .plain("Your message could not be delivered. Please try again later.")
            .build(),
        Notice::TopicCreateFailed { user_side: false } => b
            .plain("Failed to create a topic for a new user. Check the bot's permissions.")
            .build(),
        Notice::TopicRequired => b
            .plain("This group must have topics enabled.")
            .build(),
        Notice::Unsupported => b.plain("This kind of message is not supported.").build(),
        Notice::ForwardForbidden => b
            .plain("This message has forwarding restricted and cannot be delivered.")
            .build(),
        Notice::FailedToEdit => b.plain("The edit could not be delivered.").build(),
        Notice::ReplyTargetMissing => b
            .plain("The message you replied to could not be found.")
            .build(),
        Notice::UnknownCommand => b.plain("Unknown command.").build(),
        Notice::Usage(kind) => b
            .plain("Usage: ")
            .code(&format!("/{} <user id>", kind))
            .build(),
        Notice::DatabaseError => b.plain("A database error occurred.").build(),
        Notice::Error => b.plain("Something went wrong. Please try again.").build(),
        Notice::Platform { message } => Text::plain(message.clone()),
    }
}

fn chinese(notice: &Notice) -> Text {
    let b = TextBuilder::new();
    match notice {
        Notice::Welcome => b
            .bold("你好！")
            .plain("在这里发送消息即可联系我们，回复会出现在此对话中。")
            .build(),
        Notice::Captcha { problem, minutes } => b
            .plain("请完成人机验证：计算 ")
            .code(problem)
            .plain(&format!("，并在 {} 分钟内点击正确答案。", minutes))
            .build(),
        Notice::CaptchaNotCompleted => b.plain("请先完成验证。").build(),
        Notice::CaptchaFailed => b.plain("验证失败，请重新发送消息以获取新的验证。").build(),
        Notice::CaptchaCompleted => b.plain("验证完成，现在可以开始对话。").build(),
        Notice::CaptchaSent => b.plain("已向该用户发送验证。").build(),
        Notice::UserVerified => b.plain("该用户已通过验证。").build(),
        Notice::Banned => b.plain("你已被封禁。").build(),
        Notice::Terminated => b.plain("对话已结束。").build(),
        Notice::UserBanned { user_id } => b
            .plain("用户 ")
            .code(&user_id.to_string())
            .plain(" 已被封禁。")
            .build(),
        Notice::AlreadyBanned { user_id } => b
            .plain("用户 ")
            .code(&user_id.to_string())
            .plain(" 此前已被封禁，无需重复操作。")
            .build(),
        Notice::UserUnbanned { user_id } => b
            .plain("用户 ")
            .code(&user_id.to_string())
            .plain(" 已解除封禁。")
            .build(),
        Notice::Blocked { user_id } => b
            .plain("用户 ")
            .code(&user_id.to_string())
            .plain(" 已屏蔽机器人，话题已删除。")
            .build(),
        Notice::Success => b.plain("操作成功。").build(),
        Notice::Intro {
            name,
            username,
            user_id,
        } => intro(b, "用户：", "用户名：", "ID：", name, username.as_deref(), *user_id),
        Notice::TopicCreateFailed { user_side: true } => {
            b.plain("消息发送失败，请稍后再试。").build()
        }
        Notice::TopicCreateFailed { user_side: false } => {
            b.plain("为新用户创建话题失败，请检查机器人权限。").build()
        }
        Notice::TopicRequired => b.plain("该群组需要开启话题功能。").build(),
        Notice::Unsupported => b.plain("不支持此类消息。").build(),
        Notice::ForwardForbidden => b.plain("该消息禁止转发，无法送达。").build(),
        Notice::FailedToEdit => b.plain("编辑无法同步。").build(),
        Notice::ReplyTargetMissing => b.plain("找不到你回复的消息。").build(),
        Notice::UnknownCommand => b.plain("未知命令。").build(),
        Notice::Usage(kind) => b
            .plain("用法：")
            .code(&format!("/{} <用户 ID>", kind))
            .build(),
        Notice::DatabaseError => b.plain("数据库错误。").build(),
        Notice::Error => b.plain("发生错误，请重试。").build(),
        Notice::Platform { message } => Text::plain(message.clone()),
    }
}

fn intro(
    b: TextBuilder,
    user_label: &str,
    username_label: &str,
    id_label: &str,
    name: &str,
    username: Option<&str>,
    user_id: i64,
) -> Text {
    let mut b = b.plain(user_label).mention(name, user_id).plain("\n");
    if let Some(username) = username {
        b = b.plain(username_label).plain(&format!("@{}\n", username));
    }
    b.plain(id_label).code(&user_id.to_string()).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_count_utf16_units() {
        let text = TextBuilder::new().plain("😀 é ").bold("x").build();
        // emoji is a surrogate pair: 2 + space + é + space
        assert_eq!(text.entities[0].offset, 5);
        assert_eq!(text.entities[0].length, 1);
    }

    #[test]
    fn empty_fragment_adds_no_entity() {
        let text = TextBuilder::new().code("").plain("a").build();
        assert!(text.entities.is_empty());
    }

    #[test]
    fn chinese_selected_by_prefix() {
        let zh = Catalog.render("zh-hans", &Notice::Success);
        assert_eq!(zh.text, "操作成功。");
        let fallback = Catalog.render("fr", &Notice::Success);
        assert_eq!(fallback.text, "Done.");
        assert_eq!(Catalog.render("", &Notice::Success).text, "Done.");
    }

    #[test]
    fn intro_links_the_user_and_shows_id() {
        let text = Catalog.render(
            "en",
            &Notice::Intro {
                name: "Ada Lovelace".into(),
                username: Some("ada".into()),
                user_id: 555,
            },
        );
        assert_eq!(text.text, "User: Ada Lovelace\nUsername: @ada\nID: 555");
        assert_eq!(text.entities[0].url.as_deref(), Some("tg://user?id=555"));
        let code = &text.entities[1];
        assert_eq!(code.kind, "code");
        assert_eq!(code.offset, utf16_len("User: Ada Lovelace\nUsername: @ada\nID: "));
    }

    #[test]
    fn repeated_ban_reads_differently() {
        let first = Catalog.render("en", &Notice::UserBanned { user_id: 9 });
        let again = Catalog.render("en", &Notice::AlreadyBanned { user_id: 9 });
        assert_eq!(again.text, "User 9 is already banned.");
        assert_ne!(first.text, again.text);
    }

    #[test]
    fn platform_message_is_verbatim() {
        let text = Catalog.render(
            "zh",
            &Notice::Platform {
                message: "Bad Request: chat not found".into(),
            },
        );
        assert_eq!(text.text, "Bad Request: chat not found");
    }
}
