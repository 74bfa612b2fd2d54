use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Ban,
    Unban,
    Terminate,
    Start,
    Help,
}

impl CommandKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ban => "ban",
            Self::Unban => "unban",
            Self::Terminate => "terminate",
            Self::Start => "start",
            Self::Help => "help",
        }
    }

    pub fn is_administrative(self) -> bool {
        matches!(self, Self::Ban | Self::Unban | Self::Terminate)
    }

    fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "ban" => Self::Ban,
            "unban" => Self::Unban,
            "terminate" => Self::Terminate,
            "start" => Self::Start,
            "help" => Self::Help,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    pub kind: CommandKind,
    /// Everything after the first space, trimmed.
    pub arg: &'a str,
    /// Written as `/cmd@botname`.
    pub addressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parsed<'a> {
    NotCommand,
    Known(Command<'a>),
    /// `addressed` is set for `/whatever@botname`.
    Unknown { addressed: bool },
}

/// Parses `/name[@bot] [arg]`. Commands addressed to another bot are
/// unknown and not addressed.
pub fn parse<'a>(text: &'a str, bot_username: &str) -> Parsed<'a> {
    let Some(rest) = text.strip_prefix('/') else {
        return Parsed::NotCommand;
    };

    let (head, arg) = rest.split_once(' ').unwrap_or((rest, ""));
    let (name, mention) = match head.split_once('@') {
        Some((name, mention)) => (name, Some(mention)),
        None => (head, None),
    };

    let addressed = match mention {
        Some(m) if !bot_username.is_empty() && m.eq_ignore_ascii_case(bot_username) => true,
        Some(_) => return Parsed::Unknown { addressed: false },
        None => false,
    };

    match CommandKind::from_name(name) {
        Some(kind) => Parsed::Known(Command {
            kind,
            arg: arg.trim(),
            addressed,
        }),
        None => Parsed::Unknown { addressed },
    }
}
