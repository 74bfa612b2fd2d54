use thiserror::Error;

use crate::commands::CommandKind;

/// Failure reported by the outbound transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The platform rejected the call.
    #[error("platform error {code}: {message}")]
    Platform { code: i32, message: String },

    /// The call never produced a platform answer.
    #[error("network error: {0}")]
    Network(String),
}

impl TransportError {
    /// The recipient stopped the bot; the conversation cannot continue.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Platform { message, .. } if message.contains("bot was blocked by the user"))
    }
}

/// Which lookup a missing message link broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPurpose {
    Reply,
    Edit,
}

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("unsupported content")]
    Unsupported,

    #[error("no linked message for {0:?}")]
    MissingLink(LinkPurpose),

    #[error("batch length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("malformed argument for /{0}")]
    BadArgument(CommandKind),
}

/// Terminal failure of one update's handling.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl RelayError {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_blocked())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
