//! Relay engine: mirrors each user's private conversation into a dedicated
//! topic of the supervisory group and back.
//!
//! The engine owns the coordination logic only. Message transport, text
//! rendering and persistence are reached through [`Transport`],
//! [`Formatter`] and [`topicgram_db::Database`].

pub mod captcha;
pub mod classify;
pub mod commands;
pub mod error;
pub mod locks;
pub mod media;
pub mod media_group;
pub mod relay;
pub mod text;
pub mod transport;

mod topic;
mod user;

pub use captcha::CaptchaPolicy;
pub use error::{RelayError, TransportError, ValidationError};
pub use locks::Identity;
pub use relay::{Relay, RelayConfig};
pub use text::{Catalog, Formatter, Notice, Text};
pub use transport::{EditAction, Target, Transport};
