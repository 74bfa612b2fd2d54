//! Bot API client over HTTPS. Implements the relay engine's
//! [`topicgram_relay::Transport`] on top of plain JSON calls.

pub mod client;
mod requests;
mod transport;

pub use client::BotClient;
