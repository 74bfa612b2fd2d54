use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use topicgram_relay::TransportError;
use topicgram_relay::transport::TransportResult;
use topicgram_types::{ApiResponse, BotCommand, User};
use tracing::{debug, info};

use crate::requests::{BotCommandScope, SetMyCommands, SetWebhook};

/// HTTP client bound to one bot token.
#[derive(Clone)]
pub struct BotClient {
    http: reqwest::Client,
    /// `{api_url}/bot{token}`
    base: String,
}

impl BotClient {
    /// `proxy` accepts http, https and socks5 URLs.
    pub fn new(api_url: &str, token: &str, proxy: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(30));
        if let Some(url) = proxy {
            let proxy = reqwest::Proxy::all(url).with_context(|| format!("invalid proxy URL {}", url))?;
            builder = builder.proxy(proxy);
        }
        let http = builder.build().context("failed to create HTTP client")?;

        Ok(Self {
            http,
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    /// Calls `method` with `params` as the JSON body.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> TransportResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base, method);
        let response = self
            .http
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;

        // Failed calls still answer with the JSON envelope, whatever the status.
        let status = response.status();
        let envelope: ApiResponse<R> = response
            .json()
            .await
            .map_err(|e| TransportError::Network(format!("{} (HTTP {})", e.without_url(), status)))?;

        let result = unwrap_envelope(envelope, status.as_u16());
        if let Err(e) = &result {
            debug!("{} failed: {}", method, e);
        }
        result
    }

    pub async fn get_me(&self) -> TransportResult<User> {
        self.call("getMe", &serde_json::json!({})).await
    }

    pub async fn set_webhook(&self, url: &str, secret_token: &str, max_connections: u32) -> TransportResult<()> {
        let params = SetWebhook {
            url,
            secret_token,
            max_connections,
            allowed_updates: &["message", "edited_message", "callback_query"],
        };
        let _: bool = self.call("setWebhook", &params).await?;
        info!("Webhook registered at {}", url);
        Ok(())
    }

    /// Registers `commands` for the members of chat `chat_id` only.
    pub async fn set_my_commands(&self, commands: &[BotCommand], chat_id: i64) -> TransportResult<()> {
        let params = SetMyCommands {
            commands,
            scope: BotCommandScope::Chat { chat_id },
        };
        let _: bool = self.call("setMyCommands", &params).await?;
        Ok(())
    }
}

fn unwrap_envelope<R>(envelope: ApiResponse<R>, status: u16) -> TransportResult<R> {
    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse {
            ok: true,
            result: None,
            ..
        } => Err(TransportError::Network("response without result".into())),
        ApiResponse {
            description,
            error_code,
            ..
        } => Err(TransportError::Platform {
            code: error_code.unwrap_or(i32::from(status)),
            message: description.unwrap_or_else(|| "unknown error".into()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_becomes_platform_error() {
        let envelope: ApiResponse<bool> = serde_json::from_str(
            r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#,
        )
        .unwrap();
        let err = unwrap_envelope(envelope, 403).unwrap_err();
        assert!(err.is_blocked());
        assert!(matches!(err, TransportError::Platform { code: 403, .. }));
    }

    #[test]
    fn missing_error_code_falls_back_to_status() {
        let envelope: ApiResponse<bool> = serde_json::from_str(r#"{"ok":false}"#).unwrap();
        let err = unwrap_envelope(envelope, 502).unwrap_err();
        assert!(matches!(err, TransportError::Platform { code: 502, ref message } if message == "unknown error"));
    }

    #[test]
    fn ok_envelope_yields_result() {
        let envelope: ApiResponse<User> = serde_json::from_str(
            r#"{"ok":true,"result":{"id":42,"is_bot":true,"first_name":"Topic","username":"topicbot"}}"#,
        )
        .unwrap();
        let me = unwrap_envelope(envelope, 200).unwrap();
        assert_eq!(me.username.as_deref(), Some("topicbot"));
    }

    #[test]
    fn base_url_includes_token() {
        let client = BotClient::new("https://api.example.org/", "123:abc", None).unwrap();
        assert_eq!(client.base, "https://api.example.org/bot123:abc");
    }
}
