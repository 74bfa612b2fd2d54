use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use md5::Md5;
use sha2::{Digest, Sha256};
use topicgram_relay::{CaptchaPolicy, RelayConfig};

pub const WEBHOOK_PATH: &str = "/topicgram/webhook";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub group_id: i64,
    pub webhook_host: String,
    pub language: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub api_url: String,
    pub proxy: Option<String>,
    pub captcha: CaptchaPolicy,
    pub retention: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `TOPICGRAM_*` settings through `lookup`. Empty values count as
    /// unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).with_context(|| format!("{} is not set", key));

        let bot_token = required("TOPICGRAM_BOT_TOKEN")?;
        let group_id: i64 = required("TOPICGRAM_GROUP_ID")?
            .parse()
            .context("TOPICGRAM_GROUP_ID must be an integer")?;
        if group_id == 0 {
            bail!("TOPICGRAM_GROUP_ID must not be 0");
        }
        let webhook_host = required("TOPICGRAM_WEBHOOK_HOST")?;

        let port: u16 = get("TOPICGRAM_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("TOPICGRAM_PORT must be a port number")?;

        let legacy_user_id: i64 = get("TOPICGRAM_LEGACY_USER_ID")
            .map(|v| v.parse())
            .transpose()
            .context("TOPICGRAM_LEGACY_USER_ID must be an integer")?
            .unwrap_or(1_000_000_000);
        let flag = |key: &str| -> anyhow::Result<bool> {
            match get(key).as_deref() {
                None => Ok(true),
                Some(v) => parse_flag(v).with_context(|| format!("{} must be true or false", key)),
            }
        };
        let captcha = CaptchaPolicy {
            premium_bypass: flag("TOPICGRAM_PREMIUM_BYPASS")?,
            legacy_user_id: (legacy_user_id > 0).then_some(legacy_user_id),
            multi_handle_bypass: flag("TOPICGRAM_MULTI_HANDLE_BYPASS")?,
        };

        let retention_days: u64 = get("TOPICGRAM_MESSAGE_RETENTION_DAYS")
            .map(|v| v.parse())
            .transpose()
            .context("TOPICGRAM_MESSAGE_RETENTION_DAYS must be a number of days")?
            .unwrap_or(30);

        Ok(Self {
            bot_token,
            group_id,
            webhook_host,
            language: get("TOPICGRAM_LANGUAGE").unwrap_or_else(|| "en".into()),
            db_path: get("TOPICGRAM_DB_PATH")
                .unwrap_or_else(|| "topicgram.db".into())
                .into(),
            host: get("TOPICGRAM_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            api_url: get("TOPICGRAM_API_URL").unwrap_or_else(|| "https://api.telegram.org".into()),
            proxy: get("TOPICGRAM_PROXY"),
            captcha,
            retention: Duration::from_secs(retention_days * 24 * 60 * 60),
        })
    }

    pub fn webhook_url(&self) -> String {
        format!("https://{}{}", self.webhook_host, WEBHOOK_PATH)
    }

    /// Expected `X-Telegram-Bot-Api-Secret-Token`, derived so that it never
    /// has to be configured separately.
    pub fn webhook_secret(&self) -> String {
        let host = hex::encode(Md5::digest(self.webhook_host.as_bytes()));
        let token = hex::encode(Sha256::digest(self.bot_token.as_bytes()));
        host + &token
    }

    pub fn relay_config(&self) -> RelayConfig {
        let mut config = RelayConfig::new(self.bot_token.clone());
        config.language = self.language.clone();
        config.captcha = self.captcha.clone();
        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
