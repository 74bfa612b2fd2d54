use anyhow::{Context, bail};
use topicgram_relay::{Identity, Transport};
use topicgram_telegram::BotClient;
use topicgram_types::{BotCommand, ChatMember};
use tracing::info;

use crate::config::Config;

/// Confirms the bot can run the configured group and returns who it is.
pub async fn check(client: &BotClient, config: &Config) -> anyhow::Result<Identity> {
    let me = client.get_me().await.context("getMe failed, check TOPICGRAM_BOT_TOKEN")?;
    let bot_username = me.username.unwrap_or_default();
    info!("Running as @{} ({})", bot_username, me.id);

    let group = client
        .get_chat(config.group_id)
        .await
        .with_context(|| format!("cannot read group {}", config.group_id))?;
    if !group.is_forum {
        bail!("group {} does not have topics enabled", config.group_id);
    }

    let member = client
        .get_chat_member(config.group_id, me.id)
        .await
        .context("cannot read the bot's own membership")?;
    let missing = missing_rights(&member);
    if !missing.is_empty() {
        bail!(
            "the bot needs to be an administrator of group {} with: {}",
            config.group_id,
            missing.join(", ")
        );
    }

    Ok(Identity {
        group_id: config.group_id,
        bot_id: me.id,
        bot_username,
    })
}

fn missing_rights(member: &ChatMember) -> Vec<&'static str> {
    if !member.is_administrator() {
        return vec!["administrator status"];
    }
    let mut missing = Vec::new();
    if !member.can_delete_messages {
        missing.push("delete messages");
    }
    if !member.can_pin_messages {
        missing.push("pin messages");
    }
    if !member.can_manage_topics {
        missing.push("manage topics");
    }
    missing
}

/// Points the platform at the webhook and publishes the group commands.
pub async fn register(client: &BotClient, config: &Config) -> anyhow::Result<()> {
    client
        .set_webhook(&config.webhook_url(), &config.webhook_secret(), 100)
        .await
        .context("setWebhook failed")?;

    let commands = [
        ("ban", "Ban a user: /ban <user id>, or /ban inside a topic"),
        ("unban", "Unban a user: /unban <user id>, or /unban inside a topic"),
        ("terminate", "End a conversation and delete its topic"),
    ]
    .map(|(command, description)| BotCommand {
        command: command.into(),
        description: description.into(),
    });
    client
        .set_my_commands(&commands, config.group_id)
        .await
        .context("setMyCommands failed")?;
    Ok(())
}
