pub mod giveaway;
pub mod roles;

use serenity::all::{
    ChannelType, CommandDataOptionValue, CommandInteraction, CreateInteractionResponse,
    CreateInteractionResponseMessage, UserId,
};
use serenity::prelude::Context;
use std::sync::Arc;
use tracing::{error, warn};

use crate::db::models::GiveawayKey;
use crate::error::GiveawayError;
use crate::giveaway::GiveawayService;

pub async fn register_commands(ctx: &Context) -> anyhow::Result<()> {
    giveaway::register(ctx).await?;
    giveaway::register_cancel(ctx).await?;
    giveaway::register_reroll(ctx).await?;
    roles::register_role(ctx).await?;
    roles::register_my_roles(ctx).await?;
    roles::register_role_members(ctx).await?;
    Ok(())
}

pub async fn handle(ctx: &Context, cmd: &CommandInteraction, service: &Arc<GiveawayService>) -> anyhow::Result<()> {
    match cmd.data.name.as_str() {
        "giveaway" => giveaway::handle_start(ctx, cmd, service).await,
        "giveaway_cancel" => giveaway::handle_cancel(ctx, cmd, service).await,
        "reroll" | giveaway::REROLL_MENU => giveaway::handle_reroll(ctx, cmd, service).await,
        "role" => roles::handle_role(ctx, cmd, service).await,
        "my_roles" => roles::handle_my_roles(ctx, cmd, service).await,
        "role_members" => roles::handle_role_members(ctx, cmd, service).await,
        _ => Ok(()),
    }
}

/// Every command answers exactly once, visible only to whoever ran it.
pub(crate) async fn reply(ctx: &Context, cmd: &CommandInteraction, content: impl Into<String>) -> anyhow::Result<()> {
    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new().content(content).ephemeral(true),
        ),
    )
    .await?;
    Ok(())
}

pub(crate) async fn reply_error(
    ctx: &Context,
    cmd: &CommandInteraction,
    err: GiveawayError,
) -> anyhow::Result<()> {
    let command = cmd.data.name.as_str();
    if err.is_user_error() {
        warn!(command, user = cmd.user.id.get(), "rejected: {err}");
    } else {
        error!(command, user = cmd.user.id.get(), "failed: {err}");
    }
    reply(ctx, cmd, err.to_string()).await
}

pub(crate) fn string_opt(cmd: &CommandInteraction, name: &str) -> Option<String> {
    cmd.data.options.iter().find(|o| o.name == name).and_then(|o| match &o.value {
        CommandDataOptionValue::String(s) => Some(s.clone()),
        _ => None,
    })
}

pub(crate) fn integer_opt(cmd: &CommandInteraction, name: &str) -> Option<i64> {
    cmd.data.options.iter().find(|o| o.name == name).and_then(|o| match &o.value {
        CommandDataOptionValue::Integer(n) => Some(*n),
        _ => None,
    })
}

pub(crate) fn user_opt(cmd: &CommandInteraction, name: &str) -> Option<UserId> {
    cmd.data.options.iter().find(|o| o.name == name).and_then(|o| match &o.value {
        CommandDataOptionValue::User(u) => Some(*u),
        _ => None,
    })
}

/// Commands issued inside a thread address the thread's giveaway, keyed under its parent channel.
pub(crate) fn key_for(cmd: &CommandInteraction) -> GiveawayKey {
    let here = cmd.channel_id.get();
    match &cmd.channel {
        Some(ch)
            if matches!(
                ch.kind,
                ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
            ) =>
        {
            match ch.parent_id {
                Some(parent) => GiveawayKey::new(parent.get(), Some(here)),
                None => GiveawayKey::new(here, None),
            }
        }
        _ => GiveawayKey::new(here, None),
    }
}
