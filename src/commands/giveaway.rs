use serenity::all::*;
use std::sync::Arc;

use super::{integer_opt, key_for, reply, reply_error, string_opt};
use crate::giveaway::{GiveawayService, StartRequest};
use crate::utils::{escape_markdown, mention_user};

pub const REROLL_MENU: &str = "Reroll giveaway";

pub async fn register(ctx: &Context) -> anyhow::Result<()> {
    Command::create_global_command(
        &ctx.http,
        CreateCommand::new("giveaway")
            .description("Start a giveaway in this channel or thread (admins only)")
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "winners", "How many winners to draw")
                    .required(true)
                    .min_int_value(1),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "duration", "e.g. 30m, 2h, 1d").required(true),
            )
            .add_option(CreateCommandOption::new(CommandOptionType::String, "prize", "What is being given away").required(true))
            .add_option(CreateCommandOption::new(
                CommandOptionType::String,
                "role",
                "Only members holding this bot role may enter",
            )),
    )
    .await?;
    Ok(())
}

pub async fn register_cancel(ctx: &Context) -> anyhow::Result<()> {
    Command::create_global_command(
        &ctx.http,
        CreateCommand::new("giveaway_cancel").description("Cancel the giveaway running here (admins only)"),
    )
    .await?;
    Ok(())
}

pub async fn register_reroll(ctx: &Context) -> anyhow::Result<()> {
    Command::create_global_command(
        &ctx.http,
        CreateCommand::new("reroll")
            .description("Draw one more winner for a finished giveaway (admins only)")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "message_id", "Result message id or link")
                    .required(true),
            ),
    )
    .await?;
    Command::create_global_command(&ctx.http, CreateCommand::new(REROLL_MENU).kind(CommandType::Message)).await?;
    Ok(())
}

pub async fn handle_start(ctx: &Context, cmd: &CommandInteraction, service: &Arc<GiveawayService>) -> anyhow::Result<()> {
    let duration = string_opt(cmd, "duration").unwrap_or_default();
    let req = StartRequest {
        key: key_for(cmd),
        requester_id: cmd.user.id.get(),
        requester_mention: mention_user(cmd.user.id.get()),
        winners: integer_opt(cmd, "winners").unwrap_or(0),
        duration: duration.clone(),
        role: string_opt(cmd, "role"),
        prize: string_opt(cmd, "prize").unwrap_or_default(),
    };

    match service.start(req).await {
        Ok(receipt) => {
            let text = format!(
                "Giveaway for **{}** started! It ends in {} (<t:{}:R>).",
                escape_markdown(&receipt.prize),
                duration.trim(),
                receipt.end_time.timestamp()
            );
            reply(ctx, cmd, text).await
        }
        Err(e) => reply_error(ctx, cmd, e).await,
    }
}

pub async fn handle_cancel(ctx: &Context, cmd: &CommandInteraction, service: &Arc<GiveawayService>) -> anyhow::Result<()> {
    match service.cancel(key_for(cmd), cmd.user.id.get()).await {
        Ok(state) => reply(ctx, cmd, format!("Giveaway for **{}** cancelled.", escape_markdown(&state.prize))).await,
        Err(e) => reply_error(ctx, cmd, e).await,
    }
}

/// Handles both `/reroll message_id:<id>` and the message context menu on a result announcement.
pub async fn handle_reroll(ctx: &Context, cmd: &CommandInteraction, service: &Arc<GiveawayService>) -> anyhow::Result<()> {
    let target = match cmd.data.kind {
        CommandType::Message => cmd.data.target_id.map(|t| t.get()),
        _ => string_opt(cmd, "message_id").as_deref().and_then(parse_message_ref),
    };
    let Some(announcement_id) = target else {
        return reply(ctx, cmd, "Give the id or link of the giveaway's result message.").await;
    };

    match service.reroll(cmd.user.id.get(), announcement_id).await {
        Ok(winner) => reply(ctx, cmd, format!("Rerolled: {} is the new winner.", mention_user(winner))).await,
        Err(e) => reply_error(ctx, cmd, e).await,
    }
}

/// Accepts a bare id or a `https://discord.com/channels/<guild>/<channel>/<message>` link.
fn parse_message_ref(raw: &str) -> Option<u64> {
    let raw = raw.trim().trim_end_matches('/');
    let last = raw.rsplit('/').next()?;
    last.parse().ok().filter(|id| *id != 0)
}
