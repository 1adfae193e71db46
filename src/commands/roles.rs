use serenity::all::*;
use std::sync::Arc;

use super::{reply, reply_error, string_opt, user_opt};
use crate::giveaway::GiveawayService;
use crate::utils::{escape_markdown, mention_user, normalize_role};

pub async fn register_role(ctx: &Context) -> anyhow::Result<()> {
    Command::create_global_command(
        &ctx.http,
        CreateCommand::new("role")
            .description("Grant or revoke a giveaway role (admins only)")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "action", "add or remove")
                    .required(true)
                    .add_string_choice("add", "add")
                    .add_string_choice("remove", "remove"),
            )
            .add_option(CreateCommandOption::new(CommandOptionType::String, "role", "Role name").required(true))
            .add_option(CreateCommandOption::new(CommandOptionType::User, "user", "Target member").required(true)),
    )
    .await?;
    Ok(())
}

pub async fn register_my_roles(ctx: &Context) -> anyhow::Result<()> {
    Command::create_global_command(
        &ctx.http,
        CreateCommand::new("my_roles").description("List the giveaway roles you hold"),
    )
    .await?;
    Ok(())
}

pub async fn register_role_members(ctx: &Context) -> anyhow::Result<()> {
    Command::create_global_command(
        &ctx.http,
        CreateCommand::new("role_members")
            .description("List who holds a giveaway role (admins only)")
            .add_option(CreateCommandOption::new(CommandOptionType::String, "role", "Role name").required(true)),
    )
    .await?;
    Ok(())
}

pub async fn handle_role(ctx: &Context, cmd: &CommandInteraction, service: &Arc<GiveawayService>) -> anyhow::Result<()> {
    let action = string_opt(cmd, "action").unwrap_or_default();
    let role = string_opt(cmd, "role").unwrap_or_default();
    let Some(member) = user_opt(cmd, "user") else {
        return reply(ctx, cmd, "Missing user.").await;
    };
    let shown = escape_markdown(&normalize_role(&role));
    let who = mention_user(member.get());

    let text = if action.eq_ignore_ascii_case("add") {
        match service.assign_role(cmd.user.id.get(), &role, member.get()).await {
            Ok(true) => format!("{who} now has the role `{shown}`."),
            Ok(false) => format!("{who} already has the role `{shown}`."),
            Err(e) => return reply_error(ctx, cmd, e).await,
        }
    } else if action.eq_ignore_ascii_case("remove") {
        match service.remove_role(cmd.user.id.get(), &role, member.get()).await {
            Ok(true) => format!("Removed the role `{shown}` from {who}."),
            Ok(false) => format!("{who} did not have the role `{shown}`."),
            Err(e) => return reply_error(ctx, cmd, e).await,
        }
    } else {
        "Action must be 'add' or 'remove'.".to_string()
    };
    reply(ctx, cmd, text).await
}

pub async fn handle_my_roles(ctx: &Context, cmd: &CommandInteraction, service: &Arc<GiveawayService>) -> anyhow::Result<()> {
    let roles = service.roles_of(cmd.user.id.get()).await;
    let text = if roles.is_empty() {
        "You have no giveaway roles.".to_string()
    } else {
        let list: Vec<String> = roles.iter().map(|r| format!("`{}`", escape_markdown(r))).collect();
        format!("Your roles: {}", list.join(", "))
    };
    reply(ctx, cmd, text).await
}

pub async fn handle_role_members(ctx: &Context, cmd: &CommandInteraction, service: &Arc<GiveawayService>) -> anyhow::Result<()> {
    let role = string_opt(cmd, "role").unwrap_or_default();
    let shown = escape_markdown(&normalize_role(&role));
    match service.role_members(cmd.user.id.get(), &role).await {
        Ok(members) if members.is_empty() => reply(ctx, cmd, format!("Nobody holds `{shown}`.")).await,
        Ok(members) => {
            let list: Vec<String> = members.iter().map(|id| mention_user(*id)).collect();
            reply(ctx, cmd, format!("`{shown}` ({}): {}", members.len(), list.join(", "))).await
        }
        Err(e) => reply_error(ctx, cmd, e).await,
    }
}
