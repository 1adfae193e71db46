use serenity::all::{ComponentInteraction, Context, CreateInteractionResponse, CreateInteractionResponseMessage};
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::GiveawayError;
use crate::giveaway::{GiveawayService, JoinOutcome};
use crate::utils::parse_component_id;

pub async fn handle_component(
    ctx: &Context,
    it: &ComponentInteraction,
    service: &Arc<GiveawayService>,
) -> anyhow::Result<()> {
    let Some((kind, key)) = parse_component_id(&it.data.custom_id) else { return Ok(()); };
    if kind != "join" {
        return Ok(());
    }

    let user_id = it.user.id.get();
    let text = match service.participate(key, user_id, &display_name(it)).await {
        Ok(JoinOutcome::Joined) => {
            debug!(%key, user_id, "entry recorded");
            "🍀 Your entry is recorded. Good luck!".to_string()
        }
        Ok(JoinOutcome::AlreadyJoined) => "You are already participating!".to_string(),
        Err(GiveawayError::NoActiveGiveaway) | Err(GiveawayError::DrawInProgress) => {
            "Sorry, this giveaway has already ended.".to_string()
        }
        Err(e) => {
            if !e.is_user_error() {
                error!(%key, user_id, "participation failed: {e}");
            }
            e.to_string()
        }
    };

    it.create_response(
        &ctx.http,
        CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().content(text).ephemeral(true)),
    )
    .await?;
    Ok(())
}

/// Server nickname, then global display name, then username.
fn display_name(it: &ComponentInteraction) -> String {
    it.member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .or_else(|| it.user.global_name.clone())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| it.user.name.clone())
}
