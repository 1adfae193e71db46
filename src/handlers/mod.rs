pub mod components;

use serenity::all::{Context, EventHandler, Interaction, Ready};
use serenity::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::giveaway::GiveawayService;

pub struct Handler {
    service: Arc<GiveawayService>,
}

impl Handler {
    pub fn new(service: Arc<GiveawayService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "connected");
        if let Err(e) = crate::commands::register_commands(&ctx).await {
            error!("failed to register commands: {e:#}");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(cmd) => {
                if let Err(e) = crate::commands::handle(&ctx, &cmd, &self.service).await {
                    error!(command = %cmd.data.name, "command error: {e:#}");
                }
            }
            Interaction::Component(comp) => {
                if let Err(e) = components::handle_component(&ctx, &comp, &self.service).await {
                    error!(custom_id = %comp.data.custom_id, "component error: {e:#}");
                }
            }
            _ => {}
        }
    }
}
