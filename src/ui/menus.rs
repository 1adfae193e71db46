use serenity::all::ButtonStyle;
use serenity::builder::{CreateActionRow, CreateButton};

use crate::db::models::GiveawayKey;
use crate::utils::join_component_id;

/* Participate button row on a live announcement */
pub fn join_button_row(key: GiveawayKey) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(join_component_id(key))
            .label("🎉 Participate")
            .style(ButtonStyle::Success),
    ])
}
