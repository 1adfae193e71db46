use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::db::models::GiveawayState;
use crate::utils::{escape_markdown, mention_user};

/// Time left with graduated granularity: days+hours, hours+minutes, minutes+seconds.
pub fn format_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (end - now).num_seconds();
    if secs <= 0 {
        return "ended!".to_string();
    }
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    if days > 0 {
        format!("in {days}d {hours}h")
    } else if hours > 0 {
        format!("in {hours}h {minutes}m")
    } else {
        format!("in {minutes}m {seconds}s")
    }
}

/// The live announcement kept in sync while a giveaway is open.
pub fn render_live(state: &GiveawayState, now: DateTime<Utc>, tz: Tz) -> String {
    let end_local = state.end_time.with_timezone(&tz).format("%d %b %Y at %H:%M %Z");
    let mut out = format!(
        "🎉 **{prize}** 🎉\n\n\
         **Ends:** {left} ({end_local})\n\
         **Hosted by:** {host}\n\
         **Participants:** {count}\n\
         **Winners:** {winners}",
        prize = escape_markdown(&state.prize),
        left = format_remaining(state.end_time, now),
        host = state.organizer,
        count = state.participants.len(),
        winners = state.winners_requested,
    );
    if let Some(role) = &state.required_role {
        out.push_str(&format!("\n**Restricted to role:** {}", escape_markdown(role)));
    }
    out
}

/// Replaces the live announcement once the draw has run.
pub fn render_ended(state: &GiveawayState, winners_drawn: usize) -> String {
    format!(
        "🎉 **{prize}** 🎉\n\n\
         **Ended.**\n\
         **Hosted by:** {host}\n\
         **Participants:** {count}\n\
         **Winners drawn:** {winners_drawn}",
        prize = escape_markdown(&state.prize),
        host = state.organizer,
        count = state.participants.len(),
    )
}

pub fn render_cancelled(state: &GiveawayState) -> String {
    format!(
        "🚫 The giveaway for **{}** was cancelled by an administrator.",
        escape_markdown(&state.prize)
    )
}

pub fn render_drawing(prize: &str) -> String {
    format!("🎲 Drawing the winners for **{}**...", escape_markdown(prize))
}

fn winner_line(id: u64, name: &str) -> String {
    format!("🏆 {} ({})", mention_user(id), escape_markdown(name))
}

/// `winners` pairs each id with its display name, in draw order.
pub fn render_result(prize: &str, winners: &[(u64, String)]) -> String {
    let mut out = format!("🎉 The giveaway for **{}** is over!\n\n", escape_markdown(prize));
    if winners.is_empty() {
        out.push_str("Unfortunately, nobody eligible took part 😕");
    } else {
        out.push_str("Congratulations to the winners:\n");
        let lines: Vec<String> = winners.iter().map(|(id, name)| winner_line(*id, name)).collect();
        out.push_str(&lines.join("\n"));
    }
    out
}

pub fn render_reroll(prize: &str, winner: u64, name: &str) -> String {
    format!(
        "🔁 New winner drawn for **{}**:\n{}",
        escape_markdown(prize),
        winner_line(winner, name)
    )
}

pub fn render_unannounced(prize: &str) -> String {
    format!(
        "⚠️ The result for **{}** could not be announced. An administrator can start the giveaway again.",
        escape_markdown(prize)
    )
}

pub fn render_unrecorded(prize: &str) -> String {
    format!(
        "⚠️ The result for **{}** could not be saved, so it cannot be rerolled.",
        escape_markdown(prize)
    )
}

pub fn render_photo_caption(prize: &str, winners_drawn: usize) -> String {
    format!("**{}**: {} winner(s) drawn", escape_markdown(prize), winners_drawn)
}
