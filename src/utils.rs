use crate::db::models::GiveawayKey;
use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use serenity::all::UserId;
use serenity::prelude::Mentionable;

pub const JOIN_PREFIX: &str = "gw:join";
const MAX_PRIZE_CHARS: usize = 200;

/// Parses a compact duration token: `<n>m`, `<n>h` or `<n>d`, case-insensitive.
///
/// Anything else (extra characters, unknown unit, zero, missing number) is `None`.
/// There is no upper bound beyond what fits in a `chrono::Duration`.
pub fn parse_duration(token: &str) -> Option<Duration> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?i)(?P<num>[0-9]+)(?P<unit>[mhd])$").unwrap());

    let caps = RE.captures(token)?;
    let value: i64 = caps["num"].parse().ok()?;
    if value <= 0 {
        return None;
    }
    match caps["unit"].to_ascii_lowercase().as_str() {
        "m" => Duration::try_minutes(value),
        "h" => Duration::try_hours(value),
        "d" => Duration::try_days(value),
        _ => None,
    }
}

/// Escapes Discord markdown so user text renders literally.
/// `@` gets a zero-width space after it so `@everyone` and friends never ping.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' | '*' | '_' | '~' | '`' | '|' | '>' | '#' | '-' | '[' | ']' | '(' | ')' | '<' | ':' => {
                out.push('\\');
                out.push(ch);
            }
            '@' => {
                out.push('@');
                out.push('\u{200B}');
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Normalizes a prize: control characters dropped, whitespace collapsed, length capped.
pub fn sanitize_prize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_PRIZE_CHARS).collect()
}

pub fn normalize_role(role: &str) -> String {
    role.trim().to_lowercase()
}

pub fn mention_user(id: u64) -> String {
    UserId::new(id).mention().to_string()
}

/* custom_id format: "gw:join:<chat>" or "gw:join:<chat>:<thread>" */
pub fn join_component_id(key: GiveawayKey) -> String {
    match key.thread_id {
        Some(thread) => format!("{JOIN_PREFIX}:{}:{thread}", key.chat_id),
        None => format!("{JOIN_PREFIX}:{}", key.chat_id),
    }
}

pub fn parse_component_id(s: &str) -> Option<(String, GiveawayKey)> {
    let s = s.strip_prefix("gw:")?;
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        ["join", chat] => Some(("join".into(), GiveawayKey::new(chat.parse().ok()?, None))),
        ["join", chat, thread] => Some((
            "join".into(),
            GiveawayKey::new(chat.parse().ok()?, Some(thread.parse().ok()?)),
        )),
        _ => None,
    }
}
