use anyhow::{bail, Context};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Where the role and history stores live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Json { dir: PathBuf },
    Redis { url: String },
    Memory,
}

/// Countdown refresh cadence of a live announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub slow_interval: Duration,
    pub fast_interval: Duration,
    /// Length of the fast-refresh window before the draw.
    pub final_phase: Duration,
    /// Giveaways shorter than this skip the slow phase entirely.
    pub fast_only_threshold: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            slow_interval: Duration::from_secs(60),
            fast_interval: Duration::from_secs(3),
            final_phase: Duration::from_secs(60),
            fast_only_threshold: Duration::from_secs(65),
        }
    }
}

/// Knobs consumed by the giveaway service itself.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub admin_ids: HashSet<u64>,
    pub cadence: Cadence,
    /// Pause between the "drawing" notice and the result so they never race.
    pub draw_pause: Duration,
    pub result_image_url: Option<String>,
    pub display_tz: Tz,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            admin_ids: HashSet::new(),
            cadence: Cadence::default(),
            draw_pause: Duration::from_secs(3),
            result_image_url: None,
            display_tz: Tz::UTC,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub storage: StorageConfig,
    pub service: ServiceSettings,
}

impl BotConfig {
    /// Build the configuration from environment variables (after `.env` has been loaded).
    pub fn from_env() -> anyhow::Result<Self> {
        let discord_token = env::var("DISCORD_TOKEN").context("DISCORD_TOKEN not set")?;

        let admin_ids = parse_admin_ids(&env::var("ADMIN_USER_IDS").unwrap_or_default())?;
        if admin_ids.is_empty() {
            tracing::warn!("ADMIN_USER_IDS is empty; nobody will be able to start giveaways");
        }

        let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "json".to_string());
        let storage = match backend.to_ascii_lowercase().as_str() {
            "json" => StorageConfig::Json {
                dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()).into(),
            },
            "redis" => StorageConfig::Redis {
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            },
            "memory" => {
                tracing::warn!("STORAGE_BACKEND=memory: roles and history are lost on restart");
                StorageConfig::Memory
            }
            other => bail!("STORAGE_BACKEND must be `json`, `redis` or `memory`, got `{other}`"),
        };

        let display_tz = match env::var("DISPLAY_TZ") {
            Ok(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("DISPLAY_TZ `{name}` is not a known time zone: {e}"))?,
            Err(_) => Tz::UTC,
        };

        let draw_pause_secs = env::var("DRAW_PAUSE_SECS")
            .ok()
            .map(|s| s.parse::<u64>().with_context(|| format!("DRAW_PAUSE_SECS `{s}` is not a number")))
            .transpose()?
            .unwrap_or(3);

        let result_image_url = env::var("RESULT_IMAGE_URL").ok().filter(|s| !s.trim().is_empty());

        Ok(Self {
            discord_token,
            storage,
            service: ServiceSettings {
                admin_ids,
                cadence: Cadence::default(),
                draw_pause: Duration::from_secs(draw_pause_secs),
                result_image_url,
                display_tz,
            },
        })
    }
}

/// Parse a comma-separated list of Discord user ids.
pub fn parse_admin_ids(raw: &str) -> anyhow::Result<HashSet<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .with_context(|| format!("ADMIN_USER_IDS entry `{s}` is not a user id"))
        })
        .collect()
}
