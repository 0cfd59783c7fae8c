//! Application configuration structures

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SyncError};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub calendar: CalendarConfig,
    pub docs: DocStoreConfig,
    pub chat: ChatConfig,
    #[serde(default)]
    pub sync: SyncTuning,
}

impl Config {
    /// Validate that the required collaborator credentials are present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("calendar.calendar_id", &self.calendar.calendar_id),
            ("calendar.token", &self.calendar.token),
            ("docs.token", &self.docs.token),
            ("docs.internal_db_id", &self.docs.internal_db_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(SyncError::Config(format!("missing required field: {name}")));
            }
        }
        if self.chat.enabled {
            let required = [
                ("chat.token", &self.chat.token),
                ("chat.guild_id", &self.chat.guild_id),
                ("chat.bot_user_id", &self.chat.bot_user_id),
            ];
            for (name, value) in required {
                if value.trim().is_empty() {
                    return Err(SyncError::Config(format!("missing required field: {name}")));
                }
            }
        }
        Ok(())
    }
}

/// HTTP trigger surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr() }
    }
}

/// Calendar collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub calendar_id: String,
    /// Bearer token presented to the calendar API. Token acquisition and
    /// refresh are handled outside this process.
    pub token: String,
    #[serde(default = "default_calendar_api_base")]
    pub api_base: String,
}

/// Document-store collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocStoreConfig {
    pub token: String,
    pub internal_db_id: String,
    /// The external mirror database is optional; when absent, only the
    /// internal database is synchronised.
    #[serde(default)]
    pub external_db_id: Option<String>,
    #[serde(default = "default_docs_api_base")]
    pub api_base: String,
}

/// Chat-platform collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub guild_id: String,
    /// Identity of the synchronisation bot itself, used by the origin
    /// filter to suppress feedback loops.
    #[serde(default)]
    pub bot_user_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_chat_api_base")]
    pub api_base: String,
    /// When enabled, the calendar event id is embedded into chat event
    /// descriptions and used as a best-effort identity fallback.
    #[serde(default)]
    pub append_origin_marker: bool,
    #[serde(default = "default_name_limit")]
    pub name_limit: usize,
    #[serde(default = "default_description_limit")]
    pub description_limit: usize,
    #[serde(default = "default_location_limit")]
    pub location_limit: usize,
    #[serde(default = "default_location_fallback")]
    pub location_fallback: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            guild_id: String::new(),
            bot_user_id: String::new(),
            enabled: true,
            api_base: default_chat_api_base(),
            append_origin_marker: false,
            name_limit: default_name_limit(),
            description_limit: default_description_limit(),
            location_limit: default_location_limit(),
            location_fallback: default_location_fallback(),
        }
    }
}

/// Reconciliation engine tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTuning {
    /// Directory holding the four durable state files.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Minimum elapsed seconds between reconciliation pass starts.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    /// Capacity of the duplicate-notification recency set.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Interval of the periodic poll trigger.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    /// Interval of the retention sweep.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    /// External mirror pages older than this many days (by start date) are
    /// archived by the retention sweeper.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Lookback window used when no sync cursor exists yet.
    #[serde(default = "default_lookback_days")]
    pub initial_lookback_days: i64,
    /// How far the cursor is rewound before each incremental fetch to
    /// tolerate near-boundary writes.
    #[serde(default = "default_safety_margin_minutes")]
    pub cursor_safety_margin_minutes: i64,
    /// Events whose title contains this keyword are kept out of the
    /// external mirror database.
    #[serde(default)]
    pub exclude_keyword: Option<String>,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            cooldown_seconds: default_cooldown_seconds(),
            dedup_capacity: default_dedup_capacity(),
            poll_interval_seconds: default_poll_interval_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            retention_days: default_retention_days(),
            initial_lookback_days: default_lookback_days(),
            cursor_safety_margin_minutes: default_safety_margin_minutes(),
            exclude_keyword: None,
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_calendar_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_docs_api_base() -> String {
    "https://api.notion.com/v1".to_string()
}

fn default_chat_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_true() -> bool {
    true
}

fn default_name_limit() -> usize {
    100
}

fn default_description_limit() -> usize {
    1000
}

fn default_location_limit() -> usize {
    100
}

fn default_location_fallback() -> String {
    "Calendar".to_string()
}

fn default_state_dir() -> String {
    ".".to_string()
}

fn default_cooldown_seconds() -> u64 {
    2
}

fn default_dedup_capacity() -> usize {
    1000
}

fn default_poll_interval_seconds() -> u64 {
    300
}

fn default_sweep_interval_seconds() -> u64 {
    86_400
}

fn default_retention_days() -> i64 {
    30
}

fn default_lookback_days() -> i64 {
    30
}

fn default_safety_margin_minutes() -> i64 {
    2
}
