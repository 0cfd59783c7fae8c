//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required variables are missing, falls back to a config file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required: `CROSSCAL_CALENDAR_ID`, `CROSSCAL_CALENDAR_TOKEN`,
//! `CROSSCAL_DOCS_TOKEN`, `CROSSCAL_DOCS_INTERNAL_DB`, and — unless
//! `CROSSCAL_CHAT_ENABLED=false` — `CROSSCAL_CHAT_TOKEN`,
//! `CROSSCAL_CHAT_GUILD_ID`, `CROSSCAL_CHAT_BOT_USER_ID`.
//! Everything else is optional and falls back to the documented defaults.

use std::path::{Path, PathBuf};

use crosscal_domain::{
    CalendarConfig, ChatConfig, Config, DocStoreConfig, Result, ServerConfig, SyncError,
    SyncTuning,
};

/// Load configuration with automatic fallback strategy.
///
/// # Errors
/// Returns `SyncError::Config` if configuration cannot be loaded from
/// either source or fails validation.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "environment incomplete, trying config file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables.
///
/// # Errors
/// Returns `SyncError::Config` if required variables are missing or have
/// invalid values.
pub fn load_from_env() -> Result<Config> {
    let chat_enabled = env_bool("CROSSCAL_CHAT_ENABLED", true);

    let chat = ChatConfig {
        token: env_opt("CROSSCAL_CHAT_TOKEN").unwrap_or_default(),
        guild_id: env_opt("CROSSCAL_CHAT_GUILD_ID").unwrap_or_default(),
        bot_user_id: env_opt("CROSSCAL_CHAT_BOT_USER_ID").unwrap_or_default(),
        enabled: chat_enabled,
        api_base: env_or("CROSSCAL_CHAT_API_BASE", ChatConfig::default().api_base),
        append_origin_marker: env_bool("CROSSCAL_APPEND_ORIGIN_MARKER", false),
        name_limit: env_parse("CROSSCAL_CHAT_NAME_LIMIT")?.unwrap_or(100),
        description_limit: env_parse("CROSSCAL_CHAT_DESCRIPTION_LIMIT")?.unwrap_or(1000),
        location_limit: env_parse("CROSSCAL_CHAT_LOCATION_LIMIT")?.unwrap_or(100),
        location_fallback: env_or(
            "CROSSCAL_CHAT_LOCATION_FALLBACK",
            ChatConfig::default().location_fallback,
        ),
    };

    let defaults = SyncTuning::default();
    let sync = SyncTuning {
        state_dir: env_or("CROSSCAL_STATE_DIR", defaults.state_dir),
        cooldown_seconds: env_parse("CROSSCAL_COOLDOWN_SECONDS")?
            .unwrap_or(defaults.cooldown_seconds),
        dedup_capacity: env_parse("CROSSCAL_DEDUP_CAPACITY")?.unwrap_or(defaults.dedup_capacity),
        poll_interval_seconds: env_parse("CROSSCAL_POLL_INTERVAL_SECONDS")?
            .unwrap_or(defaults.poll_interval_seconds),
        sweep_interval_seconds: env_parse("CROSSCAL_SWEEP_INTERVAL_SECONDS")?
            .unwrap_or(defaults.sweep_interval_seconds),
        retention_days: env_parse("CROSSCAL_RETENTION_DAYS")?.unwrap_or(defaults.retention_days),
        initial_lookback_days: env_parse("CROSSCAL_LOOKBACK_DAYS")?
            .unwrap_or(defaults.initial_lookback_days),
        cursor_safety_margin_minutes: env_parse("CROSSCAL_CURSOR_SAFETY_MARGIN_MINUTES")?
            .unwrap_or(defaults.cursor_safety_margin_minutes),
        exclude_keyword: env_opt("CROSSCAL_EXCLUDE_KEYWORD"),
    };

    let config = Config {
        server: ServerConfig {
            bind_addr: env_or("CROSSCAL_BIND_ADDR", ServerConfig::default().bind_addr),
        },
        calendar: CalendarConfig {
            calendar_id: env_var("CROSSCAL_CALENDAR_ID")?,
            token: env_var("CROSSCAL_CALENDAR_TOKEN")?,
            api_base: env_or(
                "CROSSCAL_CALENDAR_API_BASE",
                "https://www.googleapis.com/calendar/v3".to_string(),
            ),
        },
        docs: DocStoreConfig {
            token: env_var("CROSSCAL_DOCS_TOKEN")?,
            internal_db_id: env_var("CROSSCAL_DOCS_INTERNAL_DB")?,
            external_db_id: env_opt("CROSSCAL_DOCS_EXTERNAL_DB"),
            api_base: env_or("CROSSCAL_DOCS_API_BASE", "https://api.notion.com/v1".to_string()),
        },
        chat,
        sync,
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `SyncError::Config` when no file is found, the format is
/// invalid or validation fails.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SyncError::Config(format!("config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SyncError::Config("no config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SyncError::Config(format!("failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content. Format is detected by file
/// extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SyncError::Config(format!("invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SyncError::Config(format!("invalid JSON format: {e}"))),
        _ => Err(SyncError::Config(format!("unsupported config format: {extension}"))),
    }
}

/// Probe standard locations for a config file.
///
/// Searches the working directory, up to two parent directories and the
/// directory of the executable for `config.{json,toml}` and
/// `crosscal.{json,toml}`, returning the first match.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        for base in [&cwd, &cwd.join(".."), &cwd.join("../..")] {
            candidates.extend(candidate_names(base));
        }
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidate_names(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidate_names(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("crosscal.json"),
        dir.join("crosscal.toml"),
    ]
}

/// Get a required environment variable, trimmed.
fn env_var(key: &str) -> Result<String> {
    env_opt(key)
        .ok_or_else(|| SyncError::Config(format!("missing required environment variable: {key}")))
}

/// Get an optional environment variable; empty or whitespace-only values
/// count as unset.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: String) -> String {
    env_opt(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| SyncError::Config(format!("invalid value for {key}: {e}"))),
    }
}

/// Parse boolean from environment variable.
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`
/// (case-insensitive).
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
