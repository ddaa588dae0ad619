//! Bot configuration — one JSON file aggregating the per-module sections,
//! plus shared helpers for loading/saving JSON configs and resolving API
//! keys from fields or environment variables.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::clock;
use crate::llm::llm_config::LlmConfig;
use crate::telegram::config::TelegramConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Persona name — also the trigger token and the name used in the
    /// generation cue.
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Root directory for persisted state (chat logs, user table).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Fixed civil-time offset for all date math.
    #[serde(default = "default_offset_hours")]
    pub utc_offset_hours: i32,

    /// Probability of the once-a-day random engagement per chat.
    #[serde(default = "default_engagement_probability")]
    pub engagement_probability: f64,

    /// Wall-clock hour (at the fixed offset) when daily flags reset.
    #[serde(default = "default_flags_reset_hour")]
    pub flags_reset_hour: u32,

    /// Bound on stored opinions per user (FIFO eviction past this).
    #[serde(default = "default_max_opinions")]
    pub max_opinions: usize,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_persona() -> String {
    "Pedro".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("database")
}

fn default_offset_hours() -> i32 {
    clock::DEFAULT_OFFSET_HOURS
}

fn default_engagement_probability() -> f64 {
    0.01
}

fn default_flags_reset_hour() -> u32 {
    5
}

fn default_max_opinions() -> usize {
    8
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            data_dir: default_data_dir(),
            utc_offset_hours: default_offset_hours(),
            engagement_probability: default_engagement_probability(),
            flags_reset_hour: default_flags_reset_hour(),
            max_opinions: default_max_opinions(),
            telegram: TelegramConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl BotConfig {
    pub fn load(path: &Path) -> Self {
        load_json_config(path, "config")
    }
}

/// Generic load for any Serde config type with a `Default` implementation.
/// Falls back to `T::default()` if the file is missing or unparsable.
pub fn load_json_config<T: DeserializeOwned + Default>(path: &Path, label: &str) -> T {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<T>(&content) {
            Ok(config) => {
                info!("loaded {} from {}", label, path.display());
                config
            }
            Err(e) => {
                warn!(
                    "failed to parse {} {}: {} — using defaults",
                    label,
                    path.display(),
                    e
                );
                T::default()
            }
        },
        Err(_) => {
            info!("no {} file at {} — using defaults", label, path.display());
            T::default()
        }
    }
}

/// Generic save for any Serde config type.
pub fn save_json_config<T: Serialize>(path: &Path, config: &T, label: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create config directory: {}", e))?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("failed to serialize {}: {}", label, e))?;
    std::fs::write(path, json).map_err(|e| format!("failed to write {}: {}", label, e))?;
    info!("saved {} to {}", label, path.display());
    Ok(())
}

/// Resolve an API key or token: check the direct field first, then fall back
/// to reading the environment variable named in the companion field.
pub fn resolve_api_key(api_key: &Option<String>, api_key_env: &Option<String>) -> Option<String> {
    if let Some(ref key) = api_key {
        if !key.is_empty() {
            return Some(key.clone());
        }
    }
    if let Some(ref env_var) = api_key_env {
        if let Ok(key) = std::env::var(env_var) {
            if !key.is_empty() {
                return Some(key);
            }
        }
    }
    None
}
