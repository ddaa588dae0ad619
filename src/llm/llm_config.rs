//! LLM configuration — the `llm` section of the bot config.

use serde::{Deserialize, Serialize};

use crate::config;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default generation model.
    #[serde(default = "default_model")]
    pub model: String,
    /// First escalation step when a reply looks like a refusal.
    #[serde(default = "default_strong_model")]
    pub strong_model: String,
    /// Last escalation step.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    /// Model used for the web-search generation path.
    #[serde(default = "default_search_model")]
    pub search_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_api_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4.1-nano".to_string()
}

fn default_strong_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_fallback_model() -> String {
    "gpt-4.1".to_string()
}

fn default_search_model() -> String {
    "gpt-4o-mini-search-preview".to_string()
}

fn default_temperature() -> f32 {
    1.0
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            strong_model: default_strong_model(),
            fallback_model: default_fallback_model(),
            search_model: default_search_model(),
            temperature: default_temperature(),
        }
    }
}

impl LlmConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        config::resolve_api_key(&self.api_key, &self.api_key_env)
    }
}
