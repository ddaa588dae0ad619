//! LLM service — holds the active generation backend plus the model ladder
//! used by escalation and the search path.

use std::sync::Arc;

use tracing::info;

use super::llm_config::LlmConfig;
use super::openai::OpenAIClient;
use super::provider::{GenOptions, Generator};

pub struct LlmService {
    provider: Arc<dyn Generator>,
    config: LlmConfig,
}

impl LlmService {
    pub fn from_config(config: LlmConfig) -> Self {
        let api_key = config.resolve_api_key().unwrap_or_default();
        info!(
            "initializing generation backend: base_url={}, model={}",
            config.base_url, config.model
        );
        let provider: Arc<dyn Generator> = Arc::new(OpenAIClient::new(
            api_key,
            config.base_url.clone(),
            config.model.clone(),
        ));
        Self { provider, config }
    }

    /// Test seam: wrap an arbitrary backend.
    pub fn with_provider(provider: Arc<dyn Generator>, config: LlmConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub async fn generate(&self, prompt: &str, mut options: GenOptions) -> Result<String, String> {
        if options.temperature.is_none() {
            options.temperature = Some(self.config.temperature);
        }
        if options.web_search && options.model.is_none() {
            options.model = Some(self.config.search_model.clone());
        }
        self.provider.generate_text(prompt, options).await
    }
}
