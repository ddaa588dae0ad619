//! Generator trait — the single boundary the reaction pipeline depends on
//! for text generation.

use async_trait::async_trait;

/// Per-call knobs. `model: None` means the backend's default.
#[derive(Debug, Clone, Default)]
pub struct GenOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Data URL (`data:image/...;base64,...`) attached as a multimodal part.
    pub image: Option<String>,
    /// Route through the search-enabled completion path.
    pub web_search: bool,
}

impl GenOptions {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }
}

/// Common interface for generation backends. Failures surface as `Err` and
/// must be caught by the reaction handler — never allowed to take down the
/// pipeline.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate_text(&self, prompt: &str, options: GenOptions) -> Result<String, String>;

    /// Backend identifier (e.g. "openai").
    fn id(&self) -> &str;
}
