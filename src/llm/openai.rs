//! OpenAI-compatible chat-completions client (non-streaming).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::provider::{GenOptions, Generator};
use crate::utils::http::request_with_retry;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content (serializes as a JSON string)
    Text(String),
    /// Array of content parts for multimodal messages (text + images)
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrlDetail },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrlDetail {
    pub url: String,
}

impl MessageContent {
    /// Create a multimodal content with text and image URLs.
    pub fn with_images(text: String, image_urls: Vec<String>) -> Self {
        let mut parts = vec![ContentPart::Text { text }];
        for url in image_urls {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrlDetail { url },
            });
        }
        MessageContent::Parts(parts)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_search_options: Option<Value>,
}

pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key,
            base_url,
            model,
        }
    }
}

#[async_trait]
impl Generator for OpenAIClient {
    async fn generate_text(&self, prompt: &str, options: GenOptions) -> Result<String, String> {
        let url = format!("{}/chat/completions", self.base_url);

        let content = match options.image {
            Some(data_url) => MessageContent::with_images(prompt.to_string(), vec![data_url]),
            None => MessageContent::Text(prompt.to_string()),
        };

        // Search-preview models reject an explicit temperature.
        let temperature = if options.web_search {
            None
        } else {
            options.temperature
        };

        let request_body = ChatCompletionRequest {
            model: options.model.unwrap_or_else(|| self.model.clone()),
            messages: vec![Message {
                role: "user".to_string(),
                content,
            }],
            stream: false,
            temperature,
            max_tokens: options.max_tokens,
            web_search_options: options.web_search.then(|| serde_json::json!({})),
        };

        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let body = request_body.clone();
        let url_clone = url.clone();

        let response = request_with_retry(
            move || {
                let client = client.clone();
                let url = url_clone.clone();
                let body = body.clone();
                let api_key = api_key.clone();
                async move {
                    client
                        .post(&url)
                        .header("Authorization", format!("Bearer {}", api_key))
                        .header("Content-Type", "application/json")
                        .json(&body)
                        .send()
                        .await
                }
            },
            2,
        )
        .await
        .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("API error: {}", error_text));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("failed to parse response: {}", e))?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok(content)
    }

    fn id(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(text: &str) -> Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        })
    }

    #[tokio::test]
    async fn sends_prompt_and_reads_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4.1-nano",
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("oi")))
            .mount(&server)
            .await;

        let client = OpenAIClient::new("test-key".into(), server.uri(), "gpt-4.1-nano".into());
        let text = client
            .generate_text("hello", GenOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "oi");
    }

    #[tokio::test]
    async fn model_override_wins() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4.1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
            .mount(&server)
            .await;

        let client = OpenAIClient::new("k".into(), server.uri(), "gpt-4.1-nano".into());
        let text = client
            .generate_text("x", GenOptions::with_model("gpt-4.1"))
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn retries_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("recovered")))
            .mount(&server)
            .await;

        let client = OpenAIClient::new("k".into(), server.uri(), "gpt-4.1-nano".into());
        let text = client
            .generate_text("x", GenOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "recovered");
    }

    #[tokio::test]
    async fn api_error_surfaces_as_err() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = OpenAIClient::new("k".into(), server.uri(), "gpt-4.1-nano".into());
        let err = client
            .generate_text("x", GenOptions::default())
            .await
            .unwrap_err();
        assert!(err.contains("bad key"));
    }
}
