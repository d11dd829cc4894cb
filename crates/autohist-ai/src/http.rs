//! OpenAI-compatible HTTP clients: chat completions and embeddings.
//!
//! Both are blocking; the engine runs on one thread and treats every model
//! call as a potentially slow, blocking operation.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::AiError;
use crate::llm::LanguageModel;
use crate::provider::EmbeddingModel;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings shared by both clients.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Like `https://api.openai.com/v1` (no trailing slash needed).
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn client(&self) -> Result<Client, AiError> {
        Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
    }

    fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        client: &Client,
        path: &str,
        body: &B,
    ) -> Result<R, AiError> {
        let url = format!("{}/{path}", self.base_url);
        let mut request = client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(AiError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json()?)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions language model. Wrap in
/// [`RateLimited`](crate::llm::RateLimited) to respect provider quotas.
pub struct HttpLanguageModel {
    api: ApiConfig,
    client: Client,
    model: String,
}

impl HttpLanguageModel {
    pub fn new(api: ApiConfig, model: impl Into<String>) -> Result<Self, AiError> {
        let client = api.client()?;
        let model = model.into();
        info!(base_url = %api.base_url, model = %model, "language model client ready");
        Ok(Self { api, client, model })
    }
}

impl LanguageModel for HttpLanguageModel {
    fn call(&mut self, prompt: &str) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };
        let response: ChatResponse = self.api.post(&self.client, "chat/completions", &request)?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::LanguageModel("response has no choices".into()))?;
        debug!(chars = content.len(), "language model replied");
        Ok(content)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embeddings endpoint client. One text per request and no batch
/// capability, so every text goes through the provider's cache.
pub struct HttpEmbedder {
    api: ApiConfig,
    client: Client,
    model: String,
    identity: String,
}

impl HttpEmbedder {
    pub fn new(api: ApiConfig, model: impl Into<String>) -> Result<Self, AiError> {
        let client = api.client()?;
        let model = model.into();
        let identity = format!("http/{model}");
        info!(base_url = %api.base_url, model = %model, "embedding client ready");
        Ok(Self {
            api,
            client,
            model,
            identity,
        })
    }
}

impl EmbeddingModel for HttpEmbedder {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, AiError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };
        let response: EmbeddingResponse = self.api.post(&self.client, "embeddings", &request)?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AiError::Embedding(format!("no embedding returned for {text:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed() {
        let api = ApiConfig::new("http://localhost:8080/v1/", None);
        assert_eq!(api.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn embedder_identity_names_the_model() {
        let api = ApiConfig::new(DEFAULT_BASE_URL, None);
        let mut embedder = HttpEmbedder::new(api, "text-embedding-3-small").unwrap();
        assert_eq!(embedder.identity(), "http/text-embedding-3-small");
        assert!(embedder.as_batch().is_none());
    }

    #[test]
    fn chat_request_shape() {
        let request = ChatRequest {
            model: "m",
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn parses_responses() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"animals"}}]}"#,
        )
        .unwrap();
        assert_eq!(chat.choices[0].message.content.as_deref(), Some("animals"));

        let embs: EmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[0.5,-0.25],"index":0}]}"#).unwrap();
        assert_eq!(embs.data[0].embedding, vec![0.5, -0.25]);
    }
}
