use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message, Role};

/// Provider for any OpenAI-compatible `/chat/completions` + `/embeddings` API.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    max_tokens: u32,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Clone for OpenAiProvider {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            embedding_model: self.embedding_model.clone(),
            max_tokens: self.max_tokens,
        }
    }
}

impl OpenAiProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        api_key: String,
        mut base_url: String,
        model: String,
        embedding_model: String,
        max_tokens: u32,
    ) -> Result<Self, LlmError> {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client: crate::http::default_client()?,
            api_key,
            base_url,
            model,
            embedding_model,
            max_tokens,
        })
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            tracing::error!("OpenAI {endpoint} API error {status}: {text}");
            return Err(LlmError::Other(format!(
                "OpenAI {endpoint} request failed (status {status})"
            )));
        }

        Ok(text)
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_tokens: self.max_tokens,
        };

        let text = self.post_json("chat/completions", &body).await?;
        let resp: ChatResponse = serde_json::from_str(&text)?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_owned())
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse { provider: "openai" })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingRequest {
            input: texts,
            model: &self.embedding_model,
        };

        let text = self.post_json("embeddings", &body).await?;
        let mut resp: EmbeddingResponse = serde_json::from_str(&text)?;

        if resp.data.len() != texts.len() {
            return Err(LlmError::EmbeddingCount {
                sent: texts.len(),
                received: resp.data.len(),
            });
        }

        resp.data.sort_by_key(|d| d.index);
        Ok(resp.data.into_iter().map(|d| d.embedding).collect())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

fn convert_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
    messages
        .iter()
        .map(|msg| ApiMessage {
            role: match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &msg.content,
        })
        .collect()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider_for(base_url: &str) -> OpenAiProvider {
        OpenAiProvider::new(
            "sk-test-key".into(),
            base_url.into(),
            "gpt-4.1".into(),
            "text-embedding-3-small".into(),
            100,
        )
        .unwrap()
    }

    #[test]
    fn new_trims_trailing_slashes() {
        let p = provider_for("https://api.openai.com/v1//");
        assert_eq!(p.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let p = provider_for("https://api.openai.com/v1");
        let debug = format!("{p:?}");
        assert!(!debug.contains("sk-test-key"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("gpt-4.1"));
    }

    #[test]
    fn clone_preserves_fields() {
        let p = provider_for("https://api.openai.com/v1");
        let c = p.clone();
        assert_eq!(c.model, p.model);
        assert_eq!(c.embedding_model, p.embedding_model);
        assert_eq!(c.max_tokens, p.max_tokens);
    }

    #[test]
    fn convert_messages_maps_roles() {
        let messages = vec![Message::system("sys"), Message::user("hi")];
        let api = convert_messages(&messages);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[1].content, "hi");
    }

    #[tokio::test]
    async fn chat_returns_trimmed_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  Adds numbers.  "}}]
            })))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let out = p.chat(&[Message::user("explain")]).await.unwrap();
        assert_eq!(out, "Adds numbers.");
    }

    #[tokio::test]
    async fn chat_empty_choices_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": []
            })))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let err = p.chat(&[Message::user("explain")]).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn chat_rate_limited_maps_to_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let err = p.chat(&[Message::user("explain")]).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
    }

    #[tokio::test]
    async fn embed_batch_orders_rows_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let rows = p
            .embed_batch(&["first".to_owned(), "second".to_owned()])
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn embed_batch_count_mismatch_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let err = p
            .embed_batch(&["a".to_owned(), "b".to_owned()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LlmError::EmbeddingCount {
                sent: 2,
                received: 1
            }
        ));
    }

    #[tokio::test]
    async fn embed_batch_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let p = provider_for(&server.uri());
        let err = p.embed_batch(&["a".to_owned()]).await.unwrap_err();
        assert!(matches!(err, LlmError::Other(_)));
    }

    #[tokio::test]
    async fn embed_batch_empty_input_skips_request() {
        // Unroutable base URL: any request would fail.
        let p = provider_for("http://127.0.0.1:1");
        let rows = p.embed_batch(&[]).await.unwrap();
        assert!(rows.is_empty());
    }
}
