//! Chat-completion provider for the structured extraction step.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embeddings::build_bearer_client;
use crate::types::PipelineError;

/// Deterministic chat completion: one system message, one user message.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, PipelineError>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
///
/// Requests are issued at temperature 0 so extraction runs are repeatable.
#[derive(Clone)]
pub struct OpenAiChatClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            client: build_bearer_client(api_key)?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, PipelineError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| PipelineError::Llm(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Llm(format!(
                "service returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| PipelineError::Llm(format!("failed to parse response: {err}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| PipelineError::Llm("response contained no choices".to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_the_first_choice_content() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/chat/completions")
                    .json_body_partial(r#"{"temperature": 0.0}"#);
                then.status(200).json_body(serde_json::json!({
                    "choices": [
                        {"message": {"role": "assistant", "content": "[]"}}
                    ]
                }));
            })
            .await;

        let client = OpenAiChatClient::new("key", &server.url(""), "gpt-4").unwrap();
        let output = client.complete("system", "user").await.unwrap();
        assert_eq!(output, "[]");
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn non_success_status_is_an_llm_error() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST).path("/chat/completions");
                then.status(503).body("down");
            })
            .await;

        let client = OpenAiChatClient::new("key", &server.url(""), "gpt-4").unwrap();
        let err = client.complete("system", "user").await.unwrap_err();
        assert!(matches!(err, PipelineError::Llm(_)));
    }
}
