use crate::constants::{defaults, endpoints, limits};
use crate::error::ChatFailure;
use crate::llm::traits::*;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct CompletionClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_tokens: u32,
}

impl CompletionClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: defaults::MODEL.to_string(),
            endpoint: endpoints::DEFAULT_COMPLETIONS_URL.to_string(),
            max_tokens: defaults::MAX_TOKENS,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Full URL the request is posted to.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(&self, message: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(message)],
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[async_trait::async_trait]
impl ChatBackend for CompletionClient {
    async fn send(&self, message: &str) -> Result<String, ChatFailure> {
        let request_body = self.build_request(message);
        tracing::debug!(model = %self.model, endpoint = %self.endpoint, "sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| ChatFailure::transport(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| ChatFailure::transport(e.to_string()))?;

        if status != StatusCode::OK {
            tracing::debug!(%status, "completion request rejected");
            return Err(ChatFailure::Remote {
                status: status.as_u16(),
                body: truncate_chars(&response_text, limits::ERROR_BODY_CHARS),
            });
        }

        parse_reply(&response_text)
    }
}

/// Pull `choices[0].message.content` out of a 200 response body.
fn parse_reply(body: &str) -> Result<String, ChatFailure> {
    let api_response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| ChatFailure::transport(format!("failed to parse response: {e}")))?;

    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ChatFailure::transport("no choices in response"))?;

    Ok(choice.message.content.unwrap_or_default())
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
