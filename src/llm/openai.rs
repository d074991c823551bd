//! Client for an OpenAI-compatible chat completion endpoint.

use super::{ChatMessage, CompletionError, CompletionRequest, StreamOutcome};
use crate::config::CompletionConfig;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Payload that ends the server-sent event stream.
const STREAM_DONE: &str = "[DONE]";

#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: Client,
    config: CompletionConfig,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct OpenAiStreamResponse {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
}

#[derive(Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Builds a request carrying the configured model and sampling settings.
    pub fn request(&self, messages: Vec<ChatMessage>) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    async fn post(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, CompletionError> {
        let body = OpenAiRequest {
            model: &request.model,
            messages: &request.messages,
            stream,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut req = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Content-Type", "application/json")
            .json(&body);

        if !self.config.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status,
                message: text,
            });
        }

        Ok(resp)
    }

    /// One non-streaming completion; returns the first choice's content.
    pub async fn chat(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let resp = self.post(request, false).await?;
        let data: OpenAiResponse = resp.json().await?;
        Ok(data
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }

    /// Streaming completion.
    ///
    /// Each content fragment is handed to `on_token` as it arrives. When the
    /// callback returns `false` the upstream stream is abandoned immediately
    /// and `StreamOutcome::Cancelled` is returned; otherwise the accumulated
    /// response text is returned once the `[DONE]` payload (or the end of the
    /// body) is reached. Payloads that fail to parse are skipped, not fatal.
    pub async fn chat_stream(
        &self,
        request: &CompletionRequest,
        mut on_token: impl FnMut(&str) -> bool + Send,
    ) -> Result<StreamOutcome, CompletionError> {
        let resp = self.post(request, true).await?;

        let mut full_content = String::new();
        let mut stream = resp.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == STREAM_DONE {
                    return Ok(StreamOutcome::Completed(full_content));
                }

                let parsed: OpenAiStreamResponse = match serde_json::from_str(data) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        tracing::warn!(payload = data, error = %err, "skipping malformed completion payload");
                        continue;
                    }
                };

                let token = parsed
                    .choices
                    .first()
                    .and_then(|c| c.delta.content.as_deref())
                    .unwrap_or_default();
                if token.is_empty() {
                    continue;
                }

                full_content.push_str(token);
                if !on_token(token) {
                    return Ok(StreamOutcome::Cancelled);
                }
            }
        }

        Ok(StreamOutcome::Completed(full_content))
    }
}
