//! OpenAI-compatible streaming transport.
//!
//! Works with any endpoint exposing the `/v1/chat/completions` SSE API:
//! OpenAI, OpenRouter, Ollama, vLLM, Together, and the rest. Tool calls
//! travel inline in the text per the quill wire protocol, so only content
//! deltas are consumed from the SSE stream.

use std::sync::RwLock;

use async_trait::async_trait;
use futures::StreamExt;
use quill_core::{Message, Role, TransportError};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::Transport;

/// An OpenAI-compatible streaming transport.
pub struct OpenAiCompatTransport {
    name: String,
    base_url: String,
    api_key: String,
    model: RwLock<String>,
    client: reqwest::Client,
}

impl OpenAiCompatTransport {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: RwLock::new(model.into()),
            client,
        }
    }

    /// Convert the system prompt plus history to the API message format.
    ///
    /// Tool results travel as user messages with a fixed prefix, and
    /// summary messages as system messages, since the boundary protocol
    /// does not use the API's native tool-call roles.
    fn to_api_messages(system_prompt: &str, history: &[Message]) -> Vec<ApiMessage> {
        let mut api_messages = Vec::with_capacity(history.len() + 1);
        api_messages.push(ApiMessage {
            role: "system".into(),
            content: system_prompt.to_string(),
        });
        for message in history {
            let (role, content) = match message.role {
                Role::User => ("user", message.content.clone()),
                Role::Assistant => ("assistant", message.content.clone()),
                Role::ToolResult => ("user", format!("Tool output:\n{}", message.content)),
                Role::SystemSummary => ("system", message.content.clone()),
            };
            api_messages.push(ApiMessage {
                role: role.into(),
                content,
            });
        }
        api_messages
    }

    fn status_error(status: u16, body: String) -> TransportError {
        match status {
            429 => TransportError::RateLimited {
                retry_after_secs: 5,
            },
            401 | 403 => {
                TransportError::Auth("Invalid API key or insufficient permissions".into())
            }
            _ => TransportError::Api {
                status_code: status,
                message: body,
            },
        }
    }
}

/// Drain complete lines out of the raw SSE byte buffer.
///
/// Decoding happens per complete line, so a multibyte character split
/// across network chunks is reassembled before it is ever decoded.
fn drain_sse_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let mut line: Vec<u8> = buffer.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        lines.push(String::from_utf8_lossy(&line).into_owned());
    }
    lines
}

#[async_trait]
impl Transport for OpenAiCompatTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> String {
        self.model.read().map(|m| m.clone()).unwrap_or_default()
    }

    fn set_model(&self, model: String) {
        if let Ok(mut slot) = self.model.write() {
            *slot = model;
        }
    }

    async fn send(
        &self,
        system_prompt: &str,
        history: &[Message],
    ) -> Result<mpsc::Receiver<Result<String, TransportError>>, TransportError> {
        let url = format!("{}/chat/completions", self.base_url);
        let model = self.model();

        let body = serde_json::json!({
            "model": model,
            "messages": Self::to_api_messages(system_prompt, history),
            "stream": true,
        });

        debug!(transport = %self.name, model = %model, messages = history.len(), "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Model endpoint returned error");
            return Err(Self::status_error(status, error_body));
        }

        let (tx, rx) = mpsc::channel(64);
        let transport_name = self.name.clone();

        // Read the SSE byte stream on its own task, forwarding content deltas.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(TransportError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.extend_from_slice(&bytes);

                for line in drain_sse_lines(&mut buffer) {
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(stream_resp) => {
                            if let Some(choice) = stream_resp.choices.first() {
                                if let Some(content) = &choice.delta.content {
                                    if !content.is_empty()
                                        && tx.send(Ok(content.clone())).await.is_err()
                                    {
                                        return; // receiver dropped
                                    }
                                }
                                if choice.finish_reason.is_some() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            trace!(
                                transport = %transport_name,
                                data = %data,
                                error = %e,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn list_models(&self) -> Result<Vec<String>, TransportError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, error_body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let models = body["data"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["id"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let transport =
            OpenAiCompatTransport::new("test", "http://localhost:11434/v1/", "key", "llama3");
        assert_eq!(transport.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn model_switching() {
        let transport =
            OpenAiCompatTransport::new("test", "http://localhost/v1", "key", "model-a");
        assert_eq!(transport.model(), "model-a");
        transport.set_model("model-b".into());
        assert_eq!(transport.model(), "model-b");
    }

    #[test]
    fn role_mapping() {
        let history = vec![
            Message::user("hi"),
            Message::assistant("hello"),
            Message::tool_result("file contents"),
            Message::system_summary("earlier we discussed X"),
        ];
        let api = OpenAiCompatTransport::to_api_messages("be helpful", &history);
        assert_eq!(api.len(), 5);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[0].content, "be helpful");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[2].role, "assistant");
        assert_eq!(api[3].role, "user");
        assert_eq!(api[3].content, "Tool output:\nfile contents");
        assert_eq!(api[4].role, "system");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            OpenAiCompatTransport::status_error(429, String::new()),
            TransportError::RateLimited { .. }
        ));
        assert!(matches!(
            OpenAiCompatTransport::status_error(401, String::new()),
            TransportError::Auth(_)
        ));
        assert!(matches!(
            OpenAiCompatTransport::status_error(500, String::new()),
            TransportError::Api {
                status_code: 500,
                ..
            }
        ));
    }

    #[test]
    fn multibyte_char_split_across_chunks_survives() {
        let payload = "data: {\"content\":\"héllo\"}\n".as_bytes();
        // split inside the two-byte 'é'
        let split = payload.iter().position(|&b| b >= 0x80).unwrap() + 1;
        let (first, second) = payload.split_at(split);

        let mut buffer = Vec::new();
        buffer.extend_from_slice(first);
        assert!(drain_sse_lines(&mut buffer).is_empty());
        buffer.extend_from_slice(second);
        assert_eq!(
            drain_sse_lines(&mut buffer),
            vec!["data: {\"content\":\"héllo\"}"]
        );
    }

    #[test]
    fn crlf_lines_are_trimmed() {
        let mut buffer = b"data: [DONE]\r\npartial".to_vec();
        assert_eq!(drain_sse_lines(&mut buffer), vec!["data: [DONE]"]);
        assert_eq!(buffer, b"partial");
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_stream_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("Hello"));
        assert!(parsed.choices[0].finish_reason.is_none());
    }

    #[test]
    fn parse_stream_finish_chunk() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(parsed.choices[0].delta.content.is_none());
    }

    #[test]
    fn parse_empty_choices() {
        let data = r#"{"choices":[]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices.is_empty());
    }
}
