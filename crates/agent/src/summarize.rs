//! History summarization via the model itself.

use std::sync::Arc;

use async_trait::async_trait;
use quill_core::{Message, Role, SummarizeError};
use quill_transport::Transport;
use tracing::debug;

/// Produces a condensed replacement for a slice of history.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, messages: &[Message]) -> Result<String, SummarizeError>;
}

const SUMMARY_PROMPT: &str = "\
You condense conversation transcripts. Produce a compact summary of the \
transcript below that preserves: decisions made, files created or edited, \
tool outcomes that matter for ongoing work, and anything the user asked \
for that is not finished yet. Write plain prose, no headings. Be brief.";

/// Summarizes history by sending the transcript back through a transport.
pub struct TranscriptSummarizer {
    transport: Arc<dyn Transport>,
}

impl TranscriptSummarizer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn render_transcript(messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| {
                let label = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::ToolResult => "tool",
                    Role::SystemSummary => "summary",
                };
                format!("[{label}] {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Summarizer for TranscriptSummarizer {
    async fn summarize(&self, messages: &[Message]) -> Result<String, SummarizeError> {
        let transcript = Self::render_transcript(messages);
        let request = vec![Message::user(transcript)];

        let mut rx = self
            .transport
            .send(SUMMARY_PROMPT, &request)
            .await
            .map_err(|e| SummarizeError::Failed(e.to_string()))?;

        let mut summary = String::new();
        while let Some(fragment) = rx.recv().await {
            summary.push_str(&fragment.map_err(|e| SummarizeError::Failed(e.to_string()))?);
        }

        let summary = summary.trim().to_string();
        if summary.is_empty() {
            return Err(SummarizeError::Failed("model returned an empty summary".into()));
        }
        debug!(chars = summary.len(), "received history summary");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_carries_roles_in_order() {
        let messages = vec![
            Message::user("list the files"),
            Message::assistant("on it"),
            Message::tool_result("a.rs\nb.rs"),
        ];
        let transcript = TranscriptSummarizer::render_transcript(&messages);
        assert_eq!(
            transcript,
            "[user] list the files\n[assistant] on it\n[tool] a.rs\nb.rs"
        );
    }
}
