//! URL fetching tool.

use std::time::Duration;

use async_trait::async_trait;
use quill_core::{ParameterSpec, Tool, ToolArgs, ToolError};

use crate::require_arg;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BODY_BYTES: usize = 100 * 1024;

/// Fetches a URL and returns the response body as text.
pub struct FetchUrlTool {
    client: reqwest::Client,
}

impl FetchUrlTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent("quill/0.1")
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

impl Default for FetchUrlTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch an http(s) URL and return the response body as text, truncated at 100KB."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required("url")]
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(45)
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let url = require_arg(&args, "url")?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(format!(
                "only http(s) URLs are supported, got '{url}'"
            )));
        }

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "fetch_url".into(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(format!("request failed: {e}")))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !status.is_success() {
            return Err(failed(format!("{url} returned {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| failed(format!("failed to read body: {e}")))?;

        let mut text = body;
        let mut truncated = false;
        if text.len() > MAX_BODY_BYTES {
            let mut cut = MAX_BODY_BYTES;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
            truncated = true;
        }

        let mut output = format!("[{status}] {content_type}\n{text}");
        if truncated {
            output.push_str("\n... body truncated at 100KB");
        }
        Ok(output)
    }
}
