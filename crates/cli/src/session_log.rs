//! Session transcript written to `quill_log.md` in the workspace root.
//!
//! The log is append-only markdown so a session survives the terminal
//! scrollback. Logging failures are warned about, never fatal.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

pub const LOG_FILE: &str = "quill_log.md";

/// Tool output in the log is capped so one big file read does not bloat it.
const TOOL_OUTPUT_CAP: usize = 4 * 1024;

#[derive(Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(LOG_FILE),
        }
    }

    fn append(&self, text: &str) {
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(text.as_bytes()));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to write session log");
        }
    }

    fn timestamp() -> String {
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn begin_session(&self, model: &str) {
        self.append(&format!(
            "\n## Session {} (model: {model})\n\n",
            Self::timestamp()
        ));
    }

    pub fn user(&self, input: &str) {
        self.append(&format!("**user** ({}):\n{input}\n\n", Self::timestamp()));
    }

    pub fn assistant(&self, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.append(&format!("**quill**:\n{trimmed}\n\n"));
        }
    }

    pub fn tool(&self, name: &str, success: bool, output: &str) {
        let status = if success { "ok" } else { "error" };
        let mut body = output.to_string();
        if body.len() > TOOL_OUTPUT_CAP {
            let mut cut = TOOL_OUTPUT_CAP;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("\n... truncated in log");
        }
        self.append(&format!("`{name}` ({status}):\n```\n{body}\n```\n\n"));
    }

    pub fn note(&self, text: &str) {
        self.append(&format!("_{text}_\n\n"));
    }
}
