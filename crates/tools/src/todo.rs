//! Task list tools backed by `quill_todo.json` in the workspace root.
//!
//! The model reads and rewrites the whole list; validation keeps the file
//! well-formed so a garbled write never destroys the existing list.

use std::path::PathBuf;

use async_trait::async_trait;
use quill_core::{ParameterSpec, Tool, ToolArgs, ToolError};
use serde::{Deserialize, Serialize};

use crate::require_arg;

pub const TODO_FILE: &str = "quill_todo.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
}

fn render(items: &[TodoItem]) -> String {
    if items.is_empty() {
        return "The todo list is empty".into();
    }
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let mark = match item.status {
                TodoStatus::Pending => " ",
                TodoStatus::InProgress => "~",
                TodoStatus::Done => "x",
            };
            format!("{}. [{}] {}", index + 1, mark, item.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shows the current task list.
pub struct TodoReadTool {
    root: PathBuf,
}

impl TodoReadTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for TodoReadTool {
    fn name(&self) -> &str {
        "todo_read"
    }

    fn description(&self) -> &str {
        "Read the current task list."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    async fn execute(&self, _args: ToolArgs) -> Result<String, ToolError> {
        let path = self.root.join(TODO_FILE);
        if !path.exists() {
            return Ok("The todo list is empty".into());
        }
        let content =
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: self.name().into(),
                    reason: format!("failed to read {TODO_FILE}: {e}"),
                })?;
        let items: Vec<TodoItem> =
            serde_json::from_str(&content).map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("{TODO_FILE} is corrupt: {e}"),
            })?;
        Ok(render(&items))
    }
}

/// Replaces the task list wholesale.
pub struct TodoWriteTool {
    root: PathBuf,
}

impl TodoWriteTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> &str {
        "todo_write"
    }

    fn description(&self) -> &str {
        "Replace the task list. Pass a JSON array of {\"content\": string, \
         \"status\": \"pending\" | \"in_progress\" | \"done\"} objects in the todos argument."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required("todos")]
    }

    fn mutates_workspace(&self) -> bool {
        true
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let raw = require_arg(&args, "todos")?;
        let items: Vec<TodoItem> = serde_json::from_str(raw)
            .map_err(|e| ToolError::InvalidArguments(format!("todos is not valid JSON: {e}")))?;

        let serialized =
            serde_json::to_string_pretty(&items).map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;
        tokio::fs::write(self.root.join(TODO_FILE), serialized)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("failed to write {TODO_FILE}: {e}"),
            })?;
        Ok(format!("Saved {} task(s)\n{}", items.len(), render(&items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> ToolArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let todos = r#"[
            {"content": "parse the config", "status": "done"},
            {"content": "wire up the REPL", "status": "in_progress"}
        ]"#;

        let writer = TodoWriteTool::new(dir.path().to_path_buf());
        let out = writer.execute(args(&[("todos", todos)])).await.unwrap();
        assert!(out.contains("Saved 2 task(s)"));

        let reader = TodoReadTool::new(dir.path().to_path_buf());
        let listing = reader.execute(ToolArgs::new()).await.unwrap();
        assert!(listing.contains("1. [x] parse the config"));
        assert!(listing.contains("2. [~] wire up the REPL"));
    }

    #[tokio::test]
    async fn read_without_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let reader = TodoReadTool::new(dir.path().to_path_buf());
        let out = reader.execute(ToolArgs::new()).await.unwrap();
        assert!(out.contains("empty"));
    }

    #[tokio::test]
    async fn invalid_json_rejected_and_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TodoWriteTool::new(dir.path().to_path_buf());
        writer
            .execute(args(&[(
                "todos",
                r#"[{"content": "keep me", "status": "pending"}]"#,
            )]))
            .await
            .unwrap();

        let err = writer
            .execute(args(&[("todos", "not json")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let reader = TodoReadTool::new(dir.path().to_path_buf());
        let listing = reader.execute(ToolArgs::new()).await.unwrap();
        assert!(listing.contains("keep me"));
    }

    #[tokio::test]
    async fn unknown_status_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TodoWriteTool::new(dir.path().to_path_buf());
        let err = writer
            .execute(args(&[(
                "todos",
                r#"[{"content": "x", "status": "someday"}]"#,
            )]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
