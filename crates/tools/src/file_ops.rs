//! File tools: list, read, edit, move, delete.
//!
//! All paths are validated against the workspace root before any
//! filesystem access. Edits are exact-match replacements and report a
//! unified diff so the user can see precisely what changed.

use std::path::PathBuf;

use async_trait::async_trait;
use quill_core::{ParameterSpec, Tool, ToolArgs, ToolError};
use similar::TextDiff;

use crate::require_arg;
use crate::workspace::{validate_path, walk_files};

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "pdf", "zip", "gz", "tar", "7z", "exe", "bin", "so",
    "dylib", "a", "o", "class", "jar", "woff", "woff2", "ttf", "otf", "mp3", "mp4", "avi", "mov",
    "sqlite", "db",
];

fn looks_binary(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn parse_line_number(args: &ToolArgs, key: &str) -> Result<Option<usize>, ToolError> {
    match args.get(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<usize>().map(Some).map_err(|_| {
            ToolError::InvalidArguments(format!("'{key}' must be a line number, got '{raw}'"))
        }),
    }
}

/// Lists workspace files, honoring `.gitignore`.
pub struct FileListTool {
    root: PathBuf,
}

impl FileListTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for FileListTool {
    fn name(&self) -> &str {
        "file_list"
    }

    fn description(&self) -> &str {
        "List files under a directory, recursively, skipping ignored and hidden files."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::with_default("path", ".")]
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let path = args.get("path").map(String::as_str).unwrap_or(".");
        let dir = validate_path(&self.root, path, self.name())?;
        if !dir.is_dir() {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("not a directory: {path}"),
            });
        }
        let files = walk_files(&dir);
        if files.is_empty() {
            return Ok(format!("No files found under {path}"));
        }
        let listing: Vec<String> = files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        Ok(listing.join("\n"))
    }
}

/// Reads a file, optionally limited to a line range.
pub struct FileReadTool {
    root: PathBuf,
}

impl FileReadTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read a file's contents. Optional start_line and end_line (1-based, inclusive) select a range."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("file_path"),
            ParameterSpec::optional("start_line"),
            ParameterSpec::optional("end_line"),
        ]
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let file_path = require_arg(&args, "file_path")?;
        let path = validate_path(&self.root, file_path, self.name())?;

        if looks_binary(&path) {
            let size = tokio::fs::metadata(&path)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            return Ok(format!(
                "{file_path} looks like a binary file ({size} bytes); use convert_to_markdown for documents"
            ));
        }

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("failed to read {file_path}: {e}"),
            }
        })?;

        let start = parse_line_number(&args, "start_line")?;
        let end = parse_line_number(&args, "end_line")?;
        if start.is_none() && end.is_none() {
            return Ok(content);
        }

        let lines: Vec<&str> = content.lines().collect();
        let start = start.unwrap_or(1).max(1);
        let end = end.unwrap_or(lines.len()).min(lines.len());
        if start > end {
            return Err(ToolError::InvalidArguments(format!(
                "start_line {start} is past end_line {end}"
            )));
        }
        Ok(lines[start - 1..end].join("\n"))
    }
}

/// Exact-match file editing. Creates the file when `old_content` is empty.
pub struct FileEditTool {
    root: PathBuf,
}

impl FileEditTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for FileEditTool {
    fn name(&self) -> &str {
        "file_edit"
    }

    fn description(&self) -> &str {
        "Replace an exact occurrence of old_content with new_content in a file. \
         An empty old_content creates a new file from new_content."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("file_path"),
            ParameterSpec::required("old_content"),
            ParameterSpec::required("new_content"),
        ]
    }

    fn mutates_workspace(&self) -> bool {
        true
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let file_path = require_arg(&args, "file_path")?;
        let old_content = args.get("old_content").map(String::as_str).unwrap_or("");
        let new_content = args.get("new_content").map(String::as_str).unwrap_or("");
        let path = validate_path(&self.root, file_path, self.name())?;

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "file_edit".into(),
            reason,
        };

        let original = if path.exists() {
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| failed(format!("failed to read {file_path}: {e}")))?
        } else {
            String::new()
        };

        let updated = if old_content.is_empty() {
            if path.exists() {
                return Err(failed(format!(
                    "{file_path} already exists; provide old_content to edit it"
                )));
            }
            new_content.to_string()
        } else {
            if !original.contains(old_content) {
                return Err(failed(format!(
                    "old_content not found in {file_path}; re-read the file and try again"
                )));
            }
            original.replacen(old_content, new_content, 1)
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(format!("failed to create directories: {e}")))?;
        }
        tokio::fs::write(&path, &updated)
            .await
            .map_err(|e| failed(format!("failed to write {file_path}: {e}")))?;

        let diff = TextDiff::from_lines(&original, &updated)
            .unified_diff()
            .header(file_path, file_path)
            .to_string();
        Ok(format!("Edited {file_path}\n{diff}"))
    }
}

/// Moves or renames a file within the workspace.
pub struct FileMoveTool {
    root: PathBuf,
}

impl FileMoveTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for FileMoveTool {
    fn name(&self) -> &str {
        "file_move"
    }

    fn description(&self) -> &str {
        "Move or rename a file inside the workspace."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("source_path"),
            ParameterSpec::required("destination_path"),
        ]
    }

    fn mutates_workspace(&self) -> bool {
        true
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let source = require_arg(&args, "source_path")?;
        let destination = require_arg(&args, "destination_path")?;
        let from = validate_path(&self.root, source, self.name())?;
        let to = validate_path(&self.root, destination, self.name())?;

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "file_move".into(),
            reason,
        };

        if !from.exists() {
            return Err(failed(format!("no such file: {source}")));
        }
        if to.exists() {
            return Err(failed(format!("destination already exists: {destination}")));
        }
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(format!("failed to create directories: {e}")))?;
        }
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| failed(format!("failed to move: {e}")))?;
        Ok(format!("Moved {source} to {destination}"))
    }
}

/// Deletes a single file.
pub struct FileDeleteTool {
    root: PathBuf,
}

impl FileDeleteTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for FileDeleteTool {
    fn name(&self) -> &str {
        "file_delete"
    }

    fn description(&self) -> &str {
        "Delete a single file from the workspace. Directories are refused."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required("file_path")]
    }

    fn mutates_workspace(&self) -> bool {
        true
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let file_path = require_arg(&args, "file_path")?;
        let path = validate_path(&self.root, file_path, self.name())?;

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "file_delete".into(),
            reason,
        };

        if !path.exists() {
            return Err(failed(format!("no such file: {file_path}")));
        }
        if path.is_dir() {
            return Err(failed(format!(
                "{file_path} is a directory; delete files one at a time"
            )));
        }
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| failed(format!("failed to delete: {e}")))?;
        Ok(format!("Deleted {file_path}"))
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
    async fn read_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "Hello, quill!\n").unwrap();

        let tool = FileReadTool::new(dir.path().to_path_buf());
        let out = tool
            .execute(args(&[("file_path", "hello.txt")]))
            .await
            .unwrap();
        assert_eq!(out, "Hello, quill!\n");
    }

    #[tokio::test]
    async fn read_line_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lines.txt"), "one\ntwo\nthree\nfour\n").unwrap();

        let tool = FileReadTool::new(dir.path().to_path_buf());
        let out = tool
            .execute(args(&[
                ("file_path", "lines.txt"),
                ("start_line", "2"),
                ("end_line", "3"),
            ]))
            .await
            .unwrap();
        assert_eq!(out, "two\nthree");
    }

    #[tokio::test]
    async fn read_binary_extension_is_hinted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("img.png"), [0u8, 1, 2]).unwrap();

        let tool = FileReadTool::new(dir.path().to_path_buf());
        let out = tool
            .execute(args(&[("file_path", "img.png")]))
            .await
            .unwrap();
        assert!(out.contains("binary file"));
    }

    #[tokio::test]
    async fn read_missing_path_argument() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileReadTool::new(dir.path().to_path_buf());
        let err = tool.execute(ToolArgs::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn edit_replaces_exact_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("code.rs"), "fn old() {}\nfn keep() {}\n").unwrap();

        let tool = FileEditTool::new(dir.path().to_path_buf());
        let out = tool
            .execute(args(&[
                ("file_path", "code.rs"),
                ("old_content", "fn old() {}"),
                ("new_content", "fn renamed() {}"),
            ]))
            .await
            .unwrap();

        assert!(out.contains("-fn old() {}"));
        assert!(out.contains("+fn renamed() {}"));
        let content = std::fs::read_to_string(dir.path().join("code.rs")).unwrap();
        assert_eq!(content, "fn renamed() {}\nfn keep() {}\n");
    }

    #[tokio::test]
    async fn edit_rejects_missing_old_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("code.rs"), "fn a() {}\n").unwrap();

        let tool = FileEditTool::new(dir.path().to_path_buf());
        let err = tool
            .execute(args(&[
                ("file_path", "code.rs"),
                ("old_content", "fn missing() {}"),
                ("new_content", "x"),
            ]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn edit_creates_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileEditTool::new(dir.path().to_path_buf());
        tool.execute(args(&[
            ("file_path", "src/new.rs"),
            ("old_content", ""),
            ("new_content", "fn fresh() {}\n"),
        ]))
        .await
        .unwrap();

        let content = std::fs::read_to_string(dir.path().join("src/new.rs")).unwrap();
        assert_eq!(content, "fn fresh() {}\n");
    }

    #[tokio::test]
    async fn edit_refuses_to_create_over_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("code.rs"), "content").unwrap();

        let tool = FileEditTool::new(dir.path().to_path_buf());
        let err = tool
            .execute(args(&[
                ("file_path", "code.rs"),
                ("old_content", ""),
                ("new_content", "x"),
            ]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn list_reports_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.rs"), "").unwrap();

        let tool = FileListTool::new(dir.path().to_path_buf());
        let out = tool.execute(ToolArgs::new()).await.unwrap();
        assert!(out.contains("a.rs"));
        assert!(out.contains("sub/b.rs"));
    }

    #[tokio::test]
    async fn move_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();

        let mover = FileMoveTool::new(dir.path().to_path_buf());
        mover
            .execute(args(&[
                ("source_path", "a.txt"),
                ("destination_path", "b/c.txt"),
            ]))
            .await
            .unwrap();
        assert!(dir.path().join("b/c.txt").exists());
        assert!(!dir.path().join("a.txt").exists());

        let deleter = FileDeleteTool::new(dir.path().to_path_buf());
        deleter
            .execute(args(&[("file_path", "b/c.txt")]))
            .await
            .unwrap();
        assert!(!dir.path().join("b/c.txt").exists());
    }

    #[tokio::test]
    async fn traversal_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileReadTool::new(dir.path().to_path_buf());
        let err = tool
            .execute(args(&[("file_path", "../../etc/passwd")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }
}
