//! Built-in workspace tools for quill.
//!
//! Each tool implements [`quill_core::Tool`] and is registered by
//! [`register_builtin`] at startup. File access is confined to the
//! workspace root discovered at launch.

pub mod docconv;
pub mod file_ops;
pub mod git_ops;
pub mod search;
pub mod todo;
pub mod web;
pub mod workspace;

use std::path::Path;

use quill_core::{RegistryError, ToolArgs, ToolError, ToolRegistry};

pub use git_ops::{COMMIT_PREFIX, last_commit_subject, undo_last_commit};
pub use workspace::find_workspace_root;

/// Fetch a required, non-empty argument.
pub(crate) fn require_arg<'a>(args: &'a ToolArgs, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// Register the full built-in tool set against a workspace root.
pub fn register_builtin(registry: &mut ToolRegistry, root: &Path) -> Result<(), RegistryError> {
    let root = root.to_path_buf();
    registry.register(Box::new(file_ops::FileListTool::new(root.clone())))?;
    registry.register(Box::new(file_ops::FileReadTool::new(root.clone())))?;
    registry.register(Box::new(file_ops::FileEditTool::new(root.clone())))?;
    registry.register(Box::new(file_ops::FileMoveTool::new(root.clone())))?;
    registry.register(Box::new(file_ops::FileDeleteTool::new(root.clone())))?;
    registry.register(Box::new(search::SearchCodebaseTool::new(root.clone())))?;
    registry.register(Box::new(search::SearchReplaceTool::new(root.clone())))?;
    registry.register(Box::new(git_ops::GitAddTool::new(root.clone())))?;
    registry.register(Box::new(git_ops::GitCommitTool::new(root.clone())))?;
    registry.register(Box::new(git_ops::GitDiffTool::new(root.clone())))?;
    registry.register(Box::new(todo::TodoReadTool::new(root.clone())))?;
    registry.register(Box::new(todo::TodoWriteTool::new(root.clone())))?;
    registry.register(Box::new(docconv::ConvertToMarkdownTool::new(root.clone())))?;
    registry.register(Box::new(docconv::ConvertFromMarkdownTool::new(root)))?;
    registry.register(Box::new(web::FetchUrlTool::new()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_set_registers_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ToolRegistry::new();
        register_builtin(&mut registry, dir.path()).unwrap();
        assert_eq!(registry.len(), 15);
        for name in [
            "file_list",
            "file_read",
            "file_edit",
            "search_codebase",
            "git_commit",
            "todo_write",
            "convert_to_markdown",
            "fetch_url",
        ] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn mutating_tools_are_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ToolRegistry::new();
        register_builtin(&mut registry, dir.path()).unwrap();
        for name in ["file_edit", "file_move", "file_delete", "git_add", "git_commit"] {
            assert!(
                registry.get(name).is_some_and(|t| t.mutates_workspace()),
                "{name} should mutate"
            );
        }
        for name in ["file_list", "file_read", "search_codebase", "git_diff"] {
            assert!(
                registry.get(name).is_some_and(|t| !t.mutates_workspace()),
                "{name} should be read-only"
            );
        }
    }
}
