//! Workspace root discovery and path validation.
//!
//! Every file-touching tool resolves its paths through [`validate_path`],
//! which confines the model to the workspace and keeps it out of dotfiles
//! like `.git`.

use std::path::{Component, Path, PathBuf};

use quill_core::ToolError;
use tracing::warn;

/// Walk upward from `start` looking for a `.git` directory. Falls back to
/// `start` itself when no repository is found.
pub fn find_workspace_root(start: &Path) -> PathBuf {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return start.to_path_buf(),
        }
    }
}

/// Resolve a model-supplied path against the workspace root.
///
/// Rejects absolute paths outside the root, `..` traversal that escapes
/// the root, and any hidden (dot-prefixed) component. The target does not
/// need to exist, so resolution is lexical rather than via `canonicalize`.
pub fn validate_path(root: &Path, candidate: &str, tool_name: &str) -> Result<PathBuf, ToolError> {
    let denied = |reason: String| {
        warn!(tool = tool_name, path = candidate, "rejected path");
        ToolError::PermissionDenied {
            tool_name: tool_name.to_string(),
            reason,
        }
    };

    let candidate_path = Path::new(candidate);
    let joined = if candidate_path.is_absolute() {
        candidate_path.to_path_buf()
    } else {
        root.join(candidate_path)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(denied(format!("path escapes the workspace: {candidate}")));
                }
            }
            Component::CurDir => {}
            other => resolved.push(other.as_os_str()),
        }
    }

    if !resolved.starts_with(root) {
        return Err(denied(format!("path escapes the workspace: {candidate}")));
    }

    let relative = resolved.strip_prefix(root).unwrap_or(&resolved);
    for component in relative.components() {
        if let Component::Normal(name) = component {
            if name.to_string_lossy().starts_with('.') {
                return Err(denied(format!(
                    "hidden paths are off limits: {candidate}"
                )));
            }
        }
    }

    Ok(resolved)
}

/// All non-hidden files under `root`, honoring `.gitignore`, sorted by
/// path relative to the root.
pub fn walk_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(true)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .ok()
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_resolves_under_root() {
        let root = Path::new("/work/project");
        let path = validate_path(root, "src/main.rs", "file_read").unwrap();
        assert_eq!(path, Path::new("/work/project/src/main.rs"));
    }

    #[test]
    fn parent_traversal_is_rejected() {
        let root = Path::new("/work/project");
        assert!(validate_path(root, "../../etc/passwd", "file_read").is_err());
        assert!(validate_path(root, "src/../../other", "file_read").is_err());
    }

    #[test]
    fn interior_parent_components_are_allowed() {
        let root = Path::new("/work/project");
        let path = validate_path(root, "src/../docs/readme.md", "file_read").unwrap();
        assert_eq!(path, Path::new("/work/project/docs/readme.md"));
    }

    #[test]
    fn absolute_path_outside_root_is_rejected() {
        let root = Path::new("/work/project");
        assert!(validate_path(root, "/etc/shadow", "file_read").is_err());
    }

    #[test]
    fn absolute_path_inside_root_is_allowed() {
        let root = Path::new("/work/project");
        let path = validate_path(root, "/work/project/Cargo.toml", "file_read").unwrap();
        assert_eq!(path, Path::new("/work/project/Cargo.toml"));
    }

    #[test]
    fn hidden_components_are_rejected() {
        let root = Path::new("/work/project");
        assert!(validate_path(root, ".git/config", "file_read").is_err());
        assert!(validate_path(root, "src/.env", "file_read").is_err());
    }

    #[test]
    fn workspace_root_falls_back_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_workspace_root(&nested), nested);
    }

    #[test]
    fn workspace_root_finds_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("src/deep");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_workspace_root(&nested), dir.path());
    }

    #[test]
    fn walk_skips_gitignored_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target/out.bin"), "x").unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let files = walk_files(dir.path());
        assert!(files.contains(&PathBuf::from("main.rs")));
        assert!(!files.iter().any(|p| p.starts_with("target")));
    }
}
