//! Git tools: stage, commit, diff, plus undo support for the REPL.
//!
//! Assistant-made commits are prefixed with `[quill]` so they can be told
//! apart from the user's own commits and safely undone.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use quill_core::{ParameterSpec, Tool, ToolArgs, ToolError};
use tracing::{debug, warn};

use crate::require_arg;
use crate::workspace::validate_path;

/// Prefix applied to every commit the assistant makes.
pub const COMMIT_PREFIX: &str = "[quill]";

const GIT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) async fn run_git(
    root: &Path,
    git_args: &[&str],
    tool_name: &str,
) -> Result<String, ToolError> {
    let failed = |reason: String| ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason,
    };

    debug!(tool = tool_name, args = %git_args.join(" "), "running git");

    let child = tokio::process::Command::new("git")
        .args(git_args)
        .current_dir(root)
        .output();

    let output = tokio::time::timeout(GIT_TIMEOUT, child)
        .await
        .map_err(|_| failed(format!("git {} timed out", git_args.join(" "))))?
        .map_err(|e| failed(format!("failed to run git: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(tool = tool_name, args = %git_args.join(" "), stderr = %stderr.trim(), "git exited non-zero");
        return Err(failed(format!(
            "git {} failed: {}",
            git_args.join(" "),
            stderr.trim()
        )));
    }
    Ok(stdout)
}

/// Subject line of HEAD, if the repository has any commits.
pub async fn last_commit_subject(root: &Path) -> Result<String, ToolError> {
    let subject = run_git(root, &["log", "-1", "--pretty=%s"], "git").await?;
    Ok(subject.trim().to_string())
}

/// Drop the most recent commit, but only when it carries the assistant's
/// commit prefix. User commits are never touched.
pub async fn undo_last_commit(root: &Path) -> Result<String, ToolError> {
    let subject = last_commit_subject(root).await?;
    if !subject.starts_with(COMMIT_PREFIX) {
        return Err(ToolError::ExecutionFailed {
            tool_name: "git".into(),
            reason: format!(
                "HEAD is '{subject}', not a {COMMIT_PREFIX} commit; refusing to undo"
            ),
        });
    }
    run_git(root, &["reset", "--hard", "HEAD~1"], "git").await?;
    Ok(format!("Undid commit: {subject}"))
}

/// Stages files for commit.
pub struct GitAddTool {
    root: PathBuf,
}

impl GitAddTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for GitAddTool {
    fn name(&self) -> &str {
        "git_add"
    }

    fn description(&self) -> &str {
        "Stage one or more files for commit. Separate multiple paths with commas."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required("paths")]
    }

    fn mutates_workspace(&self) -> bool {
        true
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(15)
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let raw_paths = require_arg(&args, "paths")?;
        let mut git_args = vec!["add", "--"];
        let paths: Vec<&str> = raw_paths
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if paths.is_empty() {
            return Err(ToolError::InvalidArguments("no paths given".into()));
        }
        for path in &paths {
            validate_path(&self.root, path, self.name())?;
            git_args.push(path);
        }
        run_git(&self.root, &git_args, self.name()).await?;
        Ok(format!("Staged: {}", paths.join(", ")))
    }
}

/// Commits staged changes with the assistant's commit prefix.
pub struct GitCommitTool {
    root: PathBuf,
}

impl GitCommitTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for GitCommitTool {
    fn name(&self) -> &str {
        "git_commit"
    }

    fn description(&self) -> &str {
        "Commit staged changes. The message is automatically prefixed with [quill]."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required("message")]
    }

    fn mutates_workspace(&self) -> bool {
        true
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(15)
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let message = require_arg(&args, "message")?;
        let full_message = if message.starts_with(COMMIT_PREFIX) {
            message.to_string()
        } else {
            format!("{COMMIT_PREFIX} {message}")
        };
        let output = run_git(
            &self.root,
            &["commit", "-m", &full_message],
            self.name(),
        )
        .await?;
        Ok(output.trim().to_string())
    }
}

/// Shows working tree or staged diffs.
pub struct GitDiffTool {
    root: PathBuf,
}

impl GitDiffTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &str {
        "git_diff"
    }

    fn description(&self) -> &str {
        "Show unstaged changes, or staged changes with staged=true. Optionally limit to one file."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::with_default("staged", "false"),
            ParameterSpec::optional("file_path"),
        ]
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let staged = crate::search::parse_bool(&args, "staged", false)?;
        let mut git_args = vec!["diff"];
        if staged {
            git_args.push("--cached");
        }
        if let Some(file_path) = args.get("file_path").filter(|p| !p.trim().is_empty()) {
            validate_path(&self.root, file_path, self.name())?;
            git_args.push("--");
            git_args.push(file_path);
        }
        let output = run_git(&self.root, &git_args, self.name()).await?;
        if output.trim().is_empty() {
            return Ok("No changes".into());
        }
        Ok(output)
    }
}
