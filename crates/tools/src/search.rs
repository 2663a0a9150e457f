//! Search tools: codebase grep and bulk search/replace.

use std::path::PathBuf;

use async_trait::async_trait;
use globset::Glob;
use quill_core::{ParameterSpec, Tool, ToolArgs, ToolError};

use crate::require_arg;
use crate::workspace::{validate_path, walk_files};

const MAX_MATCHES: usize = 200;

pub(crate) fn parse_bool(args: &ToolArgs, key: &str, default: bool) -> Result<bool, ToolError> {
    match args.get(key).map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) if matches!(v.as_str(), "true" | "yes" | "1") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "no" | "0") => Ok(false),
        Some(v) => Err(ToolError::InvalidArguments(format!(
            "'{key}' must be true or false, got '{v}'"
        ))),
    }
}

/// Case-insensitive literal replacement. Returns the updated text and the
/// number of replacements, or `None` when lowercasing shifts byte offsets
/// (non-ASCII edge cases) and an offset-safe replacement is impossible.
fn replace_insensitive(hay: &str, pattern: &str, replacement: &str) -> Option<(String, usize)> {
    let hay_lower = hay.to_lowercase();
    let pattern_lower = pattern.to_lowercase();
    if hay_lower.len() != hay.len() || pattern_lower.is_empty() {
        return None;
    }

    let mut result = String::with_capacity(hay.len());
    let mut cursor = 0;
    let mut count = 0;
    while let Some(found) = hay_lower[cursor..].find(&pattern_lower) {
        let start = cursor + found;
        result.push_str(&hay[cursor..start]);
        result.push_str(replacement);
        cursor = start + pattern_lower.len();
        count += 1;
    }
    result.push_str(&hay[cursor..]);
    Some((result, count))
}

/// Greps workspace files for a literal pattern.
pub struct SearchCodebaseTool {
    root: PathBuf,
}

impl SearchCodebaseTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for SearchCodebaseTool {
    fn name(&self) -> &str {
        "search_codebase"
    }

    fn description(&self) -> &str {
        "Search workspace files for a literal text pattern. Reports path, line number, and the matching line."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("pattern"),
            ParameterSpec::with_default("path", "."),
            ParameterSpec::with_default("case_sensitive", "false"),
        ]
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let pattern = require_arg(&args, "pattern")?;
        let path = args.get("path").map(String::as_str).unwrap_or(".");
        let case_sensitive = parse_bool(&args, "case_sensitive", false)?;
        let dir = validate_path(&self.root, path, self.name())?;

        let needle = if case_sensitive {
            pattern.to_string()
        } else {
            pattern.to_lowercase()
        };

        let mut matches = Vec::new();
        let mut truncated = false;
        'files: for relative in walk_files(&dir) {
            let Ok(content) = std::fs::read_to_string(dir.join(&relative)) else {
                continue; // binary or unreadable
            };
            for (index, line) in content.lines().enumerate() {
                let haystack = if case_sensitive {
                    line.to_string()
                } else {
                    line.to_lowercase()
                };
                if haystack.contains(&needle) {
                    if matches.len() >= MAX_MATCHES {
                        truncated = true;
                        break 'files;
                    }
                    matches.push(format!(
                        "{}:{}: {}",
                        relative.display(),
                        index + 1,
                        line.trim_end()
                    ));
                }
            }
        }

        if matches.is_empty() {
            return Ok(format!("No matches for '{pattern}'"));
        }
        let mut output = matches.join("\n");
        if truncated {
            output.push_str(&format!("\n... truncated at {MAX_MATCHES} matches"));
        }
        Ok(output)
    }
}

/// Literal search and replace across files matching a glob.
pub struct SearchReplaceTool {
    root: PathBuf,
}

impl SearchReplaceTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for SearchReplaceTool {
    fn name(&self) -> &str {
        "search_replace"
    }

    fn description(&self) -> &str {
        "Replace every occurrence of a literal pattern across files matching a glob (e.g. **/*.rs)."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("pattern"),
            ParameterSpec::required("replacement"),
            ParameterSpec::required("file_glob"),
            ParameterSpec::with_default("case_sensitive", "true"),
        ]
    }

    fn mutates_workspace(&self) -> bool {
        true
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let pattern = require_arg(&args, "pattern")?;
        let replacement = args.get("replacement").map(String::as_str).unwrap_or("");
        let file_glob = require_arg(&args, "file_glob")?;
        let case_sensitive = parse_bool(&args, "case_sensitive", true)?;

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "search_replace".into(),
            reason,
        };

        let matcher = Glob::new(file_glob)
            .map_err(|e| ToolError::InvalidArguments(format!("bad file_glob '{file_glob}': {e}")))?
            .compile_matcher();

        let mut touched = Vec::new();
        let mut total = 0usize;
        for relative in walk_files(&self.root) {
            if !matcher.is_match(&relative) {
                continue;
            }
            let full = self.root.join(&relative);
            let Ok(content) = std::fs::read_to_string(&full) else {
                continue;
            };

            let (updated, count) = if case_sensitive {
                let count = content.matches(pattern).count();
                (content.replace(pattern, replacement), count)
            } else {
                match replace_insensitive(&content, pattern, replacement) {
                    Some(result) => result,
                    None => {
                        return Err(failed(format!(
                            "case-insensitive replace is not supported for {}",
                            relative.display()
                        )));
                    }
                }
            };

            if count > 0 {
                std::fs::write(&full, updated)
                    .map_err(|e| failed(format!("failed to write {}: {e}", relative.display())))?;
                touched.push(format!("{} ({count})", relative.display()));
                total += count;
            }
        }

        if touched.is_empty() {
            return Ok(format!("No occurrences of '{pattern}' in files matching {file_glob}"));
        }
        Ok(format!(
            "Replaced {total} occurrence(s) across {} file(s):\n{}",
            touched.len(),
            touched.join("\n")
        ))
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
    async fn search_finds_matches_with_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn alpha() {}\nfn beta() {}\n").unwrap();

        let tool = SearchCodebaseTool::new(dir.path().to_path_buf());
        let out = tool.execute(args(&[("pattern", "beta")])).await.unwrap();
        assert!(out.contains("a.rs:2: fn beta() {}"));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Hello World\n").unwrap();

        let tool = SearchCodebaseTool::new(dir.path().to_path_buf());
        let out = tool.execute(args(&[("pattern", "hello")])).await.unwrap();
        assert!(out.contains("a.txt:1"));

        let out = tool
            .execute(args(&[("pattern", "hello"), ("case_sensitive", "true")]))
            .await
            .unwrap();
        assert!(out.contains("No matches"));
    }

    #[tokio::test]
    async fn replace_across_glob() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "old_name();\nold_name();\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "old_name\n").unwrap();

        let tool = SearchReplaceTool::new(dir.path().to_path_buf());
        let out = tool
            .execute(args(&[
                ("pattern", "old_name"),
                ("replacement", "new_name"),
                ("file_glob", "**/*.rs"),
            ]))
            .await
            .unwrap();

        assert!(out.contains("Replaced 2 occurrence(s)"));
        let a = std::fs::read_to_string(dir.path().join("a.rs")).unwrap();
        assert!(!a.contains("old_name"));
        // .txt file untouched by the glob
        let b = std::fs::read_to_string(dir.path().join("b.txt")).unwrap();
        assert!(b.contains("old_name"));
    }

    #[tokio::test]
    async fn replace_reports_no_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\n").unwrap();

        let tool = SearchReplaceTool::new(dir.path().to_path_buf());
        let out = tool
            .execute(args(&[
                ("pattern", "absent"),
                ("replacement", "x"),
                ("file_glob", "**/*.rs"),
            ]))
            .await
            .unwrap();
        assert!(out.contains("No occurrences"));
    }

    #[tokio::test]
    async fn bad_glob_is_invalid_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SearchReplaceTool::new(dir.path().to_path_buf());
        let err = tool
            .execute(args(&[
                ("pattern", "x"),
                ("replacement", "y"),
                ("file_glob", "[unclosed"),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn insensitive_replace_counts() {
        let (out, count) = replace_insensitive("Foo foo FOO", "foo", "bar").unwrap();
        assert_eq!(out, "bar bar bar");
        assert_eq!(count, 3);
    }

    #[test]
    fn bool_parsing() {
        let mut map = ToolArgs::new();
        map.insert("flag".into(), "Yes".into());
        assert!(parse_bool(&map, "flag", false).unwrap());
        assert!(!parse_bool(&map, "absent", false).unwrap());
        map.insert("flag".into(), "maybe".into());
        assert!(parse_bool(&map, "flag", false).is_err());
    }
}
