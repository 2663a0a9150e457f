//! Document conversion tools built on external converters.
//!
//! Uses `pdftotext` for PDFs and `pandoc` for everything else. Both are
//! probed on PATH at call time so a missing converter produces a clear
//! message instead of a spawn error.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use quill_core::{ParameterSpec, Tool, ToolArgs, ToolError};

use crate::require_arg;
use crate::workspace::validate_path;

const CONVERT_TIMEOUT: Duration = Duration::from_secs(60);

/// Output formats pandoc may be asked to produce.
const ALLOWED_FORMATS: &[&str] = &["docx", "html", "odt", "rtf", "pdf", "epub"];

fn converter_available(name: &str) -> bool {
    which::which(name).is_ok()
}

async fn run_converter(
    program: &str,
    args: &[&str],
    tool_name: &str,
) -> Result<String, ToolError> {
    let failed = |reason: String| ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason,
    };

    let output = tokio::time::timeout(
        CONVERT_TIMEOUT,
        tokio::process::Command::new(program).args(args).output(),
    )
    .await
    .map_err(|_| failed(format!("{program} timed out")))?
    .map_err(|e| failed(format!("failed to run {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(format!("{program} failed: {}", stderr.trim())));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Converts a document (PDF, DOCX, ODT, ...) to markdown text.
pub struct ConvertToMarkdownTool {
    root: PathBuf,
}

impl ConvertToMarkdownTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ConvertToMarkdownTool {
    fn name(&self) -> &str {
        "convert_to_markdown"
    }

    fn description(&self) -> &str {
        "Convert a document (pdf, docx, odt, epub, html) to markdown text."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required("file_path")]
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(90)
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let file_path = require_arg(&args, "file_path")?;
        let path = validate_path(&self.root, file_path, self.name())?;
        if !path.exists() {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("no such file: {file_path}"),
            });
        }

        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

        let path_str = path.to_string_lossy().into_owned();
        if is_pdf {
            if !converter_available("pdftotext") {
                return Err(ToolError::ExecutionFailed {
                    tool_name: self.name().into(),
                    reason: "pdftotext is not installed; install poppler-utils".into(),
                });
            }
            return run_converter("pdftotext", &["-layout", &path_str, "-"], self.name()).await;
        }

        if !converter_available("pandoc") {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: "pandoc is not installed".into(),
            });
        }
        run_converter("pandoc", &["-t", "markdown", &path_str], self.name()).await
    }
}

/// Renders markdown content out to a document format via pandoc.
pub struct ConvertFromMarkdownTool {
    root: PathBuf,
}

impl ConvertFromMarkdownTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ConvertFromMarkdownTool {
    fn name(&self) -> &str {
        "convert_from_markdown"
    }

    fn description(&self) -> &str {
        "Render markdown to a document. Pass the markdown body in `markdown`, \
         a workspace-relative `output_path`, and a `format` (docx, html, odt, rtf, pdf, epub)."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("markdown"),
            ParameterSpec::required("output_path"),
            ParameterSpec::with_default("format", "docx"),
        ]
    }

    fn mutates_workspace(&self) -> bool {
        true
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(90)
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let markdown = require_arg(&args, "markdown")?;
        let output_path = require_arg(&args, "output_path")?;
        let format = args.get("format").map(String::as_str).unwrap_or("docx");

        if !ALLOWED_FORMATS.contains(&format) {
            return Err(ToolError::InvalidArguments(format!(
                "unsupported format '{format}'; expected one of {}",
                ALLOWED_FORMATS.join(", ")
            )));
        }

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "convert_from_markdown".into(),
            reason,
        };

        let target = validate_path(&self.root, output_path, self.name())?;
        if !converter_available("pandoc") {
            return Err(failed("pandoc is not installed".into()));
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(format!("failed to create directories: {e}")))?;
        }

        let source = tempfile::NamedTempFile::new()
            .map_err(|e| failed(format!("failed to create temp file: {e}")))?;
        tokio::fs::write(source.path(), markdown)
            .await
            .map_err(|e| failed(format!("failed to write temp file: {e}")))?;

        let source_str = source.path().to_string_lossy().into_owned();
        let target_str = target.to_string_lossy().into_owned();
        run_converter(
            "pandoc",
            &["-f", "markdown", &source_str, "-o", &target_str],
            self.name(),
        )
        .await?;
        Ok(format!("Wrote {output_path}"))
    }
}
