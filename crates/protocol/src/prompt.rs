//! System prompt assembly.
//!
//! The prompt teaches the model the boundary-framed tool-call format and
//! lists the registered tools. It is rebuilt per request so tool catalogs
//! and planning mode changes take effect on the next turn.

use std::fmt::Write as _;

use quill_core::ToolDescription;

use crate::parser::BlockMarkers;

/// Inputs to system prompt rendering.
#[derive(Debug, Default)]
pub struct PromptContext {
    /// Extra project-local instructions, typically from `quill_prompt.txt`.
    pub project_instructions: Option<String>,
    /// When set, the model is told to plan without mutating the workspace.
    pub planning_mode: bool,
}

const PLANNING_PREAMBLE: &str = "\
You are currently in PLANNING MODE. Discuss and plan the work with the \
user, but do not modify the workspace: tools that write files or run git \
commands will be refused until planning mode is turned off. Read-only \
tools remain available for investigation.\n\n";

/// Render the full system prompt for one request.
pub fn render_system_prompt(
    tools: &[ToolDescription],
    markers: &BlockMarkers,
    ctx: &PromptContext,
) -> String {
    let mut prompt = String::new();

    if ctx.planning_mode {
        prompt.push_str(PLANNING_PREAMBLE);
    }

    prompt.push_str(
        "You are quill, a coding assistant that works inside the user's \
         project directory. You read, edit, and search files, run git \
         operations, and keep the user informed in plain prose.\n\n",
    );

    let _ = write!(
        prompt,
        "To use a tool, emit a block in your reply framed by marker lines. \
         The markers must each stand alone on their own line:\n\n\
         {open}\n\
         name: <tool name>\n\
         <key>: <single-line value>\n\
         --- <key>\n\
         <multi-line value>\n\
         {close}\n\n\
         Rules:\n\
         - The first header must be `name` and must match a tool listed below.\n\
         - Use `key: value` headers for single-line arguments.\n\
         - Use a `--- key` line to start a multi-line argument; its value runs \
         until the next `--- key` line or the closing marker.\n\
         - You may emit prose before and after blocks, and several blocks in \
         one reply. Blocks run in the order written, after your reply ends.\n\
         - Each tool's output is returned to you as a follow-up message.\n\n",
        open = markers.open,
        close = markers.close,
    );

    let _ = write!(
        prompt,
        "Example:\n\n\
         I'll check the entry point first.\n\
         {open}\n\
         name: file_read\n\
         file_path: src/main.rs\n\
         {close}\n\n",
        open = markers.open,
        close = markers.close,
    );

    prompt.push_str("Available tools:\n\n");
    for tool in tools {
        let _ = writeln!(prompt, "## {}", tool.name);
        let _ = writeln!(prompt, "{}", tool.description);
        if !tool.parameters.is_empty() {
            prompt.push_str("Parameters:\n");
            for param in &tool.parameters {
                match &param.default {
                    Some(default) => {
                        let _ = writeln!(prompt, "- {} (default: {})", param.name, default);
                    }
                    None => {
                        let _ = writeln!(prompt, "- {}", param.name);
                    }
                }
            }
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "Working habits:\n\
         - Make small, focused edits and verify them by re-reading the file.\n\
         - Prefix any commit message with [quill].\n\
         - When the user asks a question, answer it before reaching for tools.\n\
         - Keep replies short; tool output speaks for itself.\n",
    );

    if let Some(instructions) = &ctx.project_instructions {
        let trimmed = instructions.trim();
        if !trimmed.is_empty() {
            prompt.push_str("\nProject instructions:\n");
            prompt.push_str(trimmed);
            prompt.push('\n');
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::ParameterSpec;

    fn sample_tools() -> Vec<ToolDescription> {
        vec![ToolDescription {
            name: "file_read".to_string(),
            description: "Read a file from the workspace".to_string(),
            parameters: vec![
                ParameterSpec::required("file_path"),
                ParameterSpec::with_default("start_line", "1"),
            ],
        }]
    }

    #[test]
    fn prompt_lists_tools_and_markers() {
        let prompt = render_system_prompt(
            &sample_tools(),
            &BlockMarkers::default(),
            &PromptContext::default(),
        );
        assert!(prompt.contains("--TOOL_CALL_BEGIN"));
        assert!(prompt.contains("--TOOL_CALL_END"));
        assert!(prompt.contains("## file_read"));
        assert!(prompt.contains("start_line (default: 1)"));
        assert!(!prompt.contains("PLANNING MODE"));
    }

    #[test]
    fn planning_mode_prepends_preamble() {
        let ctx = PromptContext {
            planning_mode: true,
            ..PromptContext::default()
        };
        let prompt = render_system_prompt(&sample_tools(), &BlockMarkers::default(), &ctx);
        assert!(prompt.starts_with("You are currently in PLANNING MODE"));
    }

    #[test]
    fn project_instructions_are_appended() {
        let ctx = PromptContext {
            project_instructions: Some("Always run the formatter.".to_string()),
            ..PromptContext::default()
        };
        let prompt = render_system_prompt(&sample_tools(), &BlockMarkers::default(), &ctx);
        assert!(prompt.ends_with("Always run the formatter.\n"));
    }
}
