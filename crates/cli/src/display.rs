//! Terminal output formatting.
//!
//! Long tool outputs are shown head-and-tail truncated; the full text
//! still goes to the model and the session log.

use console::style;
use quill_agent::TurnEvent;
use quill_core::ToolResult;

/// Per-tool line thresholds before truncation kicks in.
fn line_threshold(tool_name: &str) -> usize {
    match tool_name {
        "file_read" => 50,
        "file_list" | "search_codebase" => 40,
        _ => 30,
    }
}

/// Head/tail truncate `output` for display.
pub fn truncate_output(tool_name: &str, output: &str) -> String {
    let threshold = line_threshold(tool_name);
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= threshold {
        return output.to_string();
    }
    let keep = threshold / 2;
    let hidden = lines.len() - keep * 2;
    let marker = format!("... {hidden} lines omitted ...");
    let mut shown = Vec::with_capacity(keep * 2 + 1);
    shown.extend_from_slice(&lines[..keep]);
    shown.push(&marker);
    shown.extend_from_slice(&lines[lines.len() - keep..]);
    shown.join("\n")
}

/// Summarize a diff-bearing output as +added/-removed counts.
pub fn diff_counts(output: &str) -> Option<(usize, usize)> {
    if !output.contains("\n@@") && !output.contains("\n+++") {
        return None;
    }
    let added = output
        .lines()
        .filter(|l| l.starts_with('+') && !l.starts_with("+++"))
        .count();
    let removed = output
        .lines()
        .filter(|l| l.starts_with('-') && !l.starts_with("---"))
        .count();
    Some((added, removed))
}

pub fn banner(model: &str, root: &std::path::Path, tool_count: usize) {
    println!();
    println!("  {}", style("quill").bold().cyan());
    println!("  model:     {model}");
    println!("  workspace: {}", root.display());
    println!("  tools:     {tool_count} available");
    println!("  {}", style("type /help for commands, ctrl-c cancels a turn").dim());
    println!();
}

pub fn print_event(event: &TurnEvent) {
    match event {
        TurnEvent::AssistantText(text) => {
            let trimmed = text.trim_end();
            if !trimmed.is_empty() {
                println!("{trimmed}");
            }
        }
        TurnEvent::ToolStarted { name } => {
            println!("  {} {name}", style("->").dim());
        }
        TurnEvent::ToolCompleted { name, result } => print_tool_result(name, result),
        TurnEvent::Retrying {
            attempt,
            delay,
            message,
        } => {
            println!(
                "  {} attempt {attempt} failed ({message}), retrying in {delay:?}",
                style("!").yellow()
            );
        }
        TurnEvent::Summarized {
            before_tokens,
            after_tokens,
        } => {
            println!(
                "  {} condensed history {before_tokens} -> {after_tokens} tokens",
                style("~").dim()
            );
        }
    }
}

fn print_tool_result(name: &str, result: &ToolResult) {
    if result.is_success() {
        if let Some((added, removed)) = diff_counts(&result.output) {
            println!(
                "  {} {name}: {} {}",
                style("ok").green(),
                style(format!("+{added}")).green(),
                style(format!("-{removed}")).red()
            );
            return;
        }
        let shown = truncate_output(name, &result.output);
        println!("  {} {name}", style("ok").green());
        for line in shown.lines() {
            println!("    {line}");
        }
    } else {
        println!("  {} {name}: {}", style("error").red(), result.output);
    }
}

pub fn print_error(message: &str) {
    eprintln!("  {} {message}", style("error:").red().bold());
}

pub fn print_notice(message: &str) {
    println!("  {}", style(message).dim());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_untouched() {
        let out = "one\ntwo\nthree";
        assert_eq!(truncate_output("file_read", out), out);
    }

    #[test]
    fn long_output_keeps_head_and_tail() {
        let lines: Vec<String> = (0..100).map(|i| format!("line {i}")).collect();
        let out = truncate_output("file_read", &lines.join("\n"));
        assert!(out.contains("line 0"));
        assert!(out.contains("line 99"));
        assert!(out.contains("lines omitted"));
        assert!(!out.contains("line 50"));
    }

    #[test]
    fn omission_marker_sits_at_the_seam() {
        let mut lines: Vec<String> = (0..100).map(|i| format!("line {i}")).collect();
        // blank line inside the kept head must not attract the marker
        lines[1] = String::new();
        let out = truncate_output("file_read", &lines.join("\n"));
        let shown: Vec<&str> = out.lines().collect();
        assert_eq!(shown[25], "... 50 lines omitted ...");
        assert_eq!(shown[24], "line 24");
        assert_eq!(shown[26], "line 75");
    }

    #[test]
    fn diff_counts_ignore_file_headers() {
        let diff = "--- a\n+++ b\n@@ -1,2 +1,2 @@\n-old line\n+new line\n+another\n";
        assert_eq!(diff_counts(diff), Some((2, 1)));
    }

    #[test]
    fn plain_output_has_no_diff_counts() {
        assert_eq!(diff_counts("just some text\nmore text"), None);
    }
}
