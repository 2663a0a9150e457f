//! Interactive REPL session.
//!
//! One line (or a multiline block) per turn. Slash commands control the
//! session; ctrl-c cancels the turn in flight rather than the process.

use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use quill_agent::{TurnEvent, TurnOrchestrator, TurnState};
use quill_config::AppConfig;
use quill_transport::Transport;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::display;
use crate::session_log::SessionLog;

/// Project-local extra instructions, loaded from the workspace root.
pub const PROJECT_PROMPT_FILE: &str = "quill_prompt.txt";

const HELP: &str = "\
  /help        show this help
  /clear       forget the conversation history
  /model       list models on the endpoint
  /model NAME  switch to NAME for the next turn
  /plan        toggle planning mode (read-only tools)
  /multiline   toggle multiline input (end a block with a lone '.')
  /undo        drop the most recent [quill] commit
  /quit        exit";

pub struct Session {
    pub orchestrator: TurnOrchestrator,
    pub transport: Arc<dyn Transport>,
    pub log: SessionLog,
    pub root: PathBuf,
    pub multiline: bool,
}

impl Session {
    /// Run one turn with event printing, session logging, and ctrl-c
    /// cancellation wired up.
    pub async fn run_turn_with_ui(&mut self, input: &str) {
        self.log.user(input);

        let (tx, mut rx) = mpsc::channel::<TurnEvent>(256);
        let log = self.log.clone();
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                display::print_event(&event);
                match &event {
                    TurnEvent::AssistantText(text) => log.assistant(text),
                    TurnEvent::ToolCompleted { name, result } => {
                        log.tool(name, result.is_success(), &result.output);
                    }
                    _ => {}
                }
            }
        });

        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let result = self.orchestrator.run_turn(input, &tx, &cancel).await;
        watcher.abort();
        drop(tx);
        let _ = printer.await;

        match result {
            Ok(TurnState::Cancelled) => {
                display::print_notice("turn cancelled");
                self.log.note("turn cancelled");
            }
            Ok(_) => {}
            Err(e) => {
                display::print_error(&e.to_string());
                self.log.note(&format!("turn failed: {e}"));
            }
        }
    }

    /// Handle a slash command. Returns false when the session should end.
    async fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(2, ' ');
        let command = parts.next().unwrap_or("");
        let argument = parts.next().map(str::trim).unwrap_or("");

        match command {
            "/help" => println!("{HELP}"),
            "/quit" | "/exit" => return false,
            "/clear" => {
                self.orchestrator.clear_history();
                display::print_notice("history cleared");
            }
            "/plan" => {
                let enabled = !self.orchestrator.planning_mode();
                self.orchestrator.set_planning_mode(enabled);
                display::print_notice(if enabled {
                    "planning mode on: workspace-mutating tools are refused"
                } else {
                    "planning mode off"
                });
            }
            "/multiline" => {
                self.multiline = !self.multiline;
                display::print_notice(if self.multiline {
                    "multiline on: end input with a lone '.'"
                } else {
                    "multiline off"
                });
            }
            "/model" => {
                if argument.is_empty() {
                    match self.transport.list_models().await {
                        Ok(models) if models.is_empty() => {
                            display::print_notice("endpoint reported no models")
                        }
                        Ok(models) => {
                            let current = self.transport.model();
                            for model in models {
                                if model == current {
                                    println!("  * {model}");
                                } else {
                                    println!("    {model}");
                                }
                            }
                        }
                        Err(e) => display::print_error(&e.to_string()),
                    }
                } else {
                    self.transport.set_model(argument.to_string());
                    display::print_notice(&format!("switched to {argument}"));
                }
            }
            "/undo" => match quill_tools::undo_last_commit(&self.root).await {
                Ok(message) => display::print_notice(&message),
                Err(e) => display::print_error(&e.to_string()),
            },
            _ => display::print_notice("unknown command, try /help"),
        }
        true
    }
}

pub async fn run(mut session: Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut editor = rustyline::DefaultEditor::new()?;
    let history_path = AppConfig::config_dir().join("history");
    if let Some(parent) = history_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = editor.load_history(&history_path);

    loop {
        let prompt = if session.orchestrator.planning_mode() {
            format!("{} ", style("plan>").yellow())
        } else {
            format!("{} ", style("quill>").cyan())
        };

        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(&line);

        if line.starts_with('/') {
            if !session.handle_command(&line).await {
                break;
            }
            continue;
        }

        let input = if session.multiline {
            let mut block = vec![line];
            loop {
                match editor.readline("... ") {
                    Ok(next) if next.trim() == "." => break,
                    Ok(next) => block.push(next),
                    Err(_) => break,
                }
            }
            block.join("\n")
        } else {
            line
        };

        session.run_turn_with_ui(&input).await;
    }

    let _ = editor.save_history(&history_path);
    Ok(())
}
