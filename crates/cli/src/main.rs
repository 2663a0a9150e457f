//! quill, a coding assistant for your terminal.
//!
//! Runs an interactive REPL against any OpenAI-compatible endpoint, or a
//! single prompt with `-p`. The assistant works inside the surrounding
//! git workspace with file, search, git, and document tools.

use std::sync::Arc;

use clap::Parser;
use quill_agent::{ContextManager, TranscriptSummarizer, TurnOrchestrator};
use quill_config::AppConfig;
use quill_core::ToolRegistry;
use quill_tools::{find_workspace_root, register_builtin};
use quill_transport::{OpenAiCompatTransport, RetryPolicy, Transport};

mod display;
mod repl;
mod session_log;

#[derive(Parser)]
#[command(
    name = "quill",
    about = "quill, a coding assistant for your terminal",
    version
)]
struct Cli {
    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, env = "QUILL_BASE_URL")]
    base_url: Option<String>,

    /// API key for the endpoint
    #[arg(long, env = "QUILL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model to use
    #[arg(short, long, env = "QUILL_MODEL")]
    model: Option<String>,

    /// Send a single prompt, print the result, and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// List models offered by the endpoint and exit
    #[arg(long)]
    list_models: bool,

    /// Token budget for conversation history
    #[arg(long)]
    max_context_tokens: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Default to warn so log lines do not interleave with the chat.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = AppConfig::load()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(api_key) = cli.api_key {
        config.api_key = Some(api_key);
    }
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(budget) = cli.max_context_tokens {
        config.context.token_budget = budget;
    }

    let transport: Arc<dyn Transport> = Arc::new(OpenAiCompatTransport::new(
        "openai-compat",
        &config.base_url,
        config.api_key.clone().unwrap_or_default(),
        &config.model,
    ));

    if cli.list_models {
        for model in transport.list_models().await? {
            println!("{model}");
        }
        return Ok(());
    }

    let cwd = std::env::current_dir()?;
    let root = find_workspace_root(&cwd);

    let mut registry = ToolRegistry::new();
    register_builtin(&mut registry, &root)?;
    let registry = Arc::new(registry);

    let summarizer = Arc::new(TranscriptSummarizer::new(transport.clone()));
    let context = ContextManager::new(
        config.context.token_budget,
        config.context.preserved_window,
    );
    let retry = RetryPolicy {
        max_attempts: config.turn.max_send_attempts,
        ..RetryPolicy::default()
    };

    let mut orchestrator = TurnOrchestrator::new(
        transport.clone(),
        registry.clone(),
        summarizer,
        context,
        retry,
        config.turn.max_iterations,
    );

    let prompt_path = root.join(repl::PROJECT_PROMPT_FILE);
    if let Ok(instructions) = std::fs::read_to_string(&prompt_path) {
        tracing::debug!(path = %prompt_path.display(), "loaded project instructions");
        orchestrator.set_project_instructions(Some(instructions));
    }

    let log = session_log::SessionLog::new(&root);
    log.begin_session(&transport.model());

    let mut session = repl::Session {
        orchestrator,
        transport: transport.clone(),
        log,
        root: root.clone(),
        multiline: false,
    };

    if let Some(prompt) = cli.prompt {
        session.run_turn_with_ui(&prompt).await;
        return Ok(());
    }

    display::banner(&transport.model(), &root, registry.len());
    repl::run(session).await
}
