//! Tool invocation dispatch.
//!
//! Every dispatch produces a `ToolResult`, success or failure; a broken
//! tool never takes the turn down with it. Unknown tools, refused tools,
//! timeouts, and execution errors all come back as failure results whose
//! text the model can read and react to.

use std::sync::Arc;

use quill_core::{ToolRegistry, ToolResult};
use quill_protocol::ToolInvocation;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Run one invocation to completion, honoring the tool's timeout and
    /// the cancellation token.
    pub async fn dispatch(
        &self,
        invocation: &ToolInvocation,
        planning_mode: bool,
        cancel: &CancellationToken,
    ) -> ToolResult {
        let invocation_id = uuid::Uuid::new_v4().to_string();
        let name = invocation.name.as_str();

        let Some(tool) = self.registry.get(name) else {
            warn!(tool = name, "model requested an unknown tool");
            return ToolResult::failure(
                invocation_id,
                format!(
                    "Unknown tool '{name}'. Available tools: {}",
                    self.registry.names().join(", ")
                ),
            );
        };

        if planning_mode && tool.mutates_workspace() {
            return ToolResult::failure(
                invocation_id,
                format!("'{name}' modifies the workspace and is unavailable in planning mode"),
            );
        }

        let declared = tool.parameters();
        let mut args = invocation.arguments.clone();

        for spec in &declared {
            if let Some(default) = &spec.default {
                args.entry(spec.name.clone()).or_insert_with(|| default.clone());
            }
        }

        let mut warnings = Vec::new();
        if !tool.accepts_extra_args() {
            let known: Vec<String> = declared.iter().map(|p| p.name.clone()).collect();
            let extra: Vec<String> = args
                .keys()
                .filter(|k| !known.contains(k))
                .cloned()
                .collect();
            for key in extra {
                args.shift_remove(&key);
                warnings.push(format!("ignored undeclared argument '{key}'"));
            }
        }

        debug!(tool = name, args = args.len(), "dispatching tool");

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                return ToolResult::failure(invocation_id, format!("'{name}' was cancelled"));
            }
            outcome = tokio::time::timeout(tool.timeout(), tool.execute(args)) => outcome,
        };

        match outcome {
            Err(_) => ToolResult::failure(
                invocation_id,
                format!("'{name}' timed out after {:?}", tool.timeout()),
            ),
            Ok(Err(e)) => ToolResult::failure(invocation_id, e.to_string()),
            Ok(Ok(mut output)) => {
                if !warnings.is_empty() {
                    output.push_str("\n\n");
                    output.push_str(&warnings.join("\n"));
                }
                ToolResult::success(invocation_id, output)
            }
        }
    }
}
