//! The turn loop.
//!
//! One turn takes a user message, streams the model's reply through the
//! boundary parser, dispatches any tool calls in order, feeds results
//! back, and streams again, until the model replies with prose only or
//! the iteration cap is hit.
//!
//! History consistency under failure rests on one rule: nothing is
//! appended to the context until a stream completes. A mid-stream
//! failure therefore discards the partial reply and retries the same
//! send from the same history snapshot, with no duplicate or partial
//! assistant messages.

use std::sync::Arc;
use std::time::Duration;

use quill_core::{Error, Message, ToolRegistry, ToolResult, TransportError};
use quill_protocol::prompt::{PromptContext, render_system_prompt};
use quill_protocol::{BlockMarkers, BoundaryParser, Segment, ToolInvocation};
use quill_transport::{RetryPolicy, Transport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::context::ContextManager;
use crate::dispatch::Dispatcher;
use crate::summarize::Summarizer;

/// Where a turn currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingInput,
    Streaming,
    ExecutingTools,
    Done,
    Cancelled,
    Failed,
}

/// Progress notifications for the UI.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    AssistantText(String),
    ToolStarted {
        name: String,
    },
    ToolCompleted {
        name: String,
        result: ToolResult,
    },
    Retrying {
        attempt: u32,
        delay: Duration,
        message: String,
    },
    Summarized {
        before_tokens: usize,
        after_tokens: usize,
    },
}

enum StreamOutcome {
    Complete {
        text: String,
        invocations: Vec<ToolInvocation>,
    },
    Cancelled {
        salvaged: String,
    },
}

pub struct TurnOrchestrator {
    transport: Arc<dyn Transport>,
    registry: Arc<ToolRegistry>,
    dispatcher: Dispatcher,
    summarizer: Arc<dyn Summarizer>,
    context: ContextManager,
    retry: RetryPolicy,
    markers: BlockMarkers,
    max_iterations: u32,
    planning_mode: bool,
    project_instructions: Option<String>,
    state: TurnState,
}

impl TurnOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<ToolRegistry>,
        summarizer: Arc<dyn Summarizer>,
        context: ContextManager,
        retry: RetryPolicy,
        max_iterations: u32,
    ) -> Self {
        Self {
            transport,
            dispatcher: Dispatcher::new(registry.clone()),
            registry,
            summarizer,
            context,
            retry,
            markers: BlockMarkers::default(),
            max_iterations,
            planning_mode: false,
            project_instructions: None,
            state: TurnState::AwaitingInput,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn planning_mode(&self) -> bool {
        self.planning_mode
    }

    pub fn set_planning_mode(&mut self, enabled: bool) {
        self.planning_mode = enabled;
    }

    pub fn set_project_instructions(&mut self, instructions: Option<String>) {
        self.project_instructions = instructions;
    }

    pub fn clear_history(&mut self) {
        self.context.clear();
    }

    /// Run one full turn for `user_input`.
    ///
    /// Returns the terminal state (`Done` or `Cancelled`); unrecoverable
    /// transport failures surface as errors with the state set to
    /// `Failed`.
    pub async fn run_turn(
        &mut self,
        user_input: &str,
        events: &mpsc::Sender<TurnEvent>,
        cancel: &CancellationToken,
    ) -> Result<TurnState, Error> {
        self.context.append(Message::user(user_input));

        for iteration in 0..self.max_iterations {
            if cancel.is_cancelled() {
                return Ok(self.finish(TurnState::Cancelled));
            }

            match self.context.ensure_budget(self.summarizer.as_ref()).await {
                Ok(Some((before_tokens, after_tokens))) => {
                    let _ = events
                        .send(TurnEvent::Summarized {
                            before_tokens,
                            after_tokens,
                        })
                        .await;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "summarization failed, continuing with full history");
                }
            }

            let system_prompt = render_system_prompt(
                &self.registry.descriptions(),
                &self.markers,
                &PromptContext {
                    planning_mode: self.planning_mode,
                    project_instructions: self.project_instructions.clone(),
                },
            );

            self.state = TurnState::Streaming;
            debug!(iteration, tokens = self.context.total_tokens(), "streaming");

            let outcome = match self.stream_with_retry(&system_prompt, events, cancel).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.state = TurnState::Failed;
                    return Err(e);
                }
            };

            match outcome {
                StreamOutcome::Cancelled { salvaged } => {
                    if !salvaged.is_empty() {
                        self.context.append(Message::assistant(salvaged));
                    }
                    return Ok(self.finish(TurnState::Cancelled));
                }
                StreamOutcome::Complete { text, invocations } => {
                    if !text.is_empty() {
                        self.context.append(Message::assistant(text));
                    }
                    if invocations.is_empty() {
                        return Ok(self.finish(TurnState::Done));
                    }

                    self.state = TurnState::ExecutingTools;
                    for invocation in &invocations {
                        if cancel.is_cancelled() {
                            return Ok(self.finish(TurnState::Cancelled));
                        }
                        let _ = events
                            .send(TurnEvent::ToolStarted {
                                name: invocation.name.clone(),
                            })
                            .await;
                        let result = self
                            .dispatcher
                            .dispatch(invocation, self.planning_mode, cancel)
                            .await;
                        let status = if result.is_success() { "ok" } else { "error" };
                        self.context.append(Message::tool_result(format!(
                            "{} ({status}):\n{}",
                            invocation.name, result.output
                        )));
                        let _ = events
                            .send(TurnEvent::ToolCompleted {
                                name: invocation.name.clone(),
                                result,
                            })
                            .await;
                    }
                }
            }
        }

        warn!(
            cap = self.max_iterations,
            "turn stopped at the tool iteration cap"
        );
        Ok(self.finish(TurnState::Done))
    }

    fn finish(&mut self, state: TurnState) -> TurnState {
        self.state = state;
        state
    }

    async fn stream_with_retry(
        &self,
        system_prompt: &str,
        events: &mpsc::Sender<TurnEvent>,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, Error> {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Ok(StreamOutcome::Cancelled {
                    salvaged: String::new(),
                });
            }

            match self.read_stream(system_prompt, events, cancel).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt >= self.retry.max_attempts {
                        return Err(Error::Transport(e));
                    }
                    let delay = self.retry.delay_for(attempt - 1, &e);
                    warn!(attempt, ?delay, error = %e, "stream failed, retrying");
                    let _ = events
                        .send(TurnEvent::Retrying {
                            attempt,
                            delay,
                            message: e.to_string(),
                        })
                        .await;
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Ok(StreamOutcome::Cancelled { salvaged: String::new() });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Read one full model reply. A transport error part-way through
    /// discards everything read so far; the caller retries from the same
    /// history snapshot.
    async fn read_stream(
        &self,
        system_prompt: &str,
        events: &mpsc::Sender<TurnEvent>,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, TransportError> {
        let mut rx = self.transport.send(system_prompt, self.context.messages()).await?;
        let mut parser = BoundaryParser::new(self.markers.clone());
        let mut text = String::new();
        let mut invocations = Vec::new();

        loop {
            let fragment = tokio::select! {
                _ = cancel.cancelled() => {
                    // salvage buffered prose; pending invocations are dropped
                    for segment in parser.finish() {
                        if let Segment::Text(t) = segment {
                            let _ = events.send(TurnEvent::AssistantText(t.clone())).await;
                            text.push_str(&t);
                        }
                    }
                    return Ok(StreamOutcome::Cancelled { salvaged: text });
                }
                fragment = rx.recv() => fragment,
            };

            match fragment {
                None => {
                    for segment in parser.finish() {
                        Self::collect(segment, &mut text, &mut invocations, events).await;
                    }
                    return Ok(StreamOutcome::Complete { text, invocations });
                }
                Some(Ok(chunk)) => {
                    for segment in parser.feed(&chunk) {
                        Self::collect(segment, &mut text, &mut invocations, events).await;
                    }
                }
                Some(Err(e)) => return Err(e),
            }
        }
    }

    async fn collect(
        segment: Segment,
        text: &mut String,
        invocations: &mut Vec<ToolInvocation>,
        events: &mpsc::Sender<TurnEvent>,
    ) {
        match segment {
            Segment::Text(t) => {
                let _ = events.send(TurnEvent::AssistantText(t.clone())).await;
                text.push_str(&t);
            }
            Segment::ToolInvocation(invocation) => invocations.push(invocation),
        }
    }
}
