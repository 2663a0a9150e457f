//! The quill agent runtime: conversation context, tool dispatch, and the
//! turn loop that ties transport, protocol, and tools together.

pub mod context;
pub mod dispatch;
pub mod summarize;
pub mod turn;

pub use context::ContextManager;
pub use dispatch::Dispatcher;
pub use summarize::{Summarizer, TranscriptSummarizer};
pub use turn::{TurnEvent, TurnOrchestrator, TurnState};
