//! Wire protocol between the model's text stream and the tool layer.
//!
//! The model emits tool calls inline in its prose, framed by boundary
//! marker lines. This crate turns the raw fragment stream into an ordered
//! sequence of [`Segment`]s (prose and tool invocations), and renders the
//! system prompt that teaches the model the framing format.

pub mod parser;
pub mod prompt;
pub mod segment;

pub use parser::{BlockMarkers, BoundaryParser};
pub use segment::{Segment, ToolInvocation};
