//! Core domain types and traits for quill.
//!
//! This crate defines the vocabulary shared by every other crate:
//! conversation messages, token estimation, the `Tool` trait and registry,
//! and the error taxonomy. It has no I/O of its own.

pub mod error;
pub mod message;
pub mod token;
pub mod tool;

pub use error::{Error, RegistryError, Result, SummarizeError, ToolError, TransportError};
pub use message::{Message, Role};
pub use tool::{ParameterSpec, Tool, ToolArgs, ToolDescription, ToolRegistry, ToolResult, ToolStatus};
