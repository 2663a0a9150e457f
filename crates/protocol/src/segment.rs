//! Parsed output of the boundary parser.

use std::ops::Range;

use quill_core::ToolArgs;
use serde::{Deserialize, Serialize};

/// One structured tool call extracted from the model's output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool name as given in the block's `name` header.
    pub name: String,
    /// Argument key-value pairs in wire order. Values are raw strings;
    /// typed coercion happens inside each tool.
    pub arguments: ToolArgs,
    /// Byte range of the full block (markers included) within the
    /// concatenated stream, for diagnostics.
    pub raw_span: Range<usize>,
}

/// One segment of model output, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    /// Prose intended for display to the user.
    Text(String),
    /// A structured tool call.
    ToolInvocation(ToolInvocation),
}

impl Segment {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Segment::Text(t) => Some(t),
            Segment::ToolInvocation(_) => None,
        }
    }

    pub fn as_invocation(&self) -> Option<&ToolInvocation> {
        match self {
            Segment::Text(_) => None,
            Segment::ToolInvocation(inv) => Some(inv),
        }
    }
}
