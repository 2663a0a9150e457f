//! Streaming boundary parser.
//!
//! The model's output arrives as arbitrary text fragments. Tool calls are
//! framed by marker lines:
//!
//! ```text
//! --TOOL_CALL_BEGIN
//! name: file_read
//! file_path: src/main.rs
//! --- content
//! (multi-line value, ends at the next section or the close marker)
//! --TOOL_CALL_END
//! ```
//!
//! A marker is recognized only when the entire trimmed line equals the
//! marker literal, so marker-like substrings inside prose or body values
//! never open or close a block. All framing decisions happen at complete
//! line granularity, and prose is emitted only when a block finalizes or
//! at [`BoundaryParser::finish`]. Together these make the parser
//! fragment-invariant: any chunking of the same input yields the same
//! segment sequence.
//!
//! Malformed blocks (no `name` header, stray junk between headers, or a
//! stream that ends mid-block) degrade gracefully: the raw block text is
//! folded back into the surrounding prose instead of being dropped.

use quill_core::ToolArgs;
use tracing::warn;

use crate::segment::{Segment, ToolInvocation};

const NAME_KEY: &str = "name";
const BODY_SECTION_PREFIX: &str = "--- ";

/// The marker lines that frame a tool-call block.
#[derive(Debug, Clone)]
pub struct BlockMarkers {
    pub open: String,
    pub close: String,
}

impl Default for BlockMarkers {
    fn default() -> Self {
        Self {
            open: "--TOOL_CALL_BEGIN".to_string(),
            close: "--TOOL_CALL_END".to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum State {
    /// Accumulating prose.
    Outside,
    /// Inside a block, reading `key: value` header lines.
    InHeader,
    /// Inside a block, reading a multi-line body section.
    InBody,
}

/// The block currently being assembled. Only meaningful while the parser
/// state is `InHeader` or `InBody`.
#[derive(Debug, Default)]
struct Block {
    /// Byte offset of the opening marker line in the overall stream.
    start: usize,
    /// Verbatim block text, markers included, kept for degradation.
    raw: String,
    name: Option<String>,
    args: ToolArgs,
    /// Key of the body section being read, if any.
    body_key: Option<String>,
    body: String,
    malformed: bool,
}

impl Block {
    fn flush_body(&mut self) {
        if let Some(key) = self.body_key.take() {
            let mut value = std::mem::take(&mut self.body);
            // A body value owns its interior newlines; the newline that
            // separates it from the next framing line is not part of it.
            if value.ends_with('\n') {
                value.pop();
                if value.ends_with('\r') {
                    value.pop();
                }
            }
            self.args.insert(key, value);
        }
    }
}

/// Incremental parser over the model's fragment stream.
///
/// Call [`feed`](Self::feed) for each fragment as it arrives and
/// [`finish`](Self::finish) exactly once when the stream ends (or is
/// cancelled) to drain buffered prose and salvage any open block.
#[derive(Debug)]
pub struct BoundaryParser {
    markers: BlockMarkers,
    state: State,
    /// Bytes received but not yet terminated by a newline.
    line_buf: String,
    /// Prose accumulated since the last emitted segment.
    text_buf: String,
    /// Total bytes of complete lines handled so far.
    consumed: usize,
    block: Block,
}

impl Default for BoundaryParser {
    fn default() -> Self {
        Self::new(BlockMarkers::default())
    }
}

impl BoundaryParser {
    pub fn new(markers: BlockMarkers) -> Self {
        Self {
            markers,
            state: State::Outside,
            line_buf: String::new(),
            text_buf: String::new(),
            consumed: 0,
            block: Block::default(),
        }
    }

    /// Feed one fragment of model output.
    ///
    /// Returns the segments completed by this fragment, in stream order.
    /// Prose is held back until the next block boundary so that segment
    /// boundaries never depend on where fragments happened to split.
    pub fn feed(&mut self, fragment: &str) -> Vec<Segment> {
        let mut out = Vec::new();
        self.line_buf.push_str(fragment);
        while let Some(pos) = self.line_buf.find('\n') {
            let line: String = self.line_buf.drain(..=pos).collect();
            self.handle_line(&line, &mut out);
        }
        out
    }

    /// Signal end of stream. Drains the final unterminated line, degrades
    /// any still-open block to prose, and emits remaining buffered text.
    pub fn finish(&mut self) -> Vec<Segment> {
        let mut out = Vec::new();
        if !self.line_buf.is_empty() {
            let line = std::mem::take(&mut self.line_buf);
            self.handle_line(&line, &mut out);
        }
        if self.state != State::Outside {
            warn!("stream ended inside a tool-call block, degrading to text");
            let block = std::mem::take(&mut self.block);
            self.text_buf.push_str(&block.raw);
            self.state = State::Outside;
        }
        if !self.text_buf.is_empty() {
            out.push(Segment::Text(std::mem::take(&mut self.text_buf)));
        }
        out
    }

    fn handle_line(&mut self, line: &str, out: &mut Vec<Segment>) {
        let start = self.consumed;
        self.consumed += line.len();
        let trimmed = line.trim();
        let is_open = trimmed == self.markers.open;
        let is_close = trimmed == self.markers.close;

        match self.state {
            State::Outside => {
                if is_open {
                    self.block = Block {
                        start,
                        raw: line.to_string(),
                        ..Block::default()
                    };
                    self.state = State::InHeader;
                } else {
                    self.text_buf.push_str(line);
                }
            }
            State::InHeader => {
                self.block.raw.push_str(line);
                if is_close {
                    self.finalize_block(out);
                } else if is_open {
                    // Nested open marker: the block is garbled.
                    self.block.malformed = true;
                } else if let Some(rest) = trimmed.strip_prefix(BODY_SECTION_PREFIX) {
                    let key = rest.trim();
                    if key.is_empty() {
                        self.block.malformed = true;
                    } else {
                        self.block.body_key = Some(key.to_string());
                        self.state = State::InBody;
                    }
                } else if trimmed.is_empty() {
                    // Blank lines between headers are tolerated.
                } else if let Some((key, value)) = trimmed.split_once(':') {
                    let key = key.trim();
                    let value = value.trim();
                    if key.is_empty() {
                        self.block.malformed = true;
                    } else if key == NAME_KEY {
                        // A repeated name header is garbled output.
                        if self.block.name.is_none() {
                            self.block.name = Some(value.to_string());
                        } else {
                            self.block.malformed = true;
                        }
                    } else {
                        self.block.args.insert(key.to_string(), value.to_string());
                    }
                } else {
                    self.block.malformed = true;
                }
            }
            State::InBody => {
                self.block.raw.push_str(line);
                if is_close {
                    self.block.flush_body();
                    self.finalize_block(out);
                } else if let Some(rest) = trimmed.strip_prefix(BODY_SECTION_PREFIX) {
                    let key = rest.trim();
                    if key.is_empty() {
                        self.block.body.push_str(line);
                    } else {
                        self.block.flush_body();
                        self.block.body_key = Some(key.to_string());
                    }
                } else {
                    self.block.body.push_str(line);
                }
            }
        }
    }

    /// Close out the current block: emit pending prose then the invocation,
    /// or fold a malformed block back into the prose buffer.
    fn finalize_block(&mut self, out: &mut Vec<Segment>) {
        self.state = State::Outside;
        let block = std::mem::take(&mut self.block);
        match block.name {
            Some(name) if !block.malformed => {
                if !self.text_buf.is_empty() {
                    out.push(Segment::Text(std::mem::take(&mut self.text_buf)));
                }
                out.push(Segment::ToolInvocation(ToolInvocation {
                    name,
                    arguments: block.args,
                    raw_span: block.start..self.consumed,
                }));
            }
            _ => {
                warn!("malformed tool-call block, degrading to text");
                self.text_buf.push_str(&block.raw);
            }
        }
    }
}
