//! Model transports.
//!
//! A [`Transport`] turns a conversation history into a stream of raw text
//! fragments from the model. Fragments carry no structure; the protocol
//! layer is responsible for extracting tool calls from them.

pub mod openai;
pub mod retry;

use async_trait::async_trait;
use quill_core::{Message, TransportError};
use tokio::sync::mpsc;

pub use openai::OpenAiCompatTransport;
pub use retry::RetryPolicy;

/// A streaming connection to a model endpoint.
///
/// `send` resolves once the response stream is open; fragments then arrive
/// on the returned channel. The channel closing without an error means the
/// model finished its reply normally.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short transport name for logs.
    fn name(&self) -> &str;

    /// The model currently in use.
    fn model(&self) -> String;

    /// Switch models. Takes effect on the next `send`.
    fn set_model(&self, model: String);

    /// Send the conversation and stream back raw text fragments.
    async fn send(
        &self,
        system_prompt: &str,
        history: &[Message],
    ) -> Result<mpsc::Receiver<Result<String, TransportError>>, TransportError>;

    /// List model names the endpoint offers. Best effort.
    async fn list_models(&self) -> Result<Vec<String>, TransportError>;
}
