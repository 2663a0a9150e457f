//! Token-budgeted conversation history.
//!
//! The history is the single source of truth for conversation order.
//! When the running token total exceeds the budget, everything older
//! than the preserved window is condensed into one summary message.
//! Replacement is atomic: a failed or non-reducing summary leaves the
//! history exactly as it was.

use quill_core::{Message, SummarizeError};
use tracing::{debug, warn};

use crate::summarize::Summarizer;

pub struct ContextManager {
    messages: Vec<Message>,
    token_budget: usize,
    /// Most recent messages that are never summarized away.
    preserved_window: usize,
    running_total: usize,
    next_sequence: u64,
}

impl ContextManager {
    pub fn new(token_budget: usize, preserved_window: usize) -> Self {
        Self {
            messages: Vec::new(),
            token_budget,
            preserved_window,
            running_total: 0,
            next_sequence: 1,
        }
    }

    /// Append a message, assigning it the next sequence index.
    pub fn append(&mut self, mut message: Message) {
        message.sequence_index = self.next_sequence;
        self.next_sequence += 1;
        self.running_total += message.estimated_tokens;
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn total_tokens(&self) -> usize {
        self.running_total
    }

    pub fn is_over_budget(&self) -> bool {
        self.running_total > self.token_budget
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.running_total = 0;
    }

    /// Bring the history back under budget by summarizing the prefix
    /// older than the preserved window into a single summary message.
    ///
    /// One summarization pass per call; if the summarizer fails the
    /// history is untouched and the next call tries again. A summary
    /// that does not actually shrink the prefix is a contract violation
    /// and is refused.
    pub async fn ensure_budget(
        &mut self,
        summarizer: &dyn Summarizer,
    ) -> Result<Option<(usize, usize)>, SummarizeError> {
        if !self.is_over_budget() {
            return Ok(None);
        }
        if self.messages.len() <= self.preserved_window {
            warn!(
                total = self.running_total,
                budget = self.token_budget,
                "over budget but the preserved window spans the whole history"
            );
            return Ok(None);
        }

        let split = self.messages.len() - self.preserved_window;
        let prefix = &self.messages[..split];
        let prefix_tokens: usize = prefix.iter().map(|m| m.estimated_tokens).sum();

        let summary_text = summarizer.summarize(prefix).await?;
        let summary = Message::system_summary(summary_text);

        if summary.estimated_tokens >= prefix_tokens {
            warn!(
                summary_tokens = summary.estimated_tokens,
                prefix_tokens, "summary did not shrink the prefix, keeping history as-is"
            );
            return Ok(None);
        }

        let before = self.running_total;
        let mut replacement = Vec::with_capacity(self.preserved_window + 1);
        let mut summary = summary;
        summary.sequence_index = self.next_sequence;
        self.next_sequence += 1;
        replacement.push(summary);
        replacement.extend(self.messages.drain(split..));
        self.messages = replacement;
        self.running_total = self.messages.iter().map(|m| m.estimated_tokens).sum();

        debug!(
            before,
            after = self.running_total,
            "summarized conversation prefix"
        );
        Ok(Some((before, self.running_total)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quill_core::Role;

    struct FixedSummarizer(&'static str);

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(&self, _messages: &[Message]) -> Result<String, SummarizeError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _messages: &[Message]) -> Result<String, SummarizeError> {
            Err(SummarizeError::Failed("model unavailable".into()))
        }
    }

    fn filled_manager() -> ContextManager {
        // budget 80 tokens, window of 2; each message is 4 + 25 = 29 tokens
        let mut ctx = ContextManager::new(80, 2);
        for i in 0..4 {
            ctx.append(Message::user(format!("{:0>100}", i)));
        }
        ctx
    }

    #[test]
    fn append_assigns_monotonic_sequence() {
        let mut ctx = ContextManager::new(1000, 2);
        ctx.append(Message::user("a"));
        ctx.append(Message::assistant("b"));
        let seqs: Vec<u64> = ctx.messages().iter().map(|m| m.sequence_index).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert!(ctx.total_tokens() > 0);
    }

    #[tokio::test]
    async fn under_budget_is_untouched() {
        let mut ctx = ContextManager::new(10_000, 2);
        ctx.append(Message::user("short"));
        let result = ctx.ensure_budget(&FixedSummarizer("sum")).await.unwrap();
        assert!(result.is_none());
        assert_eq!(ctx.messages().len(), 1);
    }

    #[tokio::test]
    async fn summarization_preserves_recent_window() {
        let mut ctx = filled_manager();
        assert!(ctx.is_over_budget());

        let (before, after) = ctx
            .ensure_budget(&FixedSummarizer("earlier: four long messages"))
            .await
            .unwrap()
            .unwrap();
        assert!(after < before);
        assert!(!ctx.is_over_budget());

        let messages = ctx.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::SystemSummary);
        // the two newest messages survive verbatim
        assert!(messages[1].content.ends_with('2'));
        assert!(messages[2].content.ends_with('3'));
    }

    #[tokio::test]
    async fn summarizer_failure_leaves_history_intact() {
        let mut ctx = filled_manager();
        let snapshot: Vec<String> = ctx.messages().iter().map(|m| m.content.clone()).collect();

        let err = ctx.ensure_budget(&FailingSummarizer).await.unwrap_err();
        assert!(matches!(err, SummarizeError::Failed(_)));

        let after: Vec<String> = ctx.messages().iter().map(|m| m.content.clone()).collect();
        assert_eq!(snapshot, after);
        assert!(ctx.is_over_budget());
    }

    #[tokio::test]
    async fn non_reducing_summary_is_refused() {
        let mut ctx = filled_manager();
        let bloated: &'static str = Box::leak(format!("{:0>500}", 7).into_boxed_str());
        let result = ctx.ensure_budget(&FixedSummarizer(bloated)).await.unwrap();
        assert!(result.is_none());
        assert_eq!(ctx.messages().len(), 4);
    }

    #[tokio::test]
    async fn whole_history_in_window_is_not_summarized() {
        let mut ctx = ContextManager::new(10, 8);
        ctx.append(Message::user(format!("{:0>100}", 1)));
        ctx.append(Message::user(format!("{:0>100}", 2)));
        assert!(ctx.is_over_budget());
        let result = ctx.ensure_budget(&FixedSummarizer("s")).await.unwrap();
        assert!(result.is_none());
        assert_eq!(ctx.messages().len(), 2);
    }
}
