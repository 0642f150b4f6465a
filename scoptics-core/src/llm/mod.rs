//! Language-model access
//!
//! Every model capability the pipeline needs (planning, per-step SQL
//! generation, validation, classification, summarization) is a prompt sent
//! through the single [`LlmClient`] trait. Conversation history travels in the
//! request; clients keep no session state between calls.

mod http;

pub use http::HttpLlmClient;

use crate::config::LlmConfig;
use crate::error::Result;
use crate::types::ChatTurn;

/// Which configured model should serve a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModelTier {
    /// The main model
    #[default]
    Primary,
    /// The cheaper model used for quick decisions
    Fast,
}

/// One blocking completion call.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Fixed instruction for this capability
    pub system: Option<String>,
    /// Prior conversation, oldest first
    pub history: Vec<ChatTurn>,
    /// The message to answer
    pub prompt: String,
    pub tier: ModelTier,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_history(mut self, history: &[ChatTurn]) -> Self {
        self.history = history.to_vec();
        self
    }

    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }
}

/// LLM completion interface.
///
/// Implementations perform one round trip per call. Timeouts belong to the
/// implementation; the pipeline never retries a failed call.
pub trait LlmClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Create the default HTTP-backed client.
pub fn create_client(llm: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    Ok(Box::new(HttpLlmClient::new(llm)?))
}
