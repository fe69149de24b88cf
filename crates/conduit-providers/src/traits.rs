//! Model invoker trait: the single request/response exchange with a
//! language model backend.
//!
//! Every backend implements [`ModelInvoker`]. The agent loop only ever sees
//! this trait, so tests can drive it with canned replies.

use async_trait::async_trait;
use conduit_core::types::{Conversation, ToolCallPart, ToolSchema, Turn};

/// Sampling parameters passed to each model call.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingConfig {
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
}

impl SamplingConfig {
    /// Deterministic sampling for the first call of a query, so tool
    /// routing is reproducible.
    pub fn first_call() -> Self {
        Self { temperature: 0.0 }
    }

    /// Sampling for calls made after tool results were folded in.
    pub fn follow_up() -> Self {
        Self { temperature: 1.0 }
    }
}

/// What the model produced for one invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelReply {
    /// The model turn to append to the conversation.
    pub next_turn: Turn,
    /// Tool calls requested in `next_turn`, in order. Empty for a final answer.
    pub requested_calls: Vec<ToolCallPart>,
}

impl ModelReply {
    /// Build a reply from a model turn, collecting its tool calls.
    pub fn from_turn(next_turn: Turn) -> Self {
        let requested_calls = next_turn.tool_calls();
        Self {
            next_turn,
            requested_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.requested_calls.is_empty()
    }
}

/// Why a model invocation failed. Every variant means the backend is
/// unusable for the current query.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model backend unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("model backend returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("model backend returned no candidates")]
    NoCandidates,

    #[error("no API key configured for {0}")]
    MissingApiKey(String),
}

/// Trait that all model backends implement.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Send the full conversation, system instruction and tool schemas to
    /// the model and return its next turn.
    async fn invoke(
        &self,
        conversation: &Conversation,
        system_instruction: &str,
        tools: &[ToolSchema],
        sampling: &SamplingConfig,
    ) -> Result<ModelReply, ModelError>;

    /// Model identifier used for requests.
    fn model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
