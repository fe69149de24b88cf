//! Conduit Core: conversation data model, configuration, and helpers
//! shared by every other Conduit crate.

pub mod config;
pub mod types;
pub mod utils;

pub use types::{
    Conversation, Part, Role, ToolCallPart, ToolExecutionOutcome, ToolResultPart,
    ToolResultPayload, ToolSchema, Turn,
};
