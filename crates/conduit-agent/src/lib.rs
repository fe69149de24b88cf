//! Conduit Agent: query loop and tool servers.
//!
//! This crate contains:
//! - **tools**: tool provider trait, MCP stdio client, and the tool registry
//! - **agent_loop**: the model ↔ tool-calling loop for one query

pub mod agent_loop;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent_loop::{AgentError, AgentLoop, AgentOutcome, MAX_TURNS, NO_RESPONSE};
pub use tools::{ProviderConnector, StdioConnector, ToolError, ToolProvider, ToolRegistry};
