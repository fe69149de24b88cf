//! Tool servers: the provider abstraction, the MCP stdio client, and the
//! per-query registry that routes calls between them.

pub mod error;
pub mod mcp;
pub mod provider;
pub mod registry;

pub use error::ToolError;
pub use mcp::StdioToolProvider;
pub use provider::{ProviderConnector, ProviderLocator, StdioConnector, ToolCallResult, ToolProvider};
pub use registry::{ShadowedTool, ToolRegistry};
