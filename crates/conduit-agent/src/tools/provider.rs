//! Tool provider trait: the abstract interface every tool server implements.
//!
//! A provider advertises a set of tools (`list_tools`) and runs them by name
//! (`call_tool`). Providers are obtained through a [`ProviderConnector`] so
//! the registry never needs to know how a server is reached.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use conduit_core::config::ServerConfig;
use conduit_core::types::ToolSchema;
use conduit_core::utils::expand_home;

use super::error::ToolError;
use super::mcp::StdioToolProvider;

// ─────────────────────────────────────────────
// Call results
// ─────────────────────────────────────────────

/// Raw result of a `tools/call`, in MCP wire format.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub is_error: bool,
}

/// One content item of a call result. Only text items carry anything we use.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ContentItem {
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem {
                content_type: "text".to_string(),
                text: Some(text.into()),
            }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    /// All text items joined by newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ─────────────────────────────────────────────
// Provider traits
// ─────────────────────────────────────────────

/// A connected tool server.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Server name, for logs and routing diagnostics.
    fn name(&self) -> &str;

    /// Tools advertised by this server.
    async fn list_tools(&self) -> Result<Vec<ToolSchema>, ToolError>;

    /// Run a tool. `Err` means the call itself failed; a tool-level failure
    /// is an `Ok` result with `is_error` set.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallResult, ToolError>;

    /// Release the connection. Called once when the query ends.
    async fn shutdown(&self) {}
}

/// Turns a configured server into a live provider.
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    async fn connect(&self, server: &ServerConfig) -> Result<Arc<dyn ToolProvider>, ToolError>;
}

/// Connects to MCP servers launched as child processes over stdio.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdioConnector;

#[async_trait]
impl ProviderConnector for StdioConnector {
    async fn connect(&self, server: &ServerConfig) -> Result<Arc<dyn ToolProvider>, ToolError> {
        let locator = ProviderLocator::resolve(server);
        let provider = StdioToolProvider::spawn(&locator).await?;
        Ok(Arc::new(provider))
    }
}

// ─────────────────────────────────────────────
// Locators
// ─────────────────────────────────────────────

/// How to launch a tool server process.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderLocator {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl ProviderLocator {
    /// Resolve a configured locator: scripts run through their interpreter
    /// (`.py` → `python3`, `.js` → `node`, `.sh` → `sh`), anything else is
    /// executed directly.
    pub fn resolve(server: &ServerConfig) -> Self {
        let path = expand_home(&server.locator).to_string_lossy().into_owned();
        let interpreter = match Path::new(&path).extension().and_then(|e| e.to_str()) {
            Some("py") => Some("python3"),
            Some("js") | Some("mjs") => Some("node"),
            Some("sh") => Some("sh"),
            _ => None,
        };

        let (program, mut args) = match interpreter {
            Some(interp) => (interp.to_string(), vec![path]),
            None => (path, Vec::new()),
        };
        args.extend(server.args.iter().cloned());

        Self {
            name: server.name.clone(),
            program,
            args,
            env: server.env.clone(),
        }
    }
}
