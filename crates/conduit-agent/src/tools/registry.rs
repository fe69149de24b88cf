//! Tool Registry: aggregates the tools of every configured server for the
//! duration of one query and routes calls by tool name.
//!
//! Discovery is best-effort: a server that cannot be reached, or fails to
//! list its tools, contributes nothing and the query goes on without it.
//! When two servers advertise the same tool name the first one (in
//! configuration order) keeps it and later ones are recorded as shadowed.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use conduit_core::config::ServerConfig;
use conduit_core::types::{ToolExecutionOutcome, ToolSchema};
use conduit_core::utils::truncate_string;

use super::error::ToolError;
use super::provider::{ProviderConnector, ToolProvider};

/// A tool that was dropped because an earlier server already offered it.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowedTool {
    pub tool: String,
    pub provider: String,
    pub kept_by: String,
}

/// Routes tool calls to the servers that advertise them.
pub struct ToolRegistry {
    schemas: Vec<ToolSchema>,
    routes: HashMap<String, Arc<dyn ToolProvider>>,
    providers: Vec<Arc<dyn ToolProvider>>,
    shadowed: Vec<ShadowedTool>,
    unreachable: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            schemas: Vec::new(),
            routes: HashMap::new(),
            providers: Vec::new(),
            shadowed: Vec::new(),
            unreachable: Vec::new(),
        }
    }

    /// Connect to every configured server and collect its tools.
    ///
    /// Never fails: unreachable servers are logged and skipped.
    pub async fn discover(connector: &dyn ProviderConnector, servers: &[ServerConfig]) -> Self {
        let mut registry = Self::new();

        for server in servers {
            let provider = match connector.connect(server).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(server = %server.name, error = %e, "Tool server unreachable, skipping");
                    registry.unreachable.push(server.name.clone());
                    continue;
                }
            };

            if let Err(e) = registry.register_provider(provider.clone()).await {
                warn!(server = %server.name, error = %e, "Failed to list tools, skipping server");
                registry.unreachable.push(server.name.clone());
                provider.shutdown().await;
            }
        }

        info!(
            tools = registry.schemas.len(),
            servers = registry.providers.len(),
            unreachable = registry.unreachable.len(),
            "Tool discovery complete"
        );
        registry
    }

    /// List a provider's tools and route each new name to it.
    ///
    /// Returns how many tools were registered. Names already taken stay with
    /// their current owner.
    pub async fn register_provider(
        &mut self,
        provider: Arc<dyn ToolProvider>,
    ) -> Result<usize, ToolError> {
        let tools = provider.list_tools().await?;
        let mut added = 0;

        for schema in tools {
            if let Some(owner) = self.routes.get(&schema.name) {
                warn!(
                    tool = %schema.name,
                    provider = %provider.name(),
                    kept_by = %owner.name(),
                    "Duplicate tool name, keeping first registration"
                );
                self.shadowed.push(ShadowedTool {
                    tool: schema.name,
                    provider: provider.name().to_string(),
                    kept_by: owner.name().to_string(),
                });
                continue;
            }

            debug!(tool = %schema.name, provider = %provider.name(), "Registered tool");
            self.routes.insert(schema.name.clone(), provider.clone());
            self.schemas.push(schema);
            added += 1;
        }

        self.providers.push(provider);
        Ok(added)
    }

    /// Schemas of every routable tool, in discovery order.
    pub fn schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    pub fn shadowed(&self) -> &[ShadowedTool] {
        &self.shadowed
    }

    /// Names of servers that contributed nothing because they failed.
    pub fn unreachable(&self) -> &[String] {
        &self.unreachable
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Execute a tool by name.
    ///
    /// Always returns an outcome, never an error: call failures (unknown
    /// tool, dead server, protocol errors) become a `call_failed` outcome
    /// the model can read.
    pub async fn execute(&self, name: &str, arguments: Map<String, Value>) -> ToolExecutionOutcome {
        let Some(provider) = self.routes.get(name) else {
            let err = ToolError::ToolNotFound(name.to_string());
            warn!(tool = %name, "Tool not found");
            return ToolExecutionOutcome::call_failed(err.kind(), &err);
        };

        debug!(tool = %name, provider = %provider.name(), "Executing tool");
        match provider.call_tool(name, arguments).await {
            Ok(result) => {
                let text = result.joined_text();
                if result.is_error {
                    info!(tool = %name, result = %truncate_string(&text, 200), "Tool reported an error");
                    ToolExecutionOutcome::tool_error(text)
                } else {
                    info!(tool = %name, result = %truncate_string(&text, 200), "Tool executed");
                    ToolExecutionOutcome::success(text)
                }
            }
            Err(e) => {
                warn!(tool = %name, provider = %provider.name(), error = %e, "Tool call failed");
                ToolExecutionOutcome::call_failed(e.kind(), &e)
            }
        }
    }

    /// Shut down every connected server.
    pub async fn shutdown(&self) {
        for provider in &self.providers {
            provider.shutdown().await;
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
