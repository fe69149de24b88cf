//! Test doubles shared by the registry and agent loop tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use conduit_core::config::ServerConfig;
use conduit_core::types::{Conversation, ToolSchema, Turn};
use conduit_providers::{ModelError, ModelInvoker, ModelReply, SamplingConfig};

use crate::tools::{ProviderConnector, ToolCallResult, ToolError, ToolProvider};

// ─────────────────────────────────────────────
// Tool providers
// ─────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Behavior {
    Text(String),
    ToolError(String),
    Broken,
    Add,
}

/// In-memory tool server. Clones share call history and shutdown state.
#[derive(Clone)]
pub struct MockToolProvider {
    name: String,
    tools: Vec<(ToolSchema, Behavior)>,
    failing_list: bool,
    shut_down: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockToolProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tools: Vec::new(),
            failing_list: false,
            shut_down: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_behavior(mut self, tool: &str, behavior: Behavior) -> Self {
        let schema = ToolSchema::new(tool, format!("Mock tool {tool}"), json!({"type": "object"}));
        self.tools.push((schema, behavior));
        self
    }

    /// Tool that answers with fixed text.
    pub fn tool(self, tool: &str, text: &str) -> Self {
        self.with_behavior(tool, Behavior::Text(text.to_string()))
    }

    /// Tool that runs but reports an error result.
    pub fn tool_error(self, tool: &str, text: &str) -> Self {
        self.with_behavior(tool, Behavior::ToolError(text.to_string()))
    }

    /// Tool whose call fails at the transport level.
    pub fn broken_tool(self, tool: &str) -> Self {
        self.with_behavior(tool, Behavior::Broken)
    }

    pub fn failing_list(mut self) -> Self {
        self.failing_list = true;
        self
    }

    pub fn was_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// A server named `calculator` with an `add(a, b)` tool.
pub fn calculator() -> MockToolProvider {
    MockToolProvider::new("calculator").with_behavior("add", Behavior::Add)
}

#[async_trait]
impl ToolProvider for MockToolProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, ToolError> {
        if self.failing_list {
            return Err(ToolError::Protocol {
                server: self.name.clone(),
                message: "tools/list returned garbage".into(),
            });
        }
        Ok(self.tools.iter().map(|(s, _)| s.clone()).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallResult, ToolError> {
        self.calls.lock().unwrap().push(name.to_string());
        let behavior = self
            .tools
            .iter()
            .find(|(s, _)| s.name == name)
            .map(|(_, b)| b.clone())
            .ok_or_else(|| ToolError::Rpc {
                server: self.name.clone(),
                code: -32602,
                message: format!("unknown tool {name}"),
            })?;

        match behavior {
            Behavior::Text(text) => Ok(ToolCallResult::text(text)),
            Behavior::ToolError(text) => Ok(ToolCallResult::error(text)),
            Behavior::Broken => Err(ToolError::Transport {
                server: self.name.clone(),
                message: "broken pipe".into(),
            }),
            Behavior::Add => {
                let a = arguments.get("a").and_then(Value::as_i64).unwrap_or(0);
                let b = arguments.get("b").and_then(Value::as_i64).unwrap_or(0);
                Ok(ToolCallResult::text((a + b).to_string()))
            }
        }
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

/// Connector handing out mock providers by server name. Unknown names fail
/// to connect.
#[derive(Clone, Default)]
pub struct MockConnector {
    providers: HashMap<String, MockToolProvider>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: MockToolProvider) -> Self {
        self.providers.insert(provider.name.clone(), provider);
        self
    }

    /// Server configs for the given names, in order.
    pub fn servers(&self, names: &[&str]) -> Vec<ServerConfig> {
        names
            .iter()
            .map(|n| ServerConfig::new(*n, format!("servers/{n}/mcp_server.py")))
            .collect()
    }
}

#[async_trait]
impl ProviderConnector for MockConnector {
    async fn connect(&self, server: &ServerConfig) -> Result<Arc<dyn ToolProvider>, ToolError> {
        match self.providers.get(&server.name) {
            Some(p) => Ok(Arc::new(p.clone())),
            None => Err(ToolError::Spawn {
                server: server.name.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            }),
        }
    }
}

// ─────────────────────────────────────────────
// Model invoker
// ─────────────────────────────────────────────

/// What the mock invoker saw on one call.
#[derive(Clone, Debug)]
pub struct RecordedInvocation {
    pub temperature: f64,
    pub turns: Vec<Turn>,
    pub tool_names: Vec<String>,
    pub system_instruction: String,
}

/// Replays canned replies. Once they run out it answers with `fallback`
/// (or a plain "Done." text turn).
pub struct MockInvoker {
    replies: Mutex<VecDeque<Result<ModelReply, ModelError>>>,
    fallback: Option<Turn>,
    recorded: Mutex<Vec<RecordedInvocation>>,
}

impl MockInvoker {
    pub fn new(replies: Vec<Result<Turn, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(ModelReply::from_turn))
                    .collect(),
            ),
            fallback: None,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Invoker that answers every call with the same turn.
    pub fn repeating(turn: Turn) -> Self {
        Self {
            fallback: Some(turn),
            ..Self::new(Vec::new())
        }
    }

    pub fn invocations(&self) -> Vec<RecordedInvocation> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn temperatures(&self) -> Vec<f64> {
        self.invocations().iter().map(|i| i.temperature).collect()
    }
}

#[async_trait]
impl ModelInvoker for MockInvoker {
    async fn invoke(
        &self,
        conversation: &Conversation,
        system_instruction: &str,
        tools: &[ToolSchema],
        sampling: &SamplingConfig,
    ) -> Result<ModelReply, ModelError> {
        self.recorded.lock().unwrap().push(RecordedInvocation {
            temperature: sampling.temperature,
            turns: conversation.turns().to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            system_instruction: system_instruction.to_string(),
        });

        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }
        let turn = self
            .fallback
            .clone()
            .unwrap_or_else(|| Turn::model_text("Done."));
        Ok(ModelReply::from_turn(turn))
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn display_name(&self) -> &str {
        "Mock"
    }
}
