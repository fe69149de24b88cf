//! MCP tool server over stdio: JSON-RPC 2.0, one message per line.
//!
//! The server is launched as a child process. After the `initialize`
//! handshake the client issues `tools/list` and `tools/call` requests and
//! reads stdout until the response with the matching id arrives. Anything
//! else on stdout (log noise, notifications, server-initiated requests) is
//! skipped. The child's stderr is forwarded to `tracing` at debug level.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use conduit_core::types::ToolSchema;

use super::error::ToolError;
use super::provider::{ProviderLocator, ToolCallResult, ToolProvider};

/// MCP protocol revision announced during the handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

// ─────────────────────────────────────────────
// JSON-RPC wire types
// ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<ToolSchema>,
}

impl JsonRpcResponse {
    /// True when this is the reply to request `id` (not a request the
    /// server sent us that happens to reuse the number).
    fn answers(&self, id: u64) -> bool {
        self.method.is_none() && self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }
}

// ─────────────────────────────────────────────
// StdioToolProvider
// ─────────────────────────────────────────────

struct StdioChannel {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// A connected MCP server child process.
pub struct StdioToolProvider {
    name: String,
    next_id: AtomicU64,
    channel: Mutex<StdioChannel>,
    child: Mutex<Option<Child>>,
}

impl StdioToolProvider {
    /// Launch the server and complete the initialize handshake.
    pub async fn spawn(locator: &ProviderLocator) -> Result<Self, ToolError> {
        debug!(
            server = %locator.name,
            program = %locator.program,
            args = ?locator.args,
            "Launching tool server"
        );

        let mut child = Command::new(&locator.program)
            .args(&locator.args)
            .envs(&locator.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                server: locator.name.clone(),
                source,
            })?;

        let missing_pipe = |pipe: &str| ToolError::Transport {
            server: locator.name.clone(),
            message: format!("failed to capture {pipe}"),
        };
        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;

        if let Some(stderr) = child.stderr.take() {
            let server = locator.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = %server, "{}", line);
                }
            });
        }

        let provider = Self {
            name: locator.name.clone(),
            next_id: AtomicU64::new(1),
            channel: Mutex::new(StdioChannel {
                stdin,
                stdout: BufReader::new(stdout),
            }),
            child: Mutex::new(Some(child)),
        };

        provider.initialize().await?;
        Ok(provider)
    }

    async fn initialize(&self) -> Result<(), ToolError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let result = self.request("initialize", Some(params)).await?;
        let server_info = result
            .get("serverInfo")
            .and_then(|i| i.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(server = %self.name, server_info = %server_info, "Tool server initialized");

        self.notify("notifications/initialized").await
    }

    /// Send a request and wait for its response. The channel lock is held
    /// for the whole exchange so responses cannot be stolen by a concurrent call.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut channel = self.channel.lock().await;

        self.write_message(
            &mut channel.stdin,
            &JsonRpcRequest {
                jsonrpc: "2.0",
                id: Some(id),
                method,
                params,
            },
        )
        .await?;

        let response = self.read_response(&mut channel.stdout, id).await?;
        if let Some(err) = response.error {
            return Err(ToolError::Rpc {
                server: self.name.clone(),
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str) -> Result<(), ToolError> {
        let mut channel = self.channel.lock().await;
        self.write_message(
            &mut channel.stdin,
            &JsonRpcRequest {
                jsonrpc: "2.0",
                id: None,
                method,
                params: None,
            },
        )
        .await
    }

    async fn write_message(
        &self,
        stdin: &mut ChildStdin,
        message: &JsonRpcRequest<'_>,
    ) -> Result<(), ToolError> {
        let mut line = serde_json::to_string(message).map_err(|e| self.protocol_error(e))?;
        line.push('\n');

        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| self.transport_error(e))?;
        stdin.flush().await.map_err(|e| self.transport_error(e))
    }

    async fn read_response(
        &self,
        stdout: &mut BufReader<ChildStdout>,
        expected_id: u64,
    ) -> Result<JsonRpcResponse, ToolError> {
        let mut buf = String::new();
        loop {
            buf.clear();
            let n = stdout
                .read_line(&mut buf)
                .await
                .map_err(|e| self.transport_error(e))?;
            if n == 0 {
                return Err(ToolError::Terminated {
                    server: self.name.clone(),
                });
            }

            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(resp) if resp.answers(expected_id) => return Ok(resp),
                Ok(resp) => {
                    debug!(
                        server = %self.name,
                        method = ?resp.method,
                        id = ?resp.id,
                        "Skipping unrelated message"
                    );
                }
                Err(_) => {
                    debug!(server = %self.name, line = %trimmed, "Skipping non-JSON output");
                }
            }
        }
    }

    fn transport_error(&self, err: impl std::fmt::Display) -> ToolError {
        ToolError::Transport {
            server: self.name.clone(),
            message: err.to_string(),
        }
    }

    fn protocol_error(&self, err: impl std::fmt::Display) -> ToolError {
        ToolError::Protocol {
            server: self.name.clone(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl ToolProvider for StdioToolProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, ToolError> {
        let result = self.request("tools/list", Some(json!({}))).await?;
        let listed: ListToolsResult =
            serde_json::from_value(result).map_err(|e| self.protocol_error(e))?;
        Ok(listed.tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallResult, ToolError> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.request("tools/call", Some(params)).await?;
        serde_json::from_value(result).map_err(|e| self.protocol_error(e))
    }

    async fn shutdown(&self) {
        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };
        if let Err(e) = child.kill().await {
            warn!(server = %self.name, error = %e, "Failed to stop tool server");
            return;
        }
        debug!(server = %self.name, "Tool server stopped");
    }
}

impl std::fmt::Debug for StdioToolProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioToolProvider")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
