//! Configuration schema.
//!
//! Hierarchy: `Config` → `AgentConfig`, `ModelConfig`, `Vec<ServerConfig>`,
//! `GatewayConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// System instruction sent with every model call unless overridden.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You should provide accurate answer based on your general knowledge.\n\n\
Think-step-by-step and if the available tools can help you to answer the question, please use them at individual steps.";

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded from `~/.conduit/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agent: AgentConfig,
    pub model: ModelConfig,
    /// Tool servers, in precedence order: on duplicate tool names the
    /// earlier server wins.
    pub servers: Vec<ServerConfig>,
    pub gateway: GatewayConfig,
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// Agent settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Model identifier (e.g. `"gemini-2.0-flash"`).
    pub model: String,
    /// System instruction sent with every model call.
    pub system_instruction: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

// ─────────────────────────────────────────────
// Model backend
// ─────────────────────────────────────────────

/// Model backend credentials and endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    /// API key for the model backend.
    #[serde(default)]
    pub api_key: String,
    /// Custom API base URL (overrides the backend default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl ModelConfig {
    /// Whether an API key is configured.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ─────────────────────────────────────────────
// Tool servers
// ─────────────────────────────────────────────

/// One tool server.
///
/// `locator` is a script path or an executable; see
/// `conduit_agent::tools::ProviderLocator` for how it is launched.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub name: String,
    pub locator: String,
    /// Extra arguments appended after the locator.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Extra environment variables for the server process.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
            ..Default::default()
        }
    }

    /// Parse a `name=locator` CLI pair. A bare locator is named after its
    /// parent directory (`servers/calculator/mcp_server.py` → `calculator`).
    pub fn parse_pair(raw: &str) -> Self {
        if let Some((name, locator)) = raw.split_once('=') {
            return Self::new(name.trim(), locator.trim());
        }
        let path = std::path::Path::new(raw);
        let name = path
            .parent()
            .and_then(|p| p.file_name())
            .or_else(|| path.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| raw.to_string());
        Self::new(name, raw)
    }
}

// ─────────────────────────────────────────────
// Gateway (HTTP query server)
// ─────────────────────────────────────────────

/// HTTP query server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Directory of a built frontend served at `/`, if it exists.
    pub static_dir: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            static_dir: "frontend/dist".to_string(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
