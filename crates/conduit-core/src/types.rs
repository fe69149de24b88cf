//! Core types for Conduit: the conversation data model shared by the agent
//! loop, the model invokers and the tool registry.
//!
//! A conversation is an append-only list of [`Turn`]s. Each turn is attributed
//! to the user or the model and carries an ordered list of [`Part`]s: plain
//! text, a tool-call request, or a tool-call result. Order is significant at
//! both levels and is never rearranged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────
// Turns and parts
// ─────────────────────────────────────────────

/// Who produced a turn.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// The smallest content unit within a turn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Natural-language text.
    Text { text: String },
    /// A request from the model to run a tool.
    ToolCall(ToolCallPart),
    /// The outcome of a tool run, fed back to the model.
    ToolResult(ToolResultPart),
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }
}

/// A tool-call request issued by the model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCallPart {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments keyed by parameter name.
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Opaque provider token that must accompany the call when the
    /// conversation is sent back (Gemini thought signatures).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ToolCallPart {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
            signature: None,
        }
    }

    pub fn with_signature(mut self, signature: Option<String>) -> Self {
        self.signature = signature;
        self
    }

    /// Build a call from a JSON value; anything but an object yields no arguments.
    pub fn from_value(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(name, arguments)
    }
}

/// The result of one tool call, as sent back to the model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolResultPart {
    /// Name of the tool that was called.
    pub name: String,
    /// Either `{"result": ...}` or `{"error": ...}`, never both.
    pub payload: ToolResultPayload,
}

impl ToolResultPart {
    pub fn new(name: impl Into<String>, payload: ToolResultPayload) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, ToolResultPayload::Error(_))
    }
}

/// Tool result payload.
///
/// Serializes as `{"result": "..."}` or `{"error": "..."}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultPayload {
    Result(String),
    Error(String),
}

impl ToolResultPayload {
    /// The text carried by either variant.
    pub fn text(&self) -> &str {
        match self {
            ToolResultPayload::Result(text) | ToolResultPayload::Error(text) => text,
        }
    }
}

/// One exchange unit in the conversation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    /// A user turn holding a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Turn {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    /// A user turn holding arbitrary parts (tool results, usually).
    pub fn user(parts: Vec<Part>) -> Self {
        Turn {
            role: Role::User,
            parts,
        }
    }

    /// A model turn.
    pub fn model(parts: Vec<Part>) -> Self {
        Turn {
            role: Role::Model,
            parts,
        }
    }

    /// A model turn holding a single text part.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self::model(vec![Part::text(text)])
    }

    /// Concatenated text of all text parts, in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool calls requested in this turn, in order.
    pub fn tool_calls(&self) -> Vec<ToolCallPart> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether any part is a tool-call request.
    pub fn has_tool_calls(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::ToolCall(_)))
    }
}

// ─────────────────────────────────────────────
// Conversation
// ─────────────────────────────────────────────

/// Ordered, append-only conversation history for a single query.
///
/// Always starts with exactly one user turn: the initial query.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Start a conversation seeded with the initial query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user_text(query)],
        }
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Never true: the seed turn is always present.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The initial user query.
    pub fn query(&self) -> String {
        self.turns.first().map(Turn::text).unwrap_or_default()
    }
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// A tool as advertised by a provider.
///
/// Field names follow the MCP `tools/list` wire format.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_input_schema")]
    pub input_schema: Value,
}

fn default_input_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// What one tool invocation produced.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolExecutionOutcome {
    /// The tool (or the call to it) failed.
    pub is_error: bool,
    /// Tool output, or the error description.
    pub text: String,
    /// The call itself failed (transport, unknown tool, ...), as opposed to
    /// the tool reporting an error result.
    pub call_failed: bool,
}

impl ToolExecutionOutcome {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            is_error: false,
            text: text.into(),
            call_failed: false,
        }
    }

    /// The provider ran the tool and it reported an error.
    pub fn tool_error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            text: text.into(),
            call_failed: false,
        }
    }

    /// The provider call failed; `text` becomes `"<kind>: <message>"`.
    pub fn call_failed(kind: &str, message: impl std::fmt::Display) -> Self {
        Self {
            is_error: true,
            text: format!("{kind}: {message}"),
            call_failed: true,
        }
    }

    /// Convert into the payload fed back to the model.
    pub fn into_payload(self) -> ToolResultPayload {
        if self.call_failed {
            ToolResultPayload::Error(format!("Tool execution failed: {}", self.text))
        } else if self.is_error {
            ToolResultPayload::Error(self.text)
        } else {
            ToolResultPayload::Result(self.text)
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
