//! Gemini model invoker: talks to the `generateContent` REST endpoint.
//!
//! Conversation turns map one-to-one onto Gemini `contents`: text parts become
//! `{"text"}`, tool calls `{"functionCall"}`, tool results
//! `{"functionResponse"}`. Tool schemas are sent as `functionDeclarations`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

use conduit_core::types::{
    Conversation, Part, Role, ToolCallPart, ToolResultPayload, ToolSchema, Turn,
};

use crate::traits::{ModelError, ModelInvoker, ModelReply, SamplingConfig};

/// Default Gemini API base.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// JSON-schema keys the Gemini function-declaration schema rejects.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties"];

// ─────────────────────────────────────────────
// GeminiInvoker
// ─────────────────────────────────────────────

/// Model invoker backed by the Gemini API.
pub struct GeminiInvoker {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"https://generativelanguage.googleapis.com/v1beta"`).
    api_base: String,
    /// API key sent as `x-goog-api-key`.
    api_key: String,
    /// Model identifier (e.g. `"gemini-2.0-flash"`).
    model: String,
}

impl std::fmt::Debug for GeminiInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiInvoker")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiInvoker {
    /// Create an invoker. `api_base` falls back to [`DEFAULT_API_BASE`].
    pub fn new(api_key: &str, api_base: Option<&str>, model: &str) -> Result<Self, ModelError> {
        if api_key.trim().is_empty() {
            return Err(ModelError::MissingApiKey("Gemini".to_string()));
        }

        Ok(GeminiInvoker {
            client: reqwest::Client::new(),
            api_base: api_base.unwrap_or(DEFAULT_API_BASE).to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Full `generateContent` URL for the configured model.
    fn generate_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        let model = self.model.trim_start_matches("models/");
        format!("{base}/models/{model}:generateContent")
    }
}

#[async_trait]
impl ModelInvoker for GeminiInvoker {
    async fn invoke(
        &self,
        conversation: &Conversation,
        system_instruction: &str,
        tools: &[ToolSchema],
        sampling: &SamplingConfig,
    ) -> Result<ModelReply, ModelError> {
        let body = build_request(conversation, system_instruction, tools, sampling);

        debug!(
            model = %self.model,
            turns = conversation.len(),
            tools = tools.len(),
            temperature = sampling.temperature,
            "Calling Gemini"
        );

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, "HTTP request failed");
                ModelError::Unreachable(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(model = %self.model, status = %status, body = %body, "API error");
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let reply = parse_response(parsed)?;
        debug!(
            model = %self.model,
            parts = reply.next_turn.parts.len(),
            tool_calls = reply.requested_calls.len(),
            "Gemini response received"
        );
        Ok(reply)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn display_name(&self) -> &str {
        "Gemini"
    }
}

// ─────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing)]
    thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl From<&Part> for GeminiPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text { text } => GeminiPart {
                text: Some(text.clone()),
                ..Default::default()
            },
            Part::ToolCall(call) => GeminiPart {
                function_call: Some(FunctionCall {
                    name: call.name.clone(),
                    args: Some(call.arguments.clone()),
                }),
                thought_signature: call.signature.clone(),
                ..Default::default()
            },
            Part::ToolResult(result) => GeminiPart {
                function_response: Some(FunctionResponse {
                    name: result.name.clone(),
                    response: payload_json(&result.payload),
                }),
                ..Default::default()
            },
        }
    }
}

impl GeminiPart {
    /// Convert a model-produced part back to a conversation part. Thought
    /// summaries and anything else we don't model yield `None`.
    fn into_part(self) -> Option<Part> {
        if self.thought == Some(true) {
            return None;
        }
        if let Some(call) = self.function_call {
            return Some(Part::ToolCall(
                ToolCallPart::new(call.name, call.args.unwrap_or_default())
                    .with_signature(self.thought_signature),
            ));
        }
        self.text.map(|text| Part::Text { text })
    }
}

fn payload_json(payload: &ToolResultPayload) -> Value {
    match payload {
        ToolResultPayload::Result(text) => serde_json::json!({ "result": text }),
        ToolResultPayload::Error(text) => serde_json::json!({ "error": text }),
    }
}

fn to_gemini_content(turn: &Turn) -> GeminiContent {
    GeminiContent {
        role: Some(turn.role.as_str().to_string()),
        parts: turn.parts.iter().map(GeminiPart::from).collect(),
    }
}

/// Build the `generateContent` request body.
fn build_request(
    conversation: &Conversation,
    system_instruction: &str,
    tools: &[ToolSchema],
    sampling: &SamplingConfig,
) -> GenerateContentRequest {
    let declarations: Vec<FunctionDeclaration> = tools
        .iter()
        .map(|t| FunctionDeclaration {
            name: t.name.clone(),
            description: t.description.clone(),
            parameters: clean_parameters(&t.input_schema),
        })
        .collect();

    GenerateContentRequest {
        system_instruction: GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(system_instruction.to_string()),
                ..Default::default()
            }],
        },
        contents: conversation.turns().iter().map(to_gemini_content).collect(),
        tools: if declarations.is_empty() {
            Vec::new()
        } else {
            vec![GeminiTool {
                function_declarations: declarations,
            }]
        },
        generation_config: GenerationConfig {
            temperature: sampling.temperature,
        },
    }
}

/// Take the first candidate as the model's next turn.
fn parse_response(response: GenerateContentResponse) -> Result<ModelReply, ModelError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ModelError::NoCandidates)?;

    let content = candidate.content.ok_or_else(|| {
        ModelError::InvalidResponse(format!(
            "candidate has no content (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ))
    })?;

    let parts: Vec<Part> = content
        .parts
        .into_iter()
        .filter_map(GeminiPart::into_part)
        .collect();

    if parts.is_empty() {
        return Err(ModelError::InvalidResponse(format!(
            "candidate has no usable parts (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(ModelReply::from_turn(Turn {
        role: Role::Model,
        parts,
    }))
}

/// Strip schema keys Gemini rejects. Schemas without properties are
/// omitted entirely: Gemini refuses empty object parameter schemas.
fn clean_parameters(schema: &Value) -> Option<Value> {
    let has_properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|p| !p.is_empty());
    if !has_properties {
        return None;
    }
    let mut cleaned = schema.clone();
    strip_unsupported(&mut cleaned);
    Some(cleaned)
}

fn strip_unsupported(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for key in UNSUPPORTED_SCHEMA_KEYS {
                map.remove(*key);
            }
            for child in map.values_mut() {
                strip_unsupported(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_unsupported),
        _ => {}
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
