//! Agent loop: the model ↔ tool-calling loop for a single query.
//!
//! Each query gets a fresh conversation seeded with the user's text and a
//! fresh [`ToolRegistry`]. The loop alternates between asking the model for
//! its next turn and executing the tool calls that turn requests, feeding
//! all results back as one user turn. It stops when the model answers
//! without requesting tools, or after [`MAX_TURNS`] tool rounds.

use std::sync::Arc;

use tracing::{debug, info, warn};

use conduit_core::config::{Config, ServerConfig};
use conduit_core::types::{Conversation, Part, ToolCallPart, ToolResultPart, Turn};
use conduit_providers::{ModelError, ModelInvoker, SamplingConfig};

use crate::tools::{ProviderConnector, StdioConnector, ToolRegistry};

/// Maximum tool-execution rounds per query.
pub const MAX_TURNS: usize = 5;

/// Text returned to callers when the model produced no text at all.
pub const NO_RESPONSE: &str = "No response generated";

/// Why a query could not be answered.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(#[from] ModelError),
}

/// Result of one processed query.
#[derive(Clone, Debug)]
pub struct AgentOutcome {
    /// The final model turn. Normally free of tool calls; when the budget
    /// ran out it is the last model turn as produced, calls included.
    pub answer: Turn,
    /// Full history, seed query first.
    pub conversation: Conversation,
    pub model_invocations: usize,
    pub tool_turns: usize,
    pub budget_exhausted: bool,
}

impl AgentOutcome {
    /// Concatenated text of the final turn.
    pub fn text(&self) -> String {
        self.answer.text()
    }

    /// Text for display, with a placeholder when the model said nothing.
    pub fn response_text(&self) -> String {
        let text = self.text();
        if text.trim().is_empty() {
            NO_RESPONSE.to_string()
        } else {
            text
        }
    }
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCallPart>),
    Done { answer: Turn, budget_exhausted: bool },
}

/// Runs queries against a model backend and the configured tool servers.
pub struct AgentLoop {
    invoker: Arc<dyn ModelInvoker>,
    connector: Arc<dyn ProviderConnector>,
    servers: Vec<ServerConfig>,
    system_instruction: String,
}

impl AgentLoop {
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        connector: Arc<dyn ProviderConnector>,
        servers: Vec<ServerConfig>,
        system_instruction: impl Into<String>,
    ) -> Self {
        info!(
            model = invoker.model(),
            provider = invoker.display_name(),
            servers = servers.len(),
            "agent loop initialized"
        );
        Self {
            invoker,
            connector,
            servers,
            system_instruction: system_instruction.into(),
        }
    }

    /// Agent loop over stdio MCP servers, as configured.
    pub fn from_config(invoker: Arc<dyn ModelInvoker>, config: &Config) -> Self {
        Self::new(
            invoker,
            Arc::new(StdioConnector),
            config.servers.clone(),
            config.agent.system_instruction.clone(),
        )
    }

    pub fn model(&self) -> &str {
        self.invoker.model()
    }

    pub fn servers(&self) -> &[ServerConfig] {
        &self.servers
    }

    /// Answer one query: discover tools, run the loop, and shut every
    /// tool server down again whatever the outcome.
    pub async fn process_query(&self, query: &str) -> Result<AgentOutcome, AgentError> {
        let registry = ToolRegistry::discover(self.connector.as_ref(), &self.servers).await;
        let result = self.run(query, &registry).await;
        registry.shutdown().await;
        result
    }

    /// Run the loop against an already discovered registry.
    pub async fn run(&self, query: &str, registry: &ToolRegistry) -> Result<AgentOutcome, AgentError> {
        info!(query = %conduit_core::utils::truncate_string(query, 80), "processing query");

        let mut conversation = Conversation::new(query);
        let tools = registry.schemas();
        let mut model_invocations = 0;
        let mut tool_turns = 0;
        let mut state = LoopState::AwaitingModel;

        loop {
            match state {
                LoopState::AwaitingModel => {
                    let sampling = if model_invocations == 0 {
                        SamplingConfig::first_call()
                    } else {
                        SamplingConfig::follow_up()
                    };
                    debug!(
                        invocation = model_invocations + 1,
                        temperature = sampling.temperature,
                        "model call"
                    );

                    let reply = self
                        .invoker
                        .invoke(&conversation, &self.system_instruction, tools, &sampling)
                        .await
                        .map_err(|e| {
                            warn!(error = %e, "model invocation failed");
                            AgentError::ModelUnavailable(e)
                        })?;
                    model_invocations += 1;
                    conversation.push(reply.next_turn.clone());

                    state = if !reply.has_tool_calls() {
                        LoopState::Done {
                            answer: reply.next_turn,
                            budget_exhausted: false,
                        }
                    } else if tool_turns >= MAX_TURNS {
                        warn!(
                            max_turns = MAX_TURNS,
                            pending_calls = reply.requested_calls.len(),
                            "tool budget exhausted, returning last model turn"
                        );
                        LoopState::Done {
                            answer: reply.next_turn,
                            budget_exhausted: true,
                        }
                    } else {
                        LoopState::ExecutingTools(reply.requested_calls)
                    };
                }

                LoopState::ExecutingTools(calls) => {
                    tool_turns += 1;
                    info!(turn = tool_turns, calls = calls.len(), "executing tool calls");

                    let mut results = Vec::with_capacity(calls.len());
                    for call in calls {
                        let outcome = registry.execute(&call.name, call.arguments).await;
                        results.push(Part::ToolResult(ToolResultPart::new(
                            call.name,
                            outcome.into_payload(),
                        )));
                    }
                    conversation.push(Turn::user(results));

                    state = LoopState::AwaitingModel;
                }

                LoopState::Done {
                    answer,
                    budget_exhausted,
                } => {
                    info!(
                        model_invocations = model_invocations,
                        tool_turns = tool_turns,
                        budget_exhausted = budget_exhausted,
                        "query complete"
                    );
                    return Ok(AgentOutcome {
                        answer,
                        conversation,
                        model_invocations,
                        tool_turns,
                        budget_exhausted,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{calculator, MockConnector, MockInvoker, MockToolProvider};
    use conduit_core::types::{Role, ToolResultPayload};
    use serde_json::json;

    fn call_turn(calls: &[(&str, serde_json::Value)]) -> Turn {
        Turn::model(
            calls
                .iter()
                .map(|(name, args)| Part::ToolCall(ToolCallPart::from_value(*name, args.clone())))
                .collect(),
        )
    }

    fn agent(invoker: Arc<MockInvoker>, connector: MockConnector, names: &[&str]) -> AgentLoop {
        let servers = connector.servers(names);
        AgentLoop::new(invoker, Arc::new(connector), servers, "Be helpful.")
    }

    fn results_of(turn: &Turn) -> Vec<ToolResultPart> {
        turn.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolResult(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_answer_without_tools_is_single_call() {
        let invoker = Arc::new(MockInvoker::new(vec![Ok(Turn::model_text("Paris."))]));
        let agent = agent(invoker.clone(), MockConnector::new(), &[]);

        let outcome = agent.process_query("Capital of France?").await.unwrap();
        assert_eq!(outcome.answer, Turn::model_text("Paris."));
        assert_eq!(outcome.text(), "Paris.");
        assert_eq!(outcome.model_invocations, 1);
        assert_eq!(outcome.tool_turns, 0);
        assert!(!outcome.budget_exhausted);
        assert_eq!(invoker.temperatures(), vec![0.0]);

        let turns = outcome.conversation.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], Turn::user_text("Capital of France?"));
        assert_eq!(invoker.invocations()[0].system_instruction, "Be helpful.");
    }

    #[tokio::test]
    async fn test_calculator_round_trip() {
        let invoker = Arc::new(MockInvoker::new(vec![
            Ok(call_turn(&[("add", json!({"a": 2, "b": 2}))])),
            Ok(Turn::model_text("2 + 2 = 4")),
        ]));
        let agent = agent(invoker.clone(), MockConnector::new().with(calculator()), &["calculator"]);

        let outcome = agent.process_query("What is 2+2?").await.unwrap();
        assert!(outcome.text().contains('4'));
        assert_eq!(outcome.model_invocations, 2);
        assert_eq!(outcome.tool_turns, 1);
        assert_eq!(invoker.temperatures(), vec![0.0, 1.0]);

        let turns = outcome.conversation.turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[2].role, Role::User);
        let results = results_of(&turns[2]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "add");
        assert_eq!(results[0].payload, ToolResultPayload::Result("4".into()));

        // The follow-up call saw the tool result and the advertised tools.
        let second = &invoker.invocations()[1];
        assert_eq!(second.turns.len(), 3);
        assert_eq!(second.tool_names, vec!["add"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let invoker = Arc::new(MockInvoker::new(vec![
            Ok(call_turn(&[("weather", json!({"city": "Oslo"}))])),
            Ok(Turn::model_text("I cannot check the weather.")),
        ]));
        let agent = agent(invoker.clone(), MockConnector::new().with(calculator()), &["calculator"]);

        let outcome = agent.process_query("Weather in Oslo?").await.unwrap();
        assert_eq!(outcome.text(), "I cannot check the weather.");

        let results = results_of(&outcome.conversation.turns()[2]);
        assert!(results[0].is_error());
        let text = results[0].payload.text();
        assert!(text.starts_with("Tool execution failed: ToolNotFound"));
        assert!(text.contains("weather"));
    }

    #[tokio::test]
    async fn test_results_keep_request_order_with_failures() {
        let email = MockToolProvider::new("email")
            .tool_error("send_email", "SMTP refused")
            .broken_tool("list_inbox");
        let invoker = Arc::new(MockInvoker::new(vec![
            Ok(call_turn(&[
                ("add", json!({"a": 1, "b": 2})),
                ("weather", json!({})),
                ("send_email", json!({"to": "a@b.c"})),
                ("list_inbox", json!({})),
                ("add", json!({"a": 5, "b": 5})),
            ])),
            Ok(Turn::model_text("done")),
        ]));
        let connector = MockConnector::new().with(calculator()).with(email);
        let agent = agent(invoker, connector, &["calculator", "email"]);

        let outcome = agent.process_query("do everything").await.unwrap();
        let turns = outcome.conversation.turns();
        assert_eq!(turns.len(), 4);

        let results = results_of(&turns[2]);
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["add", "weather", "send_email", "list_inbox", "add"]);
        assert_eq!(results[0].payload, ToolResultPayload::Result("3".into()));
        assert!(results[1].payload.text().starts_with("Tool execution failed: ToolNotFound"));
        assert_eq!(results[2].payload, ToolResultPayload::Error("SMTP refused".into()));
        assert!(results[3].payload.text().starts_with("Tool execution failed: TransportError"));
        assert_eq!(results[4].payload, ToolResultPayload::Result("10".into()));
    }

    #[tokio::test]
    async fn test_budget_exhaustion() {
        let looping = call_turn(&[("add", json!({"a": 1, "b": 1}))]);
        let invoker = Arc::new(MockInvoker::repeating(looping.clone()));
        let agent = agent(invoker.clone(), MockConnector::new().with(calculator()), &["calculator"]);

        let outcome = agent.process_query("loop forever").await.unwrap();
        assert!(outcome.budget_exhausted);
        assert_eq!(outcome.model_invocations, MAX_TURNS + 1);
        assert_eq!(outcome.tool_turns, MAX_TURNS);
        assert_eq!(outcome.answer, looping);
        assert!(outcome.answer.has_tool_calls());
        assert_eq!(invoker.temperatures(), vec![0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        // seed + 6 model turns + 5 result turns
        assert_eq!(outcome.conversation.len(), 12);
    }

    #[tokio::test]
    async fn test_model_unavailable_on_first_call() {
        let invoker = Arc::new(MockInvoker::new(vec![Err(ModelError::NoCandidates)]));
        let calc = calculator();
        let agent = agent(invoker, MockConnector::new().with(calc.clone()), &["calculator"]);

        let err = agent.process_query("hello").await.unwrap_err();
        assert!(matches!(err, AgentError::ModelUnavailable(ModelError::NoCandidates)));
        assert!(calc.was_shut_down());
    }

    #[tokio::test]
    async fn test_model_unavailable_mid_loop() {
        let invoker = Arc::new(MockInvoker::new(vec![
            Ok(call_turn(&[("add", json!({"a": 2, "b": 2}))])),
            Err(ModelError::Api {
                status: 503,
                body: "overloaded".into(),
            }),
        ]));
        let calc = calculator();
        let agent = agent(invoker, MockConnector::new().with(calc.clone()), &["calculator"]);

        let err = agent.process_query("What is 2+2?").await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert_eq!(calc.calls(), vec!["add"]);
        assert!(calc.was_shut_down());
    }

    #[tokio::test]
    async fn test_unreachable_server_still_answers() {
        let invoker = Arc::new(MockInvoker::new(vec![Ok(Turn::model_text("Hi."))]));
        let agent = agent(invoker.clone(), MockConnector::new().with(calculator()), &["keynote", "calculator"]);

        let outcome = agent.process_query("hello").await.unwrap();
        assert_eq!(outcome.text(), "Hi.");
        assert_eq!(invoker.invocations()[0].tool_names, vec!["add"]);
    }

    #[tokio::test]
    async fn test_each_query_starts_fresh() {
        let invoker = Arc::new(MockInvoker::new(vec![
            Ok(Turn::model_text("one")),
            Ok(Turn::model_text("two")),
        ]));
        let agent = agent(invoker.clone(), MockConnector::new(), &[]);

        agent.process_query("first").await.unwrap();
        let outcome = agent.process_query("second").await.unwrap();
        assert_eq!(outcome.conversation.query(), "second");
        assert_eq!(invoker.invocations()[1].turns.len(), 1);
        assert_eq!(invoker.temperatures(), vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_empty_answer_placeholder() {
        let invoker = Arc::new(MockInvoker::new(vec![Ok(Turn::model_text(""))]));
        let agent = agent(invoker, MockConnector::new(), &[]);

        let outcome = agent.process_query("say nothing").await.unwrap();
        assert_eq!(outcome.text(), "");
        assert_eq!(outcome.response_text(), NO_RESPONSE);
    }

    #[test]
    fn test_from_config_uses_configured_servers() {
        let mut config = Config::default();
        config.servers.push(ServerConfig::new("calculator", "calc.py"));
        config.agent.system_instruction = "Be brief.".into();

        let agent = AgentLoop::from_config(Arc::new(MockInvoker::new(vec![])), &config);
        assert_eq!(agent.servers().len(), 1);
        assert_eq!(agent.model(), "mock-model");
    }
}
