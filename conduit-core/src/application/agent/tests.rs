use super::*;
use crate::application::tooling::{ToolInvokeError, ToolSession};
use crate::domain::types::{
    CompletionResult, ContentBlock, Conversation, Message, Role, StopReason, ToolArguments,
    ToolDescriptor, ToolOutcome,
};
use crate::infrastructure::model::{ModelError, ModelProvider};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

type ToolResponder = Box<dyn Fn() -> Result<ToolOutcome, ToolInvokeError> + Send + Sync>;

#[derive(Default)]
struct StubSession {
    tools: Vec<ToolDescriptor>,
    responders: HashMap<String, (Duration, ToolResponder)>,
    calls: Mutex<Vec<(String, ToolArguments)>>,
    finished: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
    fail_listing: bool,
}

impl StubSession {
    fn with_tool<F>(mut self, descriptor: ToolDescriptor, delay: Duration, responder: F) -> Self
    where
        F: Fn() -> Result<ToolOutcome, ToolInvokeError> + Send + Sync + 'static,
    {
        self.responders
            .insert(descriptor.name.clone(), (delay, Box::new(responder)));
        self.tools.push(descriptor);
        self
    }

    fn returning(self, name: &str, content: &str) -> Self {
        let content = content.to_string();
        self.with_tool(
            ToolDescriptor::new(name, None, None),
            Duration::ZERO,
            move || Ok(ToolOutcome::success(content.clone())),
        )
    }

    async fn called(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl ToolSession for StubSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(ToolInvokeError::Terminated {
                server: "weather".into(),
            });
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> Result<ToolOutcome, ToolInvokeError> {
        self.calls.lock().await.push((name.to_string(), arguments));
        let Some((delay, responder)) = self.responders.get(name) else {
            return Err(ToolInvokeError::UnknownTool {
                tool: name.to_string(),
            });
        };
        tokio::time::sleep(*delay).await;
        self.finished.lock().await.push(name.to_string());
        responder()
    }
}

struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<CompletionResult, ModelError>>>,
    recordings: Mutex<Vec<Vec<Message>>>,
    delay: Duration,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<CompletionResult, ModelError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            recordings: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    fn answering(completions: Vec<CompletionResult>) -> Self {
        Self::new(completions.into_iter().map(Ok).collect())
    }

    async fn requests(&self) -> Vec<Vec<Message>> {
        self.recordings.lock().await.clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<CompletionResult, ModelError> {
        self.recordings.lock().await.push(messages.to_vec());
        tokio::time::sleep(self.delay).await;
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::invalid_response("scripted", "script exhausted")))
    }
}

fn args(value: Value) -> ToolArguments {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn tool_use(id: &str, name: &str, input: Value) -> ContentBlock {
    ContentBlock::tool_use(id, name, args(input))
}

fn tools_turn(blocks: Vec<ContentBlock>) -> CompletionResult {
    CompletionResult::new(blocks, Some(StopReason::ToolUse))
}

fn final_text(text: &str) -> CompletionResult {
    CompletionResult::new(vec![ContentBlock::text(text)], Some(StopReason::EndTurn))
}

fn orchestrator(provider: &Arc<ScriptedProvider>, session: &Arc<StubSession>) -> Orchestrator {
    Orchestrator::new(provider.clone(), session.clone(), AgentOptions::default())
}

fn result_blocks(message: &Message) -> Vec<(String, String, bool)> {
    message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Some((tool_use_id.clone(), content.clone(), *is_error)),
            ContentBlock::Text { .. } | ContentBlock::ToolUse { .. } => None,
        })
        .collect()
}

fn forecast_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "get_forecast",
        Some("Get weather forecast for a location".into()),
        Some(json!({
            "type": "object",
            "properties": {
                "latitude": {"type": "number"},
                "longitude": {"type": "number"}
            },
            "required": ["latitude", "longitude"]
        })),
    )
}

#[tokio::test]
async fn answer_without_tools_uses_one_completion() {
    let provider = Arc::new(ScriptedProvider::answering(vec![CompletionResult::new(
        vec![ContentBlock::text("Hello."), ContentBlock::text("How can I help?")],
        Some(StopReason::EndTurn),
    )]));
    let session = Arc::new(StubSession::default().returning("get_alerts", "none"));
    let mut conversation = Conversation::new();

    let outcome = orchestrator(&provider, &session)
        .run_turn(&mut conversation, "hi", &session.tools, &CancellationToken::new())
        .await
        .expect("turn succeeds");

    assert_eq!(outcome.answer, "Hello.\nHow can I help?");
    assert_eq!(outcome.rounds, 1);
    assert!(outcome.steps.is_empty());
    assert_eq!(provider.requests().await.len(), 1);
    assert!(session.called().await.is_empty());
    assert_eq!(conversation.len(), 2);
}

#[tokio::test]
async fn boston_forecast_takes_four_messages() {
    let provider = Arc::new(ScriptedProvider::answering(vec![
        tools_turn(vec![
            ContentBlock::text("Let me look that up."),
            tool_use("toolu_1", "get_forecast", json!({"latitude": 42.36, "longitude": -71.06})),
        ]),
        final_text("Tonight in Boston: clear skies, low of 58F."),
    ]));
    let session = Arc::new(StubSession::default().with_tool(
        forecast_tool(),
        Duration::ZERO,
        || Ok(ToolOutcome::success("Tonight: Clear, 58F")),
    ));
    let mut conversation = Conversation::new();

    let outcome = orchestrator(&provider, &session)
        .run_turn(
            &mut conversation,
            "What's the forecast for Boston?",
            &session.tools,
            &CancellationToken::new(),
        )
        .await
        .expect("turn succeeds");

    assert_eq!(
        outcome.answer,
        "Let me look that up.\nTonight in Boston: clear skies, low of 58F."
    );
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.steps.len(), 1);
    assert_eq!(outcome.steps[0].tool, "get_forecast");
    assert!(!outcome.steps[0].is_error);

    let messages = conversation.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0], Message::user_text("What's the forecast for Boston?"));
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].tool_use_ids(), vec!["toolu_1"]);
    assert_eq!(messages[2].role, Role::User);
    assert_eq!(
        result_blocks(&messages[2]),
        vec![("toolu_1".to_string(), "Tonight: Clear, 58F".to_string(), false)]
    );
    assert_eq!(messages[3].role, Role::Assistant);

    let requests = provider.requests().await;
    assert_eq!(requests[1].len(), 3);
    assert!(conversation.unanswered_tool_uses().is_empty());
}

#[tokio::test]
async fn every_tool_use_is_answered_once() {
    let provider = Arc::new(ScriptedProvider::answering(vec![
        tools_turn(vec![
            tool_use("a", "get_alerts", json!({"state": "MA"})),
            tool_use("b", "get_alerts", json!({"state": "NY"})),
            tool_use("c", "get_forecast", json!({"latitude": 1, "longitude": 2})),
        ]),
        final_text("done"),
    ]));
    let session = Arc::new(
        StubSession::default()
            .returning("get_alerts", "no alerts")
            .with_tool(
                forecast_tool(),
                Duration::ZERO,
                || Ok(ToolOutcome::success("sunny")),
            ),
    );
    let mut conversation = Conversation::new();

    orchestrator(&provider, &session)
        .run_turn(&mut conversation, "weather?", &session.tools, &CancellationToken::new())
        .await
        .expect("turn succeeds");

    let uses = conversation.messages()[1].tool_use_ids();
    let results = conversation.messages()[2].tool_result_ids();
    assert_eq!(uses, vec!["a", "b", "c"]);
    assert_eq!(results, uses);
    assert_eq!(session.called().await.len(), 3);
}

#[tokio::test]
async fn one_failing_tool_does_not_stop_the_others() {
    let provider = Arc::new(ScriptedProvider::answering(vec![
        tools_turn(vec![
            tool_use("a", "get_alerts", json!({"state": "MA"})),
            tool_use("b", "broken", json!({})),
            tool_use("c", "get_alerts", json!({"state": "CA"})),
        ]),
        final_text("Partial results only."),
    ]));
    let session = Arc::new(
        StubSession::default().returning("get_alerts", "no alerts").with_tool(
            ToolDescriptor::new("broken", None, None),
            Duration::ZERO,
            || {
                Err(ToolInvokeError::Rpc {
                    server: "weather".into(),
                    code: -32603,
                    message: "internal failure".into(),
                })
            },
        ),
    );
    let mut conversation = Conversation::new();

    let outcome = orchestrator(&provider, &session)
        .run_turn(&mut conversation, "alerts?", &session.tools, &CancellationToken::new())
        .await
        .expect("turn succeeds");

    assert_eq!(outcome.answer, "Partial results only.");
    let results = result_blocks(&conversation.messages()[2]);
    assert_eq!(results.len(), 3);
    assert!(!results[0].2);
    assert!(results[1].2);
    assert!(results[1].1.starts_with("Error calling tool broken: "));
    assert!(results[1].1.contains("internal failure"));
    assert!(!results[2].2);
    assert_eq!(session.called().await.len(), 3);
}

#[tokio::test]
async fn tool_reported_errors_are_prefixed() {
    let provider = Arc::new(ScriptedProvider::answering(vec![
        tools_turn(vec![tool_use("a", "get_alerts", json!({"state": "ZZ"}))]),
        final_text("That state does not exist."),
    ]));
    let session = Arc::new(StubSession::default().with_tool(
        ToolDescriptor::new("get_alerts", None, None),
        Duration::ZERO,
        || Ok(ToolOutcome::error("unknown state ZZ")),
    ));
    let mut conversation = Conversation::new();

    let outcome = orchestrator(&provider, &session)
        .run_turn(&mut conversation, "alerts for ZZ", &session.tools, &CancellationToken::new())
        .await
        .expect("turn succeeds");

    assert_eq!(
        result_blocks(&conversation.messages()[2]),
        vec![(
            "a".to_string(),
            "Error calling tool get_alerts: unknown state ZZ".to_string(),
            true
        )]
    );
    assert!(outcome.steps[0].is_error);
}

#[tokio::test(start_paused = true)]
async fn results_keep_request_order_when_tools_finish_out_of_order() {
    let provider = Arc::new(ScriptedProvider::answering(vec![
        tools_turn(vec![
            tool_use("1", "slow", json!({})),
            tool_use("2", "fast", json!({})),
            tool_use("3", "medium", json!({})),
        ]),
        final_text("ok"),
    ]));
    let mut stub = StubSession::default();
    for (name, millis) in [("slow", 30), ("fast", 10), ("medium", 20)] {
        stub = stub.with_tool(
            ToolDescriptor::new(name, None, None),
            Duration::from_millis(millis),
            move || Ok(ToolOutcome::success(name)),
        );
    }
    let session = Arc::new(stub);
    let mut conversation = Conversation::new();

    orchestrator(&provider, &session)
        .run_turn(&mut conversation, "go", &session.tools, &CancellationToken::new())
        .await
        .expect("turn succeeds");

    assert_eq!(*session.finished.lock().await, vec!["fast", "medium", "slow"]);
    let contents: Vec<String> = result_blocks(&conversation.messages()[2])
        .into_iter()
        .map(|(_, content, _)| content)
        .collect();
    assert_eq!(contents, vec!["slow", "fast", "medium"]);
}

#[tokio::test(start_paused = true)]
async fn sequential_dispatch_runs_tools_one_after_another() {
    let provider = Arc::new(ScriptedProvider::answering(vec![
        tools_turn(vec![tool_use("1", "slow", json!({})), tool_use("2", "fast", json!({}))]),
        final_text("ok"),
    ]));
    let session = Arc::new(
        StubSession::default()
            .with_tool(
                ToolDescriptor::new("slow", None, None),
                Duration::from_millis(30),
                || Ok(ToolOutcome::success("slow")),
            )
            .with_tool(
                ToolDescriptor::new("fast", None, None),
                Duration::from_millis(10),
                || Ok(ToolOutcome::success("fast")),
            ),
    );
    let options = AgentOptions {
        parallel_tool_calls: false,
        ..AgentOptions::default()
    };
    let orchestrator = Orchestrator::new(provider.clone(), session.clone(), options);
    assert!(!orchestrator.options().parallel_tool_calls);
    let mut conversation = Conversation::new();

    orchestrator
        .run_turn(&mut conversation, "go", &session.tools, &CancellationToken::new())
        .await
        .expect("turn succeeds");

    assert_eq!(*session.finished.lock().await, vec!["slow", "fast"]);
}

#[tokio::test]
async fn identical_scripts_replay_identically() {
    async fn run() -> (String, String) {
        let provider = Arc::new(ScriptedProvider::answering(vec![
            tools_turn(vec![
                ContentBlock::text("Checking."),
                tool_use(
                    "toolu_1",
                    "get_forecast",
                    json!({"latitude": 42.36, "longitude": -71.06}),
                ),
            ]),
            final_text("Clear tonight."),
        ]));
        let session = Arc::new(StubSession::default().with_tool(
            forecast_tool(),
            Duration::ZERO,
            || Ok(ToolOutcome::success("Clear, 58F")),
        ));
        let mut conversation = Conversation::with_id("replay");
        let outcome = orchestrator(&provider, &session)
            .run_turn(&mut conversation, "forecast?", &session.tools, &CancellationToken::new())
            .await
            .expect("turn succeeds");
        let transcript = serde_json::to_string(&conversation).expect("serializable");
        (outcome.answer, transcript)
    }

    let first = run().await;
    let second = run().await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn tool_timeout_becomes_error_result() {
    let provider = Arc::new(ScriptedProvider::answering(vec![
        tools_turn(vec![tool_use(
            "toolu_1",
            "get_forecast",
            json!({"latitude": 42.36, "longitude": -71.06}),
        )]),
        final_text("The forecast service is not responding right now."),
    ]));
    let session = Arc::new(StubSession::default().with_tool(
        forecast_tool(),
        Duration::ZERO,
        || {
            Err(ToolInvokeError::Timeout {
                server: "weather".into(),
                millis: 60_000,
            })
        },
    ));
    let mut conversation = Conversation::new();

    let outcome = orchestrator(&provider, &session)
        .run_turn(&mut conversation, "forecast?", &session.tools, &CancellationToken::new())
        .await
        .expect("turn succeeds");

    assert_eq!(outcome.answer, "The forecast service is not responding right now.");
    let results = result_blocks(&conversation.messages()[2]);
    assert!(results[0].2);
    assert!(results[0].1.contains("timeout"));
}

#[tokio::test]
async fn unknown_tools_and_bad_arguments_are_not_dispatched() {
    let provider = Arc::new(ScriptedProvider::answering(vec![
        tools_turn(vec![
            tool_use("a", "get_tides", json!({})),
            tool_use("b", "get_forecast", json!({"latitude": "north"})),
        ]),
        final_text("I could not get that."),
    ]));
    let session = Arc::new(StubSession::default().with_tool(
        forecast_tool(),
        Duration::ZERO,
        || Ok(ToolOutcome::success("unused")),
    ));
    let mut conversation = Conversation::new();

    orchestrator(&provider, &session)
        .run_turn(&mut conversation, "tides?", &session.tools, &CancellationToken::new())
        .await
        .expect("turn succeeds");

    assert!(session.called().await.is_empty());
    let results = result_blocks(&conversation.messages()[2]);
    assert_eq!(
        results[0],
        (
            "a".to_string(),
            "Error calling tool get_tides: unknown tool requested: get_tides".to_string(),
            true
        )
    );
    assert_eq!(
        results[1].1,
        "Error calling tool get_forecast: invalid arguments: missing required argument 'longitude'"
    );
}

#[tokio::test]
async fn empty_completion_ends_turn_with_empty_answer() {
    let provider = Arc::new(ScriptedProvider::answering(vec![CompletionResult::new(
        vec![ContentBlock::text("")],
        None,
    )]));
    let session = Arc::new(StubSession::default());
    let mut conversation = Conversation::new();

    let outcome = orchestrator(&provider, &session)
        .run_turn(&mut conversation, "", &[], &CancellationToken::new())
        .await
        .expect("turn succeeds");

    assert_eq!(outcome.answer, "");
    assert_eq!(outcome.rounds, 1);
    assert_eq!(conversation.messages()[0], Message::user_text(""));
    assert_eq!(conversation.len(), 2);
}

#[tokio::test]
async fn blockless_completion_is_recorded_as_empty_text() {
    let provider = Arc::new(ScriptedProvider::answering(vec![CompletionResult::new(
        Vec::new(),
        None,
    )]));
    let session = Arc::new(StubSession::default());
    let mut conversation = Conversation::new();

    let outcome = orchestrator(&provider, &session)
        .run_turn(&mut conversation, "hello", &[], &CancellationToken::new())
        .await
        .expect("turn succeeds");

    assert_eq!(outcome.answer, "");
    assert_eq!(
        conversation.last(),
        Some(&Message::assistant(vec![ContentBlock::text("")]))
    );
}

#[tokio::test]
async fn round_limit_stops_without_dangling_tool_use() {
    let looping = || tools_turn(vec![tool_use("x", "get_alerts", json!({"state": "MA"}))]);
    let provider = Arc::new(ScriptedProvider::answering(vec![looping(), looping(), looping()]));
    let session = Arc::new(StubSession::default().returning("get_alerts", "no alerts"));
    let options = AgentOptions {
        max_rounds: 2,
        ..AgentOptions::default()
    };
    let orchestrator = Orchestrator::new(provider.clone(), session.clone(), options);
    let mut conversation = Conversation::new();

    let err = orchestrator
        .run_turn(&mut conversation, "loop", &session.tools, &CancellationToken::new())
        .await
        .expect_err("limit reached");

    assert!(matches!(err, AgentError::RoundLimitExceeded { limit: 2 }));
    assert_eq!(provider.requests().await.len(), 3);
    assert_eq!(conversation.len(), 5);
    assert_eq!(conversation.last().map(|m| m.role), Some(Role::User));
    assert!(conversation.unanswered_tool_uses().is_empty());
}

#[tokio::test]
async fn model_failure_after_tools_leaves_reusable_transcript() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(tools_turn(vec![tool_use("a", "get_alerts", json!({"state": "MA"}))])),
        Err(ModelError::invalid_response("scripted", "truncated body")),
        Ok(final_text("Back online.")),
    ]));
    let session = Arc::new(StubSession::default().returning("get_alerts", "no alerts"));
    let orchestrator = orchestrator(&provider, &session);
    let mut conversation = Conversation::new();

    let err = orchestrator
        .run_turn(&mut conversation, "alerts?", &session.tools, &CancellationToken::new())
        .await
        .expect_err("model failure");
    assert!(matches!(err, AgentError::Model(ModelError::InvalidResponse { .. })));
    assert_eq!(conversation.len(), 3);
    assert!(conversation.unanswered_tool_uses().is_empty());

    let outcome = orchestrator
        .run_turn(&mut conversation, "try again", &session.tools, &CancellationToken::new())
        .await
        .expect("second turn succeeds");
    assert_eq!(outcome.answer, "Back online.");
    assert_eq!(conversation.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn cancelling_during_tools_rolls_back_tool_uses() {
    let provider = Arc::new(ScriptedProvider::answering(vec![tools_turn(vec![
        ContentBlock::text("Working on it."),
        tool_use("a", "slow", json!({})),
    ])]));
    let session = Arc::new(StubSession::default().with_tool(
        ToolDescriptor::new("slow", None, None),
        Duration::from_secs(3600),
        || Ok(ToolOutcome::success("late")),
    ));
    let orchestrator = orchestrator(&provider, &session);
    let cancel = CancellationToken::new();
    let mut conversation = Conversation::new();

    let canceller = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(
        orchestrator.run_turn(&mut conversation, "slow please", &session.tools, &cancel),
        canceller
    );

    assert!(matches!(result, Err(AgentError::Cancelled)));
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation.messages()[0], Message::user_text("slow please"));
    assert!(conversation.unanswered_tool_uses().is_empty());
    assert_eq!(session.called().await, vec!["slow"]);
}

#[tokio::test(start_paused = true)]
async fn cancelling_during_completion_keeps_user_message() {
    let mut provider = ScriptedProvider::answering(vec![final_text("too late")]);
    provider.delay = Duration::from_secs(3600);
    let provider = Arc::new(provider);
    let session = Arc::new(StubSession::default());
    let orchestrator = orchestrator(&provider, &session);
    let cancel = CancellationToken::new();
    let mut conversation = Conversation::new();

    let canceller = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(
        orchestrator.run_turn(&mut conversation, "hello", &[], &cancel),
        canceller
    );

    assert!(matches!(result, Err(AgentError::Cancelled)));
    assert_eq!(conversation.len(), 1);
}

#[tokio::test]
async fn chat_session_refreshes_catalog_every_turn() {
    let provider = Arc::new(ScriptedProvider::answering(vec![
        final_text("first"),
        final_text("second"),
    ]));
    let session = Arc::new(StubSession::default().returning("get_alerts", "none"));
    let mut chat = ChatSession::new(provider.clone(), session.clone(), AgentOptions::default());
    let cancel = CancellationToken::new();

    let first = chat.run_turn("one", &cancel).await.expect("first turn");
    let second = chat.run_turn("two", &cancel).await.expect("second turn");

    assert_eq!(first.answer, "first");
    assert_eq!(second.answer, "second");
    assert_eq!(session.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(chat.conversation().len(), 4);
}

#[tokio::test]
async fn chat_session_catalog_failure_appends_nothing() {
    let provider = Arc::new(ScriptedProvider::answering(vec![final_text("unused")]));
    let session = Arc::new(StubSession {
        fail_listing: true,
        ..StubSession::default()
    });
    let mut chat = ChatSession::new(provider.clone(), session, AgentOptions::default());

    let err = chat
        .run_turn("hello", &CancellationToken::new())
        .await
        .expect_err("catalog fetch fails");

    assert!(matches!(err, AgentError::Session(ToolInvokeError::Terminated { .. })));
    assert!(chat.conversation().is_empty());
    assert!(provider.requests().await.is_empty());
    assert_eq!(err.user_message(), "Tool server 'weather' stopped unexpectedly.");
}
