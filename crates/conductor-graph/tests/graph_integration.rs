//! Cross-node integration test: drives `graph::run` end to end through a
//! scripted fake LLM gateway and a real tool dispatch, exercising
//! Plan -> Execute -> Reflect -> Finalize as one invocation instead of
//! testing each node's pure logic in isolation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use conductor_core::config::{
    AgentBehaviorConfig, LlmModelsConfig, LlmRetryConfig, LlmRoleConfig, PersonaConfig, StreamingConfig,
};
use conductor_core::types::{ProgressEvent, Source, StreamingChunk, ToolCall, ToolContent, ToolExecutionResult};
use conductor_core::ErrorKind;
use conductor_bus::{ProgressBus, ProgressObserver};
use conductor_graph::{run, GraphContext, GraphState};
use conductor_llm::provider::{ChatRequest, ChatResponse, LlmProvider};
use conductor_llm::{LlmGateway, Result as LlmResult};
use conductor_media::EmojiRegistry;
use conductor_tools::{Tool, ToolContext, ToolRegistry};
use tokio_util::sync::CancellationToken;

/// Replies based on which node's system prompt is asking, so one fake
/// provider can drive the whole graph without per-role wiring.
struct ScriptedProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, req: &ChatRequest) -> LlmResult<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if req.system.contains("planning stage") {
            return Ok(ChatResponse {
                content: String::new(),
                model: req.model.clone(),
                tokens_in: 10,
                tokens_out: 5,
                stop_reason: "tool_use".into(),
                tool_calls: vec![conductor_llm::provider::ToolCall {
                    id: "call-1".into(),
                    name: "echo".into(),
                    input: serde_json::json!({ "text": "ping" }),
                }],
            });
        }

        if req.system.contains("accumulated tool results are sufficient") {
            return Ok(ChatResponse {
                content: r#"{"is_sufficient": true, "reasoning": "enough"}"#.into(),
                model: req.model.clone(),
                tokens_in: 10,
                tokens_out: 5,
                stop_reason: "end_turn".into(),
                tool_calls: vec![],
            });
        }

        // Finalize.
        Ok(ChatResponse {
            content: "The echo tool said: pong".into(),
            model: req.model.clone(),
            tokens_in: 10,
            tokens_out: 5,
            stop_reason: "end_turn".into(),
            tool_calls: vec![],
        })
    }
}

/// A trivial tool so Execute has something real to dispatch.
struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes its input back."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}})
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> ToolExecutionResult {
        ToolExecutionResult::ok(call.task_id.clone(), self.name(), ToolContent::Text("pong".into()))
    }
}

fn test_models() -> LlmModelsConfig {
    let role = LlmRoleConfig {
        model: "scripted-model".into(),
        temperature: 0.5,
        max_output_tokens: 512,
    };
    LlmModelsConfig {
        planner: role.clone(),
        finalizer: role.clone(),
        reflector: role.clone(),
        progress_blurb: role,
    }
}

/// Captures exactly what the bus delivered, in emit order, so the test can
/// check both the final outcome and the streaming-chunk invariant.
#[derive(Default)]
struct CapturingObserver {
    chunks: Mutex<Vec<String>>,
    completion: Mutex<Option<(String, Vec<Source>)>>,
    errors: Mutex<Vec<(ErrorKind, String)>>,
}

#[async_trait]
impl ProgressObserver for CapturingObserver {
    async fn on_progress(&self, _event: ProgressEvent) {}

    async fn on_streaming_chunk(&self, chunk: StreamingChunk) {
        self.chunks.lock().unwrap().push(chunk.content);
    }

    async fn on_streaming_complete(&self) {}

    async fn on_completion(&self, final_text: String, sources: Vec<Source>) {
        *self.completion.lock().unwrap() = Some((final_text, sources));
    }

    async fn on_error(&self, kind: ErrorKind, message: String) {
        self.errors.lock().unwrap().push((kind, message));
    }
}

fn build_context(observer: Arc<CapturingObserver>, streaming_enabled: bool) -> GraphContext {
    let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider {
        calls: AtomicUsize::new(0),
    });
    let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
    providers.insert("gemini".to_string(), provider);
    let llm = Arc::new(LlmGateway::new(
        providers,
        test_models(),
        LlmRetryConfig {
            max_attempts: 1,
            base_delay_ms: 1,
        },
    ));

    let tools = Arc::new(ToolRegistry::new(vec![Arc::new(EchoTool)], HashMap::new()));
    let tool_ctx = ToolContext {
        http: reqwest::Client::new(),
        timezone: chrono_tz::UTC,
    };

    let mut bus = ProgressBus::new(None);
    bus.register("test", observer, &HashMap::new());

    GraphContext {
        llm,
        tools,
        tool_ctx,
        bus: Arc::new(bus),
        behavior: AgentBehaviorConfig {
            max_tool_rounds: 3,
            timeout_per_round_secs: 30,
            enable_reflection: true,
        },
        streaming: StreamingConfig {
            enabled: streaming_enabled,
            min_content_length: 0,
        },
        persona: PersonaConfig::default(),
        available_personas: vec![],
        emoji_registry: Arc::new(EmojiRegistry::new()),
        guild_id: None,
    }
}

fn user_message(text: &str) -> conductor_core::conversation::Message {
    use conductor_core::conversation::{Content, Message, MessageMetadata, Role};
    Message {
        role: Role::User,
        content: Content::Text(text.into()),
        metadata: MessageMetadata::default(),
    }
}

/// Drains the bus the way `SessionRunner::handle` does: the graph only owns
/// one strong `Arc` reference to it by the time `run` returns, so
/// `try_unwrap` always succeeds here and `shutdown` can drain every
/// observer's queue before assertions read it.
async fn drain(ctx: GraphContext) {
    let GraphContext { bus, .. } = ctx;
    match Arc::try_unwrap(bus) {
        Ok(bus) => bus.shutdown().await,
        Err(_) => panic!("progress bus had outstanding references at shutdown"),
    }
}

#[tokio::test]
async fn full_round_trip_calls_tool_and_finalizes() {
    let observer = Arc::new(CapturingObserver::default());
    let ctx = build_context(observer.clone(), false);
    let mut state = GraphState::new(vec![user_message("what's the echo?")], String::new());

    run(&mut state, &ctx, &CancellationToken::new()).await.unwrap();
    drain(ctx).await;

    assert!(state.finished);
    assert_eq!(state.final_answer, "The echo tool said: pong");
    assert_eq!(state.tool_round, 1);
    assert!(state.aggregated_tool_results.iter().any(|r| r.content.as_text() == "pong"));

    let completion = observer.completion.lock().unwrap().clone().expect("completion delivered");
    assert_eq!(completion.0, state.final_answer);
    assert!(observer.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn streaming_final_answer_equals_concatenation_of_delivered_chunks() {
    let observer = Arc::new(CapturingObserver::default());
    let ctx = build_context(observer.clone(), true);
    let mut state = GraphState::new(vec![user_message("what's the echo?")], String::new());

    run(&mut state, &ctx, &CancellationToken::new()).await.unwrap();
    drain(ctx).await;

    assert!(state.finished);
    let delivered: String = observer.chunks.lock().unwrap().concat();
    assert_eq!(delivered, state.final_answer);
    assert_eq!(state.final_answer, "The echo tool said: pong");
}
