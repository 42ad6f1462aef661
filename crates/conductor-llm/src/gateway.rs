//! Four-role LLM gateway (C3): planner, finalizer, reflector, and
//! progress_blurb each resolve to an independently configured model/
//! temperature/max-tokens triple (`conductor_core::config::LlmModelsConfig`),
//! and are dispatched to whichever provider understands that model name.
//! Every call is health-tracked and cancellation-aware.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use conductor_core::config::{LlmModelsConfig, LlmRetryConfig, LlmRoleConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, warn, Instrument};

use crate::error::{LlmError, Result};
use crate::health::HealthTracker;
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, Message};
use crate::stream::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Planner,
    Finalizer,
    Reflector,
    ProgressBlurb,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::Planner => "planner",
            Role::Finalizer => "finalizer",
            Role::Reflector => "reflector",
            Role::ProgressBlurb => "progress_blurb",
        }
    }
}

/// A fully-formed request for one gateway role: system prompt, message
/// history, and optional tool definitions (only Plan/Execute rounds pass
/// tools; Finalize/Reflect never do).
pub struct RoleRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub raw_messages: Option<Vec<serde_json::Value>>,
    pub tools: Vec<crate::provider::ToolDefinition>,
}

/// Picks a provider for a given model name. Anthropic model names start with
/// `claude-`; everything else is routed to Gemini. A gateway configured with
/// only one provider simply never sees the other prefix in its config.
fn provider_for_model<'a>(
    providers: &'a HashMap<String, Arc<dyn LlmProvider>>,
    model: &str,
) -> Result<&'a Arc<dyn LlmProvider>> {
    let key = if model.starts_with("claude-") {
        "anthropic"
    } else {
        "gemini"
    };
    providers
        .get(key)
        .ok_or_else(|| LlmError::Unavailable(format!("no provider registered for model '{model}'")))
}

/// §7: `TransientNetwork`/`RateLimited` are retried inside the gateway;
/// everything else (structured-output, context-overflow, provider 4xx,
/// cancellation) bubbles to the node on the first failure.
fn is_retryable(error: &LlmError) -> bool {
    matches!(error.kind(), conductor_core::ErrorKind::TransientNetwork | conductor_core::ErrorKind::RateLimited)
}

/// Delay before the next attempt. A `RateLimited` error carries the
/// provider's own `retry-after`, which takes precedence over the
/// configured base delay; anything else backs off exponentially from
/// `base_delay_ms`.
fn backoff_delay(attempt: u32, retry: &LlmRetryConfig, error: &LlmError) -> Duration {
    if let LlmError::RateLimited { retry_after_ms } = error {
        return Duration::from_millis(*retry_after_ms);
    }
    let factor = 1u64 << attempt.min(16);
    Duration::from_millis(retry.base_delay_ms.saturating_mul(factor))
}

pub struct LlmGateway {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    models: LlmModelsConfig,
    retry: LlmRetryConfig,
    health: Arc<HealthTracker>,
}

impl LlmGateway {
    pub fn new(providers: HashMap<String, Arc<dyn LlmProvider>>, models: LlmModelsConfig, retry: LlmRetryConfig) -> Self {
        Self {
            providers,
            models,
            retry,
            health: HealthTracker::new(),
        }
    }

    pub fn health(&self) -> Arc<HealthTracker> {
        self.health.clone()
    }

    fn role_config(&self, role: Role) -> &LlmRoleConfig {
        match role {
            Role::Planner => &self.models.planner,
            Role::Finalizer => &self.models.finalizer,
            Role::Reflector => &self.models.reflector,
            Role::ProgressBlurb => &self.models.progress_blurb,
        }
    }

    /// Dispatch a non-streaming call for `role`, honoring `cancel`. Records
    /// the outcome into the health tracker regardless of success/failure.
    pub async fn call(
        &self,
        role: Role,
        req: RoleRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        let cfg = self.role_config(role);
        let chat_req = ChatRequest {
            model: cfg.model.clone(),
            system: req.system,
            messages: req.messages,
            max_tokens: cfg.max_output_tokens,
            temperature: cfg.temperature,
            tools: req.tools,
            raw_messages: req.raw_messages,
        };
        let provider = provider_for_model(&self.providers, &chat_req.model)?;

        let span = info_span!("llm_call", role = role.as_str(), model = %chat_req.model);
        async {
            let mut attempt = 0u32;
            loop {
                let started = Instant::now();
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(LlmError::Cancelled),
                    result = provider.send(&chat_req) => result,
                };
                let elapsed_ms = started.elapsed().as_millis() as u64;
                match outcome {
                    Ok(resp) => {
                        self.health.record_success(role.as_str(), elapsed_ms);
                        return Ok(resp);
                    }
                    Err(LlmError::Cancelled) => return Err(LlmError::Cancelled),
                    Err(e) if is_retryable(&e) && attempt + 1 < self.retry.max_attempts => {
                        self.health.record_error(role.as_str(), &e);
                        let delay = backoff_delay(attempt, &self.retry, &e);
                        warn!(role = role.as_str(), attempt, delay_ms = delay.as_millis() as u64, error = %e, "llm call failed, retrying");
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                        attempt += 1;
                    }
                    Err(e) => {
                        warn!(role = role.as_str(), attempt, error = %e, "llm call failed, giving up");
                        self.health.record_error(role.as_str(), &e);
                        return Err(e);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Stream a call for `role` (only ever used for `Role::Finalizer` per
    /// §4.4's "streaming only during Finalize" invariant, but the gateway
    /// itself doesn't enforce that — the graph does).
    pub async fn call_stream(
        &self,
        role: Role,
        req: RoleRequest,
        tx: mpsc::Sender<StreamEvent>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let cfg = self.role_config(role);
        let chat_req = ChatRequest {
            model: cfg.model.clone(),
            system: req.system,
            messages: req.messages,
            max_tokens: cfg.max_output_tokens,
            temperature: cfg.temperature,
            tools: req.tools,
            raw_messages: req.raw_messages,
        };
        let provider = provider_for_model(&self.providers, &chat_req.model)?;

        // Retries are only safe here because every provider's `send_stream`
        // returns its `Err` *before* forwarding any `StreamEvent` to `tx`
        // (the pre-flight status check happens ahead of the SSE body read);
        // once an attempt has started forwarding chunks it always resolves
        // `Ok(())`, with mid-stream failures reported as `StreamEvent::Error`
        // instead. So a retried attempt never duplicates output on `tx`.
        let mut attempt = 0u32;
        loop {
            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = tx.send(StreamEvent::Error { message: "cancelled".into() }).await;
                    Err(LlmError::Cancelled)
                }
                result = provider.send_stream(&chat_req, tx.clone()) => result,
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(()) => {
                    self.health.record_success(role.as_str(), elapsed_ms);
                    return Ok(());
                }
                Err(LlmError::Cancelled) => return Err(LlmError::Cancelled),
                Err(e) if is_retryable(&e) && attempt + 1 < self.retry.max_attempts => {
                    self.health.record_error(role.as_str(), &e);
                    let delay = backoff_delay(attempt, &self.retry, &e);
                    warn!(role = role.as_str(), attempt, delay_ms = delay.as_millis() as u64, error = %e, "llm stream call failed, retrying");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!(role = role.as_str(), attempt, error = %e, "llm stream call failed, giving up");
                    self.health.record_error(role.as_str(), &e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubProvider {
        name: &'static str,
        response: String,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                content: self.response.clone(),
                model: "stub".into(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "end_turn".into(),
                tool_calls: vec![],
            })
        }
    }

    /// Fails its first `fail_times` calls with the given error, then
    /// succeeds. Used to exercise the retry loop without a real network
    /// round trip.
    struct FlakyProvider {
        name: &'static str,
        fail_times: std::sync::Arc<std::sync::atomic::AtomicU32>,
        error: fn() -> LlmError,
        response: String,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse> {
            if self.fail_times.load(std::sync::atomic::Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                return Err((self.error)());
            }
            Ok(ChatResponse {
                content: self.response.clone(),
                model: "stub".into(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "end_turn".into(),
                tool_calls: vec![],
            })
        }
    }

    fn test_retry() -> LlmRetryConfig {
        LlmRetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
        }
    }

    fn test_models() -> LlmModelsConfig {
        LlmModelsConfig {
            planner: LlmRoleConfig {
                model: "claude-sonnet-4-6".into(),
                temperature: 0.2,
                max_output_tokens: 100,
            },
            finalizer: LlmRoleConfig {
                model: "claude-sonnet-4-6".into(),
                temperature: 0.7,
                max_output_tokens: 100,
            },
            reflector: LlmRoleConfig {
                model: "claude-haiku-4-6".into(),
                temperature: 0.0,
                max_output_tokens: 50,
            },
            progress_blurb: LlmRoleConfig {
                model: "claude-haiku-4-6".into(),
                temperature: 0.8,
                max_output_tokens: 20,
            },
        }
    }

    #[tokio::test]
    async fn routes_claude_models_to_anthropic_provider() {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        providers.insert(
            "anthropic".into(),
            Arc::new(StubProvider {
                name: "anthropic",
                response: "planned".into(),
            }),
        );
        let gateway = LlmGateway::new(providers, test_models(), test_retry());
        let resp = gateway
            .call(
                Role::Planner,
                RoleRequest {
                    system: "plan".into(),
                    messages: vec![],
                    raw_messages: None,
                    tools: vec![],
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(resp.content, "planned");
    }

    #[tokio::test]
    async fn missing_provider_is_an_error() {
        let gateway = LlmGateway::new(HashMap::new(), test_models(), test_retry());
        let result = gateway
            .call(
                Role::Planner,
                RoleRequest {
                    system: "plan".into(),
                    messages: vec![],
                    raw_messages: None,
                    tools: vec![],
                },
                &CancellationToken::new(),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_the_call() {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        providers.insert(
            "anthropic".into(),
            Arc::new(StubProvider {
                name: "anthropic",
                response: "unused".into(),
            }),
        );
        let gateway = LlmGateway::new(providers, test_models(), test_retry());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = gateway
            .call(
                Role::Planner,
                RoleRequest {
                    system: "plan".into(),
                    messages: vec![],
                    raw_messages: None,
                    tools: vec![],
                },
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(LlmError::Cancelled)));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_until_it_succeeds() {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        providers.insert(
            "anthropic".into(),
            Arc::new(FlakyProvider {
                name: "anthropic",
                fail_times: std::sync::Arc::new(std::sync::atomic::AtomicU32::new(2)),
                error: || LlmError::Api { status: 503, message: "unavailable".into() },
                response: "recovered".into(),
            }),
        );
        let gateway = LlmGateway::new(providers, test_models(), test_retry());
        let resp = gateway
            .call(
                Role::Planner,
                RoleRequest {
                    system: "plan".into(),
                    messages: vec![],
                    raw_messages: None,
                    tools: vec![],
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(resp.content, "recovered");
    }

    #[tokio::test]
    async fn retries_are_bounded_by_max_attempts() {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        providers.insert(
            "anthropic".into(),
            Arc::new(FlakyProvider {
                name: "anthropic",
                fail_times: std::sync::Arc::new(std::sync::atomic::AtomicU32::new(u32::MAX)),
                error: || LlmError::RateLimited { retry_after_ms: 1 },
                response: "unreachable".into(),
            }),
        );
        let gateway = LlmGateway::new(providers, test_models(), test_retry());
        let result = gateway
            .call(
                Role::Planner,
                RoleRequest {
                    system: "plan".into(),
                    messages: vec![],
                    raw_messages: None,
                    tools: vec![],
                },
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(LlmError::RateLimited { .. })));
    }

    #[test]
    fn rate_limited_backoff_uses_provider_retry_after() {
        let retry = test_retry();
        let err = LlmError::RateLimited { retry_after_ms: 1234 };
        assert_eq!(backoff_delay(0, &retry, &err), Duration::from_millis(1234));
    }

    #[test]
    fn non_rate_limited_backoff_is_exponential_in_base_delay() {
        let retry = LlmRetryConfig { max_attempts: 5, base_delay_ms: 100 };
        let err = LlmError::Api { status: 503, message: "x".into() };
        assert_eq!(backoff_delay(0, &retry, &err), Duration::from_millis(100));
        assert_eq!(backoff_delay(1, &retry, &err), Duration::from_millis(200));
        assert_eq!(backoff_delay(2, &retry, &err), Duration::from_millis(400));
    }
}
