//! Tool trait + registry (C2): typed declarations, dispatch with per-call
//! timeout, and the result envelope. Grounded on the teacher's
//! `skynet-agent/src/tools/mod.rs` `Tool` trait, generalized so dispatch
//! always yields a `ToolExecutionResult` (with `error_kind`) rather than a
//! bare success/failure string pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conductor_core::config::ToolGatingConfig;
use conductor_core::error::ErrorKind;
use conductor_core::types::{ToolCall, ToolContent, ToolExecutionResult};
use conductor_llm::ToolDefinition;
use tracing::{debug, warn};

/// Read-only context handed to every tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    pub http: reqwest::Client,
    pub timezone: chrono_tz::Tz,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    /// Default dispatch ordering within a round when the planner doesn't
    /// assign an explicit priority; lower runs earlier.
    fn default_priority(&self) -> i32 {
        0
    }
    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolExecutionResult;
}

#[derive(Debug, Clone)]
pub struct ToolDecl {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub priority: i32,
}

pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    gating: HashMap<String, ToolGatingConfig>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>, gating: HashMap<String, ToolGatingConfig>) -> Self {
        Self { tools, gating }
    }

    fn gating_for(&self, name: &str) -> ToolGatingConfig {
        self.gating.get(name).cloned().unwrap_or(ToolGatingConfig {
            enabled: true,
            priority: 0,
        })
    }

    /// `List(enabled_only) → [ToolDecl]`, sorted by effective priority then name.
    pub fn list(&self, enabled_only: bool) -> Vec<ToolDecl> {
        let mut decls: Vec<ToolDecl> = self
            .tools
            .iter()
            .filter_map(|t| {
                let gating = self.gating_for(t.name());
                if enabled_only && !gating.enabled {
                    return None;
                }
                let priority = if gating.priority != 0 {
                    gating.priority
                } else {
                    t.default_priority()
                };
                Some(ToolDecl {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    enabled: gating.enabled,
                    priority,
                })
            })
            .collect();
        decls.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        decls
    }

    /// `Bind(llm_gateway) → Gateway'` in spec terms: here, the tool
    /// definitions advertised to the model for the roles that accept tools.
    pub fn to_definitions(&self, enabled_only: bool) -> Vec<ToolDefinition> {
        self.list(enabled_only)
            .into_iter()
            .filter_map(|decl| {
                self.tools.iter().find(|t| t.name() == decl.name).map(|t| ToolDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    input_schema: t.input_schema(),
                })
            })
            .collect()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.gating_for(name).enabled
    }

    /// `Dispatch(call, ctx) → result`. Any thrown failure or timeout is
    /// wrapped into `success=false` with a categorized `error_kind` rather
    /// than propagated — callers (the Execute node) never see a bare error.
    pub async fn dispatch(
        &self,
        call: ToolCall,
        ctx: &ToolContext,
        per_call_timeout: Duration,
    ) -> ToolExecutionResult {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            return ToolExecutionResult::failed(
                call.task_id.clone(),
                call.name.clone(),
                ErrorKind::ToolFailure,
                format!("unknown tool: {}", call.name),
            );
        };

        debug!(tool = %call.name, task_id = %call.task_id, "dispatching tool call");

        match tokio::time::timeout(per_call_timeout, tool.execute(&call, ctx)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %call.name, task_id = %call.task_id, "tool call timed out");
                ToolExecutionResult::failed(
                    call.task_id,
                    call.name,
                    ErrorKind::TransientNetwork,
                    "tool call timed out",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysOkTool;

    #[async_trait]
    impl Tool for AlwaysOkTool {
        fn name(&self) -> &str {
            "always_ok"
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> ToolExecutionResult {
            ToolExecutionResult::ok(call.task_id.clone(), "always_ok", ToolContent::Text("done".into()))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps forever"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> ToolExecutionResult {
            tokio::time::sleep(Duration::from_secs(10)).await;
            ToolExecutionResult::ok(call.task_id.clone(), "slow", ToolContent::Text("late".into()))
        }
    }

    fn test_ctx() -> ToolContext {
        ToolContext {
            http: reqwest::Client::new(),
            timezone: chrono_tz::UTC,
        }
    }

    fn call(name: &str) -> ToolCall {
        ToolCall {
            task_id: "t1".into(),
            name: name.into(),
            arguments: serde_json::json!({}),
            priority: 0,
        }
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_is_tool_failure() {
        let registry = ToolRegistry::new(vec![], HashMap::new());
        let result = registry.dispatch(call("nope"), &test_ctx(), Duration::from_secs(1)).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::ToolFailure));
    }

    #[tokio::test]
    async fn dispatch_times_out_slow_tools() {
        let registry = ToolRegistry::new(vec![Arc::new(SlowTool)], HashMap::new());
        let result = registry
            .dispatch(call("slow"), &test_ctx(), Duration::from_millis(20))
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::TransientNetwork));
    }

    #[tokio::test]
    async fn dispatch_returns_successful_result() {
        let registry = ToolRegistry::new(vec![Arc::new(AlwaysOkTool)], HashMap::new());
        let result = registry.dispatch(call("always_ok"), &test_ctx(), Duration::from_secs(1)).await;
        assert!(result.success);
    }

    #[test]
    fn list_respects_enabled_only_and_priority_ordering() {
        let mut gating = HashMap::new();
        gating.insert(
            "always_ok".to_string(),
            ToolGatingConfig {
                enabled: false,
                priority: 5,
            },
        );
        let registry = ToolRegistry::new(vec![Arc::new(AlwaysOkTool)], gating);
        assert!(registry.list(true).is_empty());
        assert_eq!(registry.list(false).len(), 1);
    }
}
