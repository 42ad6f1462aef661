//! Reflect node (`reflection`, §4.5).

use conductor_core::types::ProgressEvent;
use conductor_core::types::ProgressStage;
use conductor_llm::provider::Role as MessageRole;
use conductor_llm::{Message, Role, RoleRequest};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::context::GraphContext;
use crate::error::Result;
use crate::state::GraphState;

const REFLECTOR_SYSTEM_PROMPT: &str = "Decide whether the accumulated tool results are sufficient \
to answer the user's original question. Reply with a JSON object: \
{\"is_sufficient\": bool, \"reasoning\": string}.";

#[derive(Deserialize)]
struct ReflectorOutput {
    is_sufficient: bool,
    #[serde(default)]
    reasoning: String,
}

/// Whether Reflect should run at all for this round (§4.5: skipped when
/// reflection is disabled, or once the round budget is exhausted).
pub fn should_run(state: &GraphState, ctx: &GraphContext) -> bool {
    ctx.behavior.enable_reflection && state.tool_round < ctx.behavior.max_tool_rounds
}

pub async fn run(state: &mut GraphState, ctx: &GraphContext, cancel: &CancellationToken) -> Result<()> {
    ctx.bus
        .publish_progress(ProgressEvent::new(ProgressStage::Reflection, "").with_pct(60));

    if state.round_all_failed {
        state.is_sufficient = false;
        state.reflection_reasoning = "all tool calls in this round failed".to_string();
        return Ok(());
    }

    let summary: Vec<String> = state
        .aggregated_tool_results
        .iter()
        .map(|r| format!("[{}] {}", r.tool_name, r.content.as_text()))
        .collect();

    let req = RoleRequest {
        system: REFLECTOR_SYSTEM_PROMPT.to_string(),
        messages: vec![Message {
            role: MessageRole::User,
            content: format!(
                "Original question: {}\nAccumulated results:\n{}",
                state.research_topic,
                summary.join("\n")
            ),
        }],
        raw_messages: None,
        tools: vec![],
    };

    match ctx.llm.call(Role::Reflector, req, cancel).await {
        Ok(resp) => match serde_json::from_str::<ReflectorOutput>(resp.content.trim()) {
            Ok(parsed) => {
                state.is_sufficient = parsed.is_sufficient;
                state.reflection_reasoning = parsed.reasoning;
            }
            Err(e) => {
                warn!(error = %e, raw = %resp.content, "reflector returned unparseable output, assuming sufficient");
                state.is_sufficient = true;
                state.reflection_reasoning = String::new();
            }
        },
        Err(conductor_llm::LlmError::Cancelled) => return Err(crate::error::GraphError::Cancelled),
        Err(e) => {
            warn!(error = %e, "reflector call failed, assuming sufficient");
            state.is_sufficient = true;
            state.reflection_reasoning = String::new();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::config::AgentBehaviorConfig;

    #[test]
    fn reflector_output_parses_expected_shape() {
        let parsed: ReflectorOutput = serde_json::from_str(r#"{"is_sufficient": true, "reasoning": "ok"}"#).unwrap();
        assert!(parsed.is_sufficient);
    }

    #[test]
    fn should_run_is_false_once_round_budget_exhausted() {
        let behavior = AgentBehaviorConfig {
            max_tool_rounds: 1,
            timeout_per_round_secs: 30,
            enable_reflection: true,
        };
        let mut state = GraphState::new(vec![], String::new());
        state.tool_round = 1;
        assert!(!should_run_standalone(&state, &behavior));
    }

    fn should_run_standalone(state: &GraphState, behavior: &AgentBehaviorConfig) -> bool {
        behavior.enable_reflection && state.tool_round < behavior.max_tool_rounds
    }
}
