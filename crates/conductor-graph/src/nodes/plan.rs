//! Plan node (`generate_query_or_plan`, §4.5).

use conductor_core::types::{AgentPlan, ProgressEvent, ProgressStage, ToolCall};
use conductor_llm::provider::Role as MessageRole;
use conductor_llm::{Message, Role, RoleRequest};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::context::GraphContext;
use crate::error::Result;
use crate::persona;
use crate::state::GraphState;

const PLANNER_SYSTEM_PROMPT: &str = "You are the planning stage of a conversational assistant. \
Decide whether answering the user requires calling any of the bound tools. If not, reply with \
plain text; the reply is discarded. If tools are needed, call them.";

pub async fn run(state: &mut GraphState, ctx: &GraphContext, cancel: &CancellationToken) -> Result<()> {
    if state.current_persona.is_none() {
        state.current_persona = persona::select_persona(&ctx.persona, &ctx.available_personas);
    }

    ctx.bus
        .publish_progress(ProgressEvent::new(ProgressStage::GenerateQuery, "").with_pct(20));

    if ctx.behavior.max_tool_rounds == 0 {
        state.plan = Some(AgentPlan {
            needs_tools: false,
            ..Default::default()
        });
        return Ok(());
    }

    let mut pre_detected = Vec::new();
    if ctx.tools.is_enabled("video_summary") {
        if let Some(id) = conductor_tools::extract_canonical_id(&state.latest_user_text()) {
            pre_detected.push(ToolCall {
                task_id: uuid::Uuid::now_v7().to_string(),
                name: "video_summary".to_string(),
                arguments: serde_json::json!({ "video_id": id }),
                priority: 0,
            });
        }
    }

    let req = RoleRequest {
        system: PLANNER_SYSTEM_PROMPT.to_string(),
        messages: vec![Message {
            role: MessageRole::User,
            content: state.research_topic.clone(),
        }],
        raw_messages: None,
        tools: ctx.tools.to_definitions(true),
    };

    let response = match ctx.llm.call(Role::Planner, req, cancel).await {
        Ok(resp) => resp,
        Err(conductor_llm::LlmError::Cancelled) => return Err(crate::error::GraphError::Cancelled),
        Err(e) => {
            // §7: an unparseable/failed planner call degrades to "no tools
            // needed" rather than aborting the invocation.
            warn!(error = %e, "planner call failed, proceeding without tools");
            state.plan = Some(AgentPlan {
                needs_tools: !pre_detected.is_empty(),
                tool_calls: pre_detected,
                reasoning: String::new(),
            });
            return Ok(());
        }
    };

    let llm_calls: Vec<ToolCall> = response
        .tool_calls
        .into_iter()
        .map(|c| ToolCall {
            task_id: c.id,
            name: c.name,
            arguments: c.input,
            priority: 0,
        })
        .collect();

    let mut combined = pre_detected;
    combined.extend(llm_calls);

    state.plan = Some(if combined.is_empty() {
        AgentPlan {
            needs_tools: false,
            ..Default::default()
        }
    } else {
        AgentPlan {
            needs_tools: true,
            tool_calls: combined,
            reasoning: response.content,
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_detected_tool_call_has_video_summary_name() {
        let call = ToolCall {
            task_id: "t1".into(),
            name: "video_summary".into(),
            arguments: serde_json::json!({ "video_id": "abc" }),
            priority: 0,
        };
        assert_eq!(call.name, "video_summary");
    }
}
