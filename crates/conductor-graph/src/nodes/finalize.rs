//! Finalize node (`finalize_answer`, §4.5). Terminal: always ends the
//! invocation, streaming or whole.

use conductor_core::types::{ProgressEvent, ProgressStage, StreamingChunk};
use conductor_llm::provider::Role as MessageRole;
use conductor_llm::{Message, Role, RoleRequest, StreamEvent};
use conductor_media::StreamRepairer;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::context::GraphContext;
use crate::error::Result;
use crate::state::GraphState;

/// Crude proxy for "how long will the final answer be": a chit-chat turn
/// with no tool results tends to produce a short reply; a research turn
/// with accumulated results tends to produce a long one. This is a
/// deliberately simple heuristic — the spec only requires *some* estimate
/// to compare against `min_content_length`.
fn projected_content_chars(state: &GraphState) -> usize {
    if state.aggregated_tool_results.is_empty() {
        state.research_topic.chars().count() * 2
    } else {
        state.aggregated_tool_results.iter().map(|r| r.content.as_text().chars().count()).sum()
    }
}

fn build_final_prompt(state: &GraphState, ctx: &GraphContext) -> (String, String) {
    let mut system = String::from("You are a helpful conversational assistant.");
    if let Some(persona) = &state.current_persona {
        system.push_str(&format!(" Persona: {persona}."));
    }
    let emoji_context = ctx.emoji_registry.prompt_context(ctx.guild_id.as_deref());
    if !emoji_context.is_empty() {
        system.push_str("\n\n");
        system.push_str(&emoji_context);
    }
    if !state.global_metadata.is_empty() {
        system.push_str(&format!("\n\nContext: {}", state.global_metadata));
    }

    let mut user = state.research_topic.clone();
    if !state.aggregated_tool_results.is_empty() {
        user.push_str("\n\nTool results:\n");
        for result in &state.aggregated_tool_results {
            user.push_str(&format!("- [{}] {}\n", result.tool_name, result.content.as_text()));
        }
    }
    (system, user)
}

pub async fn run(state: &mut GraphState, ctx: &GraphContext, cancel: &CancellationToken) -> Result<()> {
    ctx.bus
        .publish_progress(ProgressEvent::new(ProgressStage::FinalizeAnswer, "").with_pct(80));

    let (system, user) = build_final_prompt(state, ctx);
    let req = RoleRequest {
        system,
        messages: vec![Message {
            role: MessageRole::User,
            content: user,
        }],
        raw_messages: None,
        tools: vec![],
    };

    let should_stream = ctx.streaming.enabled
        && ctx.bus.observer_count() > 0
        && projected_content_chars(state) >= ctx.streaming.min_content_length;

    if should_stream {
        run_streaming(state, ctx, req, cancel).await?;
    } else {
        run_whole(state, ctx, req, cancel).await?;
    }

    ctx.bus
        .publish_progress(ProgressEvent::new(ProgressStage::Completed, "").with_pct(100));
    state.finished = true;
    Ok(())
}

async fn run_whole(state: &mut GraphState, ctx: &GraphContext, req: RoleRequest, cancel: &CancellationToken) -> Result<()> {
    match ctx.llm.call(Role::Finalizer, req, cancel).await {
        Ok(resp) => {
            let repaired = conductor_media::repair(&resp.content, &ctx.emoji_registry, ctx.guild_id.as_deref());
            state.final_answer = repaired.clone();
            ctx.bus.publish_completion(repaired, state.sources.clone());
            Ok(())
        }
        Err(conductor_llm::LlmError::Cancelled) => {
            ctx.bus.publish_error(conductor_core::ErrorKind::Cancelled, "cancelled".to_string());
            Err(crate::error::GraphError::Cancelled)
        }
        Err(e) => {
            warn!(error = %e, "finalizer call failed");
            ctx.bus.publish_error(e.kind(), e.to_string());
            Err(crate::error::GraphError::Llm(e))
        }
    }
}

async fn run_streaming(state: &mut GraphState, ctx: &GraphContext, req: RoleRequest, cancel: &CancellationToken) -> Result<()> {
    ctx.bus
        .publish_progress(ProgressEvent::new(ProgressStage::Streaming, "").with_pct(85));

    let (tx, mut rx) = mpsc::channel::<StreamEvent>(32);
    let llm = ctx.llm.clone();
    let cancel_clone = cancel.clone();
    let stream_req = req;
    let call_handle = tokio::spawn(async move { llm.call_stream(Role::Finalizer, stream_req, tx, &cancel_clone).await });

    let mut repairer = StreamRepairer::new();
    let mut repaired_text = String::new();
    let mut stream_failed = false;

    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::TextDelta { text } => {
                let safe = repairer.feed(&text, &ctx.emoji_registry, ctx.guild_id.as_deref());
                if !safe.is_empty() {
                    repaired_text.push_str(&safe);
                    ctx.bus.publish_chunk(StreamingChunk {
                        content: safe,
                        is_final: false,
                    });
                }
            }
            StreamEvent::ToolUse { .. } => {}
            StreamEvent::Done { .. } => {}
            StreamEvent::Error { message } => {
                warn!(message = %message, "finalizer stream errored");
                stream_failed = true;
            }
        }
    }

    let call_result = call_handle.await;

    let leftover = repairer.flush(&ctx.emoji_registry, ctx.guild_id.as_deref());
    repaired_text.push_str(&leftover);
    ctx.bus.publish_chunk(StreamingChunk {
        content: leftover,
        is_final: true,
    });
    ctx.bus.publish_streaming_complete();

    if stream_failed || matches!(call_result, Ok(Err(_))) || call_result.is_err() {
        let message = match call_result {
            Ok(Err(e)) => e.to_string(),
            _ => "streaming call failed".to_string(),
        };
        ctx.bus.publish_error(conductor_core::ErrorKind::ProviderError, message);
        return Err(crate::error::GraphError::Cancelled);
    }

    if cancel.is_cancelled() {
        ctx.bus.publish_error(conductor_core::ErrorKind::Cancelled, "cancelled".to_string());
        return Err(crate::error::GraphError::Cancelled);
    }

    state.final_answer = repaired_text;
    ctx.bus.publish_completion(state.final_answer.clone(), state.sources.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projected_chars_uses_tool_result_length_when_present() {
        let mut state = GraphState::new(vec![], String::new());
        state.aggregated_tool_results.push(conductor_core::types::ToolExecutionResult::ok(
            "t1",
            "web_search",
            conductor_core::types::ToolContent::Text("x".repeat(50)),
        ));
        assert_eq!(projected_content_chars(&state), 50);
    }

    #[test]
    fn projected_chars_falls_back_to_research_topic_when_no_tools_ran() {
        let state = GraphState::new(vec![], String::new());
        assert_eq!(projected_content_chars(&state), state.research_topic.chars().count() * 2);
    }
}
