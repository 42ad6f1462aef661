//! Execute node (`execute_tools_node`, §4.5). Runs only when
//! `plan.needs_tools`; dispatches every call in the plan concurrently.

use std::time::Duration;

use conductor_core::types::{ProgressEvent, ProgressStage, ToolExecutionResult};
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::context::GraphContext;
use crate::error::{GraphError, Result};
use crate::state::GraphState;

/// Floor under which a per-call timeout is never divided further, so a
/// large round doesn't starve every call to near-zero.
const MIN_CALL_TIMEOUT_SECS: u64 = 3;

pub async fn run(state: &mut GraphState, ctx: &GraphContext, cancel: &CancellationToken) -> Result<()> {
    let plan = state.plan.clone().unwrap_or_default();
    let calls = plan.tool_calls;

    let per_call_timeout = {
        let divided = ctx.behavior.timeout_per_round_secs / (calls.len().max(1) as u64);
        Duration::from_secs(divided.max(MIN_CALL_TIMEOUT_SECS))
    };

    ctx.bus.publish_progress(
        ProgressEvent::new(ProgressStage::ToolStatus, status_line(&calls, &[])).with_pct(35),
    );

    let dispatches = calls.iter().cloned().map(|call| {
        let registry = ctx.tools.clone();
        let tool_ctx = ctx.tool_ctx.clone();
        async move { registry.dispatch(call, &tool_ctx, per_call_timeout).await }
    });

    // `dispatch` itself has no cancel hook, so the in-flight round is raced
    // against the token here: on cancel the round's futures are dropped
    // (their underlying HTTP calls abort on drop) and nothing is recorded.
    let results: Vec<ToolExecutionResult> = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            ctx.bus.publish_error(conductor_core::ErrorKind::Cancelled, "cancelled".to_string());
            return Err(GraphError::Cancelled);
        }
        results = join_all(dispatches) => results,
    };

    ctx.bus.publish_progress(
        ProgressEvent::new(ProgressStage::ToolStatus, status_line(&calls, &results)).with_pct(45),
    );

    state.round_all_failed = !results.is_empty() && results.iter().all(|r| !r.success);

    for result in &results {
        if result.success {
            for source in &result.sources {
                if !state.sources.iter().any(|s| s.url == source.url) {
                    state.sources.push(source.clone());
                }
            }
        }
        if let Some(side_effect) = &result.side_effect {
            state.pending_reminders.push(side_effect.clone());
        }
    }

    merge_aggregated(state, &results);
    state.tool_results = results;
    state.tool_round += 1;

    Ok(())
}

/// Merge this round's results into `aggregated_tool_results`: priority asc
/// then insertion order, de-duplicated by exact textual equality of the
/// normalized content (first-seen wins).
fn merge_aggregated(state: &mut GraphState, results: &[ToolExecutionResult]) {
    for result in results {
        let text = result.content.as_text();
        if state.aggregated_tool_results.iter().any(|r| r.content.as_text() == text) {
            continue;
        }
        state.aggregated_tool_results.push(result.clone());
    }
    state
        .aggregated_tool_results
        .sort_by_key(|r| state_priority_of(state, r));
}

/// Looks up the originating call's priority for a result that's already
/// been stripped of it; falls back to insertion order (0) when the call is
/// no longer in scope (e.g. after a prior round).
fn state_priority_of(state: &GraphState, result: &ToolExecutionResult) -> i32 {
    state
        .plan
        .as_ref()
        .and_then(|p| p.tool_calls.iter().find(|c| c.task_id == result.task_id))
        .map(|c| c.priority)
        .unwrap_or(0)
}

/// One symbol per call: `✓` success, `✗` failure. Shown before dispatch
/// (all pending, `·`) and after completion.
fn status_line(calls: &[conductor_core::types::ToolCall], results: &[ToolExecutionResult]) -> String {
    if results.is_empty() {
        return "·".repeat(calls.len());
    }
    results
        .iter()
        .map(|r| if r.success { '✓' } else { '✗' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::types::{Source, ToolContent};

    fn ok_result(task_id: &str, text: &str) -> ToolExecutionResult {
        let mut r = ToolExecutionResult::ok(task_id, "web_search", ToolContent::Text(text.into()));
        r.sources.push(Source {
            title: "t".into(),
            url: format!("https://example.com/{task_id}"),
            snippet: "s".into(),
        });
        r
    }

    #[test]
    fn status_line_shows_pending_symbols_before_dispatch() {
        let calls = vec![
            conductor_core::types::ToolCall {
                task_id: "1".into(),
                name: "a".into(),
                arguments: serde_json::json!({}),
                priority: 0,
            },
            conductor_core::types::ToolCall {
                task_id: "2".into(),
                name: "b".into(),
                arguments: serde_json::json!({}),
                priority: 0,
            },
        ];
        assert_eq!(status_line(&calls, &[]), "··");
    }

    #[test]
    fn merge_aggregated_dedupes_by_exact_text() {
        let mut state = GraphState::new(vec![], String::new());
        let results = vec![ok_result("1", "same"), ok_result("2", "same"), ok_result("3", "different")];
        merge_aggregated(&mut state, &results);
        assert_eq!(state.aggregated_tool_results.len(), 2);
    }
}
