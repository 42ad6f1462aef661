//! The orchestrator graph driver (C5): routes between Plan → Execute →
//! Reflect → Finalize per §4.5's routing table, honoring cancellation at
//! every node boundary.

use conductor_core::types::ProgressEvent;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::context::GraphContext;
use crate::error::{GraphError, Result};
use crate::nodes::{execute, finalize, plan, reflect};
use crate::state::GraphState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Plan,
    Execute,
    Reflect,
    Finalize,
}

/// Run the full graph to completion for one invocation. Returns once
/// `state.finished` is set — either by Finalize on success, or by a
/// cancellation/unrecoverable error, in which case the bus has already
/// received the single `OnError` and `final_answer` is left empty.
pub async fn run(state: &mut GraphState, ctx: &GraphContext, cancel: &CancellationToken) -> Result<()> {
    let mut node = Node::Plan;

    loop {
        if cancel.is_cancelled() {
            ctx.bus
                .publish_error(conductor_core::ErrorKind::Cancelled, "cancelled".to_string());
            state.finished = true;
            return Err(GraphError::Cancelled);
        }

        info!(?node, tool_round = state.tool_round, "graph node transition");

        node = match node {
            Node::Plan => {
                plan::run(state, ctx, cancel).await?;
                let needs_tools = state.plan.as_ref().is_some_and(|p| p.needs_tools);
                if needs_tools {
                    Node::Execute
                } else {
                    Node::Finalize
                }
            }
            Node::Execute => {
                execute::run(state, ctx, cancel).await?;
                Node::Reflect
            }
            Node::Reflect => {
                if reflect::should_run(state, ctx) {
                    reflect::run(state, ctx, cancel).await?;
                } else {
                    state.is_sufficient = true;
                    state.reflection_reasoning = String::new();
                }
                if state.is_sufficient || state.tool_round >= ctx.behavior.max_tool_rounds {
                    Node::Finalize
                } else {
                    Node::Plan
                }
            }
            Node::Finalize => {
                finalize::run(state, ctx, cancel).await?;
                debug_assert!(state.finished, "Finalize must set finished=true");
                return Ok(());
            }
        };
    }
}

/// Convenience for callers that only want the starting stage event without
/// running the full loop (used by C10 before handing off to `run`).
pub fn starting_event() -> ProgressEvent {
    ProgressEvent::new(conductor_core::types::ProgressStage::Starting, "").with_pct(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ordering_matches_spec_routing_table() {
        // Plan -> Execute -> Reflect -> (Plan | Finalize); Finalize terminal.
        assert_ne!(Node::Plan, Node::Finalize);
        assert_ne!(Node::Execute, Node::Reflect);
    }
}
