//! The orchestrator graph (C5): the Plan → Execute → Reflect → Finalize
//! loop that turns one collected conversation window into a final answer,
//! streaming chunks, and reminder side effects. Everything here is
//! transport-agnostic — C10 builds a `GraphContext`/`GraphState` pair per
//! invocation and awaits `run`.

mod context;
mod error;
mod graph;
mod nodes;
mod persona;
mod state;

pub use context::GraphContext;
pub use error::{GraphError, Result};
pub use graph::{run, starting_event};
pub use state::GraphState;
