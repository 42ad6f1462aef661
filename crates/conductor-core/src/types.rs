//! Shared domain records that cross crate boundaries: tool calls and their
//! results, reminder side-effects, progress events, and streaming chunks.
//! These live in `conductor-core` (rather than, say, `conductor-graph` or
//! `conductor-tools`) because both of those crates — plus `conductor-bus`
//! and `conductor-scheduler` — need to name them without depending on each
//! other.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// One source harvested from a tool result, surfaced in `OnCompletion`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// A structured decision by the planner to invoke a named tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub task_id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub priority: i32,
}

/// The body of a tool's output: either free text or a structured value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolContent {
    Text(String),
    Structured(serde_json::Value),
}

impl ToolContent {
    pub fn as_text(&self) -> String {
        match self {
            ToolContent::Text(s) => s.clone(),
            ToolContent::Structured(v) => v.to_string(),
        }
    }
}

/// A reminder the reminder-setter tool wants scheduled. The tool itself
/// never touches the scheduler — it only produces this value; C10 hands it
/// to C6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderDetails {
    pub content: String,
    pub fire_at: DateTime<Utc>,
    pub channel_ref: String,
    pub user_ref: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of dispatching one `ToolCall`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub task_id: String,
    pub tool_name: String,
    pub success: bool,
    pub content: ToolContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effect: Option<ReminderDetails>,
}

impl ToolExecutionResult {
    pub fn ok(task_id: impl Into<String>, tool_name: impl Into<String>, content: ToolContent) -> Self {
        Self {
            task_id: task_id.into(),
            tool_name: tool_name.into(),
            success: true,
            content,
            error_kind: None,
            sources: Vec::new(),
            side_effect: None,
        }
    }

    pub fn failed(
        task_id: impl Into<String>,
        tool_name: impl Into<String>,
        error_kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            tool_name: tool_name.into(),
            success: false,
            content: ToolContent::Text(message.into()),
            error_kind: Some(error_kind),
            sources: Vec::new(),
            side_effect: None,
        }
    }
}

/// The planner's structured decision for one round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentPlan {
    pub needs_tools: bool,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub reasoning: String,
}

/// Closed set of progress-bus stages (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Starting,
    GenerateQuery,
    ToolStatus,
    Searching,
    Analyzing,
    Reflection,
    FinalizeAnswer,
    Streaming,
    Completed,
    Error,
    Timeout,
    ToolExecution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<i64>,
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

impl ProgressEvent {
    pub fn new(stage: ProgressStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            progress_pct: None,
            eta_seconds: None,
            meta: HashMap::new(),
        }
    }

    pub fn with_pct(mut self, pct: u8) -> Self {
        self.progress_pct = Some(pct);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingChunk {
    pub content: String,
    pub is_final: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_execution_result_ok_has_no_error_kind() {
        let r = ToolExecutionResult::ok("t1", "web_search", ToolContent::Text("hi".into()));
        assert!(r.success);
        assert!(r.error_kind.is_none());
    }

    #[test]
    fn tool_execution_result_failed_carries_kind() {
        let r = ToolExecutionResult::failed("t1", "web_search", ErrorKind::ToolFailure, "boom");
        assert!(!r.success);
        assert_eq!(r.error_kind, Some(ErrorKind::ToolFailure));
    }

    #[test]
    fn progress_event_builder_sets_pct() {
        let e = ProgressEvent::new(ProgressStage::GenerateQuery, "thinking").with_pct(20);
        assert_eq!(e.progress_pct, Some(20));
    }
}
