//! Auto-generated progress blurbs (§4.4): when a stage's `ProgressEvent`
//! arrives with an empty `message`, the bus asks the `progress_blurb` LLM
//! role for a short phrase instead of showing nothing. Failures fall back
//! to a static per-stage template so a flaky model never blanks a user's
//! progress indicator.

use std::collections::HashMap;
use std::sync::Arc;

use conductor_core::types::ProgressStage;
use conductor_llm::provider::Role as MessageRole;
use conductor_llm::{LlmGateway, Message, Role, RoleRequest};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Stages that update too frequently for a per-event LLM call to be
/// worthwhile; these always use the static template regardless of config.
const HIGH_FREQUENCY_STAGES: &[ProgressStage] = &[ProgressStage::ToolStatus, ProgressStage::Streaming];

const MAX_BLURB_CHARS: usize = 16;

pub struct BlurbGenerator {
    gateway: Arc<LlmGateway>,
    enabled: bool,
    templates: HashMap<String, String>,
}

impl BlurbGenerator {
    pub fn new(gateway: Arc<LlmGateway>, enabled: bool, templates: HashMap<String, String>) -> Self {
        Self {
            gateway,
            enabled,
            templates,
        }
    }

    fn static_template(&self, stage: ProgressStage) -> String {
        let key = stage_key(stage);
        self.templates
            .get(key)
            .cloned()
            .unwrap_or_else(|| default_template(stage).to_string())
    }

    pub fn is_high_frequency(stage: ProgressStage) -> bool {
        HIGH_FREQUENCY_STAGES.contains(&stage)
    }

    /// Resolve the message to show for `stage`, given the recent
    /// conversation context. Never fails — any LLM error degrades silently
    /// to the static template.
    pub async fn resolve(&self, stage: ProgressStage, recent_context: &str) -> String {
        if !self.enabled || Self::is_high_frequency(stage) {
            return self.static_template(stage);
        }

        let instruction = format!(
            "In at most {MAX_BLURB_CHARS} characters, write a short, casual status phrase for the \
             assistant's current activity: {}. Context: {}",
            stage_instruction(stage),
            recent_context
        );

        let req = RoleRequest {
            system: "You write extremely short status updates. Reply with only the phrase, \
                     no punctuation beyond what's natural, no quotes."
                .to_string(),
            messages: vec![Message {
                role: MessageRole::User,
                content: instruction,
            }],
            raw_messages: None,
            tools: vec![],
        };

        let cancel = CancellationToken::new();
        match self.gateway.call(Role::ProgressBlurb, req, &cancel).await {
            Ok(resp) => truncate_to_code_points(resp.content.trim(), MAX_BLURB_CHARS),
            Err(e) => {
                warn!(error = %e, "progress blurb generation failed, using static template");
                self.static_template(stage)
            }
        }
    }
}

fn truncate_to_code_points(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{truncated}…")
}

fn stage_key(stage: ProgressStage) -> &'static str {
    match stage {
        ProgressStage::Starting => "starting",
        ProgressStage::GenerateQuery => "generate_query",
        ProgressStage::ToolStatus => "tool_status",
        ProgressStage::Searching => "searching",
        ProgressStage::Analyzing => "analyzing",
        ProgressStage::Reflection => "reflection",
        ProgressStage::FinalizeAnswer => "finalize_answer",
        ProgressStage::Streaming => "streaming",
        ProgressStage::Completed => "completed",
        ProgressStage::Error => "error",
        ProgressStage::Timeout => "timeout",
        ProgressStage::ToolExecution => "tool_execution",
    }
}

fn stage_instruction(stage: ProgressStage) -> &'static str {
    match stage {
        ProgressStage::Starting => "getting started",
        ProgressStage::GenerateQuery => "figuring out what to do",
        ProgressStage::ToolStatus => "running tools",
        ProgressStage::Searching => "searching for information",
        ProgressStage::Analyzing => "analyzing results",
        ProgressStage::Reflection => "double-checking the answer",
        ProgressStage::FinalizeAnswer => "writing the answer",
        ProgressStage::Streaming => "writing the answer",
        ProgressStage::Completed => "done",
        ProgressStage::Error => "something went wrong",
        ProgressStage::Timeout => "taking longer than expected",
        ProgressStage::ToolExecution => "running tools",
    }
}

fn default_template(stage: ProgressStage) -> &'static str {
    match stage {
        ProgressStage::Starting => "Starting…",
        ProgressStage::GenerateQuery => "Thinking…",
        ProgressStage::ToolStatus => "Running tools…",
        ProgressStage::Searching => "Searching…",
        ProgressStage::Analyzing => "Analyzing…",
        ProgressStage::Reflection => "Checking…",
        ProgressStage::FinalizeAnswer => "Writing…",
        ProgressStage::Streaming => "Writing…",
        ProgressStage::Completed => "Done",
        ProgressStage::Error => "Error",
        ProgressStage::Timeout => "Still working…",
        ProgressStage::ToolExecution => "Running tools…",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_code_points_with_ellipsis() {
        let truncated = truncate_to_code_points("this is way too long for a blurb", 16);
        assert_eq!(truncated.chars().count(), 16);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn short_strings_pass_through() {
        assert_eq!(truncate_to_code_points("short", 16), "short");
    }

    #[test]
    fn tool_status_and_streaming_are_high_frequency() {
        assert!(BlurbGenerator::is_high_frequency(ProgressStage::ToolStatus));
        assert!(BlurbGenerator::is_high_frequency(ProgressStage::Streaming));
        assert!(!BlurbGenerator::is_high_frequency(ProgressStage::Searching));
    }
}
