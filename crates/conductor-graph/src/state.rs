//! Graph state (§3): the per-invocation record threaded through
//! Plan → Execute → Reflect → Finalize.

use conductor_core::types::{AgentPlan, ReminderDetails, Source, ToolExecutionResult};
use conductor_core::conversation::Message;

/// Upper bound on `research_topic`, in code points (§3).
const RESEARCH_TOPIC_MAX_CHARS: usize = 200;

/// Born at request admission, discarded at invocation end. Every field here
/// is scoped to one Plan→Execute→Reflect→Finalize run; nothing survives
/// across invocations except what C10 persists via the scheduler.
pub struct GraphState {
    pub messages: Vec<Message>,
    pub tool_round: u32,
    pub plan: Option<AgentPlan>,
    pub research_topic: String,
    pub tool_results: Vec<ToolExecutionResult>,
    pub aggregated_tool_results: Vec<ToolExecutionResult>,
    pub is_sufficient: bool,
    pub reflection_reasoning: String,
    pub final_answer: String,
    pub sources: Vec<Source>,
    pub finished: bool,
    pub current_persona: Option<String>,
    pub global_metadata: String,
    /// Set by Execute when every call in a round failed; Reflect reads this
    /// to force `is_sufficient = false` unconditionally for that round.
    pub round_all_failed: bool,
    /// Reminder side effects collected across rounds, handed to C10 once the
    /// invocation finishes. The graph never schedules anything itself.
    pub pending_reminders: Vec<ReminderDetails>,
}

impl GraphState {
    pub fn new(messages: Vec<Message>, global_metadata: String) -> Self {
        let research_topic = latest_user_text(&messages)
            .chars()
            .take(RESEARCH_TOPIC_MAX_CHARS)
            .collect();
        Self {
            messages,
            tool_round: 0,
            plan: None,
            research_topic,
            tool_results: Vec::new(),
            aggregated_tool_results: Vec::new(),
            is_sufficient: false,
            reflection_reasoning: String::new(),
            final_answer: String::new(),
            sources: Vec::new(),
            finished: false,
            current_persona: None,
            global_metadata,
            round_all_failed: false,
            pending_reminders: Vec::new(),
        }
    }

    /// Text of the most recent user message, used both to seed
    /// `research_topic` and for the Plan node's pre-detection hook.
    pub fn latest_user_text(&self) -> String {
        latest_user_text(&self.messages)
    }
}

fn latest_user_text(messages: &[Message]) -> String {
    use conductor_core::conversation::{Content, ContentPart, Role};
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| match &m.content {
            Content::Text(s) => s.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::conversation::{Content, MessageMetadata, Role};

    fn user_msg(text: &str) -> Message {
        Message {
            role: Role::User,
            content: Content::Text(text.to_string()),
            metadata: MessageMetadata::default(),
        }
    }

    #[test]
    fn research_topic_truncates_to_200_code_points() {
        let long = "x".repeat(500);
        let state = GraphState::new(vec![user_msg(&long)], String::new());
        assert_eq!(state.research_topic.chars().count(), 200);
    }

    #[test]
    fn latest_user_text_skips_trailing_assistant_message() {
        let messages = vec![
            user_msg("what's the weather"),
            Message {
                role: Role::Assistant,
                content: Content::Text("sunny".into()),
                metadata: MessageMetadata::default(),
            },
        ];
        let state = GraphState::new(messages, String::new());
        assert_eq!(state.latest_user_text(), "what's the weather");
    }
}
