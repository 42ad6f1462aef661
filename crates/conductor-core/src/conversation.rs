//! Conversation model (C1) — typed message nodes with multimodal parts.
//!
//! `collect` assembles a raw request (current utterance + history window +
//! attachments) into the ordered, de-duplicated, size-bounded message list
//! the orchestrator graph consumes. Everything downstream (graph, LLM
//! gateway, tool registry) only ever sees `Message`, never the transport's
//! native types.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// One part of a (possibly multimodal) message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { mime: String, base64: String },
    ToolResult { task_id: String, content: String },
}

/// Either plain text or an ordered list of multimodal parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Approximate character length used for the size-budget checks below.
    /// Base64 image payloads dominate; text parts are counted by code point.
    pub fn char_len(&self) -> usize {
        match self {
            Content::Text(s) => s.chars().count(),
            Content::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.chars().count(),
                    ContentPart::Image { base64, .. } => base64.len(),
                    ContentPart::ToolResult { content, .. } => content.chars().count(),
                })
                .sum(),
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            Content::Text(_) => 0,
            Content::Parts(parts) => parts
                .iter()
                .filter(|p| matches!(p, ContentPart::Image { .. }))
                .count(),
        }
    }

    fn append_text(&mut self, suffix: &str) {
        match self {
            Content::Text(s) => s.push_str(suffix),
            Content::Parts(parts) => {
                if let Some(ContentPart::Text { text }) =
                    parts.iter_mut().find(|p| matches!(p, ContentPart::Text { .. }))
                {
                    text.push_str(suffix);
                } else {
                    parts.push(ContentPart::Text {
                        text: suffix.to_string(),
                    });
                }
            }
        }
    }
}

/// Metadata carried alongside a message for ordering and de-duplication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Originator-assigned id; used to de-duplicate retransmitted messages.
    pub originator_id: Option<String>,
    /// Wall-clock instant used for ordering. `None` means "use receive order".
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    pub metadata: MessageMetadata,
}

/// One attachment on the current utterance, prior to normalization.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub mime: String,
    pub base64: String,
    /// `true` for animated sources (GIF/animated WebP/video) that must be
    /// sub-sampled to at most `max_animated_frames` frames.
    pub animated: bool,
    /// Pre-extracted frames for an animated attachment, in order. Empty for
    /// static images — the single `base64` field is used directly.
    pub frames: Vec<String>,
}

/// Raw input to `collect`: the current turn plus whatever history and
/// attachments the transport adapter already fetched.
pub struct CollectRequest {
    pub utterance: String,
    pub history: Vec<Message>,
    pub attachments: Vec<Attachment>,
}

/// Size/shape limits enforced by `collect`. Populated from
/// `discord.limits.*` / `discord.input_media.*` in the config surface.
#[derive(Debug, Clone)]
pub struct CollectLimits {
    pub max_text_chars: usize,
    pub max_images: usize,
    pub max_history_messages: usize,
    pub max_animated_frames: usize,
    /// Hard LLM-side ceiling; exceeding this after truncation is a hard
    /// failure rather than further truncation.
    pub hard_limit_chars: usize,
}

impl Default for CollectLimits {
    fn default() -> Self {
        Self {
            max_text_chars: 24_000,
            max_images: 8,
            max_history_messages: 40,
            max_animated_frames: 4,
            hard_limit_chars: 200_000,
        }
    }
}

pub struct CollectSummary {
    pub images_included: usize,
    pub animations_included: usize,
    pub history_dropped: usize,
}

/// Assemble a transport request into the ordered message list the graph
/// consumes, plus a summary of what was dropped/included for logging.
///
/// Steps (§4.1):
/// 1. De-duplicate by `originator_id`, stable-sort by timestamp ascending
///    (missing timestamps get a monotonically increasing synthetic one in
///    receive order, so ties break by arrival order).
/// 2. Normalize attachments to `ContentPart::Image`, sub-sampling animated
///    sources to `max_animated_frames`.
/// 3. Enforce history count / text / image budgets, dropping oldest-first.
/// 4. Append a human-visible media marker to the final user message.
pub fn collect(req: CollectRequest, limits: &CollectLimits) -> Result<(Vec<Message>, CollectSummary)> {
    let mut messages = stamp_and_dedupe(req.history);
    messages.sort_by_key(|m| m.metadata.timestamp.unwrap());

    // Drop oldest-first down to the configured history window.
    let history_dropped = messages.len().saturating_sub(limits.max_history_messages);
    if history_dropped > 0 {
        messages.drain(0..history_dropped);
    }

    // Normalize attachments, sub-sampling animated ones.
    let mut images_included = 0usize;
    let mut static_images_included = 0usize;
    let mut animations_included = 0usize;
    let mut parts: Vec<ContentPart> = vec![ContentPart::Text {
        text: req.utterance.clone(),
    }];

    for att in &req.attachments {
        if images_included >= limits.max_images {
            break;
        }
        if att.animated {
            animations_included += 1;
            let take = limits.max_animated_frames.min(att.frames.len());
            for frame in att.frames.iter().take(take) {
                if images_included >= limits.max_images {
                    break;
                }
                parts.push(ContentPart::Image {
                    mime: att.mime.clone(),
                    base64: frame.clone(),
                });
                images_included += 1;
            }
        } else {
            parts.push(ContentPart::Image {
                mime: att.mime.clone(),
                base64: att.base64.clone(),
            });
            images_included += 1;
            static_images_included += 1;
        }
    }

    let mut current = Message {
        role: Role::User,
        content: Content::Parts(parts),
        metadata: MessageMetadata {
            originator_id: None,
            timestamp: Some(chrono::Utc::now()),
        },
    };

    if images_included > 0 || animations_included > 0 {
        let marker = render_media_marker(static_images_included, animations_included);
        current.content.append_text(&format!(" {marker}"));
    }

    // Soft text budget: drop history oldest-first until the total fits, the
    // current message never counts against itself as droppable. This is
    // distinct from the hard ceiling below — it's expected to trigger in
    // normal long-running conversations, not just pathological input.
    let current_chars = current.content.char_len();
    let mut history_text_dropped = 0usize;
    while !messages.is_empty() {
        let total: usize = messages.iter().map(|m| m.content.char_len()).sum::<usize>() + current_chars;
        if total <= limits.max_text_chars {
            break;
        }
        messages.remove(0);
        history_text_dropped += 1;
    }

    // Hard ceiling: if the current message alone (or what's left after the
    // soft drop above) still exceeds it, no further truncation can help —
    // reject instead of silently chopping the user's own message.
    let total_text_chars: usize = messages.iter().map(|m| m.content.char_len()).sum::<usize>() + current_chars;
    if total_text_chars > limits.hard_limit_chars {
        return Err(CoreError::InputTooLarge {
            actual: total_text_chars,
            limit: limits.hard_limit_chars,
        });
    }

    messages.push(current);

    Ok((
        messages,
        CollectSummary {
            images_included,
            animations_included,
            history_dropped: history_dropped + history_text_dropped,
        },
    ))
}

/// De-duplicate by originator id (first occurrence wins) and assign a
/// synthetic monotonic timestamp to any message missing one, preserving
/// receive order as the tiebreak.
fn stamp_and_dedupe(history: Vec<Message>) -> Vec<Message> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(history.len());
    let base = chrono::Utc::now();
    for (idx, mut msg) in history.into_iter().enumerate() {
        if let Some(ref id) = msg.metadata.originator_id {
            if !seen.insert(id.clone()) {
                continue;
            }
        }
        if msg.metadata.timestamp.is_none() {
            msg.metadata.timestamp = Some(base + chrono::Duration::milliseconds(idx as i64));
        }
        out.push(msg);
    }
    out
}

/// Render the trailing human-visible media marker, e.g. `[包含: 2圖片, 1動畫]`.
fn render_media_marker(static_images: usize, animations: usize) -> String {
    let mut parts = Vec::new();
    if static_images > 0 {
        parts.push(format!("{static_images}圖片"));
    }
    if animations > 0 {
        parts.push(format!("{animations}動畫"));
    }
    format!("[包含: {}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(originator: Option<&str>, ts: Option<i64>) -> Message {
        Message {
            role: Role::User,
            content: Content::Text("hi".into()),
            metadata: MessageMetadata {
                originator_id: originator.map(String::from),
                timestamp: ts.map(|s| chrono::DateTime::from_timestamp(s, 0).unwrap()),
            },
        }
    }

    #[test]
    fn dedupes_by_originator_id_first_seen_wins() {
        let history = vec![
            msg(Some("a"), Some(100)),
            msg(Some("a"), Some(200)),
            msg(Some("b"), Some(50)),
        ];
        let deduped = stamp_and_dedupe(history);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn missing_timestamps_get_monotonic_receive_order() {
        let history = vec![msg(None, None), msg(None, None), msg(None, None)];
        let deduped = stamp_and_dedupe(history);
        let ts: Vec<_> = deduped.iter().map(|m| m.metadata.timestamp.unwrap()).collect();
        assert!(ts[0] < ts[1]);
        assert!(ts[1] < ts[2]);
    }

    #[test]
    fn collect_appends_media_marker_with_images_and_animation() {
        let req = CollectRequest {
            utterance: "look at this".into(),
            history: vec![],
            attachments: vec![
                Attachment {
                    mime: "image/png".into(),
                    base64: "aaaa".into(),
                    animated: false,
                    frames: vec![],
                },
                Attachment {
                    mime: "image/gif".into(),
                    base64: String::new(),
                    animated: true,
                    frames: vec!["f1".into(), "f2".into(), "f3".into(), "f4".into(), "f5".into()],
                },
            ],
        };
        let (messages, summary) = collect(req, &CollectLimits::default()).unwrap();
        assert_eq!(summary.animations_included, 1);
        // static + 4 sub-sampled animated frames (cap is 4, not 5)
        assert_eq!(summary.images_included, 5);
        let last = messages.last().unwrap();
        assert_eq!(last.content.image_count(), 5);
        if let Content::Parts(parts) = &last.content {
            let text = parts
                .iter()
                .find_map(|p| match p {
                    ContentPart::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .unwrap();
            assert!(text.contains("1圖片"));
            assert!(text.contains("1動畫"));
        } else {
            panic!("expected parts");
        }
    }

    #[test]
    fn collect_rejects_oversized_input() {
        let req = CollectRequest {
            utterance: "x".repeat(10),
            history: vec![],
            attachments: vec![],
        };
        let limits = CollectLimits {
            hard_limit_chars: 5,
            ..CollectLimits::default()
        };
        let err = collect(req, &limits).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InputTooLarge);
    }

    #[test]
    fn soft_text_budget_drops_history_oldest_first_without_rejecting() {
        let history = vec![
            msg(Some("a"), Some(1)),
            msg(Some("b"), Some(2)),
            msg(Some("c"), Some(3)),
        ];
        let req = CollectRequest {
            utterance: "hi".into(),
            history,
            attachments: vec![],
        };
        // Each history message is "hi" (2 chars); budget only leaves room
        // for one of them alongside the 2-char current utterance.
        let limits = CollectLimits {
            max_text_chars: 4,
            hard_limit_chars: 200_000,
            ..CollectLimits::default()
        };
        let (messages, summary) = collect(req, &limits).unwrap();
        assert_eq!(summary.history_dropped, 2);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn soft_text_budget_never_drops_the_current_message() {
        let req = CollectRequest {
            utterance: "x".repeat(50),
            history: vec![msg(Some("a"), Some(1))],
            attachments: vec![],
        };
        let limits = CollectLimits {
            max_text_chars: 10,
            hard_limit_chars: 200_000,
            ..CollectLimits::default()
        };
        let (messages, summary) = collect(req, &limits).unwrap();
        assert_eq!(summary.history_dropped, 1);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content.char_len(), 50);
    }

    #[test]
    fn history_window_drops_oldest_first() {
        let history = (0..5)
            .map(|i| msg(Some(&i.to_string()), Some(i)))
            .collect();
        let req = CollectRequest {
            utterance: "latest".into(),
            history,
            attachments: vec![],
        };
        let limits = CollectLimits {
            max_history_messages: 2,
            ..CollectLimits::default()
        };
        let (messages, summary) = collect(req, &limits).unwrap();
        assert_eq!(summary.history_dropped, 3);
        // 2 retained history + the new current message
        assert_eq!(messages.len(), 3);
    }
}
