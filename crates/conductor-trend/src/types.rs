use async_trait::async_trait;

/// One message observed in a channel, as maintained by the per-channel
/// cache C10 owns (§4.10). The trend engine never stores these itself —
/// it only scans the window it's handed.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub message_id: String,
    pub is_bot_author: bool,
    /// Normalized text content, or a sticker id prefixed so it can't
    /// collide with text (`"sticker:1234"`), per §4.7's "text or sticker
    /// id" wording.
    pub normalized_content: String,
    pub is_emoji_only: bool,
}

/// A reaction-count observation on a single message.
#[derive(Debug, Clone)]
pub struct ReactionEvent {
    pub message_id: String,
    pub emoji_token: String,
    pub reaction_count: u32,
    /// Whether the bot has already added this same reaction to this
    /// message — the bot-loop guard for the reaction mode.
    pub bot_already_reacted: bool,
}

/// What the engine decided to do, handed back to the transport adapter to
/// actually perform (add a reaction, post a message).
#[derive(Debug, Clone, PartialEq)]
pub enum TrendAction {
    RepeatReaction { emoji_token: String },
    RepeatContent { content: String },
    EmojiOnlyReply { text: String },
}

/// Opaque hook for generating an emoji-only reply. The engine decides
/// *whether* to follow the emoji trend; producing the actual reply text is
/// someone else's concern (mirrors the scheduler's `ReminderCallback`
/// split between decision and effect).
#[async_trait]
pub trait EmojiReplyGenerator: Send + Sync {
    async fn generate(&self) -> Option<String>;
}
