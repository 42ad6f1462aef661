//! Serenity event handler wired to the session glue. Unlike the teacher,
//! this isn't generic over a shared multi-transport context trait — this
//! workspace only ever talks to Discord, so `DiscordHandler` holds a
//! concrete `Arc<SessionRunner>` directly.

use std::sync::{Arc, OnceLock};

use serenity::all::ActivityData;
use serenity::async_trait;
use serenity::model::channel::{Message, Reaction, ReactionType};
use serenity::model::gateway::Ready;
use serenity::model::id::{GuildId, UserId};
use serenity::model::user::OnlineStatus;
use serenity::prelude::{Context, EventHandler};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use conductor_media::EmojiRegistry;
use conductor_session::{Identity, InboundEvent, MessageEvent, Outcome, ReactionRequest, SessionRunner};
use conductor_trend::{ChatEvent, ReactionEvent, TrendAction};

use crate::ack::AckHandle;
use crate::config::DiscordConfig;
use crate::observer::DiscordObserver;

pub struct DiscordHandler {
    pub runner: Arc<SessionRunner>,
    pub config: DiscordConfig,
    pub history_limit: u8,
    pub bot_id: OnceLock<UserId>,
    pub emoji_registry: RwLock<Arc<EmojiRegistry>>,
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.bot_id.set(ready.user.id).ok();
        ctx.set_presence(build_activity(&self.config), parse_online_status(&self.config.status));
        info!(name = %ready.user.name, "Discord bot connected");
    }

    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let mut entries = Vec::new();
        for guild_id in guilds {
            if let Some(guild) = ctx.cache.guild(guild_id) {
                entries.push((guild_id.to_string(), guild.emojis.values().cloned().collect::<Vec<_>>()));
            }
        }
        let registry = crate::emoji::build_from_guilds(entries.iter().map(|(g, e)| (g.clone(), e.as_slice())));
        *self.emoji_registry.write().await = Arc::new(registry);
        info!(guild_count = entries.len(), "emoji registry rebuilt from cache");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let is_guild = msg.guild_id.is_some();

        if is_guild && self.config.require_mention {
            let Some(bot_id) = self.bot_id.get() else { return };
            if !msg.mentions_user_id(*bot_id) {
                return;
            }
        }

        if !is_guild && !self.config.dm_allowed {
            return;
        }

        let content = strip_mention(&msg.content).trim().to_string();
        if content.is_empty() && msg.attachments.is_empty() {
            return;
        }

        let _ = msg.channel_id.broadcast_typing(&ctx.http).await;

        let mut ack = if self.config.ack_reactions {
            AckHandle::new(Arc::clone(&ctx.http), msg.channel_id, msg.id)
        } else {
            AckHandle::disabled()
        };
        ack.thinking().await;

        let runner = Arc::clone(&self.runner);
        let http = Arc::clone(&ctx.http);
        let emoji_registry = Arc::clone(&*self.emoji_registry.read().await);
        let history_limit = self.history_limit;
        let max_attachment_bytes = self.config.max_attachment_bytes;

        tokio::spawn(async move {
            handle_message(runner, http, ctx, msg, content, ack, emoji_registry, history_limit, max_attachment_bytes).await;
        });
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        let Some(bot_id) = self.bot_id.get() else { return };
        if reaction.user_id == Some(*bot_id) {
            return;
        }

        let runner = Arc::clone(&self.runner);
        tokio::spawn(async move {
            handle_reaction(runner, ctx, reaction).await;
        });
    }
}

async fn handle_message(
    runner: Arc<SessionRunner>,
    http: Arc<serenity::http::Http>,
    ctx: Context,
    msg: Message,
    content: String,
    ack: AckHandle,
    emoji_registry: Arc<EmojiRegistry>,
    history_limit: u8,
    max_attachment_bytes: u64,
) {
    let history = fetch_history(&ctx, &msg, history_limit).await;
    let (attachments, notes) = crate::attach::to_collect_attachments(&msg.attachments, max_attachment_bytes).await;

    let mut utterance = content.clone();
    for note in notes {
        utterance.push_str("\n\n");
        utterance.push_str(&note);
    }

    let role_ids = msg.member.as_ref().map(|m| m.roles.iter().map(|r| r.to_string()).collect()).unwrap_or_default();

    let identity = Identity {
        user_id: msg.author.id.to_string(),
        role_ids,
        channel_id: msg.channel_id.to_string(),
        is_dm: msg.guild_id.is_none(),
    };

    let chat_event = ChatEvent {
        message_id: msg.id.to_string(),
        is_bot_author: false,
        normalized_content: content.clone(),
        is_emoji_only: is_emoji_only(&content),
    };

    let guild_id = msg.guild_id.map(|g| g.to_string());
    let global_metadata = format!("channel:{} guild:{}", msg.channel_id, guild_id.as_deref().unwrap_or("dm"));

    let observer = Arc::new(DiscordObserver::new(
        Arc::clone(&http),
        msg.channel_id,
        Some(msg.id),
        guild_id.clone(),
        emoji_registry,
        ack,
    ));

    let event = InboundEvent::Message(MessageEvent { identity, utterance, history, attachments, chat_event });

    let outcome = runner
        .handle(event, "discord", observer, guild_id, global_metadata, CancellationToken::new())
        .await;

    if let Outcome::TrendClaimed(action) = outcome {
        deliver_trend_action(&http, msg.channel_id, Some(msg.id), action).await;
    }
}

async fn handle_reaction(runner: Arc<SessionRunner>, ctx: Context, reaction: Reaction) {
    let channel_id = reaction.channel_id;
    let is_dm = reaction.guild_id.is_none();

    let (reaction_count, bot_already_reacted) = match reaction.message(&ctx.http).await {
        Ok(message) => message
            .reactions
            .iter()
            .find(|r| r.reaction_type == reaction.emoji)
            .map(|r| (r.count, r.me))
            .unwrap_or((1, false)),
        Err(e) => {
            warn!(error = %e, "failed to fetch message for reaction count");
            (1, false)
        }
    };

    let identity = Identity {
        user_id: reaction.user_id.map(|u| u.to_string()).unwrap_or_default(),
        role_ids: Vec::new(),
        channel_id: channel_id.to_string(),
        is_dm,
    };

    let event = ReactionRequest {
        identity,
        reaction: ReactionEvent {
            message_id: reaction.message_id.to_string(),
            emoji_token: reaction.emoji.to_string(),
            reaction_count: reaction_count as u32,
            bot_already_reacted,
        },
    };

    if let Outcome::TrendClaimed(action) =
        runner.handle(InboundEvent::Reaction(event), "discord", NoopObserver::arc(), None, String::new(), CancellationToken::new()).await
    {
        deliver_trend_action(&ctx.http, channel_id, Some(reaction.message_id), action).await;
    }
}

async fn deliver_trend_action(
    http: &serenity::http::Http,
    channel_id: serenity::model::id::ChannelId,
    reply_to: Option<serenity::model::id::MessageId>,
    action: TrendAction,
) {
    match action {
        TrendAction::RepeatReaction { emoji_token } => {
            if let Some(message_id) = reply_to {
                let _ = http
                    .create_reaction(channel_id, message_id, &ReactionType::Unicode(emoji_token))
                    .await;
            }
        }
        TrendAction::RepeatContent { content } => {
            if let Err(e) = crate::send::send_chunked(http, channel_id, &content).await {
                warn!(error = %e, "failed to deliver trend content repeat");
            }
        }
        TrendAction::EmojiOnlyReply { text } => {
            if let Err(e) = crate::send::send_chunked(http, channel_id, &text).await {
                warn!(error = %e, "failed to deliver trend emoji reply");
            }
        }
    }
}

/// Fetch up to `limit` prior messages in the channel, oldest first, as
/// C1's `Message` shape. Message history fetch from chat is this crate's
/// responsibility per spec's external-collaborator split.
async fn fetch_history(
    ctx: &Context,
    msg: &Message,
    limit: u8,
) -> Vec<conductor_core::conversation::Message> {
    use conductor_core::conversation::{Content, Message as CoreMessage, MessageMetadata, Role};
    use serenity::builder::GetMessages;

    let fetched = msg
        .channel_id
        .messages(&ctx.http, GetMessages::new().before(msg.id).limit(limit))
        .await
        .unwrap_or_default();

    fetched
        .into_iter()
        .rev()
        .map(|m| CoreMessage {
            role: if m.author.bot { Role::Assistant } else { Role::User },
            content: Content::Text(m.content),
            metadata: MessageMetadata {
                originator_id: Some(m.id.to_string()),
                timestamp: Some(m.timestamp.with_timezone(&chrono::Utc)),
            },
        })
        .collect()
}

fn strip_mention(s: &str) -> &str {
    let trimmed = s.trim_start();
    if trimmed.starts_with("<@") {
        if let Some(end) = trimmed.find('>') {
            return trimmed[end + 1..].trim_start();
        }
    }
    trimmed
}

/// A message is emoji-only if, once whitespace is stripped, every
/// remaining "unit" is either a custom-emoji token (`<a?:name:id>`) or a
/// single Unicode emoji code point — approximated here as "contains no
/// ASCII alphanumeric characters".
fn is_emoji_only(content: &str) -> bool {
    let trimmed = content.trim();
    !trimmed.is_empty() && !trimmed.chars().any(|c| c.is_ascii_alphanumeric())
}

fn parse_online_status(s: &str) -> OnlineStatus {
    match s.to_lowercase().as_str() {
        "idle" => OnlineStatus::Idle,
        "dnd" | "do_not_disturb" => OnlineStatus::DoNotDisturb,
        "invisible" => OnlineStatus::Invisible,
        _ => OnlineStatus::Online,
    }
}

fn build_activity(config: &DiscordConfig) -> Option<ActivityData> {
    let name = config.activity_name.as_deref()?;
    let kind = config.activity_type.as_deref().unwrap_or("playing");
    Some(match kind.to_lowercase().as_str() {
        "listening" => ActivityData::listening(name),
        "watching" => ActivityData::watching(name),
        "competing" => ActivityData::competing(name),
        "custom" => ActivityData::custom(name),
        _ => ActivityData::playing(name),
    })
}

/// A `ProgressObserver` that drops everything — used for the reaction path,
/// which has no triggering message to attach delivery to and only ever
/// produces a `TrendAction`, never an `OnCompletion`/`OnError`.
struct NoopObserver;

impl NoopObserver {
    fn arc() -> Arc<dyn conductor_bus::ProgressObserver> {
        Arc::new(NoopObserver)
    }
}

#[serenity::async_trait]
impl conductor_bus::ProgressObserver for NoopObserver {
    async fn on_progress(&self, _event: conductor_core::types::ProgressEvent) {}
    async fn on_streaming_chunk(&self, _chunk: conductor_core::types::StreamingChunk) {}
    async fn on_streaming_complete(&self) {}
    async fn on_completion(&self, _final_text: String, _sources: Vec<conductor_core::types::Source>) {}
    async fn on_error(&self, _kind: conductor_core::ErrorKind, _message: String) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_mention_removes_leading_mention() {
        assert_eq!(strip_mention("<@123456> hello"), "hello");
    }

    #[test]
    fn strip_mention_leaves_plain_text_untouched() {
        assert_eq!(strip_mention("hello there"), "hello there");
    }

    #[test]
    fn emoji_only_detects_pure_emoji_text() {
        assert!(is_emoji_only("\u{1f389}\u{1f389}"));
        assert!(!is_emoji_only("nice job"));
        assert!(!is_emoji_only(""));
    }
}
