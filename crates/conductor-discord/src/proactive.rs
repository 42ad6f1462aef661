//! Proactive delivery — the `ReminderCallback` implementation that lets
//! C6's fired reminders actually reach a Discord channel. The scheduler
//! only knows whether to retry; it has no idea what "delivery" means.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use conductor_media::EmojiRegistry;
use conductor_scheduler::{ReminderCallback, ScheduledReminder};
use conductor_session::{Identity, InboundEvent, MessageEvent, SessionRunner};
use conductor_trend::ChatEvent;
use serenity::model::id::ChannelId;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::ack::AckHandle;
use crate::observer::DiscordObserver;

/// Constructed before the `SessionRunner` exists (the scheduler needs this
/// callback before C10 can be built, and C10 needs the scheduler), so the
/// runner is bound in after the fact via `bind_runner`.
pub struct DiscordReminderDelivery {
    http: Arc<serenity::http::Http>,
    emoji_registry: Arc<EmojiRegistry>,
    runner: OnceLock<Arc<SessionRunner>>,
}

impl DiscordReminderDelivery {
    pub fn new(http: Arc<serenity::http::Http>, emoji_registry: Arc<EmojiRegistry>) -> Self {
        Self {
            http,
            emoji_registry,
            runner: OnceLock::new(),
        }
    }

    /// Completes construction. Must be called once, before the scheduler's
    /// poll loop starts, with the runner built from the same startup call.
    pub fn bind_runner(&self, runner: Arc<SessionRunner>) {
        let _ = self.runner.set(runner);
    }
}

#[async_trait]
impl ReminderCallback for DiscordReminderDelivery {
    async fn fire(&self, reminder: &ScheduledReminder) -> bool {
        let Some(runner) = self.runner.get() else {
            warn!(id = %reminder.id, "reminder fired before the session runner was bound, retrying");
            return false;
        };

        let Ok(raw) = reminder.details.channel_ref.parse::<u64>() else {
            warn!(id = %reminder.id, channel_ref = %reminder.details.channel_ref, "reminder has a non-numeric channel ref, dropping");
            return true;
        };
        let channel_id = ChannelId::new(raw);

        // §4.6: C10 re-enters the graph with a synthesized user message
        // instead of echoing the stored text verbatim, so the delivered
        // reply is LLM-styled and persona/tool-aware rather than a raw echo.
        let utterance = format!("Remind me: {}", reminder.details.content);

        let identity = Identity {
            user_id: reminder.details.user_ref.clone(),
            role_ids: Vec::new(),
            channel_id: reminder.details.channel_ref.clone(),
            is_dm: false,
        };
        let chat_event = ChatEvent {
            message_id: reminder.id.clone(),
            is_bot_author: false,
            normalized_content: utterance.clone(),
            is_emoji_only: false,
        };
        let event = InboundEvent::Message(MessageEvent {
            identity,
            utterance,
            history: Vec::new(),
            attachments: Vec::new(),
            chat_event,
        });

        let observer = Arc::new(DiscordObserver::new(
            Arc::clone(&self.http),
            channel_id,
            None,
            None,
            Arc::clone(&self.emoji_registry),
            AckHandle::disabled(),
        ));

        let global_metadata = format!("channel:{} guild:dm", reminder.details.channel_ref);
        runner
            .handle(event, "discord", observer, None, global_metadata, CancellationToken::new())
            .await;

        // The graph's own bus already delivered the completion or error to
        // the channel through the observer; a synthesized reminder message
        // only fails to reach C10 at all when `runner` isn't bound yet,
        // handled above.
        true
    }
}
