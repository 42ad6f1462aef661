//! `ProgressObserver` implementation for Discord: turns the bus's five
//! callbacks into reaction acks, chunked sends, and embed rendering.
//! Coalescing (how often chunks arrive, how big they are) is already done
//! upstream by the bus per `TransportProgressConfig`; this observer only
//! decides how to *render* what it's handed.

use std::sync::Arc;

use async_trait::async_trait;
use conductor_bus::ProgressObserver;
use conductor_core::types::{ProgressEvent, ProgressStage, Source, StreamingChunk};
use conductor_media::{EmojiRegistry, StreamRepairer};
use serenity::model::id::{ChannelId, MessageId};
use tokio::sync::Mutex;
use tracing::warn;

use crate::ack::AckHandle;

pub struct DiscordObserver {
    http: Arc<serenity::http::Http>,
    channel_id: ChannelId,
    /// Only the first message of a reply should reference the triggering
    /// message; later sends (more streaming chunks, a follow-up embed)
    /// take this once and leave it `None` after.
    reply_to: Mutex<Option<MessageId>>,
    guild_id: Option<String>,
    emoji_registry: Arc<EmojiRegistry>,
    ack: Mutex<AckHandle>,
    repairer: Mutex<StreamRepairer>,
    streamed_anything: Mutex<bool>,
}

impl DiscordObserver {
    pub fn new(
        http: Arc<serenity::http::Http>,
        channel_id: ChannelId,
        reply_to: Option<MessageId>,
        guild_id: Option<String>,
        emoji_registry: Arc<EmojiRegistry>,
        ack: AckHandle,
    ) -> Self {
        Self {
            http,
            channel_id,
            reply_to: Mutex::new(reply_to),
            guild_id,
            emoji_registry,
            ack: Mutex::new(ack),
            repairer: Mutex::new(StreamRepairer::new()),
            streamed_anything: Mutex::new(false),
        }
    }

    async fn send(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let reply_to = self.reply_to.lock().await.take();
        if let Err(e) = crate::send::send_response(&self.http, self.channel_id, text, reply_to).await {
            warn!(error = %e, "failed to send Discord message");
        }
    }
}

#[async_trait]
impl ProgressObserver for DiscordObserver {
    async fn on_progress(&self, event: ProgressEvent) {
        if matches!(event.stage, ProgressStage::ToolExecution | ProgressStage::ToolStatus | ProgressStage::Searching) {
            self.ack.lock().await.working().await;
        }
    }

    async fn on_streaming_chunk(&self, chunk: StreamingChunk) {
        let repaired = {
            let mut repairer = self.repairer.lock().await;
            repairer.feed(&chunk.content, &self.emoji_registry, self.guild_id.as_deref())
        };
        if !repaired.is_empty() {
            *self.streamed_anything.lock().await = true;
            self.send(&repaired).await;
        }
    }

    async fn on_streaming_complete(&self) {
        let remainder = {
            let mut repairer = self.repairer.lock().await;
            repairer.flush(&self.emoji_registry, self.guild_id.as_deref())
        };
        self.send(&remainder).await;
        self.ack.lock().await.done_ok().await;
    }

    async fn on_completion(&self, final_text: String, sources: Vec<Source>) {
        if *self.streamed_anything.lock().await {
            // Already delivered via streaming chunks; nothing left to send.
            self.ack.lock().await.done_ok().await;
            return;
        }

        let repaired = conductor_media::repair(&final_text, &self.emoji_registry, self.guild_id.as_deref());
        let text_with_sources = append_sources(&repaired, &sources);

        if let Some((embed, remaining)) = crate::embed::try_parse_embed(&text_with_sources) {
            let msg = serenity::builder::CreateMessage::new().embed(embed.to_create_embed());
            if let Err(e) = self.channel_id.send_message(&self.http, msg).await {
                warn!(error = %e, "failed to send Discord embed");
            }
            if !remaining.is_empty() {
                self.send(&remaining).await;
            }
        } else {
            self.send(&text_with_sources).await;
        }

        self.ack.lock().await.done_ok().await;
    }

    async fn on_error(&self, kind: conductor_core::ErrorKind, message: String) {
        warn!(code = kind.code(), message = %message, "delivering error to Discord channel");
        self.send("\u{26a0}\u{fe0f} Something went wrong. Please try again later.").await;
        self.ack.lock().await.done_err().await;
    }
}

fn append_sources(text: &str, sources: &[Source]) -> String {
    if sources.is_empty() {
        return text.to_string();
    }
    let mut out = text.to_string();
    out.push_str("\n\nSources:");
    for s in sources {
        out.push_str(&format!("\n- [{}]({})", s.title, s.url));
    }
    out
}
