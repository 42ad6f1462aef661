//! Outbound text delivery: chunking long completions to fit Discord's
//! per-message length limit, optionally referencing the triggering message.

use serenity::builder::CreateMessage;
use serenity::model::id::{ChannelId, MessageId};

/// Discord's message limit is 2000 characters; 1950 leaves headroom for
/// any wrapping this crate adds before a chunk is sent.
const CHUNK_MAX: usize = 1950;

/// Split `text` into chunks of at most [`CHUNK_MAX`] characters, preferring
/// splits on whitespace/newline boundaries over cutting words mid-way.
pub fn split_chunks(text: &str) -> Vec<String> {
    if text.len() <= CHUNK_MAX {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.len() > CHUNK_MAX {
        let window = &remaining[..CHUNK_MAX];
        let split_at = window.rfind('\n').or_else(|| window.rfind(' ')).unwrap_or(CHUNK_MAX);
        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }

    chunks
}

/// Send `text` to `channel_id` in chunks, with the first chunk referencing
/// `reply_to` (if given) so the reply shows up threaded under the original
/// message in Discord's UI.
pub async fn send_response(
    http: &serenity::http::Http,
    channel_id: ChannelId,
    text: &str,
    reply_to: Option<MessageId>,
) -> Result<(), serenity::Error> {
    let mut chunks = split_chunks(text).into_iter();
    if let Some(first) = chunks.next() {
        let mut builder = CreateMessage::new().content(first);
        if let Some(id) = reply_to {
            builder = builder.reference_message((channel_id, id));
        }
        channel_id.send_message(http, builder).await?;
    }
    for chunk in chunks {
        channel_id.say(http, &chunk).await?;
    }
    Ok(())
}

/// Send `text` to `channel_id` in chunks with no reply reference — used for
/// proactive deliveries that have no triggering message.
pub async fn send_chunked(
    http: &serenity::http::Http,
    channel_id: ChannelId,
    text: &str,
) -> Result<(), serenity::Error> {
    for chunk in split_chunks(text) {
        channel_id.say(http, &chunk).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = split_chunks("Hello, world!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "Hello, world!");
    }

    #[test]
    fn long_text_splits_on_newline() {
        let line = "a".repeat(1000);
        let text = format!("{}\n{}", line, line);
        let chunks = split_chunks(&text);
        assert_eq!(chunks.len(), 2);
        for c in &chunks {
            assert!(c.len() <= CHUNK_MAX);
        }
    }

    #[test]
    fn very_long_word_still_splits() {
        let text = "x".repeat(4000);
        let chunks = split_chunks(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.len() <= CHUNK_MAX);
        }
    }
}
