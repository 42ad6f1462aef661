//! Builds C8's `EmojiRegistry` from Discord's own emoji lists — the
//! "emoji/sticker Base64 encoding" external-collaborator responsibility
//! spec.md names; this crate never encodes Base64 itself, it just turns
//! Discord's native emoji records into `EmojiEntry` values.

use conductor_media::{EmojiEntry, EmojiRegistry};
use serenity::model::guild::Emoji;

/// Rebuild the full registry from the gateway cache: every guild the bot is
/// currently in contributes its emoji under its own guild id; there is no
/// separate "global" application-emoji source in this deployment, so the
/// global table stays empty.
pub fn build_from_guilds<'a>(guilds: impl Iterator<Item = (String, &'a [Emoji])>) -> EmojiRegistry {
    let mut registry = EmojiRegistry::new();
    for (guild_id, emojis) in guilds {
        for emoji in emojis {
            registry.insert_guild(
                guild_id.clone(),
                EmojiEntry { name: emoji.name.clone(), id: emoji.id.to_string(), animated: emoji.animated() },
            );
        }
    }
    registry
}
