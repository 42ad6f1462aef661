//! Emoji/media context (C8): a guild-aware emoji registry, a prompt-context
//! builder, and an idempotent output-repair pass (plus its streaming,
//! token-atomic variant).

pub mod registry;
pub mod repair;

pub use registry::{EmojiEntry, EmojiRegistry};
pub use repair::{repair, StreamRepairer};
