//! Inbound request shapes: owned, transport-agnostic stand-ins for whatever
//! native event (Discord message, Discord reaction, WS frame, ...) the
//! adapter crate actually received.

use conductor_core::conversation::{Attachment, Message};
use conductor_trend::{ChatEvent, ReactionEvent};

/// Who sent the event and where, stripped of any transport-native type.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub role_ids: Vec<String>,
    pub channel_id: String,
    pub is_dm: bool,
}

/// A chat message event: carries both what C1 needs (utterance/history/
/// attachments) and what C7 needs (the normalized `ChatEvent`).
pub struct MessageEvent {
    pub identity: Identity,
    pub utterance: String,
    pub history: Vec<Message>,
    pub attachments: Vec<Attachment>,
    pub chat_event: ChatEvent,
}

/// A reaction-count event, evaluated only against C7.
pub struct ReactionRequest {
    pub identity: Identity,
    pub reaction: ReactionEvent,
}

pub enum InboundEvent {
    Message(MessageEvent),
    Reaction(ReactionRequest),
}
