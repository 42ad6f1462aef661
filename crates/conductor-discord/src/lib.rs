//! Discord transport: the external collaborator that turns gateway events
//! into session-glue calls and renders the glue's decisions back out as
//! Discord messages, reactions, and embeds. Thin by design — every piece
//! of actual agent behavior lives in the other crates; this one only
//! knows how to talk to Discord.

mod ack;
mod adapter;
mod attach;
mod config;
mod embed;
mod emoji;
mod error;
mod handler;
mod observer;
mod proactive;
mod send;

pub use adapter::DiscordAdapter;
pub use config::DiscordConfig;
pub use error::{DiscordError, Result};
pub use handler::DiscordHandler;
pub use proactive::DiscordReminderDelivery;
