use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("no bot token configured")]
    NoToken,

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DiscordError>;
