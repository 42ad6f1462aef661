use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use conductor_media::EmojiRegistry;
use conductor_session::SessionRunner;

use crate::config::DiscordConfig;
use crate::handler::DiscordHandler;

/// Discord channel adapter. Wraps a serenity `Client` and drives the
/// gateway event loop for the lifetime of the process, reconnecting
/// whenever the connection drops.
///
/// Unlike the reminder delivery path (which only needs a REST `Http`
/// client built independently at startup and handed straight to the
/// scheduler), the gateway connection itself has to be rebuilt on every
/// reconnect, since a serenity `Client` owns its own event-handler
/// instance.
pub struct DiscordAdapter {
    runner: Arc<SessionRunner>,
    config: DiscordConfig,
    history_limit: u8,
}

impl DiscordAdapter {
    pub fn new(runner: Arc<SessionRunner>, config: DiscordConfig, history_limit: u8) -> Self {
        Self { runner, config, history_limit }
    }

    /// Connect to Discord and keep reconnecting whenever the gateway
    /// drops. Never returns — runs for the lifetime of the process.
    pub async fn run(self) {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MESSAGE_REACTIONS;

        let mut client = loop {
            match self.build_client(intents).await {
                Ok(c) => break c,
                Err(e) => {
                    error!(error = %e, "Discord initial connect failed, retrying in 30s");
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
        };

        loop {
            info!("Discord gateway connecting");

            if let Err(e) = client.start().await {
                warn!(error = %e, "Discord gateway error, reconnecting in 5s");
            } else {
                info!("Discord gateway stopped cleanly, reconnecting in 5s");
            }

            tokio::time::sleep(Duration::from_secs(5)).await;

            client = loop {
                match self.build_client(intents).await {
                    Ok(c) => break c,
                    Err(e) => {
                        error!(error = %e, "Discord reconnect failed, retrying in 30s");
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                }
            };
        }
    }

    async fn build_client(&self, intents: GatewayIntents) -> Result<Client, serenity::Error> {
        let handler = DiscordHandler {
            runner: Arc::clone(&self.runner),
            config: self.config.clone(),
            history_limit: self.history_limit,
            bot_id: OnceLock::new(),
            emoji_registry: RwLock::new(Arc::new(EmojiRegistry::new())),
        };

        Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await
    }
}
