//! Discord transport entrypoint (§6's "chat transport" CLI surface).
//! Loads config, builds every library crate's runtime pieces via
//! `build_system`, then hands the assembled `SessionRunner` to
//! `conductor-discord`'s reconnect-forever gateway loop.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use conductor_discord::{DiscordAdapter, DiscordConfig};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "conductor-gateway", about = "Discord-facing agent orchestration core")]
struct Args {
    #[arg(long, default_value = "config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conductor_gateway=info,conductor_graph=info".into()),
        )
        .init();

    let args = Args::parse();

    let discord_config = match DiscordConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Discord config invalid");
            return ExitCode::from(1);
        }
    };

    let system = match conductor_gateway::build_system(&args.config, discord_config.bot_token.clone()).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "startup failed");
            return ExitCode::from(1);
        }
    };

    let history_limit = system.config.discord.limits.max_messages.min(100) as u8;
    let adapter = DiscordAdapter::new(Arc::clone(&system.runner), discord_config, history_limit);

    info!("conductor-gateway starting");

    // `DiscordAdapter::run` reconnects forever and only returns on a
    // programming error in the handler setup itself, which we treat as
    // fatal rather than retry indefinitely with no working client.
    adapter.run().await;

    error!("Discord adapter loop exited unexpectedly");
    ExitCode::from(2)
}
