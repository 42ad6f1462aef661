//! Interactive tester (§6's second CLI entrypoint): a stdin/stdout REPL
//! driving the same `SessionRunner` the Discord transport uses, so the
//! orchestrator graph can be exercised without a live bot token or guild.

use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use conductor_bus::ProgressObserver;
use conductor_core::conversation::{Message, Role};
use conductor_core::types::{ProgressEvent, Source, StreamingChunk};
use conductor_core::ErrorKind;
use conductor_session::{Identity, InboundEvent, MessageEvent, Outcome};
use conductor_trend::ChatEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::error;

#[derive(Parser)]
#[command(name = "conductor-tester", about = "Interactive tester for the agent orchestration core")]
struct Args {
    #[arg(long, default_value = "config.yaml")]
    config: String,
}

/// Prints every bus callback straight to stdout. No coalescing of its own —
/// the bus already applied `TransportProgressConfig` before this ever sees
/// an event.
struct CliObserver;

#[async_trait]
impl ProgressObserver for CliObserver {
    async fn on_progress(&self, event: ProgressEvent) {
        println!("[{:?}] {}", event.stage, event.message);
    }

    async fn on_streaming_chunk(&self, chunk: StreamingChunk) {
        print!("{}", chunk.content);
        let _ = std::io::stdout().flush();
    }

    async fn on_streaming_complete(&self) {
        println!();
    }

    async fn on_completion(&self, final_text: String, sources: Vec<Source>) {
        println!("\n{final_text}");
        for source in sources {
            println!("  - {} ({})", source.title, source.url);
        }
    }

    async fn on_error(&self, kind: ErrorKind, message: String) {
        eprintln!("error [{}]: {message}", kind.code());
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "conductor_gateway=warn".into()),
        )
        .init();

    let args = Args::parse();

    let system = match conductor_gateway::build_system(&args.config, String::new()).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "startup failed");
            return ExitCode::from(1);
        }
    };

    println!("conductor-tester ready. Type a message and press enter; Ctrl-D to exit.");

    let mut history: Vec<Message> = Vec::new();
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "stdin read failed");
                break;
            }
        };
        let utterance = line.trim().to_string();
        if utterance.is_empty() {
            continue;
        }

        let identity = Identity {
            user_id: "tester".to_string(),
            role_ids: Vec::new(),
            channel_id: "tester-channel".to_string(),
            is_dm: true,
        };
        let chat_event = ChatEvent {
            message_id: uuid::Uuid::new_v4().to_string(),
            is_bot_author: false,
            normalized_content: utterance.clone(),
            is_emoji_only: false,
        };

        let event = InboundEvent::Message(MessageEvent {
            identity,
            utterance: utterance.clone(),
            history: history.clone(),
            attachments: Vec::new(),
            chat_event,
        });

        let outcome = system
            .runner
            .handle(event, "tester", Arc::new(CliObserver), None, String::new(), CancellationToken::new())
            .await;

        match outcome {
            Outcome::Denied { reason } => println!("(denied: {reason})"),
            Outcome::TrendClaimed(_) | Outcome::NoTrendAction => {}
            Outcome::Ran => {
                history.push(Message {
                    role: Role::User,
                    content: conductor_core::conversation::Content::Text(utterance),
                    metadata: Default::default(),
                });
            }
        }
    }

    ExitCode::SUCCESS
}
