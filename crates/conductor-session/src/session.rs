//! Session glue (C10): the eight-step per-request flow tying every other
//! component together. Transport-agnostic — `conductor-discord` (or any
//! other adapter) builds an `InboundEvent` from its native type and calls
//! `SessionRunner::handle`.

use std::collections::HashMap;
use std::sync::Arc;

use conductor_bus::{BlurbGenerator, ProgressBus, ProgressObserver};
use conductor_core::config::{AccessControlConfig, AgentBehaviorConfig, PersonaConfig, StreamingConfig, TransportProgressConfig};
use conductor_core::conversation::{self, CollectLimits};
use conductor_core::ErrorKind;
use conductor_graph::{GraphContext, GraphState};
use conductor_media::EmojiRegistry;
use conductor_scheduler::Scheduler;
use conductor_tools::{ToolContext, ToolRegistry};
use conductor_trend::TrendAction;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::ChannelMessageCache;
use crate::permission::{self, PermissionCheck, RequestIdentity};
use crate::request::{InboundEvent, MessageEvent, ReactionRequest};

/// Everything about the running process that doesn't change per request:
/// the shared gateway/tool/emoji singletons, plus the config slices the
/// graph and bus need. One of these is built at startup by the binary
/// crate and shared across every `SessionRunner::handle` call.
pub struct SessionContext {
    pub llm: Arc<conductor_llm::LlmGateway>,
    pub tools: Arc<ToolRegistry>,
    pub tool_ctx: ToolContext,
    pub behavior: AgentBehaviorConfig,
    pub streaming: StreamingConfig,
    pub persona: PersonaConfig,
    pub available_personas: Vec<String>,
    pub emoji_registry: Arc<EmojiRegistry>,
    pub progress_configs: HashMap<String, TransportProgressConfig>,
    pub blurb: Option<Arc<BlurbGenerator>>,
    pub access_control: AccessControlConfig,
    pub collect_limits: CollectLimits,
}

/// What happened to one inbound event, for the adapter/binary to log or
/// (for a trend action) actually carry out. Delivery of a completed graph
/// run's answer happens through the observer, not through this value.
pub enum Outcome {
    /// C7 claimed the event; the caller is responsible for actually
    /// performing the reaction/send.
    TrendClaimed(TrendAction),
    /// C7 was offered the event (or isn't active) and declined; nothing to
    /// do beyond having cached the message for future windows.
    NoTrendAction,
    /// The permission check short-circuited the request before C1/C5 ran.
    Denied { reason: String },
    /// The graph ran to completion or failure; the observer already
    /// received the final delivery or error.
    Ran,
}

pub struct SessionRunner {
    ctx: SessionContext,
    scheduler: Scheduler,
    trend: Option<Arc<conductor_trend::TrendEngine>>,
    message_cache: ChannelMessageCache,
}

impl SessionRunner {
    pub fn new(
        ctx: SessionContext,
        scheduler: Scheduler,
        trend: Option<Arc<conductor_trend::TrendEngine>>,
        message_cache: ChannelMessageCache,
    ) -> Self {
        Self {
            ctx,
            scheduler,
            trend,
            message_cache,
        }
    }

    /// Run the full per-request flow (§4.10) for one inbound event.
    #[allow(clippy::too_many_arguments)]
    pub async fn handle(
        &self,
        event: InboundEvent,
        transport_key: &str,
        observer: Arc<dyn ProgressObserver>,
        guild_id: Option<String>,
        global_metadata: String,
        cancel: CancellationToken,
    ) -> Outcome {
        match event {
            InboundEvent::Reaction(req) => self.handle_reaction(req).await,
            InboundEvent::Message(msg) => {
                self.handle_message(msg, transport_key, observer, guild_id, global_metadata, cancel)
                    .await
            }
        }
    }

    async fn handle_reaction(&self, req: ReactionRequest) -> Outcome {
        if let Some(check) = self.check_permission(&req.identity) {
            return check;
        }
        let Some(trend) = &self.trend else {
            return Outcome::NoTrendAction;
        };
        match trend.evaluate_reaction(&req.identity.channel_id, &req.reaction).await {
            Some(action) => Outcome::TrendClaimed(action),
            None => Outcome::NoTrendAction,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_message(
        &self,
        event: MessageEvent,
        transport_key: &str,
        observer: Arc<dyn ProgressObserver>,
        guild_id: Option<String>,
        global_metadata: String,
        cancel: CancellationToken,
    ) -> Outcome {
        // 1. Permission check.
        if let Some(check) = self.check_permission(&event.identity) {
            observer
                .on_error(ErrorKind::Internal, denied_message(&check))
                .await;
            return check;
        }

        // 8 (kept near the top so every message — claimed or not — feeds
        // future trend windows). 2. Offer to C7 first.
        self.message_cache.push(&event.identity.channel_id, event.chat_event.clone());
        if let Some(trend) = &self.trend {
            let window = self.message_cache.window(&event.identity.channel_id);
            if let Some(action) = trend.evaluate_message_window(&event.identity.channel_id, &window).await {
                return Outcome::TrendClaimed(action);
            }
        }

        // 3. Collect messages via C1.
        let collect_req = conversation::CollectRequest {
            utterance: event.utterance,
            history: event.history,
            attachments: event.attachments,
        };
        let (messages, summary) = match conversation::collect(collect_req, &self.ctx.collect_limits) {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, code = e.kind().code(), "collect failed");
                observer.on_error(e.kind(), e.to_string()).await;
                return Outcome::Ran;
            }
        };
        info!(
            images = summary.images_included,
            animations = summary.animations_included,
            history_dropped = summary.history_dropped,
            "collected conversation window"
        );

        // 4. Build graph state and register the observer with C4.
        let mut bus = ProgressBus::new(self.ctx.blurb.clone());
        bus.register(transport_key, observer.clone(), &self.ctx.progress_configs);
        let graph_ctx = GraphContext {
            llm: self.ctx.llm.clone(),
            tools: self.ctx.tools.clone(),
            tool_ctx: self.ctx.tool_ctx.clone(),
            bus: Arc::new(bus),
            behavior: self.ctx.behavior.clone(),
            streaming: self.ctx.streaming.clone(),
            persona: self.ctx.persona.clone(),
            available_personas: self.ctx.available_personas.clone(),
            emoji_registry: self.ctx.emoji_registry.clone(),
            guild_id,
        };
        let mut state = GraphState::new(messages, global_metadata);

        // 5. Run C5.
        let run_result = conductor_graph::run(&mut state, &graph_ctx, &cancel).await;

        // 6/7. Success/failure delivery already happened through the bus
        // (Finalize publishes completion, any node error publishes the
        // taxonomy'd error); reminder side effects are scheduled here.
        if let Err(e) = run_result {
            warn!(error = %e, code = e.kind().code(), "graph run failed");
        } else {
            for reminder in state.pending_reminders {
                if let Err(e) = self.scheduler.schedule(reminder) {
                    warn!(error = %e, "failed to schedule reminder side effect");
                }
            }
        }

        let GraphContext { bus, .. } = graph_ctx;
        match Arc::try_unwrap(bus) {
            Ok(bus) => bus.shutdown().await,
            Err(_) => warn!("progress bus still had outstanding references at shutdown"),
        }

        Outcome::Ran
    }

    fn check_permission(&self, identity: &crate::request::Identity) -> Option<Outcome> {
        let check = permission::check(
            &RequestIdentity {
                user_id: &identity.user_id,
                role_ids: &identity.role_ids,
                channel_id: &identity.channel_id,
                is_dm: identity.is_dm,
            },
            &self.ctx.access_control,
        );
        match check {
            PermissionCheck::Allowed => None,
            PermissionCheck::Denied { reason } => Some(Outcome::Denied { reason }),
        }
    }
}

fn denied_message(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Denied { reason } => reason.clone(),
        _ => "request denied".to_string(),
    }
}
