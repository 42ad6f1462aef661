//! `EmojiReplyGenerator` for C7's emoji-trend mode: asks the `reflector`
//! role (the cheapest structured-output role available; there is no
//! "trend" role per §4.3) for a short emoji-only reply and trusts the
//! caller to only use it when the trend gate already decided to follow.

use std::sync::Arc;

use async_trait::async_trait;
use conductor_llm::provider::Role as MessageRole;
use conductor_llm::{LlmGateway, Message, Role as GatewayRole, RoleRequest};
use conductor_trend::EmojiReplyGenerator;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct LlmEmojiReplyGenerator {
    gateway: Arc<LlmGateway>,
}

impl LlmEmojiReplyGenerator {
    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl EmojiReplyGenerator for LlmEmojiReplyGenerator {
    async fn generate(&self) -> Option<String> {
        let role_request = RoleRequest {
            system: "Reply with one to three emoji and nothing else. No words, no punctuation.".to_string(),
            messages: vec![Message {
                role: MessageRole::User,
                content: "The channel has been on an emoji-only streak. Join in.".to_string(),
            }],
            raw_messages: None,
            tools: vec![],
        };

        match self.gateway.call(GatewayRole::Reflector, role_request, &CancellationToken::new()).await {
            Ok(response) => Some(response.content),
            Err(e) => {
                warn!(error = %e, "emoji trend reply generation failed, suppressing");
                None
            }
        }
    }
}
