//! Observer protocol (§4.4): the pluggable interface transport adapters
//! implement. The bus never knows about chat embed shapes — it only calls
//! these five methods in emit order.

use async_trait::async_trait;
use conductor_core::types::{ProgressEvent, Source, StreamingChunk};

#[async_trait]
pub trait ProgressObserver: Send + Sync {
    async fn on_progress(&self, event: ProgressEvent);
    async fn on_streaming_chunk(&self, chunk: StreamingChunk);
    async fn on_streaming_complete(&self);
    async fn on_completion(&self, final_text: String, sources: Vec<Source>);
    async fn on_error(&self, kind: conductor_core::ErrorKind, message: String);
}

/// One event as emitted by the core, before per-observer coalescing.
#[derive(Debug, Clone)]
pub(crate) enum BusEvent {
    Progress(ProgressEvent),
    StreamingChunk(StreamingChunk),
    StreamingComplete,
    Completion {
        final_text: String,
        sources: Vec<Source>,
    },
    Error {
        kind: conductor_core::ErrorKind,
        message: String,
    },
}

impl BusEvent {
    /// Non-critical events (mid-stage progress ticks, non-final chunks) may
    /// be dropped under back-pressure; everything else is strictly
    /// preserved per §5.
    pub(crate) fn is_critical(&self) -> bool {
        match self {
            BusEvent::Progress(_) => false,
            BusEvent::StreamingChunk(c) => c.is_final,
            BusEvent::StreamingComplete => true,
            BusEvent::Completion { .. } => true,
            BusEvent::Error { .. } => true,
        }
    }
}
