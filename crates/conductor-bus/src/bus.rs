//! The progress bus (C4): one worker task per registered observer, each
//! draining its own `ObserverQueue` and applying streaming-chunk
//! coalescing before handing events to the observer's trait methods.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use conductor_core::config::TransportProgressConfig;
use conductor_core::types::{ProgressEvent, ProgressStage, Source, StreamingChunk};
use conductor_core::ErrorKind;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::blurb::BlurbGenerator;
use crate::observer::{BusEvent, ProgressObserver};
use crate::queue::ObserverQueue;

struct Subscriber {
    observer: Arc<dyn ProgressObserver>,
    queue: Arc<ObserverQueue>,
    worker: JoinHandle<()>,
}

/// Default queue depth when a transport has no `progress` config entry.
const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Fans a single stream of core events out to every registered observer.
/// Each observer gets its own bounded queue and coalescing window so one
/// slow Discord channel can't stall another transport or the core itself.
pub struct ProgressBus {
    subscribers: Vec<Subscriber>,
    blurb: Option<Arc<BlurbGenerator>>,
}

impl ProgressBus {
    pub fn new(blurb: Option<Arc<BlurbGenerator>>) -> Self {
        Self {
            subscribers: Vec::new(),
            blurb,
        }
    }

    /// Register an observer before the graph runs. `transport_key` looks up
    /// this observer's coalescing config in `progress_configs` (falling back
    /// to defaults when absent, e.g. for the CLI tester transport).
    pub fn register(
        &mut self,
        transport_key: &str,
        observer: Arc<dyn ProgressObserver>,
        progress_configs: &HashMap<String, TransportProgressConfig>,
    ) {
        let cfg = progress_configs.get(transport_key).cloned().unwrap_or(TransportProgressConfig {
            update_interval_ms: 500,
            use_embeds: false,
            cleanup_delay_secs: 5,
            auto_generate_messages: false,
            messages: HashMap::new(),
            max_chunk_chars: 400,
        });
        let queue = Arc::new(ObserverQueue::new(DEFAULT_QUEUE_CAPACITY));
        let worker = tokio::spawn(run_worker(queue.clone(), observer.clone(), cfg, self.blurb.clone()));
        self.subscribers.push(Subscriber { observer, queue, worker });
    }

    pub fn publish_progress(&self, event: ProgressEvent) {
        self.push(BusEvent::Progress(event));
    }

    pub fn publish_chunk(&self, chunk: StreamingChunk) {
        self.push(BusEvent::StreamingChunk(chunk));
    }

    pub fn publish_streaming_complete(&self) {
        self.push(BusEvent::StreamingComplete);
    }

    pub fn publish_completion(&self, final_text: String, sources: Vec<Source>) {
        self.push(BusEvent::Completion { final_text, sources });
    }

    pub fn publish_error(&self, kind: ErrorKind, message: String) {
        self.push(BusEvent::Error { kind, message });
    }

    fn push(&self, event: BusEvent) {
        for sub in &self.subscribers {
            sub.queue.push(event.clone());
        }
    }

    /// Close every observer's queue and wait for its worker to drain and
    /// exit. Call once the graph run (success or failure) has finished
    /// emitting events.
    pub async fn shutdown(self) {
        for sub in &self.subscribers {
            sub.queue.close();
        }
        for sub in self.subscribers {
            let _ = sub.worker.await;
        }
    }

    pub fn observer_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Per-observer delivery loop: pulls events off the queue, coalesces
/// consecutive non-final streaming chunks up to the configured interval or
/// size, and flushes any pending buffer before a non-chunk event so
/// per-observer ordering is preserved.
async fn run_worker(
    queue: Arc<ObserverQueue>,
    observer: Arc<dyn ProgressObserver>,
    cfg: TransportProgressConfig,
    blurb: Option<Arc<BlurbGenerator>>,
) {
    let interval = Duration::from_millis(cfg.update_interval_ms.max(1));
    let mut pending = String::new();

    loop {
        let next = timeout(interval, queue.pop()).await;
        match next {
            Ok(Some(event)) => {
                if let BusEvent::StreamingChunk(chunk) = &event {
                    if !chunk.is_final {
                        pending.push_str(&chunk.content);
                        if pending.chars().count() < cfg.max_chunk_chars {
                            continue;
                        }
                        flush_chunk(&observer, &mut pending, false).await;
                        continue;
                    }
                    // Final chunk: flush any buffered content first, then the
                    // final piece, to preserve ordering without ever merging
                    // past the final boundary.
                    if !pending.is_empty() {
                        flush_chunk(&observer, &mut pending, false).await;
                    }
                    observer
                        .on_streaming_chunk(StreamingChunk {
                            content: chunk.content.clone(),
                            is_final: true,
                        })
                        .await;
                    continue;
                }

                if !pending.is_empty() {
                    flush_chunk(&observer, &mut pending, false).await;
                }
                deliver_non_chunk(&observer, event, &blurb).await;
            }
            Ok(None) => {
                if !pending.is_empty() {
                    flush_chunk(&observer, &mut pending, false).await;
                }
                return;
            }
            Err(_elapsed) => {
                // Interval expired with no terminating event; flush whatever
                // has accumulated so the observer isn't left silent.
                if !pending.is_empty() {
                    flush_chunk(&observer, &mut pending, true).await;
                }
            }
        }
    }
}

async fn flush_chunk(observer: &Arc<dyn ProgressObserver>, pending: &mut String, _overdue: bool) {
    let content = std::mem::take(pending);
    observer
        .on_streaming_chunk(StreamingChunk {
            content,
            is_final: false,
        })
        .await;
}

async fn deliver_non_chunk(observer: &Arc<dyn ProgressObserver>, event: BusEvent, blurb: &Option<Arc<BlurbGenerator>>) {
    match event {
        BusEvent::Progress(mut progress) => {
            if progress.message.is_empty() {
                if let Some(gen) = blurb {
                    progress.message = gen.resolve(progress.stage, "").await;
                } else {
                    progress.message = default_stage_message(progress.stage);
                }
            }
            observer.on_progress(progress).await;
        }
        BusEvent::StreamingComplete => observer.on_streaming_complete().await,
        BusEvent::Completion { final_text, sources } => observer.on_completion(final_text, sources).await,
        BusEvent::Error { kind, message } => observer.on_error(kind, message).await,
        BusEvent::StreamingChunk(_) => unreachable!("chunks are handled before reaching deliver_non_chunk"),
    }
}

fn default_stage_message(stage: ProgressStage) -> String {
    match stage {
        ProgressStage::Starting => "Starting…",
        ProgressStage::GenerateQuery => "Thinking…",
        ProgressStage::ToolStatus => "Running tools…",
        ProgressStage::Searching => "Searching…",
        ProgressStage::Analyzing => "Analyzing…",
        ProgressStage::Reflection => "Checking…",
        ProgressStage::FinalizeAnswer => "Writing…",
        ProgressStage::Streaming => "Writing…",
        ProgressStage::Completed => "Done",
        ProgressStage::Error => "Error",
        ProgressStage::Timeout => "Still working…",
        ProgressStage::ToolExecution => "Running tools…",
    }
    .to_string()
}
