//! Progress bus (C4): per-observer fan-out of core progress/streaming
//! events with bounded queues, drop-oldest back-pressure for non-critical
//! events, streaming-chunk coalescing, and auto-generated progress blurbs.

mod blurb;
mod bus;
mod observer;
mod queue;

pub use blurb::BlurbGenerator;
pub use bus::ProgressBus;
pub use observer::ProgressObserver;
