//! Observability utilities.

mod subscriber;
mod wide_events;

pub use subscriber::{init_tracing, LogFormat};
pub use wide_events::WideEventEmitter;
