//! Background work that runs outside the request path.
//!
//! - `BackgroundQueue`: cloneable, non-blocking submission side
//! - `BackgroundQueueHandle`: start/drain/shutdown lifecycle and stats

pub mod executor;

pub use executor::{BackgroundQueue, BackgroundQueueConfig, BackgroundQueueHandle, QueueError, QueueStats};
