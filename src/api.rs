//! HTTP and WebSocket API for headlock
//!
//! Agents block on the `/headlock/*` endpoints; operators drive sessions
//! through `/sessions/*` and watch them over `/ws`.

mod handlers;
mod manifest;
mod types;
mod ws;

pub use handlers::create_router;
pub use types::*;

use crate::coordinator::Coordinator;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    /// Outbound buffer per WebSocket observer
    pub sink_buffer: usize,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>, sink_buffer: usize) -> Self {
        Self {
            coordinator,
            sink_buffer,
        }
    }
}
