//! Conversation records and the in-memory store that owns them
//!
//! A session lives from the first `enter` call until it is explicitly
//! removed. Nothing here is persisted.

mod state;
mod store;

#[cfg(test)]
mod proptests;

pub use state::{Handoff, Session, SessionInfo, SessionState, TerminationReason};
pub use store::{SessionSlot, SessionStore};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session {session_id} is not waiting for input (state: {state})")]
    InvalidState {
        session_id: String,
        state: SessionState,
    },
}

pub type SessionResult<T> = Result<T, SessionError>;
