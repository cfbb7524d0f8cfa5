//! Session state types

use super::{SessionError, SessionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a session is in the agent/operator loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Agent is blocked waiting for an instruction
    Waiting,
    /// Agent received an instruction and is working on it
    Processing,
    /// Session ended normally
    Completed,
    /// Operator tapped out
    Terminated,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Waiting => "waiting",
            SessionState::Processing => "processing",
            SessionState::Completed => "completed",
            SessionState::Terminated => "terminated",
        }
    }

    /// Terminal states are never left again
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Terminated)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session stopped accepting instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    TapOut,
    Completed,
    Removed,
}

/// What a blocked agent receives when it wakes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handoff {
    Instruction(String),
    Terminated,
}

/// A single agent/operator conversation
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub state: SessionState,
    /// Latest context reported by the agent
    pub context: Option<String>,
    /// Latest task result reported by the agent
    pub last_response: Option<String>,
    /// Instruction written by the operator, not yet picked up
    pub pending_instruction: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, context: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            state: SessionState::Waiting,
            context,
            last_response: None,
            pending_instruction: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Record the agent's latest context and re-arm for the next instruction.
    ///
    /// A session that already reached a terminal state keeps it, so a
    /// `continue` racing a tap-out still sees the tap-out.
    pub fn update_context(&mut self, context: Option<String>) {
        self.last_response.clone_from(&context);
        self.context = context;
        if !self.state.is_terminal() {
            self.state = SessionState::Waiting;
        }
        self.touch();
    }

    /// Stage an instruction for the blocked agent (last write wins)
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the session is `Waiting`.
    pub fn accept_instruction(&mut self, instruction: String) -> SessionResult<()> {
        if self.state != SessionState::Waiting {
            return Err(SessionError::InvalidState {
                session_id: self.session_id.clone(),
                state: self.state,
            });
        }
        self.pending_instruction = Some(instruction);
        self.touch();
        Ok(())
    }

    pub fn terminate(&mut self) {
        self.state = SessionState::Terminated;
        self.touch();
    }

    /// Mark the session as completed. A tap-out is final and is not overridden.
    pub fn complete(&mut self) {
        if self.state != SessionState::Terminated {
            self.state = SessionState::Completed;
            self.touch();
        }
    }

    /// Consume whatever the blocked agent should wake up with.
    ///
    /// Termination wins over a pending instruction, and the stale
    /// instruction is discarded.
    pub fn take_handoff(&mut self) -> Option<Handoff> {
        if self.state.is_terminal() {
            self.pending_instruction = None;
            return Some(Handoff::Terminated);
        }

        let instruction = self.pending_instruction.take()?;
        self.state = SessionState::Processing;
        self.touch();
        Some(Handoff::Instruction(instruction))
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            state: self.state,
            context: self.context.clone(),
            last_response: self.last_response.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Snapshot of a session, as exposed to operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub state: SessionState,
    pub context: Option<String>,
    pub last_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
