//! Events pushed to observers

use crate::session::{SessionInfo, SessionState, TerminationReason};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// A session transition, as seen by observers
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    /// Agent entered the loop and is blocked for its first instruction
    SessionWaiting {
        session_id: String,
        context: Option<String>,
        created_at: DateTime<Utc>,
    },
    /// Agent reported a result and is blocked again
    TaskCompleted {
        session_id: String,
        context: Option<String>,
    },
    InstructionSent {
        session_id: String,
        instruction: String,
    },
    SessionTerminated {
        session_id: String,
        reason: TerminationReason,
    },
    /// Snapshot of one session, sent to a per-session observer on connect
    SessionState {
        session_id: String,
        state: SessionState,
        context: Option<String>,
        created_at: DateTime<Utc>,
    },
    /// Snapshot of every session, sent to a global observer on connect
    InitialState { sessions: Vec<SessionInfo> },
}

impl ObserverEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ObserverEvent::SessionWaiting { .. } => "session_waiting",
            ObserverEvent::TaskCompleted { .. } => "task_completed",
            ObserverEvent::InstructionSent { .. } => "instruction_sent",
            ObserverEvent::SessionTerminated { .. } => "session_terminated",
            ObserverEvent::SessionState { .. } => "session_state",
            ObserverEvent::InitialState { .. } => "initial_state",
        }
    }

    /// Session this event belongs to, `None` for cross-session snapshots
    pub fn session_id(&self) -> Option<&str> {
        match self {
            ObserverEvent::SessionWaiting { session_id, .. }
            | ObserverEvent::TaskCompleted { session_id, .. }
            | ObserverEvent::InstructionSent { session_id, .. }
            | ObserverEvent::SessionTerminated { session_id, .. }
            | ObserverEvent::SessionState { session_id, .. } => Some(session_id),
            ObserverEvent::InitialState { .. } => None,
        }
    }

    fn data(&self) -> Value {
        match self {
            ObserverEvent::SessionWaiting {
                session_id,
                context,
                created_at,
            } => json!({
                "session_id": session_id,
                "context": context,
                "created_at": created_at,
            }),
            ObserverEvent::TaskCompleted {
                session_id,
                context,
            } => json!({
                "session_id": session_id,
                "context": context,
            }),
            ObserverEvent::InstructionSent { instruction, .. } => json!({
                "instruction": instruction,
            }),
            ObserverEvent::SessionTerminated { reason, .. } => json!({
                "reason": reason,
            }),
            ObserverEvent::SessionState {
                state,
                context,
                created_at,
                ..
            } => json!({
                "state": state,
                "context": context,
                "created_at": created_at,
            }),
            ObserverEvent::InitialState { sessions } => json!({
                "sessions": sessions,
            }),
        }
    }

    /// Wire form: `{"type", "session_id", "data"}`
    pub fn to_json(&self) -> Value {
        let mut envelope = json!({
            "type": self.event_type(),
            "data": self.data(),
        });
        if let Some(session_id) = self.session_id() {
            envelope["session_id"] = json!(session_id);
        }
        envelope
    }

    pub fn to_frame(&self) -> String {
        self.to_json().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_envelope_shape() {
        let event = ObserverEvent::InstructionSent {
            session_id: "s-1".to_string(),
            instruction: "list files".to_string(),
        };

        let wire = event.to_json();
        assert_eq!(wire["type"], "instruction_sent");
        assert_eq!(wire["session_id"], "s-1");
        assert_eq!(wire["data"]["instruction"], "list files");
    }

    #[test]
    fn test_termination_reason_on_wire() {
        let event = ObserverEvent::SessionTerminated {
            session_id: "s-1".to_string(),
            reason: TerminationReason::TapOut,
        };
        assert_eq!(event.to_json()["data"]["reason"], "tap_out");
    }

    #[test]
    fn test_initial_state_has_no_session_id() {
        let event = ObserverEvent::InitialState { sessions: vec![] };
        let wire = event.to_json();

        assert_eq!(wire["type"], "initial_state");
        assert!(wire.get("session_id").is_none());
        assert_eq!(wire["data"]["sessions"], json!([]));
    }

    #[test]
    fn test_frame_is_valid_json() {
        let event = ObserverEvent::SessionState {
            session_id: "s-1".to_string(),
            state: SessionState::Processing,
            context: None,
            created_at: Utc::now(),
        };

        let parsed: Value = serde_json::from_str(&event.to_frame()).unwrap();
        assert_eq!(parsed["data"]["state"], "processing");
        assert_eq!(parsed["data"]["context"], Value::Null);
    }
}
