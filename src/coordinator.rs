//! Coordinator tying sessions, rendezvous slots and observers together
//!
//! The agent side calls `enter` / `continue_session`, which block until the
//! operator side calls `send_instruction`, `tap_out`, `complete` or
//! `remove`. Every transition is published to the observer bus.
//!
//! Events are published while the session's slot is locked, so observers
//! of one session see its events in transition order.


use crate::observer::{ObserverBus, ObserverEvent};
use crate::session::{
    Handoff, Session, SessionError, SessionInfo, SessionResult, SessionSlot, SessionState,
    SessionStore, TerminationReason,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// What the agent gets back from a blocking call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadlockResponse {
    pub session_id: String,
    pub instruction: Option<String>,
    #[serde(default)]
    pub should_terminate: bool,
}

impl HeadlockResponse {
    fn from_handoff(session_id: String, handoff: Option<Handoff>) -> Self {
        match handoff {
            Some(Handoff::Instruction(instruction)) => Self {
                session_id,
                instruction: Some(instruction),
                should_terminate: false,
            },
            Some(Handoff::Terminated) => Self {
                session_id,
                instruction: None,
                should_terminate: true,
            },
            // Timed out: nothing yet, the agent is expected to call again
            None => Self {
                session_id,
                instruction: None,
                should_terminate: false,
            },
        }
    }
}

/// Session counts for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    pub active_sessions: usize,
    pub waiting_sessions: usize,
}

pub struct Coordinator {
    store: SessionStore,
    observers: Arc<ObserverBus>,
    /// Bound on how long an agent call blocks; `None` waits until something happens
    wait_timeout: Option<Duration>,
}

impl Coordinator {
    pub fn new(observers: Arc<ObserverBus>) -> Self {
        Self {
            store: SessionStore::new(),
            observers,
            wait_timeout: None,
        }
    }

    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn observers(&self) -> &Arc<ObserverBus> {
        &self.observers
    }

    // ==================== Agent side ====================

    /// Enter the loop and block for an instruction.
    ///
    /// Creates the session when `session_id` is absent or unknown; otherwise
    /// records `context` on the existing one.
    pub async fn enter(
        &self,
        session_id: Option<String>,
        context: Option<String>,
    ) -> HeadlockResponse {
        let announce = |session: &Session| {
            self.observers.publish(&ObserverEvent::SessionWaiting {
                session_id: session.session_id.clone(),
                context: context.clone(),
                created_at: session.created_at,
            });
        };

        let (slot, created) =
            self.store
                .get_or_create_with(session_id.as_deref(), context.clone(), &announce);
        let session_id = slot.with(|s| {
            if !created {
                s.update_context(context.clone());
                announce(&*s);
            }
            s.session_id.clone()
        });
        if created {
            tracing::info!(session_id = %session_id, "Session created");
        }

        self.block(session_id, &slot, self.wait_timeout).await
    }

    /// Report a finished task and block for the next instruction.
    ///
    /// # Errors
    ///
    /// `NotFound` if the session does not exist.
    pub async fn continue_session(
        &self,
        session_id: &str,
        context: Option<String>,
    ) -> SessionResult<HeadlockResponse> {
        let slot = self.store.get(session_id)?;
        slot.with(|s| {
            s.update_context(context.clone());
            self.observers.publish(&ObserverEvent::TaskCompleted {
                session_id: session_id.to_string(),
                context,
            });
        });

        Ok(self
            .block(session_id.to_string(), &slot, self.wait_timeout)
            .await)
    }

    /// Block on an existing session with an explicit bound.
    ///
    /// A timeout yields an empty response and leaves any later delivery in
    /// place for the next call.
    ///
    /// # Errors
    ///
    /// `NotFound` if the session does not exist.
    pub async fn wait_for_instruction(
        &self,
        session_id: &str,
        timeout: Option<Duration>,
    ) -> SessionResult<HeadlockResponse> {
        let slot = self.store.get(session_id)?;
        Ok(self.block(session_id.to_string(), &slot, timeout).await)
    }

    async fn block(
        &self,
        session_id: String,
        slot: &SessionSlot,
        timeout: Option<Duration>,
    ) -> HeadlockResponse {
        tracing::debug!(session_id = %session_id, ?timeout, "Agent waiting for instruction");
        let handoff = slot.wait(timeout, Session::take_handoff).await;

        match &handoff {
            Some(Handoff::Instruction(_)) => {
                tracing::debug!(session_id = %session_id, "Agent picked up instruction");
            }
            Some(Handoff::Terminated) => {
                tracing::info!(session_id = %session_id, "Agent released by termination");
            }
            None => {
                tracing::debug!(session_id = %session_id, "Wait timed out without instruction");
            }
        }

        HeadlockResponse::from_handoff(session_id, handoff)
    }

    // ==================== Operator side ====================

    /// Hand an instruction to the blocked agent.
    ///
    /// # Errors
    ///
    /// `NotFound` if the session does not exist, `InvalidState` if it is not
    /// waiting for input.
    pub fn send_instruction(&self, session_id: &str, instruction: &str) -> SessionResult<()> {
        let slot = self.store.get(session_id)?;
        slot.signal(|s| {
            s.accept_instruction(instruction.to_string())?;
            self.observers.publish(&ObserverEvent::InstructionSent {
                session_id: session_id.to_string(),
                instruction: instruction.to_string(),
            });
            Ok::<_, SessionError>(())
        })?;

        tracing::info!(session_id = %session_id, "Instruction delivered");
        Ok(())
    }

    /// Tap out: end the loop and release the agent.
    ///
    /// # Errors
    ///
    /// `NotFound` if the session does not exist.
    pub fn tap_out(&self, session_id: &str) -> SessionResult<()> {
        let slot = self.store.get(session_id)?;
        slot.signal_all(|s| {
            s.terminate();
            self.publish_terminated(session_id, TerminationReason::TapOut);
        });

        tracing::info!(session_id = %session_id, "Session tapped out");
        Ok(())
    }

    /// Mark the session as gracefully finished and release the agent.
    ///
    /// # Errors
    ///
    /// `NotFound` if the session does not exist.
    pub fn complete(&self, session_id: &str) -> SessionResult<()> {
        let slot = self.store.get(session_id)?;
        slot.signal_all(|s| {
            s.complete();
            self.publish_terminated(session_id, TerminationReason::Completed);
        });

        tracing::info!(session_id = %session_id, "Session completed");
        Ok(())
    }

    /// Forget the session. A still-blocked agent is released as terminated.
    ///
    /// # Errors
    ///
    /// `NotFound` if the session does not exist.
    pub fn remove(&self, session_id: &str) -> SessionResult<()> {
        let slot = self.store.remove(session_id)?;
        slot.signal_all(|s| {
            s.terminate();
            self.publish_terminated(session_id, TerminationReason::Removed);
        });

        tracing::info!(session_id = %session_id, "Session removed");
        Ok(())
    }

    fn publish_terminated(&self, session_id: &str, reason: TerminationReason) {
        self.observers.publish(&ObserverEvent::SessionTerminated {
            session_id: session_id.to_string(),
            reason,
        });
    }

    // ==================== Queries ====================

    /// # Errors
    ///
    /// `NotFound` if the session does not exist.
    pub fn get(&self, session_id: &str) -> SessionResult<SessionInfo> {
        Ok(self.store.get(session_id)?.with(|s| Session::info(s)))
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.store.list()
    }

    pub fn list_waiting(&self) -> Vec<SessionInfo> {
        self.store.list_in_state(SessionState::Waiting)
    }

    pub fn counts(&self) -> SessionCounts {
        SessionCounts {
            active_sessions: self.store.len(),
            waiting_sessions: self.list_waiting().len(),
        }
    }

    /// Snapshot sent to a global observer when it connects
    pub fn initial_state(&self) -> ObserverEvent {
        ObserverEvent::InitialState {
            sessions: self.list(),
        }
    }

    /// Snapshot sent to a per-session observer when it connects
    pub fn session_state(&self, session_id: &str) -> Option<ObserverEvent> {
        let info = self.get(session_id).ok()?;
        Some(ObserverEvent::SessionState {
            session_id: info.session_id,
            state: info.state,
            context: info.context,
            created_at: info.created_at,
        })
    }
}
