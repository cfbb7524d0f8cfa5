//! API request and response types

use serde::{Deserialize, Serialize};

/// Request from an agent to enter the loop
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EnterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Request from an agent reporting a finished task
#[derive(Debug, Serialize, Deserialize)]
pub struct ContinueRequest {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Request from an operator to hand the agent an instruction
#[derive(Debug, Serialize, Deserialize)]
pub struct InstructRequest {
    pub instruction: String,
}

/// Outcome of an operator action
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Commands an operator may send over an observer WebSocket.
///
/// On a per-session socket `session_id` may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverCommand {
    Instruct {
        #[serde(default)]
        session_id: Option<String>,
        instruction: String,
    },
    TapOut {
        #[serde(default)]
        session_id: Option<String>,
    },
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
