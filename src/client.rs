//! Client used by agents to talk to a headlock server
//!
//! ```no_run
//! # async fn run() -> Result<(), headlock::client::ClientError> {
//! use headlock::client::HeadlockClient;
//!
//! let client = HeadlockClient::new("http://localhost:8765");
//! let mut response = client.enter(None, Some("ready")).await?;
//! while !response.should_terminate {
//!     let result = match &response.instruction {
//!         Some(instruction) => format!("Completed: {instruction}"),
//!         None => String::new(),
//!     };
//!     response = client
//!         .continue_session(&response.session_id, Some(&result))
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::api::{ContinueRequest, EnterRequest, ErrorResponse};
use crate::coordinator::HeadlockResponse;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// Agent-side handle on a headlock server.
///
/// Calls block until the operator acts, so the underlying HTTP client is
/// built without a request timeout.
#[derive(Debug, Clone)]
pub struct HeadlockClient {
    http: reqwest::Client,
    base_url: String,
}

impl HeadlockClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Enter the loop and wait for the first instruction.
    ///
    /// # Errors
    ///
    /// Transport failures and non-success HTTP statuses.
    pub async fn enter(
        &self,
        session_id: Option<&str>,
        context: Option<&str>,
    ) -> Result<HeadlockResponse, ClientError> {
        let request = EnterRequest {
            session_id: session_id.map(String::from),
            context: context.map(String::from),
        };
        self.post("/headlock/enter-headlock", &request).await
    }

    /// Report a result and wait for the next instruction.
    ///
    /// # Errors
    ///
    /// Transport failures and non-success HTTP statuses, including 404 for
    /// an unknown session.
    pub async fn continue_session(
        &self,
        session_id: &str,
        context: Option<&str>,
    ) -> Result<HeadlockResponse, ClientError> {
        let request = ContinueRequest {
            session_id: session_id.to_string(),
            context: context.map(String::from),
        };
        self.post("/headlock/continue-headlock", &request).await
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<HeadlockResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
