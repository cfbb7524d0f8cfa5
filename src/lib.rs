//! Headlock - hand a paused agent over to a human operator
//!
//! An agent calls `enter` and blocks. The operator reads its context,
//! sends one instruction, and the agent wakes with it. The agent reports
//! back through `continue` and blocks again, until the operator taps out.

pub mod api;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod observer;
pub mod rendezvous;
pub mod session;
