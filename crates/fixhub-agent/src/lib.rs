//! # fixhub-agent
//!
//! Client side of the agent protocol.
//!
//! A request is a system prompt, a fresh list of chat messages, the tool
//! definitions and some metadata. The response's `output` array is reduced to
//! an [`AgentTurn`]: the joined text segments plus every recognisable tool
//! call. Tool-call arguments arrive either as JSON objects or as JSON-encoded
//! strings and are normalised once, in [`ToolArguments::normalize`].
//!
//! No retries happen here; the session decides when to ask again.

mod client;
mod response;
pub mod tools;
mod types;

pub use client::{AgentApi, ResponsesClient, ScriptedAgent};
pub use response::parse_response;
pub use tools::ToolDefinition;
pub use types::*;
