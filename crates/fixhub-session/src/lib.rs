//! # fixhub-session
//!
//! Runs a task through the agent and turns its answer into pull requests.
//!
//! - [`state_machine`]: pure control flow for one session
//! - [`AgentSession`]: the driver that talks to the agent and GitHub
//! - [`FixService`]: context building, session run and request history

mod appendix;
pub mod prompt;
mod service;
mod session;
pub mod state_machine;
mod store;

pub use appendix::{truncate, ContextAppendix};
pub use service::FixService;
pub use session::{ActionSummary, AgentSession, SessionOutcome, SESSION_ACTOR};
pub use state_machine::{Action, Event, State, StopReason, TurnKind};
pub use store::{JsonFileRequestStore, MemoryRequestStore, RequestRecord, RequestStore};
