//! # fixhub-core
//!
//! Shared building blocks for the fixhub pipeline, which turns an LLM agent's
//! tool calls into pull requests against GitHub repositories.
//!
//! ## Contents
//!
//! - [`FixhubError`] and the crate-wide [`Result`] alias
//! - [`FixhubConfig`], loaded from `fixhub.toml` with environment overrides
//! - Request-scoped value types such as [`RepositoryCoordinates`]
//! - The [`AuditSink`] and [`Clock`] seams injected into the services

pub mod audit;
pub mod clock;
pub mod config;
mod error;
mod types;

pub use audit::{AuditEntry, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AgentConfig, FixhubConfig, GithubConfig, SessionConfig, StoreConfig};
pub use error::{FixhubError, Result};
pub use types::*;
