//! # fixhub-github
//!
//! Everything fixhub needs from GitHub:
//!
//! - [`TokenSigner`] builds RS256 App JWTs from PKCS#1 or PKCS#8 keys
//! - [`verify_signature`] checks `X-Hub-Signature-256` webhook headers
//! - [`InstallationTokenCache`] trades JWTs for installation tokens and
//!   reuses them until shortly before expiry
//! - [`GithubApi`] is the REST seam, with [`GithubClient`] for the real API
//!   and [`MockGithubApi`] for tests
//! - [`FixPublisher`] turns a unified diff into a branch, commits and a pull
//!   request
//! - [`RepositoryFileService`] and [`RepositoryContextBuilder`] feed file
//!   content and repository context to the agent

mod client;
mod context;
mod files;
mod publisher;
mod signer;
mod token_cache;
mod webhook;

#[cfg(test)]
pub(crate) mod test_keys;

pub use client::{
    BranchRef, ContentUpload, CreatedPullRequest, FileContent, GithubApi, GithubClient,
    GithubTransport, MockGithubApi, NewPullRequest, RepositoryInfo, TreeEntry,
};
pub use context::RepositoryContextBuilder;
pub use files::{RepositoryFile, RepositoryFileService};
pub use publisher::{FixPublisher, FIX_PR_BODY};
pub use signer::{pkcs1_to_pkcs8, AppClaims, PrivateKeySource, TokenSigner};
pub use token_cache::{InstallationTokenCache, MockTokenExchange, SignedToken, TokenExchange};
pub use webhook::{constant_time_eq, signature_header, verify_signature};
