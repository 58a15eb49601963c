//! Single-file fetches on behalf of the agent

use fixhub_core::{FixhubError, RepositoryCoordinates, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::client::GithubApi;

const DEFAULT_REF: &str = "main";

/// A decoded repository file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFile {
    pub path: String,
    pub git_ref: String,
    pub sha: Option<String>,
    pub size: u64,
    pub content: Option<String>,
}

/// Fetches and decodes files from the repository an environment names
pub struct RepositoryFileService {
    github: Arc<dyn GithubApi>,
    default_ref: String,
}

impl RepositoryFileService {
    pub fn new(github: Arc<dyn GithubApi>) -> Self {
        Self {
            github,
            default_ref: DEFAULT_REF.to_string(),
        }
    }

    pub fn with_default_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.default_ref = git_ref.into();
        self
    }

    /// Fetch `path` at `git_ref` (the default ref when blank)
    ///
    /// Invalid environments, blank paths and directories are
    /// [`FixhubError::InvalidInput`]; a missing file is [`FixhubError::NotFound`].
    pub async fn fetch_file(
        &self,
        environment: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<RepositoryFile> {
        let coordinates = RepositoryCoordinates::parse(environment).ok_or_else(|| {
            FixhubError::InvalidInput(format!(
                "Invalid environment '{}'; expected owner/repo",
                environment
            ))
        })?;

        let path = path.trim();
        if path.is_empty() {
            return Err(FixhubError::InvalidInput(
                "Provide the full path of a file in the repository".to_string(),
            ));
        }

        let git_ref = git_ref
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(self.default_ref.as_str());

        let content = self
            .github
            .get_content(&coordinates.owner, &coordinates.repo, path, git_ref)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    FixhubError::NotFound(format!("{} does not exist at {}", path, git_ref))
                } else {
                    tracing::warn!("Failed to fetch {} from {}: {}", path, coordinates, e);
                    e
                }
            })?;

        Ok(RepositoryFile {
            path: path.to_string(),
            git_ref: git_ref.to_string(),
            sha: content.sha.clone(),
            size: content.size,
            content: content.decoded()?,
        })
    }
}
