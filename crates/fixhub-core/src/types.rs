//! Request-scoped value types shared across fixhub crates

use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner and name of a GitHub repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryCoordinates {
    pub owner: String,
    pub repo: String,
}

impl RepositoryCoordinates {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parse an `owner/repo` slug
    ///
    /// Environment strings may be sandbox-local names with no repository
    /// behind them, so anything without both parts yields `None`.
    pub fn parse(slug: &str) -> Option<Self> {
        let trimmed = slug.trim();
        if trimmed.is_empty() {
            return None;
        }

        let mut parts = trimmed.split('/');
        let owner = parts.next()?.trim();
        let repo = parts.next()?.trim();
        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        Some(Self::new(owner, repo))
    }

    /// `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepositoryCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A pull request opened for an agent-authored fix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestResult {
    pub number: u64,
    pub html_url: Option<String>,
    /// Branch the fix was pushed to
    pub branch: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slug() {
        let coords = RepositoryCoordinates::parse(" acme/widgets ").unwrap();
        assert_eq!(coords.owner, "acme");
        assert_eq!(coords.repo, "widgets");
        assert_eq!(coords.to_string(), "acme/widgets");
    }

    #[test]
    fn test_parse_invalid_slugs() {
        assert!(RepositoryCoordinates::parse("").is_none());
        assert!(RepositoryCoordinates::parse("   ").is_none());
        assert!(RepositoryCoordinates::parse("sandbox-local").is_none());
        assert!(RepositoryCoordinates::parse("acme/").is_none());
        assert!(RepositoryCoordinates::parse("/widgets").is_none());
    }

    #[test]
    fn test_parse_keeps_first_two_segments() {
        let coords = RepositoryCoordinates::parse("acme/widgets/extra").unwrap();
        assert_eq!(coords.slug(), "acme/widgets");
    }
}
