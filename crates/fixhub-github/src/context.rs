//! Read-only repository context for the agent's first turn
//!
//! Collects the slug, default branch, description, file count, README and
//! every `AGENTS.md`. Each piece after the repository metadata is optional;
//! if the metadata itself cannot be read the builder returns `None` and the
//! agent works without context.

use fixhub_core::{RepositoryCoordinates, Result};
use std::sync::Arc;
use tracing::info;

use crate::client::GithubApi;

const README_PATH: &str = "README.md";
const AGENTS_FILE: &str = "AGENTS.md";

pub struct RepositoryContextBuilder {
    github: Arc<dyn GithubApi>,
}

impl RepositoryContextBuilder {
    pub fn new(github: Arc<dyn GithubApi>) -> Self {
        Self { github }
    }

    /// Context text for `environment`, or `None` when it names no reachable repository
    pub async fn build(&self, environment: &str) -> Option<String> {
        let coordinates = RepositoryCoordinates::parse(environment)?;
        match self.build_for(&coordinates).await {
            Ok(context) => Some(context),
            Err(e) => {
                info!(
                    "Could not build repository context for {}: {}",
                    coordinates, e
                );
                None
            }
        }
    }

    async fn build_for(&self, coordinates: &RepositoryCoordinates) -> Result<String> {
        let RepositoryCoordinates { owner, repo } = coordinates;
        let repository = self.github.get_repository(owner, repo).await?;
        let default_branch = repository
            .default_branch
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| "main".to_string());

        let mut context = coordinates.slug();
        context.push_str(&format!("\nDefault branch: {}", default_branch));
        if let Some(description) = repository.description.as_deref().map(str::trim) {
            if !description.is_empty() {
                context.push_str(&format!("\nDescription: {}", description));
            }
        }

        let tree_paths = self.tree_paths(coordinates, &default_branch).await;
        if !tree_paths.is_empty() {
            context.push_str(&format!("\nFiles: {}", tree_paths.len()));
        }

        if let Some(readme) = self.file_text(coordinates, README_PATH, &default_branch).await {
            context.push_str("\n\nREADME contents:\n");
            context.push_str(&readme);
        }

        let agents_paths: Vec<&String> = tree_paths
            .iter()
            .filter(|path| path.ends_with(AGENTS_FILE))
            .collect();
        if !agents_paths.is_empty() {
            context.push_str("\n\nAGENTS.md contents:\n");
            for path in agents_paths {
                if let Some(text) = self.file_text(coordinates, path, &default_branch).await {
                    context.push_str(&format!("\n--- {} ---\n{}", path, text));
                }
            }
        }

        Ok(context)
    }

    async fn tree_paths(&self, coordinates: &RepositoryCoordinates, branch: &str) -> Vec<String> {
        let RepositoryCoordinates { owner, repo } = coordinates;
        let sha = match self.github.get_branch(owner, repo, branch).await {
            Ok(branch_ref) if !branch_ref.sha.trim().is_empty() => branch_ref.sha,
            Ok(_) => return Vec::new(),
            Err(e) => {
                info!("Could not resolve {} on {}: {}", branch, coordinates, e);
                return Vec::new();
            }
        };

        match self.github.get_tree(owner, repo, &sha, true).await {
            Ok(entries) => entries
                .into_iter()
                .map(|entry| entry.path)
                .filter(|path| !path.trim().is_empty())
                .collect(),
            Err(e) => {
                info!("Could not list tree of {}: {}", coordinates, e);
                Vec::new()
            }
        }
    }

    /// Trimmed, non-empty text of a file; failures are logged and skipped
    async fn file_text(
        &self,
        coordinates: &RepositoryCoordinates,
        path: &str,
        branch: &str,
    ) -> Option<String> {
        let RepositoryCoordinates { owner, repo } = coordinates;
        let content = match self.github.get_content(owner, repo, path, branch).await {
            Ok(content) => content,
            Err(e) => {
                info!("Could not read {} from {}: {}", path, coordinates, e);
                return None;
            }
        };

        match content.decoded() {
            Ok(Some(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                info!("Could not decode {} from {}: {}", path, coordinates, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockGithubApi;

    fn builder(github: MockGithubApi) -> RepositoryContextBuilder {
        RepositoryContextBuilder::new(Arc::new(github))
    }

    #[tokio::test]
    async fn test_full_context() {
        let github = MockGithubApi::new()
            .with_repository("main", Some("  Widget factory  "))
            .with_branch("main", "abc123")
            .with_file("main", "README.md", "# Widgets\n\nBuilds widgets.\n")
            .with_file("main", "AGENTS.md", "Run `make test`.\n")
            .with_file("main", "src/lib.rs", "")
            .with_file("main", "web/AGENTS.md", "Use pnpm.\n");

        let context = builder(github).build("acme/widgets").await.unwrap();

        assert_eq!(
            context,
            "acme/widgets\n\
             Default branch: main\n\
             Description: Widget factory\n\
             Files: 4\n\n\
             README contents:\n# Widgets\n\nBuilds widgets.\n\n\
             AGENTS.md contents:\n\n\
             --- AGENTS.md ---\nRun `make test`.\n\
             --- web/AGENTS.md ---\nUse pnpm."
        );
    }

    #[tokio::test]
    async fn test_invalid_environment() {
        let github = MockGithubApi::new().with_repository("main", None);
        assert!(builder(github).build("local-sandbox").await.is_none());
    }

    #[tokio::test]
    async fn test_repository_failure_gives_no_context() {
        let github = MockGithubApi::new().with_failure("get_repository", 404, "Not Found");
        assert!(builder(github).build("acme/widgets").await.is_none());
    }

    #[tokio::test]
    async fn test_partial_context_when_tree_fails() {
        let github = MockGithubApi::new()
            .with_repository("develop", None)
            .with_branch("develop", "abc")
            .with_failure("get_tree", 500, "oops");

        let context = builder(github).build("acme/widgets").await.unwrap();
        assert_eq!(context, "acme/widgets\nDefault branch: develop");
    }
}
