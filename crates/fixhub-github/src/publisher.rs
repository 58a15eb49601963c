//! Publishes an agent-authored diff as a pull request
//!
//! One call creates a timestamped branch off the base branch, rewrites every
//! file the diff touches, opens the pull request and records an audit entry.
//! GitHub rejections (an existing branch, a stale blob sha) propagate as-is;
//! nothing is retried or renamed.

use fixhub_core::{
    AuditEntry, AuditSink, Clock, PullRequestResult, RepositoryCoordinates, Result, SystemClock,
    TracingAuditSink,
};
use fixhub_patch::FileDiff;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::{ContentUpload, GithubApi, NewPullRequest};

/// Description attached to every fix pull request
pub const FIX_PR_BODY: &str = "Automated fix generated by fixhub from the agent's analysis.";

const AUDIT_ACTION: &str = "create_fix_pr";
const DEFAULT_BRANCH_PREFIX: &str = "fixhub/fix-";

pub struct FixPublisher {
    github: Arc<dyn GithubApi>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    branch_prefix: String,
}

impl FixPublisher {
    pub fn new(github: Arc<dyn GithubApi>) -> Self {
        Self {
            github,
            audit: Arc::new(TracingAuditSink),
            clock: Arc::new(SystemClock),
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_branch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.branch_prefix = prefix.into();
        self
    }

    /// Apply `diff_text` on a new branch and open a pull request into `base_branch`
    pub async fn publish(
        &self,
        actor: &str,
        repository: &RepositoryCoordinates,
        base_branch: &str,
        title: &str,
        diff_text: &str,
    ) -> Result<PullRequestResult> {
        let RepositoryCoordinates { owner, repo } = repository;

        let base_sha = self.github.get_branch(owner, repo, base_branch).await?.sha;
        let branch = format!("{}{}", self.branch_prefix, self.clock.now().timestamp());
        self.github
            .create_branch(owner, repo, &branch, &base_sha)
            .await?;
        info!("Created branch {} from {}@{}", branch, base_branch, base_sha);

        let diff = fixhub_patch::parse(diff_text);
        let message = format!("{} (fixhub)", title);
        for file in &diff {
            if !file.is_resolvable() {
                warn!(
                    old_path = ?file.old_path,
                    "Skipping file diff without a writable path"
                );
                continue;
            }
            self.publish_file(repository, base_branch, &branch, &message, file)
                .await?;
        }

        let created = self
            .github
            .create_pull_request(
                owner,
                repo,
                &NewPullRequest {
                    title: title.to_string(),
                    head: branch.clone(),
                    base: base_branch.to_string(),
                    body: FIX_PR_BODY.to_string(),
                },
            )
            .await?;
        info!("Opened pull request #{} on {}", created.number, repository);

        self.audit.record(
            AuditEntry::new(actor, AUDIT_ACTION, repository.slug(), self.clock.now())
                .with_metadata("branch", branch.clone())
                .with_metadata("title", title),
        );

        Ok(PullRequestResult {
            number: created.number,
            html_url: created.html_url,
            branch,
        })
    }

    async fn publish_file(
        &self,
        repository: &RepositoryCoordinates,
        base_branch: &str,
        branch: &str,
        message: &str,
        file: &FileDiff,
    ) -> Result<()> {
        let RepositoryCoordinates { owner, repo } = repository;
        let path = file.new_path.as_str();

        let (existing, prior_sha) = if file.is_new_file() {
            (None, None)
        } else {
            match self.github.get_content(owner, repo, path, base_branch).await {
                Ok(content) => (content.decoded()?, content.sha),
                Err(e) if e.is_not_found() => {
                    debug!("{} not found on {}, creating it", path, base_branch);
                    (None, None)
                }
                Err(e) => return Err(e),
            }
        };

        let updated = fixhub_patch::apply(existing.as_deref(), file);
        self.github
            .upload_content(
                owner,
                repo,
                &ContentUpload {
                    path: path.to_string(),
                    message: message.to_string(),
                    content: updated,
                    branch: branch.to_string(),
                    sha: prior_sha,
                },
            )
            .await?;
        debug!("Uploaded {} to {}", path, branch);
        Ok(())
    }
}
