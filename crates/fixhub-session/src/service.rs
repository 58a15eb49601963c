//! Request-level entry point

use fixhub_core::{Clock, FixhubError, Result, SystemClock};
use fixhub_github::RepositoryContextBuilder;
use std::sync::Arc;
use tracing::info;

use crate::session::{AgentSession, SessionOutcome};
use crate::store::{RequestRecord, RequestStore};

/// Builds repository context, runs the session and keeps the history
pub struct FixService {
    context: RepositoryContextBuilder,
    session: AgentSession,
    store: Arc<dyn RequestStore>,
    clock: Arc<dyn Clock>,
}

impl FixService {
    pub fn new(
        context: RepositoryContextBuilder,
        session: AgentSession,
        store: Arc<dyn RequestStore>,
    ) -> Self {
        Self {
            context,
            session,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run `prompt` against `environment` and persist the rendered result
    pub async fn submit(&self, environment: &str, prompt: &str) -> Result<RequestRecord> {
        self.submit_with_outcome(environment, prompt)
            .await
            .map(|(record, _)| record)
    }

    /// Like [`FixService::submit`], also returning the session outcome
    pub async fn submit_with_outcome(
        &self,
        environment: &str,
        prompt: &str,
    ) -> Result<(RequestRecord, SessionOutcome)> {
        let environment = environment.trim();
        if environment.is_empty() {
            return Err(FixhubError::InvalidInput(
                "An environment (owner/repo) is required".to_string(),
            ));
        }
        if prompt.trim().is_empty() {
            return Err(FixhubError::InvalidInput("A prompt is required".to_string()));
        }

        let repository_context = self.context.build(environment).await;
        let outcome = self
            .session
            .run(prompt, environment, repository_context.as_deref())
            .await?;

        let mut record =
            RequestRecord::new(environment, self.session.model(), prompt, self.clock.now());
        record.response_text = Some(outcome.render_result());
        record.external_id = outcome.turn_id.clone();
        self.store.save(&record)?;

        info!(
            "Request {} for {} finished with {} action(s)",
            record.id,
            environment,
            outcome.actions.len()
        );
        Ok((record, outcome))
    }

    /// Stored requests, newest first
    pub fn history(&self) -> Result<Vec<RequestRecord>> {
        self.store.list_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRequestStore;
    use fixhub_agent::{AgentTurn, ScriptedAgent};
    use fixhub_github::{FixPublisher, MockGithubApi, RepositoryFileService};

    fn service(agent: &ScriptedAgent, github: &MockGithubApi) -> (FixService, Arc<MemoryRequestStore>) {
        let github = Arc::new(github.clone());
        let session = AgentSession::new(
            Arc::new(agent.clone()),
            Arc::new(RepositoryFileService::new(github.clone())),
            Arc::new(FixPublisher::new(github.clone())),
        );
        let store = Arc::new(MemoryRequestStore::new());
        (
            FixService::new(RepositoryContextBuilder::new(github), session, store.clone()),
            store,
        )
    }

    #[tokio::test]
    async fn test_blank_input_rejected() {
        let agent = ScriptedAgent::new();
        let (service, _) = service(&agent, &MockGithubApi::new());

        assert!(matches!(
            service.submit("  ", "Fix").await,
            Err(FixhubError::InvalidInput(_))
        ));
        assert!(matches!(
            service.submit("acme/widgets", "\n").await,
            Err(FixhubError::InvalidInput(_))
        ));
        assert!(agent.requests().is_empty());
    }

    #[tokio::test]
    async fn test_repository_context_is_sent() {
        let github = MockGithubApi::new()
            .with_repository("main", Some("Widget factory"))
            .with_branch("main", "sha")
            .with_file("main", "README.md", "# Widgets");
        let agent = ScriptedAgent::new()
            .with_model("gpt-test")
            .then_turn(AgentTurn::text("Nothing to change").with_id("r1"))
            .then_turn(AgentTurn::text("Nothing to change"));
        let (service, store) = service(&agent, &github);

        let record = service.submit("acme/widgets", "Check the docs").await.unwrap();

        let first = &agent.requests()[0];
        let message = first.last_user_message().unwrap();
        assert!(message.contains("Repository context (read-only):\nacme/widgets"));
        assert!(message.contains("Description: Widget factory"));
        assert!(message.contains("# Widgets"));

        assert_eq!(record.model, "gpt-test");
        assert_eq!(record.response_text.as_deref(), Some("Nothing to change"));
        assert_eq!(record.external_id.as_deref(), Some("r1"));
        assert_eq!(store.list_all().unwrap(), vec![record.clone()]);
        assert_eq!(service.history().unwrap()[0].id, record.id);
    }

    #[tokio::test]
    async fn test_agent_failure_is_not_recorded() {
        let agent = ScriptedAgent::new().then_error(FixhubError::AgentApi("503".to_string()));
        let (service, store) = service(&agent, &MockGithubApi::new());

        assert!(service.submit("acme/widgets", "Fix").await.is_err());
        assert!(store.list_all().unwrap().is_empty());
    }
}
