//! Drives one task through the agent
//!
//! The driver owns all I/O: it submits requests, fetches the files the agent
//! asks for and executes the final tool calls. Control flow lives in
//! [`crate::state_machine`]; every agent turn and fetch result becomes an
//! event and the returned actions are carried out in order.

use fixhub_agent::tools::{
    self, BASE_BRANCH_ALIASES, DIFF_ALIASES, PATH_ALIASES, REF_ALIASES, TITLE_ALIASES,
};
use fixhub_agent::{AgentApi, AgentRequest, AgentTurn, ToolCall};
use fixhub_core::{FixhubError, RepositoryCoordinates, Result, SessionConfig};
use fixhub_github::{FixPublisher, RepositoryFile, RepositoryFileService};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::appendix::ContextAppendix;
use crate::prompt;
use crate::state_machine::{transition_with_limit, Action, Event, State, StopReason, TurnKind};

/// Actor recorded for pull requests the session opens
pub const SESSION_ACTOR: &str = "fixhub";

const ACTIONS_HEADING: &str = "Actions executed automatically:";

/// One executed tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub tool: String,
    pub success: bool,
    pub message: String,
}

/// What a session produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub turn_id: Option<String>,
    pub content: String,
    /// One line per requested file, fetched or not
    pub file_notes: Vec<String>,
    pub actions: Vec<ActionSummary>,
    pub stop_reason: StopReason,
    /// Agent round trips
    pub rounds: usize,
}

impl SessionOutcome {
    /// Agent text followed by the automatic action lines, if any
    pub fn render_result(&self) -> String {
        let lines: Vec<String> = self
            .file_notes
            .iter()
            .chain(self.actions.iter().map(|a| &a.message))
            .filter(|line| !line.trim().is_empty())
            .map(|line| format!("- {}", line.trim()))
            .collect();

        if lines.is_empty() {
            return self.content.clone();
        }

        let mut rendered = String::new();
        if !self.content.trim().is_empty() {
            rendered.push_str(self.content.trim_end());
            rendered.push_str("\n\n");
        }
        rendered.push_str(ACTIONS_HEADING);
        rendered.push('\n');
        rendered.push_str(&lines.join("\n"));
        rendered
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileRequest {
    path: String,
    git_ref: Option<String>,
}

/// Mutable state of one run, separate from the control state
struct Run<'a> {
    task: &'a str,
    environment: &'a str,
    repository_context: Option<&'a str>,
    request: AgentRequest,
    turn: AgentTurn,
    appendix: ContextAppendix,
    file_notes: Vec<String>,
    actions: Vec<ActionSummary>,
    rounds: usize,
}

pub struct AgentSession {
    agent: Arc<dyn AgentApi>,
    files: Arc<RepositoryFileService>,
    publisher: Arc<FixPublisher>,
    config: SessionConfig,
}

impl AgentSession {
    pub fn new(
        agent: Arc<dyn AgentApi>,
        files: Arc<RepositoryFileService>,
        publisher: Arc<FixPublisher>,
    ) -> Self {
        Self {
            agent,
            files,
            publisher,
            config: SessionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Model used for every round trip
    pub fn model(&self) -> &str {
        self.agent.model()
    }

    /// Run `task` against `environment` until the agent settles
    ///
    /// Agent failures abort the run. File fetch and publishing failures end up
    /// as notes in the outcome instead.
    #[instrument(skip(self, task, repository_context), fields(model = %self.agent.model()))]
    pub async fn run(
        &self,
        task: &str,
        environment: &str,
        repository_context: Option<&str>,
    ) -> Result<SessionOutcome> {
        let request = prompt::task_request(task, environment, repository_context);
        let turn = self.agent.submit(&request).await?;

        let mut run = Run {
            task,
            environment,
            repository_context,
            request,
            turn,
            appendix: ContextAppendix::new(
                self.config.max_appended_context_chars,
                self.config.max_file_content_chars,
            ),
            file_notes: Vec::new(),
            actions: Vec::new(),
            rounds: 1,
        };

        let mut state = State::Submitted;
        let mut events = VecDeque::from([Event::TaskSent, Event::Turn(classify(&run.turn))]);

        while let Some(event) = events.pop_front() {
            let (next, actions) =
                transition_with_limit(state, event, self.config.max_file_request_cycles);
            state = next;
            if state.is_terminal() {
                debug!("Session reached {:?}", state);
            }

            for action in actions {
                match self.perform(action, &mut run).await {
                    Ok(Some(event)) => events.push_back(event),
                    Ok(None) => {}
                    Err(e) => {
                        let (failed, _) = transition_with_limit(
                            state,
                            Event::Error {
                                message: e.to_string(),
                            },
                            self.config.max_file_request_cycles,
                        );
                        debug!("Session ended in {:?}", failed);
                        return Err(e);
                    }
                }
            }
        }

        match state {
            State::Resolved { reason } => {
                info!(
                    "Session resolved ({:?}) after {} round(s), {} action(s)",
                    reason,
                    run.rounds,
                    run.actions.len()
                );
                Ok(SessionOutcome {
                    turn_id: run.turn.id.clone(),
                    content: run.turn.content().to_string(),
                    file_notes: run.file_notes,
                    actions: run.actions,
                    stop_reason: reason,
                    rounds: run.rounds,
                })
            }
            State::Failed { error } => Err(FixhubError::Session(error)),
            other => Err(FixhubError::Session(format!(
                "Session stopped in non-terminal state {:?}",
                other
            ))),
        }
    }

    async fn perform(&self, action: Action, run: &mut Run<'_>) -> Result<Option<Event>> {
        match action {
            Action::LogActivity { message } => {
                info!("{}", message);
                Ok(None)
            }

            Action::FetchFiles { cycle } => {
                let requests = file_requests(&run.turn);
                let fetched = self.fetch_files(run, &requests).await;
                if fetched.is_empty() {
                    warn!(
                        "Agent requested {} file(s) but none could be loaded",
                        requests.len()
                    );
                }
                let appended = run.appendix.push_files(&fetched);
                debug!("File round {}: {} fetched, appended={}", cycle, fetched.len(), appended);
                Ok(Some(Event::FilesAppended { appended }))
            }

            Action::ResubmitWithFiles { cycle } => {
                let task = prompt::augmented_task(run.task, run.appendix.as_str());
                info!(
                    "Resubmitting task with shared files (attempt {})",
                    cycle + 1
                );
                run.request =
                    prompt::task_request(&task, run.environment, run.repository_context);
                run.turn = self.agent.submit(&run.request).await?;
                run.rounds += 1;
                Ok(Some(Event::Turn(classify(&run.turn))))
            }

            Action::SendReminder => {
                let reminder = prompt::reminder_request(&run.request, &run.turn, run.environment);
                let retry = self.agent.submit(&reminder).await?;
                run.rounds += 1;
                let primary = std::mem::take(&mut run.turn);
                run.turn = prompt::combine_turns(primary, retry);
                Ok(Some(Event::Turn(classify(&run.turn))))
            }

            Action::ExecuteToolCalls => {
                for call in &run.turn.tool_calls {
                    if let Some(summary) = self.execute_tool_call(run.environment, call).await {
                        run.actions.push(summary);
                    }
                }
                Ok(None)
            }
        }
    }

    async fn fetch_files(&self, run: &mut Run<'_>, requests: &[FileRequest]) -> Vec<RepositoryFile> {
        let mut fetched = Vec::new();
        for request in requests {
            match self
                .files
                .fetch_file(run.environment, &request.path, request.git_ref.as_deref())
                .await
            {
                Ok(file) => {
                    run.file_notes.push(format!(
                        "File {} (@{}) shared automatically with the agent.",
                        file.path, file.git_ref
                    ));
                    fetched.push(file);
                }
                Err(e) => {
                    warn!("Failed to fetch {} requested by the agent: {}", request.path, e);
                    run.file_notes
                        .push(format!("Failed to load file {}: {}", request.path, e));
                }
            }
        }
        fetched
    }

    async fn execute_tool_call(&self, environment: &str, call: &ToolCall) -> Option<ActionSummary> {
        if tools::is_merge_tool(&call.name) {
            let (success, message) = self.open_merge_request(environment, &call.arguments).await;
            return Some(ActionSummary {
                tool: call.name.clone(),
                success,
                message,
            });
        }
        if call.name == tools::REQUEST_REPOSITORY_FILE {
            debug!("Ignoring file request left in the final turn");
        } else {
            warn!("Unsupported tool call from agent: {}", call.name);
        }
        None
    }

    async fn open_merge_request(
        &self,
        environment: &str,
        arguments: &serde_json::Value,
    ) -> (bool, String) {
        let Some(coordinates) = RepositoryCoordinates::parse(environment) else {
            warn!("Cannot derive owner/repo from environment {}", environment);
            return failure("invalid environment.");
        };
        if !arguments.is_object() {
            warn!("Merge request tool call without arguments");
            return failure("missing parameters.");
        }

        let Some(diff) = tools::read_string_argument(arguments, &DIFF_ALIASES) else {
            warn!("Merge request tool call without a diff");
            return failure("diff not provided.");
        };
        let Some(title) = tools::read_string_argument(arguments, &TITLE_ALIASES) else {
            warn!("Merge request tool call without a title");
            return failure("title not provided.");
        };
        let base_branch = tools::read_string_argument(arguments, &BASE_BRANCH_ALIASES)
            .unwrap_or_else(|| self.config.default_branch.clone());

        match self
            .publisher
            .publish(SESSION_ACTOR, &coordinates, &base_branch, &title, &diff)
            .await
        {
            Ok(pr) => {
                let message = match pr.html_url.as_deref().filter(|u| !u.trim().is_empty()) {
                    Some(url) => format!("Merge request created successfully: {}", url),
                    None => format!("Merge request #{} created successfully.", pr.number),
                };
                (true, message)
            }
            Err(e) => {
                tracing::error!("Failed to open merge request for {}: {}", coordinates, e);
                failure(&e.to_string())
            }
        }
    }
}

fn failure(reason: &str) -> (bool, String) {
    (false, format!("Failed to open merge request: {}", reason))
}

fn file_requests(turn: &AgentTurn) -> Vec<FileRequest> {
    turn.tool_calls
        .iter()
        .filter(|call| call.name == tools::REQUEST_REPOSITORY_FILE)
        .filter_map(|call| {
            let path = tools::read_string_argument(&call.arguments, &PATH_ALIASES)
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty());
            let Some(path) = path else {
                warn!("Ignoring file request without a path");
                return None;
            };
            Some(FileRequest {
                path,
                git_ref: tools::read_string_argument(&call.arguments, &REF_ALIASES),
            })
        })
        .collect()
}

fn classify(turn: &AgentTurn) -> TurnKind {
    let requests = file_requests(turn).len();
    if requests > 0 {
        TurnKind::FileRequests { count: requests }
    } else if turn.has_tool_calls() {
        TurnKind::ToolCalls {
            count: turn.tool_calls.len(),
        }
    } else {
        TurnKind::NoToolCalls
    }
}
