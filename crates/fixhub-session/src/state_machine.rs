//! Pure state machine for the agent session
//!
//! `transition(state, event) -> (state, actions)` performs no I/O. The driver
//! in [`crate::session`] executes the actions and feeds back the events they
//! produce. Invalid transitions go to `Failed`; nothing here panics.

/// How many file-request rounds are honoured by default
pub const DEFAULT_MAX_CYCLES: usize = 3;

/// What the latest agent turn asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// At least one usable `request_repository_file` call
    FileRequests { count: usize },
    /// Tool calls, none of them a usable file request
    ToolCalls { count: usize },
    /// Prose only
    NoToolCalls,
}

/// Why a session stopped talking to the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ToolCallReceived,
    CycleLimitReached,
    NoFilesLoaded,
    ReminderAnswered,
}

/// Session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Nothing sent yet
    Submitted,
    /// Waiting on the agent after round `cycle` of file sharing
    AwaitingToolCall { cycle: usize },
    /// Fetching the files requested in round `cycle`
    FileFetchRetry { cycle: usize },
    /// Reminder sent after a turn without tool calls
    DiffReminderRetry,
    /// Done; the last turn's tool calls get executed
    Resolved { reason: StopReason },
    /// Failed with error
    Failed { error: String },
}

/// Events fed back by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The initial task reached the agent
    TaskSent,
    /// The agent answered
    Turn(TurnKind),
    /// Requested files were fetched; `appended` is false when nothing could
    /// be added to the prompt
    FilesAppended { appended: bool },
    /// A collaborator failed
    Error { message: String },
}

/// Side effects for the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FetchFiles { cycle: usize },
    ResubmitWithFiles { cycle: usize },
    SendReminder,
    ExecuteToolCalls,
    LogActivity { message: String },
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Resolved { .. } | State::Failed { .. })
    }
}

/// Transition with the default file-request cycle limit
pub fn transition(state: State, event: Event) -> (State, Vec<Action>) {
    transition_with_limit(state, event, DEFAULT_MAX_CYCLES)
}

/// Pure state transition function
///
/// `max_cycles` bounds how many times requested files are fetched and the
/// task resubmitted. The diff reminder is only reachable from
/// `AwaitingToolCall` and always resolves, so it is sent at most once.
pub fn transition_with_limit(state: State, event: Event, max_cycles: usize) -> (State, Vec<Action>) {
    match (state, event) {
        (State::Submitted, Event::TaskSent) => (
            State::AwaitingToolCall { cycle: 0 },
            vec![Action::LogActivity {
                message: "Task submitted to agent".to_string(),
            }],
        ),

        (State::AwaitingToolCall { cycle }, Event::Turn(TurnKind::FileRequests { count })) => {
            if cycle < max_cycles {
                let next = cycle + 1;
                (
                    State::FileFetchRetry { cycle: next },
                    vec![
                        Action::LogActivity {
                            message: format!("Agent requested {} file(s), round {}", count, next),
                        },
                        Action::FetchFiles { cycle: next },
                    ],
                )
            } else {
                resolved(
                    StopReason::CycleLimitReached,
                    format!("File request limit ({}) reached", max_cycles),
                )
            }
        }

        (State::AwaitingToolCall { .. }, Event::Turn(TurnKind::ToolCalls { count })) => resolved(
            StopReason::ToolCallReceived,
            format!("Agent returned {} tool call(s)", count),
        ),

        (State::AwaitingToolCall { .. }, Event::Turn(TurnKind::NoToolCalls)) => (
            State::DiffReminderRetry,
            vec![
                Action::LogActivity {
                    message: "Agent answered without tool calls, sending diff reminder".to_string(),
                },
                Action::SendReminder,
            ],
        ),

        (State::FileFetchRetry { cycle }, Event::FilesAppended { appended: true }) => (
            State::AwaitingToolCall { cycle },
            vec![Action::ResubmitWithFiles { cycle }],
        ),

        (State::FileFetchRetry { .. }, Event::FilesAppended { appended: false }) => resolved(
            StopReason::NoFilesLoaded,
            "No requested file could be shared, keeping current answer".to_string(),
        ),

        (State::DiffReminderRetry, Event::Turn(kind)) => resolved(
            StopReason::ReminderAnswered,
            format!("Agent answered the reminder ({:?})", kind),
        ),

        // Error events from any non-terminal state
        (State::Submitted, Event::Error { message })
        | (State::AwaitingToolCall { .. }, Event::Error { message })
        | (State::FileFetchRetry { .. }, Event::Error { message })
        | (State::DiffReminderRetry, Event::Error { message }) => {
            let actions = vec![Action::LogActivity {
                message: format!("Error: {}", message),
            }];
            (State::Failed { error: message }, actions)
        }

        (State::Failed { error }, event) => (
            State::Failed {
                error: format!(
                    "Invalid transition from Failed state (error: {}) on event: {:?}",
                    error, event
                ),
            },
            vec![],
        ),

        // All other invalid transitions, including anything after Resolved
        (state, event) => (
            State::Failed {
                error: format!(
                    "Invalid state transition: {:?} cannot handle event {:?}",
                    state, event
                ),
            },
            vec![],
        ),
    }
}

fn resolved(reason: StopReason, message: String) -> (State, Vec<Action>) {
    (
        State::Resolved { reason },
        vec![Action::LogActivity { message }, Action::ExecuteToolCalls],
    )
}
