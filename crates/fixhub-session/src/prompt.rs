//! Prompt text for agent submissions
//!
//! Every submission is a complete conversation built here: the system prompt,
//! the user message carrying the task, and for the reminder round the agent's
//! earlier prose plus a nudge towards a diff.

use fixhub_agent::{tools, AgentRequest, AgentTurn, ChatMessage};

pub const SYSTEM_PROMPT: &str = "You are the fixhub coding assistant. Use the context of the given \
environment to answer with an objective plan of action. Before proposing any change, look for and \
read the AGENTS.md and README.md files in the repository and follow every instruction they contain. \
When you need to see a repository file, call the request_repository_file tool with its path. When a \
code fix is needed, produce a unified diff and call the create_merge_request tool to open a pull \
request on GitHub for the given environment (owner/repo format).";

const METADATA_SOURCE: &str = "fixhub";

/// User message for a task, with or without repository context
pub fn user_message(task: &str, environment: &str, repository_context: Option<&str>) -> String {
    let mut message = format!("Environment: {}\n\nTask:\n{}", environment, task.trim());

    match repository_context.filter(|c| !c.trim().is_empty()) {
        Some(context) => {
            message.push_str("\n\nRepository context (read-only):\n");
            message.push_str(context.trim());
        }
        None => message.push_str(
            "\n\nRepository context was not loaded; explore the repository starting with \
AGENTS.md and README.md to understand its instructions and structure before suggesting changes.",
        ),
    }
    message
}

/// A fresh conversation for `task`
pub fn task_request(task: &str, environment: &str, repository_context: Option<&str>) -> AgentRequest {
    AgentRequest::new(SYSTEM_PROMPT)
        .with_message(ChatMessage::user(user_message(
            task,
            environment,
            repository_context,
        )))
        .with_tools(tools::default_tools())
        .with_metadata("source", METADATA_SOURCE)
        .with_metadata("environment", environment)
}

pub fn diff_reminder(environment: &str) -> String {
    format!(
        "Your previous answer produced no diff or tool call. Review the requested task and produce \
a unified diff containing only the necessary changes. Then call the create_merge_request tool with \
the fields base_branch (use 'main' if unsure), title and diff. Remember that the diff must apply to \
the repository {}.",
        environment
    )
}

/// `base` followed by the agent's prose (when any) and the diff reminder
pub fn reminder_request(base: &AgentRequest, primary: &AgentTurn, environment: &str) -> AgentRequest {
    let mut request = base.clone();
    if !primary.content().trim().is_empty() {
        request
            .messages
            .push(ChatMessage::assistant(primary.content()));
    }
    request.messages.push(ChatMessage::user(diff_reminder(environment)));
    request
}

/// The task with shared file content appended
pub fn augmented_task(task: &str, appendix: &str) -> String {
    if appendix.trim().is_empty() {
        return task.to_string();
    }
    format!("{}\n\n{}", task.trim_end(), appendix.trim_start())
}

/// Merge the first answer with the answer to the reminder
///
/// Blank halves are dropped and answers equal after trimming are kept once.
pub fn combine_contents(primary: &str, retry: &str) -> String {
    if primary.trim().is_empty() {
        return retry.to_string();
    }
    if retry.trim().is_empty() || primary.trim() == retry.trim() {
        return primary.to_string();
    }
    format!("{}\n\n{}", primary.trim_end(), retry.trim())
}

/// Combine the reminder round into one turn
///
/// The retry's tool calls and id win when present.
pub fn combine_turns(primary: AgentTurn, retry: AgentTurn) -> AgentTurn {
    let content = combine_contents(primary.content(), retry.content());
    AgentTurn {
        id: retry.id.or(primary.id),
        text_content: (!content.is_empty()).then_some(content),
        tool_calls: if retry.tool_calls.is_empty() {
            primary.tool_calls
        } else {
            retry.tool_calls
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixhub_agent::{Role, ToolCall};
    use serde_json::json;

    #[test]
    fn test_user_message_with_context() {
        let message = user_message("  Fix the bug \n", "acme/widgets", Some("\nacme/widgets\nFiles: 3\n"));
        assert_eq!(
            message,
            "Environment: acme/widgets\n\nTask:\nFix the bug\n\nRepository context (read-only):\nacme/widgets\nFiles: 3"
        );
    }

    #[test]
    fn test_user_message_without_context() {
        for context in [None, Some("   ")] {
            let message = user_message("Fix", "acme/widgets", context);
            assert!(message.contains("Repository context was not loaded"));
            assert!(message.contains("AGENTS.md"));
        }
    }

    #[test]
    fn test_task_request() {
        let request = task_request("Fix", "acme/widgets", None);
        assert_eq!(request.system_prompt, SYSTEM_PROMPT);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.tools.len(), 2);
        assert_eq!(request.metadata["source"], "fixhub");
        assert_eq!(request.metadata["environment"], "acme/widgets");
    }

    #[test]
    fn test_reminder_request_appends_prose_and_reminder() {
        let base = task_request("Fix", "acme/widgets", None);

        let with_prose = reminder_request(&base, &AgentTurn::text("I would change x"), "acme/widgets");
        let roles: Vec<Role> = with_prose.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(with_prose.messages[1].content, "I would change x");
        assert!(with_prose.messages[2].content.contains("acme/widgets"));

        let silent = reminder_request(&base, &AgentTurn::text("  "), "acme/widgets");
        assert_eq!(silent.messages.len(), 2);
    }

    #[test]
    fn test_augmented_task() {
        assert_eq!(augmented_task("Fix it  \n", "\n\nFile a\n"), "Fix it\n\nFile a\n");
        assert_eq!(augmented_task("Fix it", "  "), "Fix it");
    }

    #[test]
    fn test_combine_contents() {
        assert_eq!(combine_contents("", "second"), "second");
        assert_eq!(combine_contents("first", "  "), "first");
        assert_eq!(combine_contents("same\n", "  same"), "same\n");
        assert_eq!(combine_contents("first  \n", "\nsecond\n"), "first\n\nsecond");
    }

    #[test]
    fn test_combine_turns_prefers_retry() {
        let call = ToolCall::new("make_pr", json!({"title": "t"}));
        let primary = AgentTurn::text("plan").with_id("r1");
        let retry = AgentTurn::default().with_id("r2").with_tool_call(call.clone());

        let combined = combine_turns(primary, retry);
        assert_eq!(combined.id.as_deref(), Some("r2"));
        assert_eq!(combined.content(), "plan");
        assert_eq!(combined.tool_calls, vec![call]);

        let combined = combine_turns(AgentTurn::text("a").with_id("r1"), AgentTurn::text("b"));
        assert_eq!(combined.id.as_deref(), Some("r1"));
        assert_eq!(combined.content(), "a\n\nb");
    }
}
