//! Tools offered to the agent and argument helpers

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Opens a pull request from a unified diff
pub const CREATE_MERGE_REQUEST: &str = "create_merge_request";

/// Asks for a repository file to be shared on the next round
pub const REQUEST_REPOSITORY_FILE: &str = "request_repository_file";

/// Names accepted as a merge request tool call
pub const MERGE_TOOL_ALIASES: [&str; 3] = [CREATE_MERGE_REQUEST, "create_pull_request", "make_pr"];

pub const PATH_ALIASES: [&str; 3] = ["path", "file", "filepath"];
pub const REF_ALIASES: [&str; 3] = ["ref", "branch", "sha"];
pub const BASE_BRANCH_ALIASES: [&str; 3] = ["base_branch", "baseBranch", "base"];
pub const TITLE_ALIASES: [&str; 1] = ["title"];
pub const DIFF_ALIASES: [&str; 3] = ["diff", "patch", "unified_diff"];

/// A function tool in Responses API form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

pub fn is_merge_tool(name: &str) -> bool {
    MERGE_TOOL_ALIASES.contains(&name)
}

pub fn create_merge_request_tool() -> ToolDefinition {
    ToolDefinition::function(
        CREATE_MERGE_REQUEST,
        "Apply a unified diff to a new branch of the repository and open a pull request.",
        json!({
            "type": "object",
            "properties": {
                "base_branch": {"type": "string", "description": "Branch the pull request targets"},
                "title": {"type": "string", "description": "Pull request title"},
                "diff": {"type": "string", "description": "Unified diff with a/ and b/ prefixed paths"}
            },
            "required": ["base_branch", "title", "diff"]
        }),
    )
}

pub fn request_repository_file_tool() -> ToolDefinition {
    ToolDefinition::function(
        REQUEST_REPOSITORY_FILE,
        "Ask for a repository file to be included in the next request.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path relative to the repository root"},
                "ref": {"type": "string", "description": "Branch, tag or commit; defaults to main"}
            },
            "required": ["path"]
        }),
    )
}

/// Every tool sent with a task
pub fn default_tools() -> Vec<ToolDefinition> {
    vec![create_merge_request_tool(), request_repository_file_tool()]
}

/// First alias holding a non-blank value
///
/// Numbers and booleans are rendered as text; objects and arrays never match.
pub fn read_string_argument(arguments: &Value, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| match arguments.get(*alias)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}
