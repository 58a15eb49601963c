//! Agent request and turn types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::ToolDefinition;

/// Chat roles understood by the agent API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One input message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything sent to the agent in one round trip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub metadata: Map<String, Value>,
}

impl AgentRequest {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// All messages with the system prompt first
    pub fn input(&self) -> Vec<ChatMessage> {
        let mut input = Vec::with_capacity(self.messages.len() + 1);
        input.push(ChatMessage::system(self.system_prompt.clone()));
        input.extend(self.messages.iter().cloned());
        input
    }

    /// Responses API body for `model`
    pub fn to_body(&self, model: &str) -> Value {
        serde_json::json!({
            "model": model,
            "input": self.input(),
            "metadata": self.metadata,
            "tools": self.tools,
        })
    }

    /// Last user message, which carries the task
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// A tool invocation requested by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Tool-call arguments as they arrive on the wire
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    /// A JSON document encoded as a string
    Encoded(String),
    /// Already structured
    Structured(Value),
}

impl ToolArguments {
    /// Structured arguments, or `None` when absent or unparsable
    pub fn normalize(self) -> Option<Value> {
        match self {
            ToolArguments::Structured(Value::Null) => None,
            ToolArguments::Structured(value) => Some(value),
            ToolArguments::Encoded(text) if text.trim().is_empty() => None,
            ToolArguments::Encoded(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Null) => None,
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("Could not parse tool call arguments: {}", e);
                    None
                }
            },
        }
    }
}

impl From<Value> for ToolArguments {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ToolArguments::Encoded(text),
            other => ToolArguments::Structured(other),
        }
    }
}

/// One agent response reduced to text and tool calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentTurn {
    pub id: Option<String>,
    pub text_content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl AgentTurn {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            text_content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    /// Text content, empty when the agent only called tools
    pub fn content(&self) -> &str {
        self.text_content.as_deref().unwrap_or_default()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_object_arguments() {
        let args: ToolArguments = serde_json::from_value(json!({"path": "src/a.rs"})).unwrap();
        assert_eq!(args.normalize(), Some(json!({"path": "src/a.rs"})));
    }

    #[test]
    fn test_normalize_encoded_arguments() {
        let args: ToolArguments =
            serde_json::from_value(json!("{\"title\":\"Fix\",\"diff\":\"--- a\"}")).unwrap();
        assert!(matches!(args, ToolArguments::Encoded(_)));
        assert_eq!(
            args.normalize(),
            Some(json!({"title": "Fix", "diff": "--- a"}))
        );
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(ToolArguments::from(json!("{not json")).normalize(), None);
        assert_eq!(ToolArguments::from(json!("   ")).normalize(), None);
        assert_eq!(ToolArguments::from(json!(null)).normalize(), None);
        assert_eq!(ToolArguments::from(json!("null")).normalize(), None);
    }

    #[test]
    fn test_request_body_shape() {
        let request = AgentRequest::new("be helpful")
            .with_message(ChatMessage::user("fix it"))
            .with_metadata("source", "fixhub")
            .with_metadata("environment", "acme/widgets");

        let body = request.to_body("gpt-test");
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["input"][0], json!({"role": "system", "content": "be helpful"}));
        assert_eq!(body["input"][1], json!({"role": "user", "content": "fix it"}));
        assert_eq!(body["metadata"]["environment"], "acme/widgets");
        assert_eq!(body["tools"], json!([]));
        assert_eq!(request.last_user_message(), Some("fix it"));
    }

    #[test]
    fn test_turn_content_defaults_to_empty() {
        let turn = AgentTurn::default().with_tool_call(ToolCall::new("make_pr", json!({})));
        assert_eq!(turn.content(), "");
        assert!(turn.has_tool_calls());
    }
}
