//! Reduce a Responses API payload to an [`AgentTurn`]

use fixhub_core::{FixhubError, Result};
use serde_json::Value;

use crate::types::{AgentTurn, ToolArguments, ToolCall};

const TOOL_ITEM_KINDS: [&str; 2] = ["tool_call", "function_call"];

/// Parse the body returned by `POST /v1/responses`
///
/// Text segments from every output item are joined with newlines. Tool calls
/// with a missing name or unusable arguments are skipped with a warning. A
/// response with neither text nor tool calls is malformed.
pub fn parse_response(body: &Value) -> Result<AgentTurn> {
    if body.is_null() {
        return Err(FixhubError::MalformedResponse(
            "Empty response from agent API".to_string(),
        ));
    }

    let id = body
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();

    for item in body
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let kind = item.get("type").and_then(Value::as_str).unwrap_or_default();
        if TOOL_ITEM_KINDS.contains(&kind) {
            if let Some(call) = parse_tool_call(item) {
                tool_calls.push(call);
            }
        }
        collect_text(item, &mut texts);
    }

    if texts.is_empty() && tool_calls.is_empty() {
        return Err(FixhubError::MalformedResponse(
            "Agent response contained neither text nor tool calls".to_string(),
        ));
    }

    tracing::debug!(
        "Agent turn with {} text segments and {} tool calls",
        texts.len(),
        tool_calls.len()
    );

    Ok(AgentTurn {
        id,
        text_content: (!texts.is_empty()).then(|| texts.join("\n")),
        tool_calls,
    })
}

fn parse_tool_call(item: &Value) -> Option<ToolCall> {
    let function = item.get("function");

    let name = [
        item.get("name"),
        item.get("tool_name"),
        function.and_then(|f| f.get("name")),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
    .find(|s| !s.trim().is_empty());

    let Some(name) = name else {
        tracing::warn!("Skipping tool call without a name");
        return None;
    };

    let raw = raw_arguments(item).or_else(|| function.and_then(raw_arguments));
    match raw.and_then(|value| ToolArguments::from(value.clone()).normalize()) {
        Some(arguments) => Some(ToolCall::new(name, arguments)),
        None => {
            tracing::warn!("Skipping tool call {} with unusable arguments", name);
            None
        }
    }
}

/// `arguments`, then `argument`, then the first `content[].arguments`
fn raw_arguments(node: &Value) -> Option<&Value> {
    let present = |v: &&Value| !v.is_null();

    node.get("arguments")
        .filter(present)
        .or_else(|| node.get("argument").filter(present))
        .or_else(|| {
            node.get("content")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|part| part.get("arguments"))
                .find(present)
        })
}

fn collect_text(item: &Value, texts: &mut Vec<String>) {
    let direct = item.get("text");
    let parts = item
        .get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|part| part.get("text"));

    for text in direct.into_iter().chain(parts).filter_map(Value::as_str) {
        if !text.trim().is_empty() {
            texts.push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_text_is_joined() {
        let body = json!({
            "id": "resp_1",
            "output": [
                {"type": "message", "content": [
                    {"type": "output_text", "text": "First"},
                    {"type": "output_text", "text": "   "},
                    {"type": "output_text", "text": "Second"}
                ]},
                {"type": "reasoning", "text": "Third"}
            ]
        });

        let turn = parse_response(&body).unwrap();
        assert_eq!(turn.id.as_deref(), Some("resp_1"));
        assert_eq!(turn.content(), "First\nSecond\nThird");
        assert!(turn.tool_calls.is_empty());
    }

    #[test]
    fn test_function_call_with_encoded_arguments() {
        let body = json!({
            "output": [{
                "type": "function_call",
                "name": "create_merge_request",
                "arguments": "{\"title\":\"Fix\",\"diff\":\"--- a/x\"}"
            }]
        });

        let turn = parse_response(&body).unwrap();
        assert_eq!(turn.text_content, None);
        assert_eq!(
            turn.tool_calls,
            vec![ToolCall::new(
                "create_merge_request",
                json!({"title": "Fix", "diff": "--- a/x"})
            )]
        );
    }

    #[test]
    fn test_nested_function_payload() {
        let body = json!({
            "output": [{
                "type": "tool_call",
                "function": {"name": "request_repository_file", "arguments": {"path": "README.md"}}
            }]
        });

        let turn = parse_response(&body).unwrap();
        assert_eq!(turn.tool_calls[0].name, "request_repository_file");
        assert_eq!(turn.tool_calls[0].arguments, json!({"path": "README.md"}));
    }

    #[test]
    fn test_alternate_argument_locations() {
        let body = json!({
            "output": [
                {"type": "tool_call", "tool_name": "make_pr", "argument": "{\"title\":\"A\"}"},
                {"type": "tool_call", "name": "make_pr", "content": [{"arguments": {"title": "B"}}]}
            ]
        });

        let turn = parse_response(&body).unwrap();
        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.tool_calls[0].arguments["title"], "A");
        assert_eq!(turn.tool_calls[1].arguments["title"], "B");
    }

    #[test]
    fn test_unusable_calls_are_skipped() {
        let body = json!({
            "output": [
                {"type": "function_call", "name": "make_pr", "arguments": "{broken"},
                {"type": "function_call", "arguments": "{}"},
                {"type": "function_call", "name": "make_pr"},
                {"type": "message", "content": [{"text": "still here"}]}
            ]
        });

        let turn = parse_response(&body).unwrap();
        assert!(turn.tool_calls.is_empty());
        assert_eq!(turn.content(), "still here");
    }

    #[test]
    fn test_empty_responses_are_malformed() {
        assert!(matches!(
            parse_response(&Value::Null),
            Err(FixhubError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_response(&json!({"output": []})),
            Err(FixhubError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_response(&json!({"id": "x"})),
            Err(FixhubError::MalformedResponse(_))
        ));
    }
}
