use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new<T: Into<String>>(name: T, args: Map<String, Value>) -> Self {
        Self {
            id: call_id(),
            name: name.into(),
            args,
        }
    }

    pub fn with_id<I: Into<String>, T: Into<String>>(id: I, name: T, args: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AgentMessage {
    pub author: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl AgentMessage {
    pub fn text<A: Into<String>, C: Into<String>>(author: A, content: C) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolResultMessage {
    pub tool_name: String,
    pub tool_call_id: String,
    pub content: String,
}

impl ToolResultMessage {
    pub fn new<N, I, C>(tool_name: N, tool_call_id: I, content: C) -> Self
    where
        N: Into<String>,
        I: Into<String>,
        C: Into<String>,
    {
        Self {
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationMessage {
    Agent(AgentMessage),
    ToolResult(ToolResultMessage),
}

impl ConversationMessage {
    pub fn role(&self) -> MessageRole {
        match self {
            ConversationMessage::Agent(_) => MessageRole::Assistant,
            ConversationMessage::ToolResult(_) => MessageRole::Tool,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ConversationMessage::Agent(message) => &message.content,
            ConversationMessage::ToolResult(result) => &result.content,
        }
    }

    pub fn as_agent(&self) -> Option<&AgentMessage> {
        match self {
            ConversationMessage::Agent(message) => Some(message),
            ConversationMessage::ToolResult(_) => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultMessage> {
        match self {
            ConversationMessage::ToolResult(result) => Some(result),
            ConversationMessage::Agent(_) => None,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            ConversationMessage::Agent(message) => &message.tool_calls,
            ConversationMessage::ToolResult(_) => &[],
        }
    }
}

impl From<AgentMessage> for ConversationMessage {
    fn from(message: AgentMessage) -> Self {
        ConversationMessage::Agent(message)
    }
}

impl From<ToolResultMessage> for ConversationMessage {
    fn from(result: ToolResultMessage) -> Self {
        ConversationMessage::ToolResult(result)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    System,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::System => "system",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

pub fn call_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_results_carry_no_calls() {
        let entry: ConversationMessage = ToolResultMessage::new("echo", "1", "ok").into();
        assert!(entry.tool_calls().is_empty());
        assert_eq!(entry.role(), MessageRole::Tool);
    }

    #[test]
    fn call_ids_are_hex() {
        let id = call_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
