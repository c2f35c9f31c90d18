pub mod agent;
pub mod message;

pub use agent::{Agent, AgentRole, PromptAgent};
pub use message::{
    call_id, AgentMessage, ConversationMessage, MessageRole, ToolCall, ToolResultMessage,
};
