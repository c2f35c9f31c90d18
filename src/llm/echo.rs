use async_trait::async_trait;

use super::client::LlmClient;
use super::types::{LlmRequest, LlmResponse};
use crate::agent::MessageRole;
use crate::error::Result;

/// 离线回显客户端，用于 `--dry-run`，从不请求工具
#[derive(Default, Clone)]
pub struct LocalEchoClient;

#[async_trait]
impl LlmClient for LocalEchoClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let last = request
            .messages
            .iter()
            .rev()
            .find(|message| matches!(message.role, MessageRole::User | MessageRole::System))
            .map(|message| message.content.trim())
            .unwrap_or_default();
        Ok(LlmResponse {
            content: format!("[Echo] {last}"),
            tool_calls: Vec::new(),
            metadata: request.metadata,
        })
    }
}
