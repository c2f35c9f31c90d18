use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::client::LlmClient;
use super::types::{LlmRequest, LlmResponse};
use crate::error::{PocFlowError, Result};

/// 按顺序回放预设响应并记录请求；队列耗尽后返回空文本
#[derive(Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<LlmResponse>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedClient {
    pub fn new(responses: impl IntoIterator<Item = LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 从 JSON 数组文件加载响应
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            PocFlowError::Config(format!("cannot read script {}: {err}", path.display()))
        })?;
        let responses: Vec<LlmResponse> = serde_json::from_str(&raw)?;
        Ok(Self::new(responses))
    }

    pub fn push(&self, response: LlmResponse) {
        self.responses.lock().push_back(response);
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request);
        Ok(self.responses.lock().pop_front().unwrap_or_default())
    }
}
