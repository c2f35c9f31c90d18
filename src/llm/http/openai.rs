use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use crate::agent::{call_id, MessageRole, ToolCall};
use crate::error::{PocFlowError, Result};
use crate::llm::client::LlmClient;
use crate::llm::types::{LlmMessage, LlmRequest, LlmResponse, ToolDefinition};

/// OpenAI 兼容的 chat/completions 客户端，支持函数调用
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAiClient {
    fn http_client() -> reqwest::Client {
        reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_else(|err| {
                warn!(%err, "falling back to default HTTP client");
                reqwest::Client::new()
            })
    }

    pub fn new<S: Into<String>>(api_key: S, model: S) -> Self {
        Self::with_base_url("https://api.openai.com/v1", api_key, model)
    }

    pub fn with_base_url<S1, S2, S3>(base_url: S1, api_key: S2, model: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            client: Self::http_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// 覆盖请求中的温度
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn body(&self, request: &LlmRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(encode_message).collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature.unwrap_or(request.temperature),
        });
        if let Some(max_tokens) = request.max_tokens.or(self.max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(encode_tool).collect());
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

fn encode_message(message: &LlmMessage) -> Value {
    match message.role {
        MessageRole::Assistant if !message.tool_calls.is_empty() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": Value::Object(call.args.clone()).to_string(),
                        }
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                Value::String(message.content.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        MessageRole::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content,
        }),
        role => json!({ "role": role.as_str(), "content": message.content }),
    }
}

fn encode_tool(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn decode_tool_calls(message: &Value) -> Vec<ToolCall> {
    let Some(calls) = message["tool_calls"].as_array() else {
        return Vec::new();
    };
    calls
        .iter()
        .filter_map(|call| {
            let function = &call["function"];
            let name = function["name"].as_str()?;
            let args = match function["arguments"].as_str() {
                Some(raw) if !raw.trim().is_empty() => {
                    match serde_json::from_str::<Value>(raw) {
                        Ok(Value::Object(map)) => map,
                        _ => {
                            warn!(tool = name, "tool arguments are not a JSON object");
                            let mut map = Map::new();
                            map.insert("_raw".into(), Value::String(raw.to_string()));
                            map
                        }
                    }
                }
                _ => Map::new(),
            };
            let id = call["id"]
                .as_str()
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(call_id);
            Some(ToolCall::with_id(id, name, args))
        })
        .collect()
}

#[async_trait]
impl LlmClient for OpenAiClient {
    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.body(&request);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PocFlowError::Llm(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PocFlowError::Llm(format!(
                "request failed with status {status}: {detail}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| PocFlowError::Other(anyhow!(e)))?;
        let message = payload["choices"]
            .get(0)
            .map(|choice| &choice["message"])
            .ok_or_else(|| PocFlowError::Llm("response has no choices".to_string()))?;

        let content = message["content"].as_str().unwrap_or_default().to_string();
        let tool_calls = decode_tool_calls(message);
        debug!(tool_calls = tool_calls.len(), "model responded");

        Ok(LlmResponse {
            content,
            tool_calls,
            metadata: payload.get("usage").cloned(),
        })
    }
}
