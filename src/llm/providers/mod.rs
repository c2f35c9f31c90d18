mod configs;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use configs::ProviderKind;

use crate::config::EnvConfig;
use crate::error::{PocFlowError, Result};
use crate::llm::client::DynLlmClient;

/// 模型注册项
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProviderSpec {
    pub provider: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// 可为 `${VAR}` 形式；为空时读取提供方默认环境变量
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderSpec {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            api_key: String::new(),
            base_url: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// 工作目录使用的标签 `<provider>-<model>`，路径分隔符替换为 `_`
    pub fn label(&self) -> String {
        format!("{}-{}", self.provider, self.model).replace(['/', '\\'], "_")
    }

    pub fn resolve_api_key(&self) -> Result<String> {
        match EnvConfig::get_api_key(&self.api_key, self.provider.api_key_env()) {
            Ok(key) => Ok(key),
            Err(err) => self
                .provider
                .fallback_api_key()
                .map(str::to_string)
                .ok_or_else(|| {
                    PocFlowError::Config(format!(
                        "missing API key for provider '{}': {err}",
                        self.provider
                    ))
                }),
        }
    }

    pub fn resolve_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.base_url())
    }
}

/// 模型注册表，键为配置中的模型名
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelRegistry {
    models: BTreeMap<String, ProviderSpec>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.insert("gpt-4o", ProviderSpec::new(ProviderKind::OpenAi, "gpt-4o"));
        registry.insert("gpt-5", ProviderSpec::new(ProviderKind::OpenAi, "gpt-5"));
        registry.insert(
            "llama-4-maverick",
            ProviderSpec::new(
                ProviderKind::Together,
                "meta-llama/Llama-4-Maverick-17B-128E-Instruct-FP8",
            ),
        );
        registry.insert(
            "llama-4-scout",
            ProviderSpec::new(
                ProviderKind::Together,
                "meta-llama/Llama-4-Scout-17B-16E-Instruct",
            ),
        );
        registry.insert(
            "deepseek-v3",
            ProviderSpec::new(ProviderKind::Together, "deepseek-ai/DeepSeek-V3"),
        );
        registry.insert(
            "llama3.3-70b-ionos",
            ProviderSpec::new(ProviderKind::Ionos, "meta-llama/Llama-3.3-70B-Instruct"),
        );
        registry.insert(
            "llama3.2-ollama",
            ProviderSpec::new(ProviderKind::Ollama, "llama3.2"),
        );
        registry.insert(
            "claude-sonnet-4",
            ProviderSpec::new(ProviderKind::Anthropic, "claude-sonnet-4-20250514"),
        );
        registry.insert(
            "Qwen3-Coder",
            ProviderSpec::new(
                ProviderKind::Together,
                "Qwen/Qwen3-Coder-480B-A35B-Instruct-FP8",
            )
            .with_max_tokens(32000),
        );
        registry
    }

    pub fn insert(&mut self, key: impl Into<String>, spec: ProviderSpec) {
        self.models.insert(key.into(), spec);
    }

    pub fn get(&self, key: &str) -> Result<&ProviderSpec> {
        self.models.get(key).ok_or_else(|| PocFlowError::UnknownModel {
            key: key.to_string(),
            available: self.keys().collect::<Vec<_>>().join(", "),
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProviderSpec)> {
        self.models.iter().map(|(key, spec)| (key.as_str(), spec))
    }

    /// 构造模型客户端；未知键或缺少密钥时为配置错误
    #[cfg(feature = "openai-client")]
    pub fn build_client(&self, key: &str) -> Result<DynLlmClient> {
        let spec = self.get(key)?;
        let client = crate::llm::http::OpenAiClient::with_base_url(
            spec.resolve_base_url(),
            spec.resolve_api_key()?,
            spec.model.clone(),
        )
        .with_temperature(spec.temperature)
        .with_max_tokens(spec.max_tokens);
        Ok(std::sync::Arc::new(client))
    }

    #[cfg(not(feature = "openai-client"))]
    pub fn build_client(&self, key: &str) -> Result<DynLlmClient> {
        self.get(key)?;
        Err(PocFlowError::Config(
            "built without the `openai-client` feature; use --dry-run".to_string(),
        ))
    }
}

/// 文档存储使用的模型族目录名
pub fn model_family(model_key: &str) -> &'static str {
    let key = model_key.to_ascii_lowercase();
    if key.contains("claude") {
        "Claude"
    } else if key.contains("gpt") {
        "GPT"
    } else if key.contains("qwen") {
        "Qwen3"
    } else if key.contains("deepseek") {
        "deepseek"
    } else if key.contains("llama") {
        "Llama"
    } else {
        "Other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_lists_available_models() {
        let registry = ModelRegistry::builtin();
        let err = registry.get("gpt-2").unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("gpt-4o"));
    }

    #[test]
    fn label_is_path_safe() {
        let registry = ModelRegistry::builtin();
        let label = registry.get("Qwen3-Coder").unwrap().label();
        assert_eq!(label, "together-Qwen_Qwen3-Coder-480B-A35B-Instruct-FP8");
    }

    #[test]
    fn family_from_key() {
        assert_eq!(model_family("claude-sonnet-4"), "Claude");
        assert_eq!(model_family("Qwen3-Coder"), "Qwen3");
        assert_eq!(model_family("llama3.2-ollama"), "Llama");
    }
}
