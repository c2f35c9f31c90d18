use serde::{Deserialize, Serialize};

use crate::config::EnvConfig;

/// OpenAI 兼容端点的提供方
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Together,
    Ionos,
    Ollama,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Together => "together",
            ProviderKind::Ionos => "ionos",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Together => "TOGETHER_API_KEY",
            ProviderKind::Ionos => "IONOS_API_KEY",
            ProviderKind::Ollama => "OLLAMA_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn base_url_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_BASE_URL",
            ProviderKind::Together => "TOGETHER_BASE_URL",
            ProviderKind::Ionos => "IONOS_BASE_URL",
            ProviderKind::Ollama => "OLLAMA_OPENAI_BASE_URL",
            ProviderKind::Anthropic => "ANTHROPIC_BASE_URL",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Together => "https://api.together.xyz/v1",
            ProviderKind::Ionos => "https://api.ionos.com/v1",
            ProviderKind::Ollama => "http://host.docker.internal:11434/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// 环境变量优先，否则使用默认地址
    pub fn base_url(&self) -> String {
        EnvConfig::get_env_optional(self.base_url_env())
            .unwrap_or_else(|| self.default_base_url().to_string())
    }

    /// Ollama 不校验密钥，缺省时使用占位值
    pub fn fallback_api_key(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Ollama => Some("ollama"),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
