use crate::error::{PocFlowError, Result};
use std::env;
use std::path::PathBuf;

/// 环境变量配置管理
pub struct EnvConfig;

impl EnvConfig {
    /// 获取 API Key，支持从环境变量或配置中获取
    ///
    /// 优先级：
    /// 1. 直接传入的 api_key 参数（如果不以 ${} 包裹且不是占位符）
    /// 2. 环境变量（如果 api_key 以 ${VAR_NAME} 格式）
    /// 3. 默认环境变量
    pub fn get_api_key(api_key: &str, default_env_var: &str) -> Result<String> {
        if let Some(name) = api_key
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
        {
            Self::get_env(name)
        } else if api_key.is_empty() || Self::is_placeholder(api_key) {
            Self::get_env(default_env_var)
        } else {
            Ok(api_key.to_string())
        }
    }

    fn is_placeholder(value: &str) -> bool {
        value.starts_with("your_") || value.ends_with("_here")
    }

    /// 从环境变量获取值
    pub fn get_env(key: &str) -> Result<String> {
        env::var(key).map_err(|_| {
            PocFlowError::Config(format!(
                "环境变量 '{}' 未设置。请在 .env 文件中设置或通过环境变量传递。",
                key
            ))
        })
    }

    /// 获取可选的环境变量
    pub fn get_env_optional(key: &str) -> Option<String> {
        env::var(key).ok()
    }

    /// 展开路径开头的 `~`
    pub fn expand_home(path: &str) -> PathBuf {
        match path.strip_prefix('~') {
            Some(rest) => {
                let home = Self::get_env_optional("HOME").unwrap_or_else(|| ".".to_string());
                PathBuf::from(home).join(rest.trim_start_matches('/'))
            }
            None => PathBuf::from(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_api_key_direct() {
        let result = EnvConfig::get_api_key("sk-1234567890abcdef1234567890", "TEST_API_KEY");
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "sk-1234567890abcdef1234567890");
    }

    #[test]
    fn test_get_api_key_env_var() {
        env::set_var("POCFLOW_TEST_TOGETHER_KEY", "test_key_value");
        let result = EnvConfig::get_api_key("${POCFLOW_TEST_TOGETHER_KEY}", "FALLBACK_KEY");
        assert_eq!(result.unwrap(), "test_key_value");
        env::remove_var("POCFLOW_TEST_TOGETHER_KEY");
    }

    #[test]
    fn test_get_api_key_placeholder() {
        env::set_var("POCFLOW_TEST_DEFAULT_KEY", "default_value");
        let result = EnvConfig::get_api_key("your_api_key_here", "POCFLOW_TEST_DEFAULT_KEY");
        assert_eq!(result.unwrap(), "default_value");
        env::remove_var("POCFLOW_TEST_DEFAULT_KEY");
    }

    #[test]
    fn test_missing_env_is_config_error() {
        let err = EnvConfig::get_env("POCFLOW_TEST_SURELY_UNSET").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_expand_home_keeps_plain_paths() {
        assert_eq!(EnvConfig::expand_home("/tmp/x"), PathBuf::from("/tmp/x"));
    }
}
