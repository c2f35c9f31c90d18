use thiserror::Error;

pub type Result<T> = std::result::Result<T, PocFlowError>;

#[derive(Debug, Error)]
pub enum PocFlowError {
    #[error("unknown node `{0}` in workflow")]
    UnknownNode(String),
    #[error("tool `{0}` not registered")]
    ToolNotRegistered(String),
    #[error("tool `{0}` registered twice")]
    DuplicateTool(String),
    #[error("unknown model key `{key}`. Available: {available}")]
    UnknownModel { key: String, available: String },
    #[error("unknown phase `{name}`. Available: {available}")]
    UnknownPhase { name: String, available: String },
    #[error("prompt template not found: {0}")]
    TemplateNotFound(String),
    #[error("version `{version}` not found in {file}. Available: {available}")]
    TemplateVersionMissing {
        version: String,
        file: String,
        available: String,
    },
    #[error("invalid prompt template {file}: {reason}")]
    InvalidTemplate { file: String, reason: String },
    #[error("invalid workflow `{workflow}`: {reason}")]
    InvalidGraph { workflow: String, reason: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("step budget of {0} exhausted before reaching the terminal node")]
    StepBudgetExceeded(u32),
    #[error("tool result `{0}` does not answer any earlier tool call")]
    OrphanToolResult(String),
    #[error("model call failed: {0}")]
    Llm(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PocFlowError {
    /// 启动阶段的配置错误，发生在任何状态变更之前
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PocFlowError::UnknownModel { .. }
                | PocFlowError::UnknownPhase { .. }
                | PocFlowError::TemplateNotFound(_)
                | PocFlowError::TemplateVersionMissing { .. }
                | PocFlowError::InvalidTemplate { .. }
                | PocFlowError::InvalidGraph { .. }
                | PocFlowError::ToolNotRegistered(_)
                | PocFlowError::DuplicateTool(_)
                | PocFlowError::Config(_)
        )
    }
}

impl From<serde_json::Error> for PocFlowError {
    fn from(err: serde_json::Error) -> Self {
        PocFlowError::Serialization(err.to_string())
    }
}
