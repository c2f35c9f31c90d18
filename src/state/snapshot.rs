use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::conversation::{ConversationState, Counters};

/// 交给 Agent 的只读状态副本
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    inner: ConversationState,
}

impl StateSnapshot {
    pub(crate) fn new(inner: ConversationState) -> Self {
        Self { inner }
    }
}

impl Deref for StateSnapshot {
    type Target = ConversationState;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// 注入工具 `state` 参数的 JSON 视图
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateView {
    pub attack_vector: String,
    pub target_language: String,
    pub target_file_extension: String,
    pub victim_function: u32,
    pub template_number: u32,
    pub model_key: String,
    pub run_id: String,
    #[serde(flatten)]
    pub counters: Counters,
    #[serde(default)]
    pub retrieval_questions: Vec<String>,
    #[serde(default)]
    pub exec_done: bool,
    #[serde(default)]
    pub last_exec_output: String,
}

impl StateView {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
