use serde::{Deserialize, Serialize};

/// 单次运行的配置回显，运行期间不可变
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunProfile {
    pub attack_vector: String,
    pub target_language: String,
    pub target_file_extension: String,
    pub victim_function: u32,
    pub template_number: u32,
    pub model_key: String,
    pub run_id: String,
}

impl RunProfile {
    /// 相对于工作目录的源码路径，例如 `PoC/Spectre-v1.c`
    pub fn source_path(&self) -> String {
        format!("PoC/{}.{}", self.attack_vector, self.target_file_extension)
    }

    /// 相对于工作目录的二进制路径
    pub fn binary_path(&self) -> String {
        format!("PoC/{}", self.attack_vector)
    }
}

impl Default for RunProfile {
    fn default() -> Self {
        Self {
            attack_vector: "Spectre-v1".to_string(),
            target_language: "C".to_string(),
            target_file_extension: "c".to_string(),
            victim_function: 1,
            template_number: 3,
            model_key: "gpt-4o".to_string(),
            run_id: crate::agent::message::call_id(),
        }
    }
}
