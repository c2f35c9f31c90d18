use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::EnvConfig;
use crate::error::{PocFlowError, Result};
use crate::flow::Phase;
use crate::state::RunProfile;

/// 迭代与步数上限
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Limits {
    pub reflection_limit: u32,
    pub evaluation_limit: u32,
    pub step_budget: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            reflection_limit: 8,
            evaluation_limit: 7,
            step_budget: 70,
        }
    }
}

/// 运行所需的目录，支持 `~` 展开
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub workdir_root: String,
    pub prompt_dir: String,
    pub resources_dir: String,
    pub docs_root: String,
    pub log_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            workdir_root: "~/workdir".to_string(),
            prompt_dir: "prompts".to_string(),
            resources_dir: "resources".to_string(),
            docs_root: "~/workdir/RAG_Dir".to_string(),
            log_dir: "~/workdir/logs".to_string(),
        }
    }
}

impl PathsConfig {
    pub fn workdir_root(&self) -> PathBuf {
        EnvConfig::expand_home(&self.workdir_root)
    }

    pub fn prompt_dir(&self) -> PathBuf {
        EnvConfig::expand_home(&self.prompt_dir)
    }

    pub fn resources_dir(&self) -> PathBuf {
        EnvConfig::expand_home(&self.resources_dir)
    }

    pub fn docs_root(&self) -> PathBuf {
        EnvConfig::expand_home(&self.docs_root)
    }

    pub fn log_dir(&self) -> PathBuf {
        EnvConfig::expand_home(&self.log_dir)
    }
}

/// 单次运行配置，启动时构建一次后向下传递
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub phase: Phase,
    pub model_key: String,
    pub run_id: String,
    pub attack_vector: String,
    pub target_language: String,
    pub target_file_extension: String,
    pub victim_function: u32,
    pub template_number: u32,
    pub retrieval_questions: Vec<String>,
    pub limits: Limits,
    pub paths: PathsConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        let profile = RunProfile::default();
        Self {
            phase: Phase::Online,
            model_key: profile.model_key,
            run_id: profile.run_id,
            attack_vector: profile.attack_vector,
            target_language: profile.target_language,
            target_file_extension: profile.target_file_extension,
            victim_function: profile.victim_function,
            template_number: profile.template_number,
            retrieval_questions: Vec::new(),
            limits: Limits::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            PocFlowError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(raw)
            .map_err(|err| PocFlowError::Config(format!("invalid run config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limits.reflection_limit == 0 || self.limits.evaluation_limit == 0 {
            return Err(PocFlowError::Config(
                "reflection_limit and evaluation_limit must be positive".to_string(),
            ));
        }
        if self.limits.step_budget == 0 {
            return Err(PocFlowError::Config("step_budget must be positive".to_string()));
        }
        if self.attack_vector.trim().is_empty() {
            return Err(PocFlowError::Config("attack_vector must not be empty".to_string()));
        }
        if self.run_id.contains(['/', '\\']) || self.run_id.is_empty() {
            return Err(PocFlowError::Config(format!(
                "run_id `{}` is not a valid directory name",
                self.run_id
            )));
        }
        Ok(())
    }

    pub fn profile(&self) -> RunProfile {
        RunProfile {
            attack_vector: self.attack_vector.clone(),
            target_language: self.target_language.clone(),
            target_file_extension: self.target_file_extension.clone(),
            victim_function: self.victim_function,
            template_number: self.template_number,
            model_key: self.model_key.clone(),
            run_id: self.run_id.clone(),
        }
    }
}
