use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::state::StateView;
use crate::tools::builtin::ToolEnvironment;
use crate::tools::manifest::{ToolManifest, ToolPort};
use crate::tools::tool::{Tool, ToolInvocation, ToolOutput};

#[derive(Debug, Deserialize)]
struct ReaderInput {
    #[serde(default)]
    state: StateView,
}

/// 按运行配置定位的静态资源
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    ProblemStatement,
    TemplateCode,
    SourceCode,
    EvaluationMetrics,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::ProblemStatement,
        ResourceKind::TemplateCode,
        ResourceKind::SourceCode,
        ResourceKind::EvaluationMetrics,
    ];

    pub fn tool_name(&self) -> &'static str {
        match self {
            ResourceKind::ProblemStatement => "read_problem_statement",
            ResourceKind::TemplateCode => "template_code_reader",
            ResourceKind::SourceCode => "source_code_reader",
            ResourceKind::EvaluationMetrics => "evaluation_metrics_reader",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ResourceKind::ProblemStatement => {
                "Retrieve the problem statement of the PoC based on the attack vector name."
            }
            ResourceKind::TemplateCode => {
                "Retrieve the template code (the starting checkpoint) based on the attack vector name."
            }
            ResourceKind::SourceCode => {
                "Retrieve the original (ground truth) source code based on the attack vector name."
            }
            ResourceKind::EvaluationMetrics => {
                "Read the evaluation metrics for the attack vector."
            }
        }
    }

    /// 相对资源目录的路径
    pub fn relative_path(&self, state: &StateView) -> PathBuf {
        let attack = &state.attack_vector;
        let ext = &state.target_file_extension;
        match self {
            ResourceKind::ProblemStatement if state.victim_function <= 1 => {
                PathBuf::from("problem_statements").join(format!("{attack}-PoC.txt"))
            }
            ResourceKind::ProblemStatement => PathBuf::from("problem_statements")
                .join(format!("{attack}-PoC-VF{}.txt", state.victim_function)),
            ResourceKind::TemplateCode => PathBuf::from("templates")
                .join(attack)
                .join(format!("T{}_{attack}.{ext}", state.template_number)),
            ResourceKind::SourceCode => PathBuf::from("sources").join(format!("{attack}.{ext}")),
            ResourceKind::EvaluationMetrics => PathBuf::from("evaluation_metrics")
                .join(format!("{attack}-Evaluation-Metrics.txt")),
        }
    }
}

pub struct ResourceReaderTool {
    manifest: ToolManifest,
    kind: ResourceKind,
    env: Arc<ToolEnvironment>,
}

impl ResourceReaderTool {
    pub fn new(kind: ResourceKind, env: Arc<ToolEnvironment>) -> Self {
        let manifest = ToolManifest::builder(kind.tool_name())
            .description(kind.description())
            .input(ToolPort::state())
            .build();
        Self {
            manifest,
            kind,
            env,
        }
    }
}

#[async_trait]
impl Tool for ResourceReaderTool {
    fn manifest(&self) -> &ToolManifest {
        &self.manifest
    }

    async fn call(&self, invocation: ToolInvocation) -> anyhow::Result<ToolOutput> {
        let input: ReaderInput = invocation.parse()?;
        anyhow::ensure!(
            !input.state.attack_vector.is_empty(),
            "state.attack_vector is required"
        );
        let path = self
            .env
            .resources_dir
            .join(self.kind.relative_path(&input.state));
        info!(tool = %self.manifest.name, path = %path.display(), "[+] Reading file");
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("{} not found", path.display()))?;
        Ok(ToolOutput::text(contents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(victim_function: u32) -> StateView {
        StateView {
            attack_vector: "Spectre-v1".into(),
            target_file_extension: "c".into(),
            victim_function,
            template_number: 4,
            ..StateView::default()
        }
    }

    #[test]
    fn resource_paths_follow_profile() {
        assert_eq!(
            ResourceKind::ProblemStatement.relative_path(&view(1)),
            PathBuf::from("problem_statements/Spectre-v1-PoC.txt")
        );
        assert_eq!(
            ResourceKind::ProblemStatement.relative_path(&view(3)),
            PathBuf::from("problem_statements/Spectre-v1-PoC-VF3.txt")
        );
        assert_eq!(
            ResourceKind::TemplateCode.relative_path(&view(1)),
            PathBuf::from("templates/Spectre-v1/T4_Spectre-v1.c")
        );
    }
}
