use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::llm::model_family;
use crate::state::StateView;
use crate::tools::builtin::ToolEnvironment;
use crate::tools::manifest::{ToolManifest, ToolPort};
use crate::tools::tool::{Tool, ToolInvocation, ToolOutput};

#[derive(Debug, Deserialize)]
struct StoreInput {
    file_path: String,
    file_contents: String,
    #[serde(default)]
    state: StateView,
}

fn store_manifest(name: &str, description: &str) -> ToolManifest {
    ToolManifest::builder(name)
        .description(description)
        .input(
            ToolPort::new("file_path")
                .with_description("the path of the file to be saved including file name")
                .required(),
        )
        .input(
            ToolPort::new("file_contents")
                .with_description("the contents of the file")
                .required(),
        )
        .input(ToolPort::state())
        .build()
}

/// 保留字母、数字、`_`、`-`、`.`，其余替换为 `_`
pub(crate) fn safe_filename(name: &str) -> String {
    let mapped: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = mapped.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// 将生成的文档存到 `<docs_root>/<family>/<attack>/T<n>/`
pub struct StoreContentTool {
    manifest: ToolManifest,
    env: Arc<ToolEnvironment>,
}

impl StoreContentTool {
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            manifest: store_manifest("store_content", "Store the document for later retrieval."),
            env,
        }
    }

    pub(crate) fn target_path(docs_root: &Path, file_path: &str, state: &StateView) -> PathBuf {
        let base = Path::new(file_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base = safe_filename(&base);
        let (stem, ext) = match base.rfind('.') {
            Some(index) if index > 0 => base.split_at(index),
            _ => (base.as_str(), ""),
        };
        docs_root
            .join(model_family(&state.model_key))
            .join(&state.attack_vector)
            .join(format!("T{}", state.template_number))
            .join(format!("{stem}_{}{ext}", state.run_id))
    }
}

#[async_trait]
impl Tool for StoreContentTool {
    fn manifest(&self) -> &ToolManifest {
        &self.manifest
    }

    async fn call(&self, invocation: ToolInvocation) -> anyhow::Result<ToolOutput> {
        let input: StoreInput = invocation.parse()?;
        let target = Self::target_path(&self.env.docs_root, &input.file_path, &input.state);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        info!(path = %target.display(), "[store_content] Saving content");
        debug!(contents = %input.file_contents, "[store_content] New Content");
        tokio::fs::write(&target, &input.file_contents)
            .await
            .with_context(|| format!("Failed to save file {}", target.display()))?;

        Ok(ToolOutput::sections([
            ("status", "success".to_string()),
            ("message", format!("File updated at {}", target.display())),
        ]))
    }
}

/// 将评估者的缺失指标报告写入工作区
pub struct SaveMissingMetricsTool {
    manifest: ToolManifest,
    env: Arc<ToolEnvironment>,
}

impl SaveMissingMetricsTool {
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            manifest: store_manifest(
                "save_missing_metrics",
                "Save the missing evaluation metrics report in the specified file.",
            ),
            env,
        }
    }
}

#[async_trait]
impl Tool for SaveMissingMetricsTool {
    fn manifest(&self) -> &ToolManifest {
        &self.manifest
    }

    async fn call(&self, invocation: ToolInvocation) -> anyhow::Result<ToolOutput> {
        let input: StoreInput = invocation.parse()?;
        let written = self
            .env
            .workspace
            .write_file(&input.file_path, &input.file_contents)
            .await?;
        Ok(ToolOutput::text(format!("Saved {}", written.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_sanitised() {
        assert_eq!(safe_filename("gap report?.md"), "gap_report_.md");
        assert_eq!(safe_filename("..."), "untitled");
    }

    #[test]
    fn stored_documents_are_grouped_by_family_attack_and_template() {
        let state = StateView {
            attack_vector: "Flush-Reload".into(),
            template_number: 2,
            model_key: "gpt-4o".into(),
            run_id: "abc123".into(),
            ..StateView::default()
        };
        let path = StoreContentTool::target_path(Path::new("/docs"), "notes/summary.md", &state);
        assert_eq!(
            path,
            PathBuf::from("/docs/GPT/Flush-Reload/T2/summary_abc123.md")
        );
    }
}
