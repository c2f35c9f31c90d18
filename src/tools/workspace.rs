use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

/// 单次运行的工作目录：`<workdir_root>/<run_id>/<model_label>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunWorkspace {
    root: PathBuf,
}

impl RunWorkspace {
    pub fn new(workdir_root: impl AsRef<Path>, run_id: &str, model_label: &str) -> Self {
        Self {
            root: workdir_root.as_ref().join(run_id).join(model_label),
        }
    }

    /// 直接以给定目录为根，测试中常用
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 工作区内路径：去掉开头的 `~` 与 `/`，始终落在根目录之下
    pub fn resolve(&self, path: &str) -> PathBuf {
        let relative = path.strip_prefix('~').unwrap_or(path);
        let relative = relative.trim_start_matches('/');
        self.root.join(relative)
    }

    pub async fn ensure(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("cannot create workspace {}", self.root.display()))
    }

    /// 写文件，自动创建父目录
    pub async fn write_file(&self, path: &str, contents: &str) -> anyhow::Result<PathBuf> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("cannot create directory {}", parent.display()))?;
        }
        debug!(path = %target.display(), "writing file");
        tokio::fs::write(&target, contents)
            .await
            .with_context(|| format!("cannot write {}", target.display()))?;
        Ok(target)
    }

    pub async fn read_file(&self, path: &str) -> anyhow::Result<String> {
        let target = self.resolve(path);
        debug!(path = %target.display(), "reading file");
        tokio::fs::read_to_string(&target)
            .await
            .with_context(|| format!("cannot read {}", target.display()))
    }
}
