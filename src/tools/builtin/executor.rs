use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::tools::builtin::{run_process, ToolEnvironment};
use crate::tools::manifest::{ToolManifest, ToolPort, ToolPortSchema};
use crate::tools::tool::{Tool, ToolInvocation, ToolOutput};

/// 每个二进制的执行时限
pub const EXECUTION_TIMEOUT: Duration = Duration::from_secs(40);

fn default_path() -> String {
    "PoC".to_string()
}

fn default_core() -> u32 {
    2
}

#[derive(Debug, Deserialize)]
struct ExecuteInput {
    #[serde(default = "default_path")]
    file_path: String,
    #[serde(default = "default_core")]
    cpu_core: u32,
}

/// 按文件名顺序用 `taskset` 绑核运行产物目录下的全部二进制
pub struct ExecuteBinariesTool {
    manifest: ToolManifest,
    env: Arc<ToolEnvironment>,
    timeout: Duration,
}

impl ExecuteBinariesTool {
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        let manifest = ToolManifest::builder("execute_binaries")
            .description(
                "Executes all the binaries at the specified path. \
                 Returns the execution output and the execution error.",
            )
            .input(ToolPort::new("file_path").with_description("the path of the file to execute"))
            .input(
                ToolPort::new("cpu_core")
                    .with_schema(ToolPortSchema::new().with_type("integer"))
                    .with_description("the cpu core in which the file will be executed"),
            )
            .build();
        Self {
            manifest,
            env,
            timeout: EXECUTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `PoC/<attack>` 指向二进制时扫描其所在目录
    fn artifact_dir(&self, file_path: &str) -> PathBuf {
        let resolved = self.env.workspace.resolve(file_path);
        if resolved.is_dir() {
            resolved
        } else {
            resolved
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.env.workspace.root().to_path_buf())
        }
    }
}

async fn list_binaries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut binaries = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && path.extension().is_none() {
            binaries.push(path);
        }
    }
    binaries.sort();
    Ok(binaries)
}

#[async_trait]
impl Tool for ExecuteBinariesTool {
    fn manifest(&self) -> &ToolManifest {
        &self.manifest
    }

    async fn call(&self, invocation: ToolInvocation) -> anyhow::Result<ToolOutput> {
        let input: ExecuteInput = invocation.parse()?;
        let dir = self.artifact_dir(&input.file_path);
        info!(input = %input.file_path, dir = %dir.display(), "locating binaries");

        let binaries = match list_binaries(&dir).await {
            Ok(binaries) => binaries,
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "artifact directory unavailable");
                Vec::new()
            }
        };
        if binaries.is_empty() {
            return Ok(ToolOutput::pair(
                "",
                format!("No binaries found in {}", input.file_path),
            ));
        }

        let mut stdout = String::new();
        let mut stderr = String::new();
        for binary in &binaries {
            let args = vec![
                "-c".to_string(),
                input.cpu_core.to_string(),
                binary.display().to_string(),
            ];
            match run_process("taskset", &args, self.env.workspace.root(), Some(self.timeout)).await
            {
                Ok(output) if output.timed_out => {
                    let message = format!(
                        "Timeout Error: Execution of {} exceeded {} seconds.",
                        binary.display(),
                        self.timeout.as_secs()
                    );
                    error!("{message}");
                    stderr.push_str(&message);
                }
                Ok(output) => {
                    stdout.push_str(&output.stdout);
                    stderr.push_str(&output.stderr);
                }
                Err(err) => {
                    error!(binary = %binary.display(), error = %err, "execution failed");
                    stderr.push_str(&format!("{err:#}\n"));
                }
            }
        }

        debug!(stdout = %stdout, stderr = %stderr, "execution finished");
        Ok(ToolOutput::pair(stdout, stderr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::workspace::RunWorkspace;

    #[tokio::test]
    async fn missing_artifact_dir_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let env = Arc::new(ToolEnvironment::new(
            RunWorkspace::at(dir.path()),
            dir.path(),
            dir.path(),
        ));
        let tool = ExecuteBinariesTool::new(env);
        let mut args = serde_json::Map::new();
        args.insert("file_path".into(), "PoC/Spectre-v1".into());
        args.insert("cpu_core".into(), 1.into());

        let output = tool
            .call(ToolInvocation::new("execute_binaries", args))
            .await
            .unwrap();
        assert_eq!(
            output,
            ToolOutput::pair("", "No binaries found in PoC/Spectre-v1")
        );
    }

    #[tokio::test]
    async fn only_extensionless_files_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b", "a", "a.c", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let binaries = list_binaries(dir.path()).await.unwrap();
        let names: Vec<_> = binaries
            .iter()
            .filter_map(|path| path.file_name()?.to_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
