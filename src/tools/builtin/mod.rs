// 内置工具：编译、执行、性能计数、资源读取与文档存储

mod compiler;
mod executor;
mod perf;
mod readers;
mod storage;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::process::Command;
use tracing::info;

use crate::error::Result;
use crate::tools::registry::ToolRegistry;
use crate::tools::workspace::RunWorkspace;

pub use compiler::{CargoCompilerTool, CompilerTool, CARGO_BUILD_TIMEOUT, COMPILE_TIMEOUT};
pub use executor::{ExecuteBinariesTool, EXECUTION_TIMEOUT};
pub use perf::{CacheInfoTool, MeasureHpcTool};
pub use readers::{ResourceKind, ResourceReaderTool};
pub use storage::{SaveMissingMetricsTool, StoreContentTool};

/// 内置工具共享的运行环境
#[derive(Clone, Debug)]
pub struct ToolEnvironment {
    pub workspace: RunWorkspace,
    /// 题目、模板、参考源码与评估指标所在目录
    pub resources_dir: PathBuf,
    /// 检索文档根目录
    pub docs_root: PathBuf,
}

impl ToolEnvironment {
    pub fn new(
        workspace: RunWorkspace,
        resources_dir: impl Into<PathBuf>,
        docs_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            workspace,
            resources_dir: resources_dir.into(),
            docs_root: docs_root.into(),
        }
    }
}

/// 注册全部内置工具
pub fn register_builtin_tools(registry: &mut ToolRegistry, env: &ToolEnvironment) -> Result<()> {
    let env = Arc::new(env.clone());
    registry.register(Arc::new(CompilerTool::gcc(env.clone())))?;
    registry.register(Arc::new(CompilerTool::gxx(env.clone())))?;
    registry.register(Arc::new(CargoCompilerTool::new(env.clone())))?;
    registry.register(Arc::new(ExecuteBinariesTool::new(env.clone())))?;
    registry.register(Arc::new(MeasureHpcTool::new(env.clone())))?;
    registry.register(Arc::new(CacheInfoTool::new()))?;
    for kind in ResourceKind::ALL {
        registry.register(Arc::new(ResourceReaderTool::new(kind, env.clone())))?;
    }
    registry.register(Arc::new(StoreContentTool::new(env.clone())))?;
    registry.register(Arc::new(SaveMissingMetricsTool::new(env)))?;
    Ok(())
}

/// 外部进程的输出
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub timed_out: bool,
}

/// 在给定目录运行命令；超时后子进程被杀掉并返回 `timed_out`
pub(crate) async fn run_process(
    program: &str,
    args: &[String],
    cwd: &Path,
    timeout: Option<Duration>,
) -> anyhow::Result<ProcessOutput> {
    info!(command = %format!("{program} {}", args.join(" ")), cwd = %cwd.display(), "[+] Running command");
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command
        .spawn()
        .with_context(|| format!("failed to start `{program}`"))?;
    let waited = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(result) => result,
            Err(_) => {
                return Ok(ProcessOutput {
                    timed_out: true,
                    ..ProcessOutput::default()
                })
            }
        },
        None => child.wait_with_output().await,
    };
    let output = waited.with_context(|| format!("failed to wait for `{program}`"))?;

    Ok(ProcessOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
        timed_out: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_builtin_once() {
        let dir = tempfile::tempdir().unwrap();
        let env = ToolEnvironment::new(
            RunWorkspace::at(dir.path().join("ws")),
            dir.path().join("resources"),
            dir.path().join("docs"),
        );
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry, &env).unwrap();

        let names: Vec<&str> = registry.names().collect();
        for expected in [
            "compile_C",
            "compile_CPP",
            "compile_rust",
            "execute_binaries",
            "measure_HPC",
            "collect_cacheinfo",
            "read_problem_statement",
            "template_code_reader",
            "source_code_reader",
            "evaluation_metrics_reader",
            "store_content",
            "save_missing_metrics",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert_eq!(registry.len(), 12);
        assert!(register_builtin_tools(&mut registry, &env).is_err());
    }
}
