use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::state::StateView;
use crate::tools::builtin::{run_process, ToolEnvironment, EXECUTION_TIMEOUT};
use crate::tools::manifest::{ToolManifest, ToolPort, ToolPortSchema};
use crate::tools::tool::{Tool, ToolInvocation, ToolOutput};

/// 单次系统信息查询上限
const SYSINFO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct MeasureInput {
    perf_events: Vec<String>,
    #[serde(default)]
    state: StateView,
}

/// 在工作区内运行 `perf stat -e <events> ./PoC/<attack>`
pub struct MeasureHpcTool {
    manifest: ToolManifest,
    env: Arc<ToolEnvironment>,
}

impl MeasureHpcTool {
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        let manifest = ToolManifest::builder("measure_HPC")
            .description(
                "Executes the PoC binary and measures the specified performance events with the perf tool. \
                 The list of performance events must only contain events supported by perf.",
            )
            .input(
                ToolPort::new("perf_events")
                    .with_schema(ToolPortSchema::new().with_json_schema(json!({
                        "type": "array",
                        "items": {"type": "string"}
                    })))
                    .with_description("perf performance events to measure")
                    .required(),
            )
            .input(ToolPort::state())
            .build();
        Self { manifest, env }
    }
}

#[async_trait]
impl Tool for MeasureHpcTool {
    fn manifest(&self) -> &ToolManifest {
        &self.manifest
    }

    async fn call(&self, invocation: ToolInvocation) -> anyhow::Result<ToolOutput> {
        let input: MeasureInput = invocation.parse()?;
        anyhow::ensure!(!input.perf_events.is_empty(), "perf_events must not be empty");
        let args = vec![
            "stat".to_string(),
            "-e".to_string(),
            input.perf_events.join(","),
            format!("./PoC/{}", input.state.attack_vector),
        ];
        let output =
            run_process("perf", &args, self.env.workspace.root(), Some(EXECUTION_TIMEOUT)).await?;
        if output.timed_out {
            return Ok(ToolOutput::pair(
                output.stdout,
                format!(
                    "Timeout Error: Measurement of {} exceeded {} seconds.",
                    args[3],
                    EXECUTION_TIMEOUT.as_secs()
                ),
            ));
        }
        Ok(ToolOutput::pair(output.stdout, output.stderr))
    }
}

const CACHE_KEYWORDS: &[&str] = &[
    "CACHE", "LEVEL", "DCACHE", "ICACHE", "L1d", "L1i", "L2", "L3", "cache", "linesize",
    "line size",
];

const GETCONF_VARS: &[&str] = &[
    "LEVEL1_DCACHE_SIZE",
    "LEVEL1_DCACHE_ASSOC",
    "LEVEL1_DCACHE_LINESIZE",
    "LEVEL1_ICACHE_SIZE",
    "LEVEL1_ICACHE_ASSOC",
    "LEVEL1_ICACHE_LINESIZE",
    "LEVEL2_CACHE_SIZE",
    "LEVEL2_CACHE_ASSOC",
    "LEVEL2_CACHE_LINESIZE",
    "LEVEL3_CACHE_SIZE",
    "LEVEL3_CACHE_ASSOC",
    "LEVEL3_CACHE_LINESIZE",
    "LEVEL1_DCACHE_SETS",
    "LEVEL2_CACHE_SETS",
    "LEVEL3_CACHE_SETS",
];

const SYSFS_CACHE: &str = "/sys/devices/system/cpu/cpu0/cache";

/// 采集缓存信息：依次尝试 getconf、lscpu 与 sysfs
pub struct CacheInfoTool {
    manifest: ToolManifest,
}

impl CacheInfoTool {
    pub fn new() -> Self {
        let manifest = ToolManifest::builder("collect_cacheinfo")
            .description("Collect CPU cache information. This tool takes no arguments.")
            .build();
        Self { manifest }
    }
}

impl Default for CacheInfoTool {
    fn default() -> Self {
        Self::new()
    }
}

fn filter_cache_lines(text: &str) -> String {
    text.lines()
        .filter(|line| CACHE_KEYWORDS.iter().any(|key| line.trim().contains(key)))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn via_getconf(cwd: &Path) -> (String, Vec<String>) {
    let mut errors = Vec::new();
    match run_process(
        "getconf",
        &["-a".to_string(), "/".to_string()],
        cwd,
        Some(SYSINFO_TIMEOUT),
    )
    .await {
        Ok(output) if output.success && !output.stdout.trim().is_empty() => {
            return (filter_cache_lines(&output.stdout), vec![output.stderr]);
        }
        Ok(output) => errors.push(output.stderr),
        Err(err) => return (String::new(), vec![format!("{err:#}")]),
    }

    let mut lines = Vec::new();
    for var in GETCONF_VARS {
        for form in [vec![var.to_string()], vec![var.to_string(), "/".to_string()]] {
            match run_process("getconf", &form, cwd, Some(SYSINFO_TIMEOUT)).await {
                Ok(output) if output.success && !output.stdout.trim().is_empty() => {
                    lines.push(format!("{var}: {}", output.stdout.trim()));
                    break;
                }
                Ok(output) if !output.stderr.trim().is_empty() => {
                    errors.push(format!("getconf {} -> {}", form.join(" "), output.stderr.trim()));
                }
                Ok(_) => {}
                Err(err) => errors.push(format!("{err:#}")),
            }
        }
    }
    (lines.join("\n"), errors)
}

async fn via_lscpu(cwd: &Path) -> (String, String) {
    match run_process("lscpu", &[], cwd, Some(SYSINFO_TIMEOUT)).await {
        Ok(output) if output.success => (filter_cache_lines(&output.stdout), output.stderr),
        Ok(output) => (String::new(), output.stderr),
        Err(err) => (String::new(), format!("{err:#}")),
    }
}

async fn via_sysfs(base: &Path) -> (String, String) {
    async fn read(dir: &Path, name: &str) -> String {
        tokio::fs::read_to_string(dir.join(name))
            .await
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    }

    let mut entries = match tokio::fs::read_dir(base).await {
        Ok(entries) => entries,
        Err(_) => return (String::new(), String::new()),
    };
    let mut indexes = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with("index") && entry.path().is_dir() {
                    indexes.push((name, entry.path()));
                }
            }
            Ok(None) => break,
            Err(err) => return (String::new(), err.to_string()),
        }
    }
    indexes.sort();

    let mut lines = Vec::new();
    for (name, dir) in indexes {
        lines.push(format!(
            "{name}: level={} type={} size={} ways={} line_size={} sets={}",
            read(&dir, "level").await,
            read(&dir, "type").await,
            read(&dir, "size").await,
            read(&dir, "ways_of_associativity").await,
            read(&dir, "coherency_line_size").await,
            read(&dir, "number_of_sets").await,
        ));
    }
    (lines.join("\n"), String::new())
}

fn join_errors<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for CacheInfoTool {
    fn manifest(&self) -> &ToolManifest {
        &self.manifest
    }

    async fn call(&self, _invocation: ToolInvocation) -> anyhow::Result<ToolOutput> {
        let cwd = std::env::temp_dir();

        let (out, getconf_errors) = via_getconf(&cwd).await;
        let getconf_err = join_errors(getconf_errors.iter().map(String::as_str));
        if !out.trim().is_empty() {
            return Ok(ToolOutput::pair(out, getconf_err));
        }
        debug!("getconf reported no cache info, trying lscpu");

        let (out, lscpu_err) = via_lscpu(&cwd).await;
        if !out.trim().is_empty() {
            let errors = join_errors([getconf_err.as_str(), lscpu_err.as_str()]);
            return Ok(ToolOutput::pair(out, errors));
        }
        debug!("lscpu reported no cache info, trying sysfs");

        let (out, sysfs_err) = via_sysfs(Path::new(SYSFS_CACHE)).await;
        Ok(ToolOutput::pair(
            out,
            join_errors([
                getconf_err.as_str(),
                lscpu_err.as_str(),
                sysfs_err.as_str(),
            ]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_cache_lines() {
        let text = "PATH_MAX 4096\nLEVEL1_DCACHE_SIZE 32768\nL2 cache: 1 MiB\nModel name: x";
        assert_eq!(
            filter_cache_lines(text),
            "LEVEL1_DCACHE_SIZE 32768\nL2 cache: 1 MiB"
        );
    }

    #[tokio::test]
    async fn sysfs_fallback_formats_each_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index0");
        std::fs::create_dir(&index).unwrap();
        for (name, value) in [
            ("level", "1"),
            ("type", "Data"),
            ("size", "32K"),
            ("ways_of_associativity", "8"),
            ("coherency_line_size", "64"),
            ("number_of_sets", "64"),
        ] {
            std::fs::write(index.join(name), format!("{value}\n")).unwrap();
        }

        let (out, err) = via_sysfs(dir.path()).await;
        assert_eq!(
            out,
            "index0: level=1 type=Data size=32K ways=8 line_size=64 sets=64"
        );
        assert!(err.is_empty());
    }
}
