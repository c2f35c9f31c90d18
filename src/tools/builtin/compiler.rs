use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};

use crate::state::StateView;
use crate::tools::builtin::{run_process, ProcessOutput, ToolEnvironment};
use crate::tools::manifest::{ToolManifest, ToolPort};
use crate::tools::tool::{Tool, ToolInvocation, ToolOutput};

/// gcc/g++ 单次编译上限
pub const COMPILE_TIMEOUT: Duration = Duration::from_secs(120);
/// `cargo build` 上限，首次构建需要拉取依赖
pub const CARGO_BUILD_TIMEOUT: Duration = Duration::from_secs(300);

const CARGO_PROJECT: &str = "PoC/rust_cargo";
const CARGO_MANIFEST: &str = r#"[package]
name = "main"
version = "0.1.0"
edition = "2021"

[profile.dev]
overflow-checks = false
opt-level = 1

[dependencies]
rand = "0.8"
"#;

#[derive(Debug, Deserialize)]
struct CompileInput {
    file_contents: String,
    #[serde(default)]
    state: StateView,
}

fn compile_manifest(name: &str, description: &str) -> ToolManifest {
    ToolManifest::builder(name)
        .description(description)
        .input(
            ToolPort::new("file_contents")
                .with_description("the contents of the file (source code) to compile")
                .required(),
        )
        .input(ToolPort::state())
        .build()
}

/// 写入 `PoC/<attack>.<ext>` 并编译为 `PoC/<attack>`
pub struct CompilerTool {
    manifest: ToolManifest,
    program: &'static str,
    flags: &'static [&'static str],
    env: Arc<ToolEnvironment>,
}

impl CompilerTool {
    pub fn gcc(env: Arc<ToolEnvironment>) -> Self {
        Self::new(
            "compile_C",
            "Compiles C source code to a binary. Useful to compile C source code files to a binary. \
             Returns the compiler output and error messages.",
            "gcc",
            &[],
            env,
        )
    }

    pub fn gxx(env: Arc<ToolEnvironment>) -> Self {
        Self::new(
            "compile_CPP",
            "Compiles C++ source code to a binary. Useful to compile C++ source code files to a binary. \
             Returns the compiler output and error messages.",
            "g++",
            &["-std=gnu++17"],
            env,
        )
    }

    fn new(
        name: &str,
        description: &str,
        program: &'static str,
        flags: &'static [&'static str],
        env: Arc<ToolEnvironment>,
    ) -> Self {
        Self {
            manifest: compile_manifest(name, description),
            program,
            flags,
            env,
        }
    }

    fn command_args(&self, source: &str, binary: &str) -> Vec<String> {
        self.flags
            .iter()
            .map(|flag| flag.to_string())
            .chain(["-o".to_string(), binary.to_string(), source.to_string()])
            .collect()
    }
}

#[async_trait]
impl Tool for CompilerTool {
    fn manifest(&self) -> &ToolManifest {
        &self.manifest
    }

    async fn call(&self, invocation: ToolInvocation) -> anyhow::Result<ToolOutput> {
        let input: CompileInput = invocation.parse()?;
        let attack = non_empty(&input.state.attack_vector, "Spectre-v1");
        let extension = non_empty(&input.state.target_file_extension, "c");
        let source = format!("PoC/{attack}.{extension}");
        let binary = format!("PoC/{attack}");

        self.env
            .workspace
            .write_file(&source, &input.file_contents)
            .await?;
        let output = run_process(
            self.program,
            &self.command_args(&source, &binary),
            self.env.workspace.root(),
            Some(COMPILE_TIMEOUT),
        )
        .await?;
        info!(tool = %self.manifest.name, success = output.success, "compilation finished");
        Ok(compiler_output(output, &source, COMPILE_TIMEOUT))
    }
}

/// Rust 目标：在 `PoC/rust_cargo` 中用 cargo 构建，再把二进制复制到 `PoC/<attack>`
pub struct CargoCompilerTool {
    manifest: ToolManifest,
    env: Arc<ToolEnvironment>,
}

impl CargoCompilerTool {
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            manifest: compile_manifest(
                "compile_rust",
                "Compiles Rust source code to a binary inside a cargo project. Useful to compile \
                 Rust source code files to a binary. Returns the compiler output and error messages.",
            ),
            env,
        }
    }

    fn build_args() -> Vec<String> {
        vec![
            "build".to_string(),
            "--manifest-path".to_string(),
            format!("{CARGO_PROJECT}/Cargo.toml"),
        ]
    }

    fn bin_source(attack: &str) -> String {
        format!("{CARGO_PROJECT}/src/bin/{attack}.rs")
    }

    fn built_binary(attack: &str) -> String {
        format!("{CARGO_PROJECT}/target/debug/{attack}")
    }
}

#[async_trait]
impl Tool for CargoCompilerTool {
    fn manifest(&self) -> &ToolManifest {
        &self.manifest
    }

    async fn call(&self, invocation: ToolInvocation) -> anyhow::Result<ToolOutput> {
        let input: CompileInput = invocation.parse()?;
        let attack = non_empty(&input.state.attack_vector, "Spectre-v1");
        let workspace = &self.env.workspace;

        let source = format!("PoC/{attack}.rs");
        workspace.write_file(&source, &input.file_contents).await?;
        workspace
            .write_file(&format!("{CARGO_PROJECT}/Cargo.toml"), CARGO_MANIFEST)
            .await?;
        workspace
            .write_file(&Self::bin_source(attack), &input.file_contents)
            .await?;

        let output = run_process(
            "cargo",
            &Self::build_args(),
            workspace.root(),
            Some(CARGO_BUILD_TIMEOUT),
        )
        .await?;
        info!(tool = %self.manifest.name, success = output.success, "cargo build finished");

        if output.success {
            let built = workspace.resolve(&Self::built_binary(attack));
            let target = workspace.resolve(&format!("PoC/{attack}"));
            tokio::fs::copy(&built, &target).await.with_context(|| {
                format!("cannot copy {} to {}", built.display(), target.display())
            })?;
        }
        Ok(compiler_output(output, &source, CARGO_BUILD_TIMEOUT))
    }
}

fn compiler_output(output: ProcessOutput, source: &str, limit: Duration) -> ToolOutput {
    if output.timed_out {
        let message = format!(
            "Timeout Error: Compilation of {source} exceeded {} seconds.",
            limit.as_secs()
        );
        error!("{message}");
        return ToolOutput::pair(output.stdout, message);
    }
    ToolOutput::pair(output.stdout, output.stderr)
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
