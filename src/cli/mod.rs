// 命令行入口使用的装配逻辑

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::agent::{Agent, AgentRole, PromptAgent};
use crate::config::RunConfig;
use crate::error::Result;
use crate::flow::{NodeId, Phase, WorkflowComponents};
use crate::llm::{model_family, DynLlmClient, LocalEchoClient, ModelRegistry, ProviderSpec};
use crate::prompt::PromptTemplateLoader;
use crate::retrieval::{KeywordRetriever, Retriever};
use crate::runtime::WorkflowEngine;
use crate::state::ConversationState;
use crate::tools::{register_builtin_tools, RunWorkspace, ToolEnvironment, ToolRegistry, ToolSet};

/// 提示模板版本
pub const PROMPT_VERSION: &str = "v1";

/// 一次运行所需的全部已校验组件
pub struct RunAssembly {
    pub engine: WorkflowEngine,
    pub state: ConversationState,
    pub workspace: RunWorkspace,
}

/// 构建引擎与初始状态；所有配置错误都在状态创建之前返回
pub fn assemble(
    config: &RunConfig,
    models: &ModelRegistry,
    client: DynLlmClient,
) -> Result<RunAssembly> {
    config.validate()?;
    let spec = models.get(&config.model_key)?;
    let paths = &config.paths;
    let phase = config.phase;
    let descriptor = phase.descriptor();

    let workspace = RunWorkspace::new(paths.workdir_root(), &config.run_id, &spec.label());
    let env = ToolEnvironment::new(workspace.clone(), paths.resources_dir(), paths.docs_root());
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, &env)?;

    let loader = PromptTemplateLoader::new(paths.prompt_dir());
    let programmer_tools = registry.select(descriptor.programmer_tools)?;
    let reflection_tools = registry.select(descriptor.reflection_tools)?;
    let evaluator_tools = match descriptor.evaluator {
        Some(evaluator) => registry.select(evaluator.tools)?,
        None => ToolSet::default(),
    };

    let build_agent = |role: AgentRole, tools: &ToolSet| -> Result<Arc<dyn Agent>> {
        let template = loader.load(role.class_name(), PROMPT_VERSION, Some(phase.prompt_dir()))?;
        let agent = PromptAgent::new(role, template, client.clone())?
            .with_tools(tools)
            .with_temperature(spec.temperature)
            .with_max_tokens(spec.max_tokens);
        Ok(Arc::new(agent))
    };

    let programmer = build_agent(AgentRole::Programmer, &programmer_tools)?;
    let reflection = build_agent(AgentRole::Reflection, &reflection_tools)?;
    let evaluator = match descriptor.evaluator {
        Some(_) => Some(build_agent(AgentRole::Evaluator, &evaluator_tools)?),
        None => None,
    };
    let retriever = descriptor.retrieval.then(|| {
        let documents = paths
            .docs_root()
            .join(model_family(&config.model_key))
            .join(&config.attack_vector);
        Arc::new(KeywordRetriever::new(documents)) as Arc<dyn Retriever>
    });

    let workflow = descriptor.build_workflow(
        WorkflowComponents {
            programmer,
            reflection,
            evaluator,
            programmer_tools,
            reflection_tools,
            evaluator_tools,
            retriever,
        },
        &config.limits,
    )?;
    info!(
        phase = %phase,
        model = %config.model_key,
        workspace = %workspace.root().display(),
        nodes = workflow.node_ids().count(),
        "workflow assembled"
    );

    let engine = WorkflowEngine::new(workflow).with_step_budget(config.limits.step_budget);
    let state = ConversationState::new(config.profile(), config.retrieval_questions.clone());
    Ok(RunAssembly {
        engine,
        state,
        workspace,
    })
}

/// 用本地回显客户端构建并校验某阶段的工作流
pub fn validate_phase(config: &RunConfig, models: &ModelRegistry) -> Result<Vec<NodeId>> {
    let assembly = assemble(config, models, Arc::new(LocalEchoClient))?;
    Ok(assembly.engine.workflow().node_ids().collect())
}

#[derive(Clone, Debug, Serialize)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub prompt_dir: &'static str,
    pub nodes: Vec<&'static str>,
    pub gated: bool,
}

pub fn phase_summaries() -> Vec<PhaseSummary> {
    Phase::ALL
        .into_iter()
        .map(|phase| {
            let descriptor = phase.descriptor();
            PhaseSummary {
                phase,
                prompt_dir: phase.prompt_dir(),
                nodes: descriptor.node_ids().iter().map(NodeId::as_str).collect(),
                gated: descriptor.gate().is_some(),
            }
        })
        .collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelSummary {
    pub key: String,
    pub family: &'static str,
    #[serde(flatten)]
    pub spec: ProviderSpec,
}

pub fn model_summaries(models: &ModelRegistry) -> Vec<ModelSummary> {
    models
        .iter()
        .map(|(key, spec)| ModelSummary {
            key: key.to_string(),
            family: model_family(key),
            spec: spec.clone(),
        })
        .collect()
}
