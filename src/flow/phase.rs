use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentRole};
use crate::config::Limits;
use crate::error::{PocFlowError, Result};
use crate::flow::builder::WorkflowBuilder;
use crate::flow::gate::PhaseGate;
use crate::flow::nodes::{AgentNode, NodeAction, RetrieverNode};
use crate::flow::routes::Router;
use crate::flow::types::{NodeId, Workflow};
use crate::retrieval::Retriever;
use crate::tools::{ToolDispatcher, ToolSet};

/// 运行阶段
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Drafting,
    GapAnalysis,
    RagSynthesis,
    Online,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Drafting,
        Phase::GapAnalysis,
        Phase::RagSynthesis,
        Phase::Online,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Drafting => "drafting",
            Phase::GapAnalysis => "gap-analysis",
            Phase::RagSynthesis => "rag-synthesis",
            Phase::Online => "online",
        }
    }

    /// 提示模板所在子目录
    pub fn prompt_dir(&self) -> &'static str {
        match self {
            Phase::Drafting => "Drafting",
            Phase::GapAnalysis => "Offline_1",
            Phase::RagSynthesis => "Offline_2",
            Phase::Online => "Online",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.name() == name)
            .ok_or_else(|| PocFlowError::UnknownPhase {
                name: name.to_string(),
                available: Self::ALL.map(|phase| phase.name()).join(", "),
            })
    }

    pub fn descriptor(&self) -> PhaseDescriptor {
        const PROGRAMMER: &[&str] = &[
            "read_problem_statement",
            "collect_cacheinfo",
            "compile_C",
            "compile_CPP",
            "compile_rust",
        ];
        const REFLECTION: &[&str] =
            &["compile_C", "compile_CPP", "measure_HPC", "execute_binaries"];

        match self {
            Phase::Drafting => PhaseDescriptor {
                phase: *self,
                retrieval: false,
                evaluator: None,
                programmer_tools: PROGRAMMER,
                reflection_tools: REFLECTION,
            },
            Phase::GapAnalysis => PhaseDescriptor {
                phase: *self,
                retrieval: false,
                evaluator: Some(EvaluatorSpec {
                    gated: false,
                    tools: &[
                        "evaluation_metrics_reader",
                        "source_code_reader",
                        "save_missing_metrics",
                    ],
                }),
                programmer_tools: PROGRAMMER,
                reflection_tools: REFLECTION,
            },
            Phase::RagSynthesis => PhaseDescriptor {
                phase: *self,
                retrieval: false,
                evaluator: Some(EvaluatorSpec {
                    gated: true,
                    tools: &["execute_binaries", "source_code_reader", "store_content"],
                }),
                programmer_tools: &[
                    "read_problem_statement",
                    "collect_cacheinfo",
                    "template_code_reader",
                    "compile_C",
                    "compile_CPP",
                    "compile_rust",
                ],
                reflection_tools: &["compile_C", "compile_CPP", "compile_rust", "measure_HPC"],
            },
            Phase::Online => PhaseDescriptor {
                phase: *self,
                retrieval: true,
                evaluator: None,
                programmer_tools: PROGRAMMER,
                reflection_tools: &[
                    "compile_C",
                    "compile_CPP",
                    "compile_rust",
                    "measure_HPC",
                    "execute_binaries",
                ],
            },
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = PocFlowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvaluatorSpec {
    /// 是否启用执行门控
    pub gated: bool,
    pub tools: &'static [&'static str],
}

/// 描述一个阶段包含哪些节点、工具与门控
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseDescriptor {
    pub phase: Phase,
    pub retrieval: bool,
    pub evaluator: Option<EvaluatorSpec>,
    pub programmer_tools: &'static [&'static str],
    pub reflection_tools: &'static [&'static str],
}

/// 组装工作流所需的已构造组件
#[derive(Clone)]
pub struct WorkflowComponents {
    pub programmer: Arc<dyn Agent>,
    pub reflection: Arc<dyn Agent>,
    pub evaluator: Option<Arc<dyn Agent>>,
    pub programmer_tools: ToolSet,
    pub reflection_tools: ToolSet,
    pub evaluator_tools: ToolSet,
    pub retriever: Option<Arc<dyn Retriever>>,
}

impl PhaseDescriptor {
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids = vec![NodeId::Programmer, NodeId::ProgrammerTools];
        if self.retrieval {
            ids.push(NodeId::Retriever);
        }
        ids.extend([NodeId::Reflection, NodeId::ReflectionTools]);
        if self.evaluator.is_some() {
            ids.extend([NodeId::Evaluator, NodeId::EvaluatorTools]);
        }
        ids
    }

    pub fn gate(&self) -> Option<PhaseGate> {
        self.evaluator
            .filter(|spec| spec.gated)
            .map(|_| PhaseGate::default())
    }

    /// 按阶段描述构建并校验工作流图
    pub fn build_workflow(&self, parts: WorkflowComponents, limits: &Limits) -> Result<Workflow> {
        let mut builder = WorkflowBuilder::new(self.phase.name());
        let gate = self.gate();

        let mut programmer = AgentNode::new(parts.programmer, AgentRole::Programmer.counter());
        if self.retrieval {
            programmer = programmer.draining_retrievals();
        }
        builder
            .set_start(NodeId::Programmer)
            .add_node(NodeId::Programmer, NodeAction::Agent(programmer))
            .add_node(
                NodeId::ProgrammerTools,
                NodeAction::Tools(ToolDispatcher::new(
                    AgentRole::Programmer.label(),
                    parts.programmer_tools,
                )),
            )
            .connect_routed(
                NodeId::Programmer,
                Router::Programmer {
                    retrieval: self.retrieval,
                },
            )
            .connect(NodeId::ProgrammerTools, NodeId::Programmer);

        if self.retrieval {
            let retriever = parts.retriever.ok_or_else(|| PocFlowError::InvalidGraph {
                workflow: self.phase.name().to_string(),
                reason: "retrieval phase without a retriever".to_string(),
            })?;
            builder
                .add_node(
                    NodeId::Retriever,
                    NodeAction::Retriever(RetrieverNode::new(
                        NodeId::Retriever.as_str(),
                        retriever,
                    )),
                )
                .connect(NodeId::Retriever, NodeId::Programmer);
        }

        let reflection_exit = if self.evaluator.is_some() {
            NodeId::Evaluator
        } else {
            NodeId::End
        };
        builder
            .add_node(
                NodeId::Reflection,
                NodeAction::Agent(AgentNode::new(
                    parts.reflection,
                    AgentRole::Reflection.counter(),
                )),
            )
            .add_node(
                NodeId::ReflectionTools,
                NodeAction::Tools(ToolDispatcher::new(
                    AgentRole::Reflection.label(),
                    parts.reflection_tools,
                )),
            )
            .connect_routed(
                NodeId::Reflection,
                Router::Reflection {
                    limit: limits.reflection_limit,
                    exit: reflection_exit,
                },
            )
            .connect(NodeId::ReflectionTools, NodeId::Reflection);

        if self.evaluator.is_some() {
            let evaluator = parts.evaluator.ok_or_else(|| PocFlowError::InvalidGraph {
                workflow: self.phase.name().to_string(),
                reason: "evaluation phase without an evaluator agent".to_string(),
            })?;
            let mut node = AgentNode::new(evaluator, AgentRole::Evaluator.counter());
            let mut dispatcher =
                ToolDispatcher::new(AgentRole::Evaluator.label(), parts.evaluator_tools);
            if let Some(gate) = gate {
                if dispatcher.tools().get(gate.tool_name()).is_none() {
                    return Err(PocFlowError::InvalidGraph {
                        workflow: self.phase.name().to_string(),
                        reason: format!(
                            "gated evaluator is missing its gate tool `{}`",
                            gate.tool_name()
                        ),
                    });
                }
                node = node.gated(gate.clone());
                dispatcher = dispatcher.with_gate(gate);
            }
            builder
                .add_node(NodeId::Evaluator, NodeAction::Agent(node))
                .add_node(NodeId::EvaluatorTools, NodeAction::Tools(dispatcher))
                .connect_routed(
                    NodeId::Evaluator,
                    Router::Evaluator {
                        limit: limits.evaluation_limit,
                    },
                )
                .connect(NodeId::EvaluatorTools, NodeId::Evaluator);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_round_trip_through_from_name() {
        for phase in Phase::ALL {
            assert_eq!(Phase::from_name(phase.name()).unwrap(), phase);
        }
        assert!(Phase::from_name("Offline_3").unwrap_err().is_config_error());
    }

    #[test]
    fn only_rag_synthesis_is_gated() {
        let gated: Vec<Phase> = Phase::ALL
            .into_iter()
            .filter(|phase| phase.descriptor().gate().is_some())
            .collect();
        assert_eq!(gated, vec![Phase::RagSynthesis]);
    }

    #[test]
    fn rust_compiler_bindings_follow_phase() {
        for phase in Phase::ALL {
            assert!(phase.descriptor().programmer_tools.contains(&"compile_rust"), "{phase}");
        }
        let reflecting: Vec<Phase> = Phase::ALL
            .into_iter()
            .filter(|phase| phase.descriptor().reflection_tools.contains(&"compile_rust"))
            .collect();
        assert_eq!(reflecting, vec![Phase::RagSynthesis, Phase::Online]);
    }
}
