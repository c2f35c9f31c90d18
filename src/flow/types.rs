use std::collections::BTreeMap;
use std::fmt;

use crate::flow::nodes::NodeAction;
use crate::flow::routes::Router;
use crate::state::ConversationState;

/// 工作流节点标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Programmer,
    ProgrammerTools,
    Retriever,
    Reflection,
    ReflectionTools,
    Evaluator,
    EvaluatorTools,
    /// 终止哨兵，不对应任何节点动作
    End,
}

impl NodeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeId::Programmer => "ProgrammerAgent0",
            NodeId::ProgrammerTools => "ProgrammerAgent0Tools",
            NodeId::Retriever => "ProgrammerAgent0Retriever",
            NodeId::Reflection => "ProgrammerReflectionAgent0",
            NodeId::ReflectionTools => "ProgrammerReflectionAgent0Tools",
            NodeId::Evaluator => "ProgrammerEvaluatorAgent0",
            NodeId::EvaluatorTools => "ProgrammerEvaluatorAgent0Tools",
            NodeId::End => "__end__",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeId::End)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 节点出边：固定目标或路由函数
#[derive(Clone, Debug, PartialEq)]
pub enum Edge {
    Fixed(NodeId),
    Routed(Router),
}

impl Edge {
    pub fn next(&self, state: &ConversationState) -> NodeId {
        match self {
            Edge::Fixed(target) => *target,
            Edge::Routed(router) => router.route(state),
        }
    }

    /// 该边可能选择的全部目标
    pub fn targets(&self) -> Vec<NodeId> {
        match self {
            Edge::Fixed(target) => vec![*target],
            Edge::Routed(router) => router.targets(),
        }
    }
}

/// 已校验的工作流图
pub struct Workflow {
    pub(crate) name: String,
    pub(crate) start: NodeId,
    pub(crate) nodes: BTreeMap<NodeId, NodeAction>,
    pub(crate) edges: BTreeMap<NodeId, Edge>,
}

impl Workflow {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeAction> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, id: NodeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("start", &self.start)
            .field("edges", &self.edges)
            .finish()
    }
}
