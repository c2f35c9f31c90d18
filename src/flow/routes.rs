use tracing::{info, warn};

use crate::flow::types::NodeId;
use crate::state::ConversationState;

/// 路由策略，纯函数：只读状态，返回下一个节点
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Router {
    /// 有工具调用去工具节点；检索阶段还有问题时去检索；否则进入反思
    Programmer { retrieval: bool },
    /// 达到上限后离开到 `exit`，离开前先补齐未应答的工具调用
    Reflection { limit: u32, exit: NodeId },
    /// 达到上限终止；有工具调用去工具节点；否则继续评估
    Evaluator { limit: u32 },
}

impl Router {
    pub fn route(&self, state: &ConversationState) -> NodeId {
        match self {
            Router::Programmer { retrieval } => route_programmer(state, *retrieval),
            Router::Reflection { limit, exit } => route_reflection(state, *limit, *exit),
            Router::Evaluator { limit } => route_evaluator(state, *limit),
        }
    }

    pub fn targets(&self) -> Vec<NodeId> {
        match self {
            Router::Programmer { retrieval: true } => vec![
                NodeId::ProgrammerTools,
                NodeId::Retriever,
                NodeId::Reflection,
            ],
            Router::Programmer { retrieval: false } => {
                vec![NodeId::ProgrammerTools, NodeId::Reflection]
            }
            Router::Reflection { exit, .. } => {
                vec![NodeId::ReflectionTools, NodeId::Programmer, *exit]
            }
            Router::Evaluator { .. } => {
                vec![NodeId::EvaluatorTools, NodeId::Evaluator, NodeId::End]
            }
        }
    }
}

fn route_programmer(state: &ConversationState, retrieval: bool) -> NodeId {
    if !state.last_tool_calls().is_empty() {
        NodeId::ProgrammerTools
    } else if retrieval && state.has_pending_questions() {
        NodeId::Retriever
    } else {
        NodeId::Reflection
    }
}

fn route_reflection(state: &ConversationState, limit: u32, exit: NodeId) -> NodeId {
    let count = state.counters().reflection_count;
    if count >= limit {
        if state.has_unanswered_tool_calls() {
            info!(count, limit, "reflection limit reached, answering pending tool calls first");
            return NodeId::ReflectionTools;
        }
        info!(count, limit, next = %exit, "reflection limit reached");
        return exit;
    }
    if !state.last_tool_calls().is_empty() {
        NodeId::ReflectionTools
    } else {
        NodeId::Programmer
    }
}

fn route_evaluator(state: &ConversationState, limit: u32) -> NodeId {
    let count = state.counters().evaluation_count;
    if count >= limit {
        if state.has_unanswered_tool_calls() {
            warn!(count, limit, "evaluation limit reached with unanswered tool calls");
        }
        info!(count, limit, "evaluation limit reached, ending run");
        return NodeId::End;
    }
    if !state.last_tool_calls().is_empty() {
        NodeId::EvaluatorTools
    } else {
        NodeId::Evaluator
    }
}
