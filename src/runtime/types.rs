use serde::Serialize;

use crate::flow::NodeId;
use crate::state::{ConversationState, Counters, GateFlags};

// 运行时类型定义

/// 一次运行的结果摘要
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub workflow: String,
    pub run_id: String,
    pub steps: u32,
    #[serde(serialize_with = "serialize_trace")]
    pub trace: Vec<NodeId>,
    pub counters: Counters,
    pub gate: GateFlags,
    pub conversation_len: usize,
}

impl RunReport {
    pub(crate) fn new(workflow: &str, trace: Vec<NodeId>, state: &ConversationState) -> Self {
        Self {
            workflow: workflow.to_string(),
            run_id: state.profile().run_id.clone(),
            steps: trace.len() as u32,
            trace,
            counters: state.counters(),
            gate: state.gate_flags().clone(),
            conversation_len: state.conversation().len(),
        }
    }

    /// 某节点被访问的次数
    pub fn visits(&self, id: NodeId) -> usize {
        self.trace.iter().filter(|visited| **visited == id).count()
    }
}

fn serialize_trace<S: serde::Serializer>(trace: &[NodeId], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(trace.iter().map(NodeId::as_str))
}
