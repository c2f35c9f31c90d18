use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::agent::{AgentMessage, ConversationMessage, ToolCall, ToolResultMessage};
use crate::error::{PocFlowError, Result};
use crate::state::profile::RunProfile;
use crate::state::snapshot::{StateSnapshot, StateView};

/// 各节点的执行计数，只增不减
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Counters {
    pub draft_count: u32,
    pub reflection_count: u32,
    pub evaluation_count: u32,
    pub query_index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Counter {
    Draft,
    Reflection,
    Evaluation,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Success,
    Fail,
}

/// 阶段门控标记，只能由 PhaseGate 写入
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateFlags {
    pub exec_done: bool,
    pub last_exec_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
}

/// 单次运行中贯穿所有节点的可变状态
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationState {
    profile: RunProfile,
    conversation: Vec<ConversationMessage>,
    counters: Counters,
    retrieval_questions: Vec<String>,
    retrieval_responses: Vec<AgentMessage>,
    gate: GateFlags,
}

impl ConversationState {
    pub fn new(profile: RunProfile, retrieval_questions: Vec<String>) -> Self {
        Self {
            profile,
            conversation: Vec::new(),
            counters: Counters::default(),
            retrieval_questions,
            retrieval_responses: Vec::new(),
            gate: GateFlags::default(),
        }
    }

    pub fn profile(&self) -> &RunProfile {
        &self.profile
    }

    pub fn conversation(&self) -> &[ConversationMessage] {
        &self.conversation
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn gate_flags(&self) -> &GateFlags {
        &self.gate
    }

    pub fn retrieval_questions(&self) -> &[String] {
        &self.retrieval_questions
    }

    pub fn retrieval_responses(&self) -> &[AgentMessage] {
        &self.retrieval_responses
    }

    pub fn last_message(&self) -> Option<&ConversationMessage> {
        self.conversation.last()
    }

    /// 最后一条消息携带的工具调用；最后一条是工具结果时为空
    pub fn last_tool_calls(&self) -> &[ToolCall] {
        self.conversation
            .last()
            .map(ConversationMessage::tool_calls)
            .unwrap_or(&[])
    }

    /// 最近一条 AgentMessage 中尚未得到结果的工具调用
    pub fn unanswered_tool_calls(&self) -> Vec<&ToolCall> {
        let Some(position) = self
            .conversation
            .iter()
            .rposition(|entry| entry.as_agent().is_some())
        else {
            return Vec::new();
        };
        let answered: HashSet<&str> = self.conversation[position + 1..]
            .iter()
            .filter_map(ConversationMessage::as_tool_result)
            .map(|result| result.tool_call_id.as_str())
            .collect();
        self.conversation[position]
            .tool_calls()
            .iter()
            .filter(|call| !answered.contains(call.id.as_str()))
            .collect()
    }

    pub fn has_unanswered_tool_calls(&self) -> bool {
        !self.unanswered_tool_calls().is_empty()
    }

    pub fn push_agent(&mut self, message: AgentMessage) {
        self.conversation.push(ConversationMessage::Agent(message));
    }

    /// 追加工具结果；结果必须对应此前某条 AgentMessage 中的调用
    pub fn push_tool_result(&mut self, result: ToolResultMessage) -> Result<()> {
        let known = self
            .conversation
            .iter()
            .flat_map(ConversationMessage::tool_calls)
            .any(|call| call.id == result.tool_call_id);
        if !known {
            return Err(PocFlowError::OrphanToolResult(result.tool_call_id));
        }
        self.conversation.push(ConversationMessage::ToolResult(result));
        Ok(())
    }

    pub fn increment(&mut self, counter: Counter) {
        match counter {
            Counter::Draft => self.counters.draft_count += 1,
            Counter::Reflection => self.counters.reflection_count += 1,
            Counter::Evaluation => self.counters.evaluation_count += 1,
        }
    }

    pub fn count(&self, counter: Counter) -> u32 {
        match counter {
            Counter::Draft => self.counters.draft_count,
            Counter::Reflection => self.counters.reflection_count,
            Counter::Evaluation => self.counters.evaluation_count,
        }
    }

    /// 下一个待检索的问题
    pub fn next_question(&self) -> Option<&str> {
        self.retrieval_questions
            .get(self.counters.query_index)
            .map(String::as_str)
    }

    pub fn has_pending_questions(&self) -> bool {
        self.counters.query_index < self.retrieval_questions.len()
    }

    /// 记录一次检索结果并推进 query_index
    pub fn record_retrieval(&mut self, answer: AgentMessage) -> Result<()> {
        if !self.has_pending_questions() {
            return Err(PocFlowError::Other(anyhow::anyhow!(
                "query index {} already past {} retrieval questions",
                self.counters.query_index,
                self.retrieval_questions.len()
            )));
        }
        self.retrieval_responses.push(answer);
        self.counters.query_index += 1;
        Ok(())
    }

    /// 将待合并的检索结果移入对话，返回合并条数
    pub fn drain_retrievals(&mut self) -> usize {
        let drained = self.retrieval_responses.len();
        self.conversation.extend(
            self.retrieval_responses
                .drain(..)
                .map(ConversationMessage::Agent),
        );
        drained
    }

    pub(crate) fn record_exec_output(&mut self, output: String) {
        if !self.gate.exec_done {
            self.gate.exec_done = true;
        }
        self.gate.last_exec_output = output;
    }

    pub(crate) fn set_decision(&mut self, decision: Decision) {
        if let Some(previous) = self.gate.decision {
            if previous != decision {
                warn!(?previous, ?decision, "Evaluator changed its decision");
            }
        }
        self.gate.decision = Some(decision);
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::new(self.clone())
    }

    /// 注入给工具的纯数据视图，不含消息
    pub fn view(&self) -> StateView {
        StateView {
            attack_vector: self.profile.attack_vector.clone(),
            target_language: self.profile.target_language.clone(),
            target_file_extension: self.profile.target_file_extension.clone(),
            victim_function: self.profile.victim_function,
            template_number: self.profile.template_number,
            model_key: self.profile.model_key.clone(),
            run_id: self.profile.run_id.clone(),
            counters: self.counters,
            retrieval_questions: self.retrieval_questions.clone(),
            exec_done: self.gate.exec_done,
            last_exec_output: self.gate.last_exec_output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn state() -> ConversationState {
        ConversationState::new(RunProfile::default(), vec!["q1".into()])
    }

    #[test]
    fn unanswered_calls_shrink_as_results_arrive() {
        let mut state = state();
        let first = ToolCall::with_id("a", "compile_C", Map::new());
        let second = ToolCall::with_id("b", "execute_binaries", Map::new());
        state.push_agent(AgentMessage::text("p", "").with_tool_calls(vec![first, second]));
        assert_eq!(state.unanswered_tool_calls().len(), 2);

        state
            .push_tool_result(ToolResultMessage::new("compile_C", "a", "ok"))
            .unwrap();
        let pending = state.unanswered_tool_calls();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "b");
        assert!(state.last_tool_calls().is_empty());
    }

    #[test]
    fn retrieval_is_bounded_by_question_count() {
        let mut state = state();
        state.record_retrieval(AgentMessage::text("r", "a1")).unwrap();
        assert_eq!(state.counters().query_index, 1);
        assert!(state.record_retrieval(AgentMessage::text("r", "a2")).is_err());
        assert_eq!(state.drain_retrievals(), 1);
        assert!(state.retrieval_responses().is_empty());
        assert_eq!(state.conversation().len(), 1);
    }

    #[test]
    fn exec_output_keeps_flag_set() {
        let mut state = state();
        state.record_exec_output("first".into());
        state.record_exec_output("second".into());
        assert!(state.gate_flags().exec_done);
        assert_eq!(state.gate_flags().last_exec_output, "second");
    }
}
