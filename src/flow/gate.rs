use serde_json::{json, Map};
use tracing::info;

use crate::agent::{AgentMessage, ToolCall};
use crate::state::{ConversationState, Decision};

/// 评估阶段门控：指定工具被分派一次之前，评估者不能调用模型或其他工具
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseGate {
    tool: String,
    artifact_dir: String,
    cpu_core: u32,
}

impl Default for PhaseGate {
    fn default() -> Self {
        Self {
            tool: "execute_binaries".to_string(),
            artifact_dir: "PoC".to_string(),
            cpu_core: 1,
        }
    }
}

impl PhaseGate {
    pub fn tool_name(&self) -> &str {
        &self.tool
    }

    pub fn is_gate_tool(&self, name: &str) -> bool {
        self.tool == name
    }

    pub fn is_open(&self, state: &ConversationState) -> bool {
        state.gate_flags().exec_done
    }

    /// 门未打开时生成强制调用消息
    pub fn forced_message(&self, author: &str, state: &ConversationState) -> Option<AgentMessage> {
        if self.is_open(state) {
            return None;
        }
        let mut args = Map::new();
        args.insert(
            "file_path".into(),
            json!(format!("{}/{}", self.artifact_dir, state.profile().attack_vector)),
        );
        args.insert("cpu_core".into(), json!(self.cpu_core));
        info!(tool = %self.tool, "forcing gate tool before evaluation");
        Some(AgentMessage::text(author, "").with_tool_calls(vec![ToolCall::new(&self.tool, args)]))
    }

    pub fn permits(&self, call: &ToolCall, state: &ConversationState) -> bool {
        self.is_open(state) || self.is_gate_tool(&call.name)
    }

    pub fn refusal(&self, call: &ToolCall) -> String {
        format!(
            "Tool '{}' was not executed: '{}' must run before any other evaluation tool.",
            call.name, self.tool
        )
    }

    /// 记录门控工具的输出（含失败文本）并打开门
    pub(crate) fn record(&self, state: &mut ConversationState, output: String) {
        let opened = !self.is_open(state);
        state.record_exec_output(output);
        if opened {
            info!(tool = %self.tool, "gate opened");
        }
    }

    /// 从评估者回复中读取 `Decision: success|fail` 行
    pub(crate) fn observe_verdict(&self, state: &mut ConversationState, message: &AgentMessage) {
        if let Some(decision) = parse_decision(&message.content) {
            state.set_decision(decision);
        }
    }
}

fn parse_decision(content: &str) -> Option<Decision> {
    content.lines().rev().find_map(|line| {
        let line = line.trim().trim_matches(['*', '#', ' ']).to_ascii_lowercase();
        let rest = line
            .strip_prefix("final decision")
            .or_else(|| line.strip_prefix("decision"))?;
        let verdict = rest
            .trim_start_matches(['*', ' '])
            .strip_prefix(':')?
            .trim()
            .trim_matches(['*', '.', '`', ' ']);
        match verdict {
            "success" => Some(Decision::Success),
            "fail" | "failure" => Some(Decision::Fail),
            _ => None,
        }
    })
}
