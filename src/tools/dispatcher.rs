use tracing::{debug, info, warn};

use crate::agent::{ToolCall, ToolResultMessage};
use crate::error::Result;
use crate::flow::PhaseGate;
use crate::state::ConversationState;
use crate::tools::format::render_output;
use crate::tools::manifest::STATE_PORT;
use crate::tools::registry::ToolSet;
use crate::tools::tool::ToolInvocation;

/// 工具节点：按调用顺序执行最新 Agent 消息中的工具调用
#[derive(Clone, Debug)]
pub struct ToolDispatcher {
    label: String,
    tools: ToolSet,
    gate: Option<PhaseGate>,
}

impl ToolDispatcher {
    pub fn new(label: impl Into<String>, tools: ToolSet) -> Self {
        Self {
            label: label.into(),
            tools,
            gate: None,
        }
    }

    pub fn with_gate(mut self, gate: PhaseGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// 返回追加的结果消息数
    pub async fn dispatch(&self, state: &mut ConversationState) -> Result<usize> {
        let calls = state.last_tool_calls().to_vec();
        if calls.is_empty() {
            warn!(dispatcher = %self.label, "No tool calls found.");
            return Ok(0);
        }

        for call in &calls {
            let content = self.run_call(call, state).await;
            state.push_tool_result(ToolResultMessage::new(
                call.name.clone(),
                call.id.clone(),
                content,
            ))?;
        }
        Ok(calls.len())
    }

    async fn run_call(&self, call: &ToolCall, state: &mut ConversationState) -> String {
        if let Some(gate) = &self.gate {
            if !gate.permits(call, state) {
                info!(tool = %call.name, "refusing tool call before gate tool has run");
                return gate.refusal(call);
            }
        }

        let Some(tool) = self.tools.get(&call.name) else {
            warn!(dispatcher = %self.label, tool = %call.name, "tool not bound to this node");
            return format!("ERROR: Tool '{}' is not registered in this node.", call.name);
        };

        let mut invocation = ToolInvocation::from(call);
        if tool.manifest().accepts_state() && !invocation.args.contains_key(STATE_PORT) {
            invocation
                .args
                .insert(STATE_PORT.to_string(), state.view().to_value());
        }

        info!(tool = %call.name, "Invoking tool");
        let gate = self
            .gate
            .as_ref()
            .filter(|gate| gate.is_gate_tool(&call.name));
        match tool.call(invocation).await {
            Ok(output) => {
                if let Some(gate) = gate {
                    gate.record(state, output.plain_text());
                }
                let rendered = render_output(&self.label, &output);
                debug!(tool = %call.name, output = %rendered, "tool finished");
                rendered
            }
            Err(err) => {
                warn!(tool = %call.name, error = %err, "tool failed");
                let rendered = format!("Tool execution error: {err:#}");
                // 失败时也打开门，错误文本作为执行输出
                if let Some(gate) = gate {
                    gate.record(state, rendered.clone());
                }
                rendered
            }
        }
    }
}
