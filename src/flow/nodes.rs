use std::sync::Arc;

use tracing::{info, warn};

use crate::agent::{Agent, AgentMessage};
use crate::error::Result;
use crate::flow::gate::PhaseGate;
use crate::retrieval::Retriever;
use crate::state::{ConversationState, Counter};
use crate::tools::{render_output, ToolDispatcher};

/// 调用 Agent 的节点
#[derive(Clone)]
pub struct AgentNode {
    agent: Arc<dyn Agent>,
    counter: Counter,
    drain_retrievals: bool,
    gate: Option<PhaseGate>,
}

impl AgentNode {
    pub fn new(agent: Arc<dyn Agent>, counter: Counter) -> Self {
        Self {
            agent,
            counter,
            drain_retrievals: false,
            gate: None,
        }
    }

    /// 调用模型前先合并待处理的检索结果
    pub fn draining_retrievals(mut self) -> Self {
        self.drain_retrievals = true;
        self
    }

    pub fn gated(mut self, gate: PhaseGate) -> Self {
        self.gate = Some(gate);
        self
    }

    async fn run(&self, state: &mut ConversationState) -> Result<()> {
        let name = self.agent.name();
        info!("##### {} Node Start {} #####", name, state.count(self.counter) + 1);

        if let Some(gate) = &self.gate {
            if let Some(forced) = gate.forced_message(name, state) {
                state.push_agent(forced);
                info!("##### {} Node End (gate tool forced) #####", name);
                return Ok(());
            }
        }

        if self.drain_retrievals {
            let merged = state.drain_retrievals();
            if merged > 0 {
                info!(merged, "merged retrieval responses into conversation");
            }
        }

        let snapshot = state.snapshot();
        let mut message = self.agent.invoke(&snapshot).await?;
        message.content = message.content.trim().to_string();
        state.increment(self.counter);

        if let Some(gate) = &self.gate {
            gate.observe_verdict(state, &message);
        }
        info!(
            tool_calls = message.tool_calls.len(),
            "##### {} Node End #####", name
        );
        state.push_agent(message);
        Ok(())
    }
}

/// 逐条检索问题的节点
#[derive(Clone)]
pub struct RetrieverNode {
    name: String,
    retriever: Arc<dyn Retriever>,
}

impl RetrieverNode {
    pub fn new(name: impl Into<String>, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            name: name.into(),
            retriever,
        }
    }

    async fn run(&self, state: &mut ConversationState) -> Result<()> {
        let Some(query) = state.next_question().map(str::to_string) else {
            warn!(node = %self.name, "no retrieval question left");
            return Ok(());
        };
        info!(node = %self.name, query = %query, "Retrieving");

        let rendered = match self.retriever.retrieve(&query, &state.view()).await {
            Ok(output) => render_output("Retriever", &output),
            Err(err) => {
                warn!(error = %err, "retrieval failed");
                format!("Tool execution error: {err:#}")
            }
        };
        let answer = AgentMessage::text(
            self.name.clone(),
            format!("Retrieved information for query: \"{query}\"\n{rendered}"),
        );
        state.record_retrieval(answer)
    }
}

/// 节点动作
#[derive(Clone)]
pub enum NodeAction {
    Agent(AgentNode),
    Tools(ToolDispatcher),
    Retriever(RetrieverNode),
}

impl NodeAction {
    pub async fn run(&self, state: &mut ConversationState) -> Result<()> {
        match self {
            NodeAction::Agent(node) => node.run(state).await,
            NodeAction::Tools(dispatcher) => {
                let dispatched = dispatcher.dispatch(state).await?;
                info!(dispatcher = %dispatcher.label(), dispatched, "tool node finished");
                Ok(())
            }
            NodeAction::Retriever(node) => node.run(state).await,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NodeAction::Agent(_) => "agent",
            NodeAction::Tools(_) => "tools",
            NodeAction::Retriever(_) => "retriever",
        }
    }
}
