use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{PocFlowError, Result};
use crate::flow::{NodeId, Workflow};
use crate::state::ConversationState;

use super::types::RunReport;

/// 默认步数上限
pub const DEFAULT_STEP_BUDGET: u32 = 70;

/// 工作流执行器：逐个运行节点，由出边选择下一个节点
#[derive(Clone, Debug)]
pub struct WorkflowEngine {
    workflow: Arc<Workflow>,
    step_budget: u32,
}

impl WorkflowEngine {
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }

    pub fn with_step_budget(mut self, step_budget: u32) -> Self {
        self.step_budget = step_budget;
        self
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn step_budget(&self) -> u32 {
        self.step_budget
    }

    /// 运行到终止节点；超出步数上限时返回 `StepBudgetExceeded`
    pub async fn run(&self, state: &mut ConversationState) -> Result<RunReport> {
        let workflow = &self.workflow;
        info!(
            workflow = %workflow.name(),
            run_id = %state.profile().run_id,
            budget = self.step_budget,
            "workflow started"
        );

        let mut current = workflow.start();
        let mut trace = Vec::new();
        while !current.is_terminal() {
            if trace.len() as u32 >= self.step_budget {
                warn!(budget = self.step_budget, node = %current, "step budget exhausted");
                return Err(PocFlowError::StepBudgetExceeded(self.step_budget));
            }

            let action = workflow
                .node(current)
                .ok_or_else(|| PocFlowError::UnknownNode(current.to_string()))?;
            debug!(node = %current, kind = action.kind(), step = trace.len() + 1, "running node");
            action.run(state).await?;
            trace.push(current);

            let edge = workflow
                .edge(current)
                .ok_or_else(|| PocFlowError::UnknownNode(current.to_string()))?;
            let next: NodeId = edge.next(state);
            debug!(from = %current, to = %next, step = trace.len(), "transition");
            current = next;
        }

        let report = RunReport::new(workflow.name(), trace, state);
        info!(
            workflow = %report.workflow,
            steps = report.steps,
            exec_done = report.gate.exec_done,
            "workflow completed"
        );
        Ok(report)
    }
}
