use std::collections::{BTreeMap, BTreeSet};

use crate::error::{PocFlowError, Result};
use crate::flow::nodes::NodeAction;
use crate::flow::routes::Router;
use crate::flow::types::{Edge, NodeId, Workflow};

/// 工作流构建器，`build` 时完成图校验
pub struct WorkflowBuilder {
    name: String,
    start: Option<NodeId>,
    nodes: BTreeMap<NodeId, NodeAction>,
    edges: BTreeMap<NodeId, Edge>,
}

impl WorkflowBuilder {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            start: None,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }

    pub fn add_node(&mut self, id: NodeId, action: NodeAction) -> &mut Self {
        self.nodes.insert(id, action);
        self
    }

    pub fn set_start(&mut self, id: NodeId) -> &mut Self {
        self.start = Some(id);
        self
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) -> &mut Self {
        self.edges.insert(from, Edge::Fixed(to));
        self
    }

    pub fn connect_routed(&mut self, from: NodeId, router: Router) -> &mut Self {
        self.edges.insert(from, Edge::Routed(router));
        self
    }

    fn invalid(&self, reason: impl Into<String>) -> PocFlowError {
        PocFlowError::InvalidGraph {
            workflow: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn validate(&self) -> Result<NodeId> {
        let start = self.start.ok_or_else(|| self.invalid("no start node"))?;
        if !self.nodes.contains_key(&start) {
            return Err(self.invalid(format!("start node {start} has no action")));
        }
        if self.nodes.contains_key(&NodeId::End) {
            return Err(self.invalid("the terminal sentinel cannot carry an action"));
        }

        for id in self.nodes.keys() {
            if !self.edges.contains_key(id) {
                return Err(self.invalid(format!("node {id} has no outgoing edge")));
            }
        }
        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(self.invalid(format!("edge from unknown node {from}")));
            }
            for target in edge.targets() {
                if !target.is_terminal() && !self.nodes.contains_key(&target) {
                    return Err(self.invalid(format!("edge {from} -> {target} is dangling")));
                }
            }
        }

        let mut reached = BTreeSet::from([start]);
        let mut pending = vec![start];
        while let Some(id) = pending.pop() {
            let Some(edge) = self.edges.get(&id) else {
                continue;
            };
            for target in edge.targets() {
                if reached.insert(target) && !target.is_terminal() {
                    pending.push(target);
                }
            }
        }
        if let Some(orphan) = self.nodes.keys().find(|id| !reached.contains(id)) {
            return Err(self.invalid(format!("node {orphan} is unreachable from {start}")));
        }
        if !reached.contains(&NodeId::End) {
            return Err(self.invalid("the terminal node is unreachable"));
        }
        Ok(start)
    }

    pub fn build(self) -> Result<Workflow> {
        let start = self.validate()?;
        Ok(Workflow {
            name: self.name,
            start,
            nodes: self.nodes,
            edges: self.edges,
        })
    }
}
