#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pocflow::state::StateView;
use pocflow::{
    Agent, AgentMessage, RunProfile, Retriever, StateSnapshot, Tool, ToolCall, ToolInvocation,
    ToolManifest, ToolOutput, ToolPort,
};
use serde_json::{Map, Value};

pub fn profile() -> RunProfile {
    RunProfile {
        attack_vector: "Spectre-v1".into(),
        target_language: "C".into(),
        target_file_extension: "c".into(),
        victim_function: 1,
        template_number: 3,
        model_key: "gpt-4o".into(),
        run_id: "test-run".into(),
    }
}

pub fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

pub fn call(id: &str, name: &str) -> ToolCall {
    ToolCall::with_id(id, name, Map::new())
}

/// Tool double that records every invocation.
pub struct SpyTool {
    manifest: ToolManifest,
    output: Result<ToolOutput, String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Map<String, Value>>>,
}

impl SpyTool {
    pub fn new(name: &str, output: ToolOutput) -> Arc<Self> {
        Self::build(name, Ok(output), false)
    }

    pub fn stateful(name: &str, output: ToolOutput) -> Arc<Self> {
        Self::build(name, Ok(output), true)
    }

    pub fn failing(name: &str, message: &str) -> Arc<Self> {
        Self::build(name, Err(message.to_string()), false)
    }

    fn build(name: &str, output: Result<ToolOutput, String>, with_state: bool) -> Arc<Self> {
        let mut builder = ToolManifest::builder(name).input(ToolPort::new("file_path"));
        if with_state {
            builder = builder.input(ToolPort::state());
        }
        Arc::new(Self {
            manifest: builder.build(),
            output,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Map<String, Value>> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Tool for SpyTool {
    fn manifest(&self) -> &ToolManifest {
        &self.manifest
    }

    async fn call(&self, invocation: ToolInvocation) -> anyhow::Result<ToolOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(invocation.args.clone());
        match &self.output {
            Ok(output) => Ok(output.clone()),
            Err(message) => Err(anyhow::anyhow!(message.clone())),
        }
    }
}

/// Agent double replaying prepared messages, then plain "done".
pub struct ScriptedAgent {
    name: String,
    replies: Mutex<VecDeque<AgentMessage>>,
    invocations: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new(name: &str, replies: Vec<AgentMessage>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            replies: Mutex::new(replies.into()),
            invocations: AtomicUsize::new(0),
        })
    }

    pub fn silent(name: &str) -> Arc<Self> {
        Self::new(name, Vec::new())
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _snapshot: &StateSnapshot) -> pocflow::Result<AgentMessage> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().pop_front();
        Ok(reply.unwrap_or_else(|| AgentMessage::text(self.name.clone(), "done")))
    }
}

/// Retriever double answering every query with a fixed document.
pub struct StaticRetriever {
    pub queries: Mutex<Vec<String>>,
}

impl StaticRetriever {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, query: &str, _state: &StateView) -> anyhow::Result<ToolOutput> {
        self.queries.lock().push(query.to_string());
        Ok(ToolOutput::pair(
            query,
            "Source: notes.md\nContent: flush the probe array first",
        ))
    }
}
