use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::ToolCall;
use crate::tools::manifest::ToolManifest;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolInvocation {
    pub fn new<T: Into<String>>(name: T, args: Map<String, Value>) -> Self {
        Self {
            id: crate::agent::message::call_id(),
            name: name.into(),
            args,
        }
    }

    pub fn parse<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_value(Value::Object(self.args.clone()))
            .with_context(|| format!("invalid arguments for `{}`", self.name))
    }
}

impl From<&ToolCall> for ToolInvocation {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            args: call.args.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutput {
    Text(String),
    Pair(String, String),
    /// Ordered label → text sections.
    Sections(Vec<(String, String)>),
}

impl ToolOutput {
    pub fn text(value: impl Into<String>) -> Self {
        ToolOutput::Text(value.into())
    }

    pub fn pair(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        ToolOutput::Pair(stdout.into(), stderr.into())
    }

    pub fn sections<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        ToolOutput::Sections(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn plain_text(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Pair(stdout, stderr) => format!("stdout:\n{stdout}\nstderr:\n{stderr}"),
            ToolOutput::Sections(entries) => entries
                .iter()
                .map(|(key, value)| format!("{key}: {value}"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn manifest(&self) -> &ToolManifest;

    fn name(&self) -> &str {
        &self.manifest().name
    }

    async fn call(&self, invocation: ToolInvocation) -> anyhow::Result<ToolOutput>;
}
