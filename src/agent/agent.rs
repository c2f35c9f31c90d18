use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use tracing::debug;

use super::message::{call_id, AgentMessage};
use crate::error::{PocFlowError, Result};
use crate::llm::{DynLlmClient, LlmRequest, ToolDefinition};
use crate::prompt::{PromptTemplate, StateField};
use crate::state::{Counter, StateSnapshot};
use crate::tools::ToolSet;

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    async fn invoke(&self, snapshot: &StateSnapshot) -> Result<AgentMessage>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Programmer,
    Reflection,
    Evaluator,
}

impl AgentRole {
    pub fn class_name(&self) -> &'static str {
        match self {
            AgentRole::Programmer => "ProgrammerAgent",
            AgentRole::Reflection => "ProgrammerReflectionAgent",
            AgentRole::Evaluator => "ProgrammerEvaluatorAgent",
        }
    }

    pub fn node_name(&self) -> String {
        format!("{}0", self.class_name())
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgentRole::Programmer => "Programmer",
            AgentRole::Reflection => "Reflection",
            AgentRole::Evaluator => "Evaluator",
        }
    }

    pub fn counter(&self) -> Counter {
        match self {
            AgentRole::Programmer => Counter::Draft,
            AgentRole::Reflection => Counter::Reflection,
            AgentRole::Evaluator => Counter::Evaluation,
        }
    }

    pub fn declared_fields(&self) -> BTreeSet<StateField> {
        use StateField::*;
        let fields: &[StateField] = match self {
            AgentRole::Programmer => &[
                AttackVector,
                TargetLanguage,
                TargetFileExtension,
                VictimFunction,
                TemplateNumber,
                RetrievalQuestions,
                RetrievalResponses,
                Conversation,
            ],
            AgentRole::Reflection => &[
                AttackVector,
                TargetLanguage,
                TargetFileExtension,
                VictimFunction,
                TemplateNumber,
                Conversation,
            ],
            AgentRole::Evaluator => &[
                AttackVector,
                TargetLanguage,
                TargetFileExtension,
                VictimFunction,
                TemplateNumber,
                ModelKey,
                LastExecOutput,
                Conversation,
            ],
        };
        fields.iter().copied().collect()
    }
}

pub struct PromptAgent {
    name: String,
    template: PromptTemplate,
    client: DynLlmClient,
    tools: Vec<ToolDefinition>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl PromptAgent {
    pub fn new(role: AgentRole, template: PromptTemplate, client: DynLlmClient) -> Result<Self> {
        let declared = role.declared_fields();
        if let Some(field) = template.variables().into_iter().find(|f| !declared.contains(f)) {
            return Err(PocFlowError::InvalidTemplate {
                file: template.name().to_string(),
                reason: format!("`{field}` is not available to {}", role.class_name()),
            });
        }
        Ok(Self {
            name: role.node_name(),
            template,
            client,
            tools: Vec::new(),
            temperature: 0.0,
            max_tokens: None,
        })
    }

    pub fn with_tools(mut self, tools: &ToolSet) -> Self {
        self.tools = tools.definitions();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name.as_str()).collect()
    }
}

#[async_trait]
impl Agent for PromptAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, snapshot: &StateSnapshot) -> Result<AgentMessage> {
        let messages = self.template.render(snapshot)?;
        let request = LlmRequest {
            messages,
            tools: self.tools.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            metadata: None,
        };
        let response = self.client.complete(request).await?;

        let mut seen = HashSet::new();
        let tool_calls = response
            .tool_calls
            .into_iter()
            .map(|mut call| {
                if call.id.is_empty() || !seen.insert(call.id.clone()) {
                    call.id = call_id();
                    seen.insert(call.id.clone());
                }
                call
            })
            .collect::<Vec<_>>();
        debug!(agent = %self.name, tool_calls = tool_calls.len(), "agent responded");

        Ok(AgentMessage {
            author: self.name.clone(),
            content: response.content.trim().to_string(),
            tool_calls,
        })
    }
}
