use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;

use crate::agent::ConversationMessage;
use crate::error::{PocFlowError, Result};
use crate::llm::LlmMessage;
use crate::state::StateSnapshot;

/// 模板可引用的状态字段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateField {
    AttackVector,
    TargetLanguage,
    TargetFileExtension,
    VictimFunction,
    TemplateNumber,
    ModelKey,
    RetrievalQuestions,
    RetrievalResponses,
    Conversation,
    LastExecOutput,
}

impl StateField {
    pub const ALL: [StateField; 10] = [
        StateField::AttackVector,
        StateField::TargetLanguage,
        StateField::TargetFileExtension,
        StateField::VictimFunction,
        StateField::TemplateNumber,
        StateField::ModelKey,
        StateField::RetrievalQuestions,
        StateField::RetrievalResponses,
        StateField::Conversation,
        StateField::LastExecOutput,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StateField::AttackVector => "attack_vector",
            StateField::TargetLanguage => "target_language",
            StateField::TargetFileExtension => "target_file_extension",
            StateField::VictimFunction => "victim_function",
            StateField::TemplateNumber => "template_number",
            StateField::ModelKey => "selected_model_key",
            StateField::RetrievalQuestions => "retrieval_questions",
            StateField::RetrievalResponses => "retrieval_responses",
            StateField::Conversation => "conversation",
            StateField::LastExecOutput => "last_exec_output",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    /// 可展开为消息序列的字段
    pub fn is_message_list(&self) -> bool {
        matches!(self, StateField::Conversation | StateField::RetrievalResponses)
    }

    pub fn text(&self, state: &StateSnapshot) -> String {
        let profile = state.profile();
        match self {
            StateField::AttackVector => profile.attack_vector.clone(),
            StateField::TargetLanguage => profile.target_language.clone(),
            StateField::TargetFileExtension => profile.target_file_extension.clone(),
            StateField::VictimFunction => profile.victim_function.to_string(),
            StateField::TemplateNumber => profile.template_number.to_string(),
            StateField::ModelKey => profile.model_key.clone(),
            StateField::RetrievalQuestions => state.retrieval_questions().join("\n"),
            StateField::RetrievalResponses => state
                .retrieval_responses()
                .iter()
                .map(|message| message.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
            StateField::Conversation => state
                .conversation()
                .iter()
                .map(ConversationMessage::content)
                .collect::<Vec<_>>()
                .join("\n\n"),
            StateField::LastExecOutput => state.gate_flags().last_exec_output.clone(),
        }
    }

    pub fn messages(&self, state: &StateSnapshot) -> Vec<LlmMessage> {
        match self {
            StateField::Conversation => state.conversation().iter().map(to_llm_message).collect(),
            StateField::RetrievalResponses => state
                .retrieval_responses()
                .iter()
                .map(|message| LlmMessage::assistant(message.content.clone(), Vec::new()))
                .collect(),
            other => vec![LlmMessage::user(other.text(state))],
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn to_llm_message(entry: &ConversationMessage) -> LlmMessage {
    match entry {
        ConversationMessage::Agent(message) => {
            LlmMessage::assistant(message.content.clone(), message.tool_calls.clone())
        }
        ConversationMessage::ToolResult(result) => LlmMessage::tool(
            result.tool_name.clone(),
            result.tool_call_id.clone(),
            result.content.clone(),
        ),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FragmentRole {
    System,
    Human,
    Ai,
}

/// 模板中的一段文本，`{{ var }}` 已解析为字段
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    role: FragmentRole,
    text: String,
    fields: BTreeSet<StateField>,
}

impl Fragment {
    pub fn parse(role: FragmentRole, text: impl Into<String>, file: &str) -> Result<Self> {
        let text = text.into();
        let fields = referenced_fields(&text, file)?;
        Ok(Self { role, text, fields })
    }

    pub fn fields(&self) -> &BTreeSet<StateField> {
        &self.fields
    }

    fn render(&self, state: &StateSnapshot, file: &str) -> Result<String> {
        let pattern = variable_pattern(file)?;
        let rendered = pattern.replace_all(&self.text, |caps: &regex::Captures<'_>| {
            StateField::from_name(&caps[1])
                .map(|field| field.text(state))
                .unwrap_or_else(|| caps[0].to_string())
        });
        Ok(rendered.into_owned())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptEntry {
    Fragment(Fragment),
    Placeholder(StateField),
}

/// 已校验的提示模板
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    version: String,
    entries: Vec<PromptEntry>,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, version: impl Into<String>, entries: Vec<PromptEntry>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            entries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn entries(&self) -> &[PromptEntry] {
        &self.entries
    }

    /// 模板引用的全部字段
    pub fn variables(&self) -> BTreeSet<StateField> {
        self.entries
            .iter()
            .flat_map(|entry| match entry {
                PromptEntry::Fragment(fragment) => fragment.fields.iter().copied().collect(),
                PromptEntry::Placeholder(field) => vec![*field],
            })
            .collect()
    }

    pub fn render(&self, state: &StateSnapshot) -> Result<Vec<LlmMessage>> {
        let mut messages = Vec::new();
        for entry in &self.entries {
            match entry {
                PromptEntry::Fragment(fragment) => {
                    let text = fragment.render(state, &self.name)?;
                    messages.push(match fragment.role {
                        FragmentRole::System => LlmMessage::system(text),
                        FragmentRole::Human => LlmMessage::user(text),
                        FragmentRole::Ai => LlmMessage::assistant(text, Vec::new()),
                    });
                }
                PromptEntry::Placeholder(field) => messages.extend(field.messages(state)),
            }
        }
        Ok(messages)
    }
}

fn variable_pattern(file: &str) -> Result<Regex> {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").map_err(|err| {
        PocFlowError::InvalidTemplate {
            file: file.to_string(),
            reason: err.to_string(),
        }
    })
}

fn referenced_fields(text: &str, file: &str) -> Result<BTreeSet<StateField>> {
    let pattern = variable_pattern(file)?;
    pattern
        .captures_iter(text)
        .map(|caps| {
            let name = &caps[1];
            StateField::from_name(name).ok_or_else(|| PocFlowError::InvalidTemplate {
                file: file.to_string(),
                reason: format!("unknown variable `{name}`"),
            })
        })
        .collect()
}
