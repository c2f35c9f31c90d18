pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod llm;
pub mod prompt;
pub mod retrieval;
pub mod runtime;
pub mod state;
pub mod tools;
pub mod utils;

pub use agent::{
    Agent, AgentMessage, AgentRole, ConversationMessage, MessageRole, PromptAgent, ToolCall,
    ToolResultMessage,
};
pub use cli::{assemble, RunAssembly};
pub use config::{EnvConfig, Limits, PathsConfig, RunConfig};
pub use error::{PocFlowError, Result};
pub use flow::{
    Edge, NodeAction, NodeId, Phase, PhaseDescriptor, PhaseGate, Router, Workflow,
    WorkflowBuilder, WorkflowComponents,
};
pub use llm::{
    DynLlmClient, LlmClient, LlmMessage, LlmRequest, LlmResponse, LocalEchoClient, ModelRegistry,
    ProviderKind, ProviderSpec, ScriptedClient, ToolDefinition,
};
#[cfg(feature = "openai-client")]
pub use llm::OpenAiClient;
pub use prompt::{PromptTemplate, PromptTemplateLoader, StateField};
pub use retrieval::{KeywordRetriever, Retriever};
pub use runtime::{RunReport, WorkflowEngine, DEFAULT_STEP_BUDGET};
pub use state::{
    ConversationState, Counter, Counters, GateFlags, RunProfile, StateSnapshot, StateView,
};
pub use tools::{
    register_builtin_tools, RunWorkspace, Tool, ToolDispatcher, ToolEnvironment, ToolInvocation,
    ToolManifest, ToolManifestBuilder, ToolOutput, ToolPort, ToolPortSchema, ToolRegistry,
    ToolSet,
};
pub use utils::logging;
