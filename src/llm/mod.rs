pub mod client;
pub mod echo;
#[cfg(feature = "openai-client")]
pub mod http;
pub mod providers;
pub mod scripted;
pub mod types;

pub use client::{DynLlmClient, LlmClient};
pub use echo::LocalEchoClient;
#[cfg(feature = "openai-client")]
pub use http::OpenAiClient;
pub use providers::{model_family, ModelRegistry, ProviderKind, ProviderSpec};
pub use scripted::ScriptedClient;
pub use types::{LlmMessage, LlmRequest, LlmResponse, ToolDefinition};
