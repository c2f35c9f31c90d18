pub mod builtin;
pub mod dispatcher;
pub mod format;
pub mod manifest;
pub mod registry;
pub mod tool;
pub mod workspace;

pub use builtin::{register_builtin_tools, ToolEnvironment};
pub use dispatcher::ToolDispatcher;
pub use format::render_output;
pub use manifest::{ToolManifest, ToolManifestBuilder, ToolPort, ToolPortSchema, STATE_PORT};
pub use registry::{ToolRegistry, ToolSet};
pub use tool::{Tool, ToolInvocation, ToolOutput};
pub use workspace::RunWorkspace;
