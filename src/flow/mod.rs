// Flow 模块 - 工作流图定义、路由与阶段

pub mod builder;
pub mod gate;
pub mod nodes;
pub mod phase;
pub mod routes;
pub mod types;

pub use builder::WorkflowBuilder;
pub use gate::PhaseGate;
pub use nodes::{AgentNode, NodeAction, RetrieverNode};
pub use phase::{EvaluatorSpec, Phase, PhaseDescriptor, WorkflowComponents};
pub use routes::Router;
pub use types::{Edge, NodeId, Workflow};
