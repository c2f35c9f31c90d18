// 运行状态模块

mod conversation;
mod profile;
mod snapshot;

pub use conversation::{ConversationState, Counter, Counters, Decision, GateFlags};
pub use profile::RunProfile;
pub use snapshot::{StateSnapshot, StateView};
