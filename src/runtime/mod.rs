// 运行时执行引擎模块

mod executor;
mod types;

pub use executor::{WorkflowEngine, DEFAULT_STEP_BUDGET};
pub use types::RunReport;
