pub mod env;
pub mod run_config;

pub use env::EnvConfig;
pub use run_config::{Limits, PathsConfig, RunConfig};
