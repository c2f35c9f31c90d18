pub mod loader;
pub mod template;

pub use loader::{parse_template, PromptTemplateLoader};
pub use template::{Fragment, FragmentRole, PromptEntry, PromptTemplate, StateField};
