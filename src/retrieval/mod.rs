pub mod keyword;

use async_trait::async_trait;

use crate::state::StateView;
use crate::tools::ToolOutput;

pub use keyword::KeywordRetriever;

/// 检索接口：根据问题返回 `(query, formatted documents)`
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, state: &StateView) -> anyhow::Result<ToolOutput>;
}
