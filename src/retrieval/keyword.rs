use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info};

use super::Retriever;
use crate::state::StateView;
use crate::tools::ToolOutput;

const CHUNK_SIZE: usize = 6000;
const CHUNK_OVERLAP: usize = 1500;
const EXTENSIONS: [&str; 2] = ["txt", "md"];

struct Chunk {
    source: PathBuf,
    text: String,
}

/// 基于关键词重合度的文档检索，返回最佳片段
#[derive(Clone, Debug)]
pub struct KeywordRetriever {
    documents: PathBuf,
}

impl KeywordRetriever {
    pub fn new(documents: impl Into<PathBuf>) -> Self {
        Self {
            documents: documents.into(),
        }
    }

    pub fn documents(&self) -> &Path {
        &self.documents
    }

    async fn load_chunks(&self) -> anyhow::Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        let mut pending = vec![self.documents.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("cannot read documents directory {}", dir.display()))?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let matches = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| EXTENSIONS.contains(&ext));
                if !matches {
                    continue;
                }
                let text = tokio::fs::read_to_string(&path).await?;
                info!(source = %path.display(), "Loaded document");
                chunks.extend(split(&text).into_iter().map(|text| Chunk {
                    source: path.clone(),
                    text,
                }));
            }
        }
        Ok(chunks)
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// 按字符边界切分为重叠窗口
fn split(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= CHUNK_SIZE {
        return vec![text.to_string()];
    }
    let step = CHUNK_SIZE - CHUNK_OVERLAP;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + CHUNK_SIZE).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

fn score(query: &HashSet<String>, chunk: &str) -> usize {
    let lowered = chunk.to_lowercase();
    query
        .iter()
        .map(|term| lowered.matches(term.as_str()).count())
        .sum()
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str, _state: &StateView) -> anyhow::Result<ToolOutput> {
        let chunks = self.load_chunks().await?;
        let query_terms = terms(query);
        let best = chunks
            .iter()
            .map(|chunk| (score(&query_terms, &chunk.text), chunk))
            .filter(|(score, _)| *score > 0)
            .max_by_key(|(score, _)| *score);

        let Some((score, chunk)) = best else {
            return Ok(ToolOutput::pair("", "No relevant documents found."));
        };
        debug!(query, score, source = %chunk.source.display(), "retrieved chunk");
        Ok(ToolOutput::pair(
            query,
            format!("Source: {}\nContent: {}", chunk.source.display(), chunk.text),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_text_is_split_with_overlap() {
        let text = "a".repeat(CHUNK_SIZE * 2);
        let chunks = split(&text);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= CHUNK_SIZE));
    }

    #[tokio::test]
    async fn best_matching_document_wins() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("delay.md"), "Controlled delay loops with rdtscp timing.")?;
        std::fs::write(dir.path().join("other.txt"), "Array initialization of probe buffers.")?;
        std::fs::write(dir.path().join("ignored.pdf"), "controlled delay controlled delay")?;

        let retriever = KeywordRetriever::new(dir.path());
        let output = retriever
            .retrieve("Controlled Delay", &StateView::default())
            .await?;
        match output {
            ToolOutput::Pair(query, body) => {
                assert_eq!(query, "Controlled Delay");
                assert!(body.contains("delay.md"));
            }
            other => panic!("unexpected output {other:?}"),
        }
        Ok(())
    }
}
