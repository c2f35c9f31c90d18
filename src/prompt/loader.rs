use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use tracing::{debug, warn};

use crate::error::{PocFlowError, Result};
use crate::prompt::template::{Fragment, FragmentRole, PromptEntry, PromptTemplate, StateField};

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// 从 `<root>/<phase_dir>/<AgentClass>Prompt.yaml` 读取按版本划分的模板
#[derive(Clone, Debug)]
pub struct PromptTemplateLoader {
    root: PathBuf,
}

impl PromptTemplateLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn template_path(&self, class_name: &str, phase_dir: Option<&str>) -> PathBuf {
        let dir = match phase_dir {
            Some(phase) => self.root.join(phase),
            None => self.root.clone(),
        };
        dir.join(format!("{class_name}Prompt.yaml"))
    }

    pub fn load(
        &self,
        class_name: &str,
        version: &str,
        phase_dir: Option<&str>,
    ) -> Result<PromptTemplate> {
        let path = self.template_path(class_name, phase_dir);
        let file = path.display().to_string();
        if !path.is_file() {
            return Err(PocFlowError::TemplateNotFound(file));
        }
        let raw = std::fs::read_to_string(&path)?;
        let template = parse_template(class_name, version, &raw, &file)?;
        debug!(template = %file, version, entries = template.entries().len(), "loaded prompt template");
        Ok(template)
    }
}

fn invalid(file: &str, reason: impl Into<String>) -> PocFlowError {
    PocFlowError::InvalidTemplate {
        file: file.to_string(),
        reason: reason.into(),
    }
}

/// 解析模板文本；空模板退化为一条默认系统消息
pub fn parse_template(
    class_name: &str,
    version: &str,
    raw: &str,
    file: &str,
) -> Result<PromptTemplate> {
    let document: Value = serde_yaml::from_str(raw).map_err(|err| invalid(file, err.to_string()))?;
    let mapping = match document {
        Value::Null => serde_yaml::Mapping::new(),
        Value::Mapping(mapping) => mapping,
        _ => return Err(invalid(file, "top level must be a mapping of versions")),
    };

    let Some(versioned) = mapping.get(version) else {
        let available = mapping
            .keys()
            .filter_map(|key| key.as_str().map(str::to_string))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(PocFlowError::TemplateVersionMissing {
            version: version.to_string(),
            file: file.to_string(),
            available,
        });
    };

    let raw_entries = match versioned {
        Value::Null => Vec::new(),
        Value::Sequence(items) => items.clone(),
        _ => {
            return Err(invalid(
                file,
                format!("template version '{version}' must be a list"),
            ))
        }
    };

    let mut entries = Vec::new();
    for (index, item) in raw_entries.into_iter().enumerate() {
        let entry: RawEntry =
            serde_yaml::from_value(item).map_err(|err| invalid(file, format!("entry {index}: {err}")))?;
        let kind = entry.kind.as_deref().unwrap_or_default().trim().to_ascii_lowercase();
        match kind.as_str() {
            "placeholder" => {
                let raw_name = entry.prompt.or(entry.name).unwrap_or_default();
                let name = raw_name.trim().trim_start_matches('{').trim_end_matches('}').trim();
                let field = StateField::from_name(name)
                    .ok_or_else(|| invalid(file, format!("unknown placeholder `{name}`")))?;
                entries.push(PromptEntry::Placeholder(field));
            }
            "system" | "human" | "ai" => {
                let role = match kind.as_str() {
                    "system" => FragmentRole::System,
                    "human" => FragmentRole::Human,
                    _ => FragmentRole::Ai,
                };
                let text = entry.prompt.unwrap_or_default();
                entries.push(PromptEntry::Fragment(Fragment::parse(role, text, file)?));
            }
            other => warn!(file, index, kind = other, "Unknown prompt entry type; skipping."),
        }
    }

    if entries.is_empty() {
        warn!(file, version, "No messages found, using a default system message.");
        let fallback = Fragment::parse(
            FragmentRole::System,
            format!("{class_name} is running without a configured prompt."),
            file,
        )?;
        entries.push(PromptEntry::Fragment(fallback));
    }

    Ok(PromptTemplate::new(class_name, version, entries))
}
