use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::llm::ToolDefinition;

pub const STATE_PORT: &str = "state";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<ToolPort>,
}

impl ToolManifest {
    pub fn builder(name: impl Into<String>) -> ToolManifestBuilder {
        ToolManifestBuilder::new(name)
    }

    pub fn accepts_state(&self) -> bool {
        self.inputs.iter().any(|port| port.name == STATE_PORT)
    }

    pub fn definition(&self) -> ToolDefinition {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for port in self.inputs.iter().filter(|port| port.name != STATE_PORT) {
            properties.insert(port.name.clone(), port.property());
            if port.required {
                required.push(Value::String(port.name.clone()));
            }
        }
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_default(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolPort {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<ToolPortSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl ToolPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            description: None,
            required: false,
        }
    }

    pub fn state() -> Self {
        Self::new(STATE_PORT).with_schema(ToolPortSchema::new().with_type("object"))
    }

    pub fn with_schema(mut self, schema: ToolPortSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn property(&self) -> Value {
        let mut property = match self.schema.as_ref().and_then(|s| s.json_schema.clone()) {
            Some(Value::Object(schema)) => schema,
            _ => {
                let mut map = Map::new();
                let type_name = self
                    .schema
                    .as_ref()
                    .and_then(|s| s.type_name.clone())
                    .unwrap_or_else(|| "string".to_string());
                map.insert("type".into(), Value::String(type_name));
                map
            }
        };
        if let Some(description) = &self.description {
            property
                .entry("description")
                .or_insert_with(|| Value::String(description.clone()));
        }
        Value::Object(property)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolPortSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<Value>,
}

impl ToolPortSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_json_schema(mut self, schema: Value) -> Self {
        self.json_schema = Some(schema);
        self
    }
}

#[derive(Clone, Debug)]
pub struct ToolManifestBuilder {
    manifest: ToolManifest,
}

impl ToolManifestBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            manifest: ToolManifest {
                name: name.into(),
                description: None,
                inputs: Vec::new(),
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.manifest.description = Some(description.into());
        self
    }

    pub fn input(mut self, port: ToolPort) -> Self {
        self.manifest.inputs.push(port);
        self
    }

    pub fn build(self) -> ToolManifest {
        self.manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_hides_state_port() {
        let manifest = ToolManifest::builder("compile_C")
            .description("Compile C source")
            .input(ToolPort::new("file_contents").required())
            .input(ToolPort::state())
            .build();

        assert!(manifest.accepts_state());
        let definition = manifest.definition();
        let properties = definition.parameters["properties"].as_object().unwrap();
        assert!(properties.contains_key("file_contents"));
        assert!(!properties.contains_key(STATE_PORT));
        assert_eq!(definition.parameters["required"], json!(["file_contents"]));
    }
}
