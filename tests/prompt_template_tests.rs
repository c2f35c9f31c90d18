mod common;

use std::sync::Arc;

use common::{call, profile, SpyTool};
use pocflow::prompt::parse_template;
use pocflow::{
    Agent, AgentMessage, AgentRole, ConversationState, LlmResponse, MessageRole, PocFlowError,
    PromptAgent, PromptTemplateLoader, ScriptedClient, Tool, ToolOutput, ToolResultMessage,
    ToolSet,
};

const PROGRAMMER: &str = r#"
v1:
  - type: system
    prompt: "Write a {{ target_language }} PoC for {{attack_vector}}."
  - type: placeholder
    prompt: "{{conversation}}"
v2:
  - type: human
    prompt: "Use template T{{ template_number }}."
"#;

#[test]
fn loader_resolves_phase_directory_and_version() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("Online"))?;
    std::fs::write(dir.path().join("Online/ProgrammerAgentPrompt.yaml"), PROGRAMMER)?;
    let loader = PromptTemplateLoader::new(dir.path());

    let template = loader.load("ProgrammerAgent", "v1", Some("Online"))?;
    assert_eq!(template.entries().len(), 2);
    assert_eq!(template.version(), "v1");

    let err = loader.load("ProgrammerAgent", "v7", Some("Online")).unwrap_err();
    assert!(matches!(err, PocFlowError::TemplateVersionMissing { .. }));
    assert!(err.to_string().contains("v1, v2"), "{err}");

    let err = loader
        .load("ProgrammerReflectionAgent", "v1", Some("Online"))
        .unwrap_err();
    assert!(matches!(err, PocFlowError::TemplateNotFound(_)));
    assert!(err.is_config_error());
    Ok(())
}

#[test]
fn unknown_variable_is_rejected() {
    let raw = "v1:\n  - type: system\n    prompt: \"Hello {{ secret_key }}\"\n";
    let err = parse_template("ProgrammerAgent", "v1", raw, "inline.yaml").unwrap_err();
    assert!(matches!(err, PocFlowError::InvalidTemplate { .. }));
    assert!(err.to_string().contains("secret_key"));
}

#[test]
fn version_must_be_a_list() {
    let raw = "v1:\n  type: system\n";
    let err = parse_template("ProgrammerAgent", "v1", raw, "inline.yaml").unwrap_err();
    assert!(err.to_string().contains("must be a list"), "{err}");
}

#[test]
fn empty_version_falls_back_to_default_system_message() -> anyhow::Result<()> {
    let template = parse_template("ProgrammerAgent", "v1", "v1: []\n", "inline.yaml")?;
    let state = ConversationState::new(profile(), Vec::new());
    let messages = template.render(&state.snapshot())?;
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].content,
        "ProgrammerAgent is running without a configured prompt."
    );
    Ok(())
}

#[test]
fn rendering_expands_fields_and_conversation() -> anyhow::Result<()> {
    let template = parse_template("ProgrammerAgent", "v1", PROGRAMMER, "inline.yaml")?;
    let mut state = ConversationState::new(profile(), Vec::new());
    state.push_agent(
        AgentMessage::text("ProgrammerAgent0", "compiling").with_tool_calls(vec![call("c1", "compile_C")]),
    );
    state.push_tool_result(ToolResultMessage::new("compile_C", "c1", "ok"))?;

    let messages = template.render(&state.snapshot())?;

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].role, MessageRole::System);
    assert_eq!(messages[0].content, "Write a C PoC for Spectre-v1.");
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].tool_calls.len(), 1);
    assert_eq!(messages[2].role, MessageRole::Tool);
    assert_eq!(messages[2].tool_call_id.as_deref(), Some("c1"));
    Ok(())
}

#[test]
fn agent_rejects_fields_outside_its_role() {
    let raw = "v1:\n  - type: system\n    prompt: \"{{ last_exec_output }}\"\n";
    let template = parse_template("ProgrammerAgent", "v1", raw, "inline.yaml").unwrap();
    let client = Arc::new(ScriptedClient::new(Vec::new()));
    let err = PromptAgent::new(AgentRole::Programmer, template, client)
        .err()
        .expect("programmer cannot read execution output");
    assert!(err.is_config_error());
}

#[tokio::test]
async fn prompt_agent_sends_tools_and_repairs_call_ids() -> anyhow::Result<()> {
    let template = parse_template("ProgrammerAgent", "v1", PROGRAMMER, "inline.yaml")?;
    let client = Arc::new(ScriptedClient::new([LlmResponse::text("  compiling now  ")
        .with_tool_calls(vec![call("dup", "compile_C"), call("dup", "compile_C")])]));
    let tools = ToolSet::new(vec![
        SpyTool::stateful("compile_C", ToolOutput::pair("", "")) as Arc<dyn Tool>,
    ]);
    let agent = PromptAgent::new(AgentRole::Programmer, template, client.clone())?.with_tools(&tools);
    assert_eq!(agent.name(), "ProgrammerAgent0");
    assert_eq!(agent.tool_names(), vec!["compile_C"]);

    let state = ConversationState::new(profile(), Vec::new());
    let message = agent.invoke(&state.snapshot()).await?;

    assert_eq!(message.content, "compiling now");
    assert_eq!(message.tool_calls.len(), 2);
    assert_ne!(message.tool_calls[0].id, message.tool_calls[1].id);

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "compile_C");
    assert!(requests[0].tools[0].parameters["properties"].get("state").is_none());
    Ok(())
}
