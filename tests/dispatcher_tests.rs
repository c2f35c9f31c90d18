mod common;

use std::sync::Arc;

use common::{args, call, profile, SpyTool};
use pocflow::{
    AgentMessage, ConversationState, PhaseGate, Tool, ToolDispatcher, ToolOutput,
    ToolResultMessage, ToolSet,
};
use serde_json::json;

fn tool_set(tools: &[Arc<SpyTool>]) -> ToolSet {
    ToolSet::new(
        tools
            .iter()
            .map(|tool| Arc::clone(tool) as Arc<dyn Tool>)
            .collect(),
    )
}

fn state_with_calls(calls: Vec<pocflow::ToolCall>) -> ConversationState {
    let mut state = ConversationState::new(profile(), Vec::new());
    state.push_agent(AgentMessage::text("ProgrammerAgent0", "").with_tool_calls(calls));
    state
}

fn results(state: &ConversationState) -> Vec<ToolResultMessage> {
    state
        .conversation()
        .iter()
        .filter_map(|message| message.as_tool_result().cloned())
        .collect()
}

#[tokio::test]
async fn unregistered_tool_yields_error_text() -> anyhow::Result<()> {
    let dispatcher = ToolDispatcher::new("Programmer", ToolSet::default());
    let mut state = state_with_calls(vec![call("c1", "compile_rust")]);

    let appended = dispatcher.dispatch(&mut state).await?;

    assert_eq!(appended, 1);
    let results = results(&state);
    assert_eq!(results[0].tool_call_id, "c1");
    assert_eq!(
        results[0].content,
        "ERROR: Tool 'compile_rust' is not registered in this node."
    );
    Ok(())
}

#[tokio::test]
async fn state_is_injected_only_when_declared_and_absent() -> anyhow::Result<()> {
    let stateful = SpyTool::stateful("compile_C", ToolOutput::pair("", ""));
    let plain = SpyTool::new("execute_binaries", ToolOutput::pair("ok", ""));
    let dispatcher = ToolDispatcher::new("Programmer", tool_set(&[stateful.clone(), plain.clone()]));

    let supplied = pocflow::ToolCall::with_id(
        "c2",
        "compile_C",
        args(&[("state", json!({"attack_vector": "custom"}))]),
    );
    let mut state = state_with_calls(vec![
        call("c1", "compile_C"),
        supplied,
        call("c3", "execute_binaries"),
    ]);
    dispatcher.dispatch(&mut state).await?;

    let seen = stateful.seen();
    assert_eq!(seen[0]["state"]["attack_vector"], json!("Spectre-v1"));
    assert_eq!(seen[0]["state"]["run_id"], json!("test-run"));
    assert_eq!(seen[1]["state"]["attack_vector"], json!("custom"));
    assert!(!plain.seen()[0].contains_key("state"));
    Ok(())
}

#[tokio::test]
async fn tool_failure_becomes_result_text() -> anyhow::Result<()> {
    let failing = SpyTool::failing("measure_HPC", "perf is not installed");
    let dispatcher = ToolDispatcher::new("Reflection", tool_set(&[failing]));
    let mut state = state_with_calls(vec![call("c1", "measure_HPC")]);

    dispatcher.dispatch(&mut state).await?;

    assert_eq!(
        results(&state)[0].content,
        "Tool execution error: perf is not installed"
    );
    Ok(())
}

#[tokio::test]
async fn section_formatting_is_idempotent() -> anyhow::Result<()> {
    let store = SpyTool::new("store_content", ToolOutput::sections([("a", "1"), ("b", "2")]));
    let dispatcher = ToolDispatcher::new("Evaluator", tool_set(&[store]));
    let mut state = state_with_calls(vec![call("c1", "store_content")]);
    dispatcher.dispatch(&mut state).await?;
    state.push_agent(
        AgentMessage::text("ProgrammerAgent0", "").with_tool_calls(vec![call("c2", "store_content")]),
    );
    dispatcher.dispatch(&mut state).await?;

    let results = results(&state);
    let expected = "a:\n```\n1\n```\nb:\n```\n2\n```";
    assert_eq!(results[0].content, expected);
    assert_eq!(results[1].content, expected);
    Ok(())
}

#[tokio::test]
async fn results_follow_call_order() -> anyhow::Result<()> {
    let gcc = SpyTool::new("compile_C", ToolOutput::pair("", "warning"));
    let run = SpyTool::new("execute_binaries", ToolOutput::pair("leaked", ""));
    let dispatcher = ToolDispatcher::new("Reflection", tool_set(&[gcc, run]));
    let mut state = state_with_calls(vec![
        call("c1", "compile_C"),
        call("c2", "execute_binaries"),
        call("c3", "compile_C"),
    ]);

    assert_eq!(dispatcher.dispatch(&mut state).await?, 3);

    let ids: Vec<_> = results(&state)
        .into_iter()
        .map(|result| result.tool_call_id)
        .collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
    assert_eq!(
        results(&state)[1].content,
        "Reflection Tool Output:\n```\n(\"leaked\", \"\")\n```"
    );
    assert!(!state.has_unanswered_tool_calls());
    Ok(())
}

#[tokio::test]
async fn empty_dispatch_appends_nothing() -> anyhow::Result<()> {
    let dispatcher = ToolDispatcher::new("Programmer", ToolSet::default());
    let mut state = ConversationState::new(profile(), Vec::new());
    state.push_agent(AgentMessage::text("ProgrammerAgent0", "all good"));

    assert_eq!(dispatcher.dispatch(&mut state).await?, 0);
    assert_eq!(state.conversation().len(), 1);
    Ok(())
}

#[tokio::test]
async fn gate_refuses_other_tools_until_gate_tool_succeeds() -> anyhow::Result<()> {
    let reader = SpyTool::new("source_code_reader", ToolOutput::text("int main() {}"));
    let runner = SpyTool::new("execute_binaries", ToolOutput::pair("secret: 42", ""));
    let dispatcher = ToolDispatcher::new("Evaluator", tool_set(&[reader.clone(), runner.clone()]))
        .with_gate(PhaseGate::default());

    let mut state = state_with_calls(vec![call("c1", "source_code_reader")]);
    dispatcher.dispatch(&mut state).await?;

    assert_eq!(reader.calls(), 0);
    assert!(results(&state)[0].content.contains("was not executed"));
    assert!(!state.gate_flags().exec_done);

    state.push_agent(AgentMessage::text("ProgrammerEvaluatorAgent0", "").with_tool_calls(vec![
        call("c2", "execute_binaries"),
        call("c3", "source_code_reader"),
    ]));
    dispatcher.dispatch(&mut state).await?;

    assert_eq!(runner.calls(), 1);
    assert_eq!(reader.calls(), 1);
    assert!(state.gate_flags().exec_done);
    assert!(state.gate_flags().last_exec_output.contains("secret: 42"));
    Ok(())
}

#[tokio::test]
async fn failed_gate_tool_opens_gate_with_error_text() -> anyhow::Result<()> {
    let runner = SpyTool::failing("execute_binaries", "taskset missing");
    let reader = SpyTool::new("source_code_reader", ToolOutput::text("int main() {}"));
    let dispatcher = ToolDispatcher::new("Evaluator", tool_set(&[runner, reader.clone()]))
        .with_gate(PhaseGate::default());
    let mut state = state_with_calls(vec![
        call("c1", "execute_binaries"),
        call("c2", "source_code_reader"),
    ]);

    dispatcher.dispatch(&mut state).await?;

    let results = results(&state);
    assert_eq!(results[0].content, "Tool execution error: taskset missing");
    assert!(state.gate_flags().exec_done);
    assert_eq!(state.gate_flags().last_exec_output, results[0].content);
    assert_eq!(reader.calls(), 1);
    Ok(())
}
