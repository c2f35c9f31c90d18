mod common;

use common::{call, profile};
use pocflow::{AgentMessage, ConversationState, Counter, NodeId, Router, ToolResultMessage};

fn state() -> ConversationState {
    ConversationState::new(profile(), vec!["how to flush?".into()])
}

#[test]
fn programmer_prefers_tools_then_retrieval_then_reflection() {
    let router = Router::Programmer { retrieval: true };
    let mut state = state();

    state.push_agent(AgentMessage::text("ProgrammerAgent0", "").with_tool_calls(vec![call("c1", "compile_C")]));
    assert_eq!(router.route(&state), NodeId::ProgrammerTools);

    state
        .push_tool_result(ToolResultMessage::new("compile_C", "c1", "ok"))
        .unwrap();
    state.push_agent(AgentMessage::text("ProgrammerAgent0", "compiled"));
    assert_eq!(router.route(&state), NodeId::Retriever);
    assert_eq!(
        Router::Programmer { retrieval: false }.route(&state),
        NodeId::Reflection
    );
}

#[test]
fn reflection_at_limit_answers_pending_calls_first() {
    let router = Router::Reflection {
        limit: 2,
        exit: NodeId::End,
    };
    let mut state = state();
    state.increment(Counter::Reflection);
    state.increment(Counter::Reflection);
    state.push_agent(
        AgentMessage::text("ProgrammerReflectionAgent0", "one more run")
            .with_tool_calls(vec![call("c9", "execute_binaries")]),
    );

    assert_eq!(router.route(&state), NodeId::ReflectionTools);

    state
        .push_tool_result(ToolResultMessage::new("execute_binaries", "c9", "done"))
        .unwrap();
    assert_eq!(router.route(&state), NodeId::End);
}

#[test]
fn reflection_limit_one_without_calls_moves_to_evaluator() {
    let router = Router::Reflection {
        limit: 1,
        exit: NodeId::Evaluator,
    };
    let mut state = state();
    state.increment(Counter::Reflection);
    state.push_agent(AgentMessage::text("ProgrammerReflectionAgent0", "looks fine"));

    assert_eq!(router.route(&state), NodeId::Evaluator);
}

#[test]
fn reflection_under_limit_returns_to_programmer() {
    let router = Router::Reflection {
        limit: 8,
        exit: NodeId::End,
    };
    let mut state = state();
    state.increment(Counter::Reflection);
    state.push_agent(AgentMessage::text("ProgrammerReflectionAgent0", "fix the timing loop"));

    assert_eq!(router.route(&state), NodeId::Programmer);
}

#[test]
fn evaluator_limit_is_inclusive() {
    let router = Router::Evaluator { limit: 2 };
    let mut state = state();
    state.increment(Counter::Evaluation);
    state.push_agent(AgentMessage::text("ProgrammerEvaluatorAgent0", "checking"));
    assert_eq!(router.route(&state), NodeId::Evaluator);

    state.increment(Counter::Evaluation);
    state.push_agent(
        AgentMessage::text("ProgrammerEvaluatorAgent0", "")
            .with_tool_calls(vec![call("c1", "store_content")]),
    );
    assert_eq!(router.route(&state), NodeId::End);
}

#[test]
fn router_targets_cover_every_route() {
    let router = Router::Reflection {
        limit: 1,
        exit: NodeId::Evaluator,
    };
    assert_eq!(
        router.targets(),
        vec![NodeId::ReflectionTools, NodeId::Programmer, NodeId::Evaluator]
    );
    assert!(Router::Evaluator { limit: 1 }.targets().contains(&NodeId::End));
}
