use std::path::Path;
use std::sync::Arc;

use pocflow::cli::{phase_summaries, validate_phase};
use pocflow::{
    assemble, LocalEchoClient, ModelRegistry, NodeId, PathsConfig, Phase, PocFlowError, RunConfig,
};

fn config(phase: Phase, root: &Path) -> RunConfig {
    let path = |name: &str| root.join(name).to_string_lossy().into_owned();
    RunConfig {
        phase,
        run_id: "cli-run".to_string(),
        paths: PathsConfig {
            workdir_root: path("workdir"),
            prompt_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/prompts").to_string(),
            resources_dir: path("resources"),
            docs_root: path("RAG_Dir"),
            log_dir: path("logs"),
        },
        ..RunConfig::default()
    }
}

#[test]
fn every_phase_assembles_from_bundled_prompts() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let models = ModelRegistry::builtin();

    for phase in Phase::ALL {
        let assembly = assemble(&config(phase, dir.path()), &models, Arc::new(LocalEchoClient))?;
        let nodes: Vec<NodeId> = assembly.engine.workflow().node_ids().collect();
        let mut expected = phase.descriptor().node_ids();
        expected.sort();
        assert_eq!(nodes, expected, "{phase}");
        assert!(assembly.workspace.root().ends_with("cli-run/gpt-4o"));
        assert_eq!(assembly.engine.step_budget(), 70);
        assert!(assembly.state.conversation().is_empty());
    }
    Ok(())
}

#[test]
fn unknown_model_is_a_config_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = config(Phase::Online, dir.path());
    config.model_key = "gpt-2".to_string();

    let err = validate_phase(&config, &ModelRegistry::builtin()).unwrap_err();

    assert!(matches!(err, PocFlowError::UnknownModel { ref key, .. } if key == "gpt-2"));
    assert!(err.is_config_error());
    assert!(err.to_string().contains("gpt-4o"), "{err}");
    Ok(())
}

#[test]
fn missing_prompt_directory_fails_before_running() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = config(Phase::Drafting, dir.path());
    config.paths.prompt_dir = dir.path().join("nowhere").to_string_lossy().into_owned();

    let err = validate_phase(&config, &ModelRegistry::builtin()).unwrap_err();

    assert!(matches!(err, PocFlowError::TemplateNotFound(_)));
    Ok(())
}

#[test]
fn only_rag_synthesis_is_gated() {
    let summaries = phase_summaries();
    assert_eq!(summaries.len(), 4);

    let gated: Vec<Phase> = summaries
        .iter()
        .filter(|summary| summary.gated)
        .map(|summary| summary.phase)
        .collect();
    assert_eq!(gated, vec![Phase::RagSynthesis]);

    let online = summaries
        .iter()
        .find(|summary| summary.phase == Phase::Online)
        .unwrap();
    assert_eq!(online.prompt_dir, "Online");
    assert!(online.nodes.contains(&NodeId::Retriever.as_str()));
}

#[tokio::test]
async fn dry_run_drafting_stops_at_reflection_limit() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = config(Phase::Drafting, dir.path());
    config.limits.reflection_limit = 2;

    let mut assembly = assemble(&config, &ModelRegistry::builtin(), Arc::new(LocalEchoClient))?;
    assembly.workspace.ensure().await?;
    let report = assembly.engine.run(&mut assembly.state).await?;

    assert_eq!(
        report.trace,
        vec![
            NodeId::Programmer,
            NodeId::Reflection,
            NodeId::Programmer,
            NodeId::Reflection,
        ]
    );
    assert_eq!(report.counters.reflection_count, 2);
    assert!(assembly.workspace.root().is_dir());
    Ok(())
}
