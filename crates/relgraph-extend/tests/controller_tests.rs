//! End-to-end tests for the iteration controller with a mock generator.

use relgraph_core::{CandidateSource, Normalizer, Reconciler, RelationCandidate};
use relgraph_extend::{
    read_artifact_edges, BuildConfig, ControllerPhase, GeneratorConfig, IterationController,
    IterationState, MockGenerator,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn seed_candidate(
    sentence: &str,
    head: &str,
    tail: &str,
    relation: &str,
    confidence: f64,
) -> RelationCandidate {
    RelationCandidate {
        sentence: sentence.to_string(),
        head: head.to_string(),
        tail: tail.to_string(),
        relation: relation.to_string(),
        confidence: Some(confidence),
        iteration: 0,
        source: CandidateSource::Seed,
    }
}

fn config_for(data_dir: &Path) -> BuildConfig {
    BuildConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    }
}

fn controller_with(
    data_dir: &Path,
    generator: MockGenerator,
) -> IterationController {
    IterationController::new(
        config_for(data_dir),
        GeneratorConfig {
            backoff_base: std::time::Duration::from_millis(1),
            ..Default::default()
        },
        Arc::new(generator),
        Arc::new(Reconciler::new(Normalizer::default())),
    )
    .unwrap()
}

#[tokio::test]
async fn empty_generator_converges_at_version_one() {
    let dir = tempdir().unwrap();
    let mut controller = controller_with(dir.path(), MockGenerator::empty());

    let seeded = controller
        .seed_with_candidates(&[
            seed_candidate("数组的查找具有线性时间复杂度", "数组", "查找", "依赖", 0.9),
            seed_candidate("数组的查找具有线性时间复杂度", "查找", "时间复杂度", "拥有", 0.85),
        ])
        .unwrap();
    assert_eq!(seeded, 2);

    let summary = controller.run().await.unwrap();

    // A generator that never proposes anything must stop after the first
    // iteration, regardless of max_iterations.
    assert_eq!(summary.final_version, 1);
    assert_eq!(controller.phase(), ControllerPhase::Converged);
    assert_eq!(summary.artifact_paths.len(), 2);
}

#[tokio::test]
async fn discovered_relations_grow_the_graph_until_convergence() {
    let dir = tempdir().unwrap();
    let generator = MockGenerator::with_relations([(
        ("数组".to_string(), "时间复杂度".to_string()),
        ("拥有".to_string(), 0.9),
    )]);
    let mut controller = controller_with(dir.path(), generator);

    controller
        .seed_with_candidates(&[
            seed_candidate("数组的查找具有线性时间复杂度", "数组", "查找", "依赖", 0.9),
            seed_candidate("数组的查找具有线性时间复杂度", "查找", "时间复杂度", "拥有", 0.85),
        ])
        .unwrap();

    let summary = controller.run().await.unwrap();

    // Iteration 1 discovers (数组, 时间复杂度); iteration 2 finds nothing
    // new and converges.
    assert_eq!(summary.final_version, 2);

    let final_edges = read_artifact_edges(controller.latest_artifact_path().unwrap()).unwrap();
    assert_eq!(final_edges.len(), 3);
    assert!(final_edges
        .iter()
        .any(|e| e.source == "数组" && e.target == "时间复杂度" && e.relation == "拥有"));
}

#[tokio::test]
async fn already_related_pairs_are_not_requeried() {
    let dir = tempdir().unwrap();
    let generator = Arc::new(MockGenerator::empty());
    let mut controller = IterationController::new(
        config_for(dir.path()),
        GeneratorConfig::default(),
        Arc::clone(&generator) as Arc<dyn relgraph_extend::CandidateGenerator>,
        Arc::new(Reconciler::new(Normalizer::default())),
    )
    .unwrap();

    // Both directions of the only co-occurring pair are covered by the seed
    // edge, so the generator must never be called.
    controller
        .seed_with_candidates(&[seed_candidate("数组支持查找", "数组", "查找", "依赖", 0.9)])
        .unwrap();
    controller.run().await.unwrap();

    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn resume_continues_from_checkpoint_without_recomputation() {
    let dir = tempdir().unwrap();
    let mut controller = controller_with(dir.path(), MockGenerator::empty());
    controller
        .seed_with_candidates(&[seed_candidate("数组支持查找", "数组", "查找", "依赖", 0.9)])
        .unwrap();
    controller.run().await.unwrap();

    let state = controller.state().clone();
    let checkpoint = dir.path().join("checkpoint.json");
    state.save(&checkpoint).unwrap();

    let resumed = IterationController::resume(
        config_for(dir.path()),
        GeneratorConfig::default(),
        Arc::new(MockGenerator::empty()),
        Arc::new(Reconciler::new(Normalizer::default())),
        &checkpoint,
    )
    .unwrap();

    assert_eq!(resumed.state().version, state.version);
    assert_eq!(
        resumed.latest_artifact_path(),
        state.latest_artifact_path()
    );
    // The resumed controller still has the completed iteration's edges.
    let edges = read_artifact_edges(resumed.latest_artifact_path().unwrap()).unwrap();
    assert_eq!(edges.len(), 1);
}

#[tokio::test]
async fn history_checkpoints_are_valid_iteration_states() {
    let dir = tempdir().unwrap();
    let mut controller = controller_with(dir.path(), MockGenerator::empty());
    controller
        .seed_with_candidates(&[seed_candidate("数组支持查找", "数组", "查找", "依赖", 0.9)])
        .unwrap();
    controller.run().await.unwrap();

    let history = dir.path().join("history");
    let mut entries: Vec<_> = std::fs::read_dir(&history)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    entries.sort();
    assert!(!entries.is_empty());

    for entry in entries {
        IterationState::load(&entry).unwrap();
    }
}
