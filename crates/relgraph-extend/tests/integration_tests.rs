//! Integration tests for the complete relgraph pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Predictions CSV → seed candidates → reconciled version-0 artifact
//! - Iteration loop → convergence → resumable checkpoints
//!
//! Run with: cargo test --test integration_tests

use relgraph_core::{Normalizer, Reconciler};
use relgraph_extend::{
    read_artifact_edges, seed_candidates_from_csv, BuildConfig, GeneratorConfig,
    IterationController, IterationState, MockGenerator,
};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::tempdir;

fn write_predictions_csv(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("predictions.csv");
    std::fs::write(
        &path,
        "sentence,head,tail,relation,confidence\n\
         数组的查找操作具有线性时间复杂度,数组,查找,依赖,0.9\n\
         数组的查找操作具有线性时间复杂度,查找,时间复杂度,拥有,0.85\n\
         数组的查找操作具有线性时间复杂度,数组,查找,依赖,0.6\n\
         栈和队列没有关系,栈,队列,none,0.99\n\
         栈是一种线性表,栈,栈,同义,0.95\n",
    )
    .unwrap();
    path
}

fn build_config(data_dir: &std::path::Path) -> BuildConfig {
    BuildConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    }
}

// ============================================================================
// Seed → reconcile → artifact
// ============================================================================

#[test]
fn csv_seed_is_reconciled_into_version_zero() {
    let dir = tempdir().unwrap();
    let csv = write_predictions_csv(dir.path());

    let candidates = seed_candidates_from_csv(&csv).unwrap();
    // The "none" row is dropped at load time; the self-relation survives
    // until reconciliation.
    assert_eq!(candidates.len(), 4);

    let mut controller = IterationController::new(
        build_config(dir.path()),
        GeneratorConfig::default(),
        Arc::new(MockGenerator::empty()),
        Arc::new(Reconciler::new(Normalizer::default())),
    )
    .unwrap();
    let seeded = controller.seed_with_candidates(&candidates).unwrap();

    // Duplicate (数组,查找,依赖) collapses to the stronger row and the
    // self-relation is dropped: two edges remain.
    assert_eq!(seeded, 2);

    let edges = read_artifact_edges(controller.latest_artifact_path().unwrap()).unwrap();
    assert_eq!(edges.len(), 2);
    assert!(edges.iter().all(|e| e.relation != "none"));
    assert!(edges.iter().all(|e| e.source != e.target));
    let strongest = edges
        .iter()
        .find(|e| e.source == "数组" && e.target == "查找")
        .unwrap();
    assert!((strongest.confidence - 0.9).abs() < 1e-9);
}

// ============================================================================
// Full loop with growth
// ============================================================================

#[tokio::test]
async fn pipeline_discovers_extends_and_converges() {
    let dir = tempdir().unwrap();
    let csv = write_predictions_csv(dir.path());
    let candidates = seed_candidates_from_csv(&csv).unwrap();

    let generator = MockGenerator::with_relations([(
        ("数组".to_string(), "时间复杂度".to_string()),
        ("拥有".to_string(), 0.9),
    )]);
    let mut controller = IterationController::new(
        build_config(dir.path()),
        GeneratorConfig::default(),
        Arc::new(generator),
        Arc::new(Reconciler::new(Normalizer::default())),
    )
    .unwrap();
    controller.seed_with_candidates(&candidates).unwrap();

    let summary = controller.run().await.unwrap();

    // One iteration of growth, one of quiescence.
    assert_eq!(summary.final_version, 2);
    assert_eq!(summary.artifact_paths.len(), 3);

    let final_edges = read_artifact_edges(controller.latest_artifact_path().unwrap()).unwrap();
    assert_eq!(final_edges.len(), 3);
    assert!(final_edges
        .iter()
        .any(|e| e.source == "数组" && e.target == "时间复杂度"));

    // Identity keys stay unique across the whole final artifact.
    let keys: HashSet<_> = final_edges.iter().map(|e| e.key()).collect();
    assert_eq!(keys.len(), final_edges.len());

    // Every version's artifact is still loadable — nothing was overwritten.
    for path in &summary.artifact_paths {
        read_artifact_edges(path).unwrap();
    }
}

// ============================================================================
// Crash-resume
// ============================================================================

#[tokio::test]
async fn checkpoints_allow_resume_without_recomputation() {
    let dir = tempdir().unwrap();
    let csv = write_predictions_csv(dir.path());
    let candidates = seed_candidates_from_csv(&csv).unwrap();

    // First process: seed only, then "crash".
    {
        let mut controller = IterationController::new(
            build_config(dir.path()),
            GeneratorConfig::default(),
            Arc::new(MockGenerator::empty()),
            Arc::new(Reconciler::new(Normalizer::default())),
        )
        .unwrap();
        controller.seed_with_candidates(&candidates).unwrap();
    }

    // Second process: pick up the latest history checkpoint and finish.
    let history = dir.path().join("history");
    let mut checkpoints: Vec<_> = std::fs::read_dir(&history)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    checkpoints.sort();
    let latest = checkpoints.last().unwrap();
    IterationState::load(latest).unwrap();

    let mut resumed = IterationController::resume(
        build_config(dir.path()),
        GeneratorConfig::default(),
        Arc::new(MockGenerator::empty()),
        Arc::new(Reconciler::new(Normalizer::default())),
        latest,
    )
    .unwrap();
    assert_eq!(resumed.state().version, 0);

    let summary = resumed.run().await.unwrap();
    assert_eq!(summary.final_version, 1);
}
