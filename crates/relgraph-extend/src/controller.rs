//! The iteration controller: build → extend → checkpoint → converge.

use crate::artifact::{read_artifact_edges, write_artifact_edges};
use crate::generator::{generate_with_retry, CandidateGenerator, GeneratorConfig};
use crate::state::IterationState;
use anyhow::{Context, Result};
use relgraph_core::{EdgeKey, GraphEdge, Reconciler, RelationCandidate, RelgraphError};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

// ============================================================================
// Configuration
// ============================================================================

/// Tunables for the build loop.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory holding artifacts and checkpoints for this project.
    pub data_dir: PathBuf,
    /// Hard cap on iterations, regardless of convergence behavior.
    pub max_iterations: u32,
    /// Converge when the growth ratio drops below this.
    pub convergence_threshold: f64,
    /// Stricter bound; two consecutive iterations below it also converge.
    pub min_growth_threshold: f64,
    /// Confidence filter applied during reconciliation.
    pub min_confidence: f64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/default"),
            max_iterations: 5,
            convergence_threshold: 0.1,
            min_growth_threshold: 0.05,
            min_confidence: 0.7,
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Phases of the controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Initializing,
    RunningIteration,
    CheckingConvergence,
    Converged,
}

/// Result of one completed iteration.
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub version: u32,
    pub edge_count: usize,
    /// Edges present in this version but absent (by identity key) from the
    /// previous one.
    pub new_edge_count: usize,
    pub extend_ratio: f64,
    pub artifact_path: PathBuf,
}

/// Result of a full build run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub final_version: u32,
    pub artifact_paths: Vec<PathBuf>,
    pub last_extend_ratio: f64,
}

/// Drives the iterative build loop and owns the versioned state.
pub struct IterationController {
    config: BuildConfig,
    generator_config: GeneratorConfig,
    generator: Arc<dyn CandidateGenerator>,
    reconciler: Arc<Reconciler>,
    state: IterationState,
    phase: ControllerPhase,
    consecutive_low_growth: u32,
}

impl IterationController {
    pub fn new(
        config: BuildConfig,
        generator_config: GeneratorConfig,
        generator: Arc<dyn CandidateGenerator>,
        reconciler: Arc<Reconciler>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
        Ok(Self {
            config,
            generator_config,
            generator,
            reconciler,
            state: IterationState::new(),
            phase: ControllerPhase::Initializing,
            consecutive_low_growth: 0,
        })
    }

    /// Resume from a previously written checkpoint.
    pub fn resume(
        config: BuildConfig,
        generator_config: GeneratorConfig,
        generator: Arc<dyn CandidateGenerator>,
        reconciler: Arc<Reconciler>,
        checkpoint: &Path,
    ) -> Result<Self> {
        let state = IterationState::load(checkpoint)?;
        tracing::info!(
            version = state.version,
            artifacts = state.artifact_paths.len(),
            "resumed iteration state"
        );
        let mut controller = Self::new(config, generator_config, generator, reconciler)?;
        controller.state = state;
        Ok(controller)
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn state(&self) -> &IterationState {
        &self.state
    }

    pub fn latest_artifact_path(&self) -> Option<&Path> {
        self.state.latest_artifact_path()
    }

    fn artifact_path_for(&self, version: u32) -> PathBuf {
        self.config
            .data_dir
            .join(format!("iteration_version_{version}.json"))
    }

    /// Install the seed edge set as version 0.
    ///
    /// The candidates are reconciled first, so a noisy seed batch (duplicate
    /// rows, "none" labels) is cleaned on the way in.
    pub fn seed_with_candidates(&mut self, candidates: &[RelationCandidate]) -> Result<usize> {
        if !self.state.artifact_paths.is_empty() {
            return Err(RelgraphError::Config(
                "controller already seeded; use resume to continue a run".to_string(),
            )
            .into());
        }
        let edges = self
            .reconciler
            .reconcile(candidates, self.config.min_confidence);
        let path = self.artifact_path_for(0);
        write_artifact_edges(&path, &edges, &HashSet::new())?;
        self.state.artifact_paths.push(path.clone());
        self.state.save_to_history(&self.config.data_dir)?;
        tracing::info!(edges = edges.len(), path = %path.display(), "seed artifact written");
        Ok(edges.len())
    }

    /// Run one iteration: fan out candidate generation over co-occurring
    /// entity pairs, reconcile against the previous version, write the new
    /// artifact, checkpoint.
    pub async fn run_iteration(&mut self) -> Result<IterationOutcome> {
        let current_path = self
            .state
            .latest_artifact_path()
            .ok_or_else(|| {
                RelgraphError::Config("no seed artifact; seed or resume first".to_string())
            })?
            .to_path_buf();
        self.phase = ControllerPhase::RunningIteration;
        let next_version = self.state.version + 1;
        tracing::info!(version = next_version, input = %current_path.display(), "starting iteration");

        let current_edges = read_artifact_edges(&current_path)?;
        let previous_count = current_edges.len();
        let previous_keys: HashSet<EdgeKey> = current_edges.iter().map(GraphEdge::key).collect();

        let generated = self
            .generate_for_pairs(&current_edges, next_version)
            .await;
        tracing::info!(
            candidates = generated.len(),
            "generator fan-out complete, reconciling"
        );

        // Merge previous edges (as authoritative seeds) with the fresh
        // candidates; reconciliation is single-threaded by design — it needs
        // the global view of this iteration's candidate set.
        let mut candidates: Vec<RelationCandidate> = current_edges
            .iter()
            .map(|edge| edge.to_candidate(next_version))
            .collect();
        candidates.extend(generated);
        let edges = self
            .reconciler
            .reconcile(&candidates, self.config.min_confidence);

        let new_edge_count = edges
            .iter()
            .filter(|edge| !previous_keys.contains(&edge.key()))
            .count();
        let extend_ratio = new_edge_count as f64 / previous_count.max(1) as f64;

        let artifact_path = self.artifact_path_for(next_version);
        write_artifact_edges(&artifact_path, &edges, &previous_keys)?;

        self.state.version = next_version;
        self.state.artifact_paths.push(artifact_path.clone());
        self.state.last_extend_ratio = extend_ratio;
        self.state.save_to_history(&self.config.data_dir)?;

        tracing::info!(
            version = next_version,
            edges = edges.len(),
            new = new_edge_count,
            ratio = extend_ratio,
            "iteration complete"
        );
        self.phase = ControllerPhase::CheckingConvergence;

        Ok(IterationOutcome {
            version: next_version,
            edge_count: edges.len(),
            new_edge_count,
            extend_ratio,
            artifact_path,
        })
    }

    /// Collect ordered entity pairs co-occurring in retained sentences and
    /// query the generator for each, through a bounded worker pool. Pair
    /// generation is independent and side-effect-free; one failed pair never
    /// aborts the batch.
    async fn generate_for_pairs(
        &self,
        current_edges: &[GraphEdge],
        iteration: u32,
    ) -> Vec<RelationCandidate> {
        let known_entities: BTreeSet<&str> = current_edges
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect();

        // Pairs already related in a sentence (either direction) are not
        // re-queried.
        let mut sentences: Vec<&str> = Vec::new();
        let mut covered: HashMap<&str, HashSet<(&str, &str)>> = HashMap::new();
        for edge in current_edges {
            let entry = covered.entry(edge.source_sentence.as_str()).or_default();
            if entry.is_empty() {
                sentences.push(edge.source_sentence.as_str());
            }
            entry.insert((edge.source.as_str(), edge.target.as_str()));
            entry.insert((edge.target.as_str(), edge.source.as_str()));
        }

        let mut tasks: Vec<(String, String, String)> = Vec::new();
        for sentence in sentences {
            let present: Vec<&str> = known_entities
                .iter()
                .copied()
                .filter(|entity| sentence.contains(entity))
                .collect();
            let existing = &covered[sentence];
            for &head in &present {
                for &tail in &present {
                    if head != tail && !existing.contains(&(head, tail)) {
                        tasks.push((sentence.to_string(), head.to_string(), tail.to_string()));
                    }
                }
            }
        }
        tracing::debug!(pairs = tasks.len(), "dispatching generator calls");

        let semaphore = Arc::new(Semaphore::new(self.generator_config.concurrency.max(1)));
        let mut join_set = JoinSet::new();
        for (sentence, head, tail) in tasks {
            let generator = Arc::clone(&self.generator);
            let config = self.generator_config.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore open");
                generate_with_retry(generator.as_ref(), &config, &sentence, &head, &tail).await
            });
        }

        // The single synchronization barrier of the iteration: reconciliation
        // must not start until every in-flight call has finished.
        let mut candidates = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Some(mut candidate)) => {
                    candidate.iteration = iteration;
                    candidates.push(candidate);
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "generator task panicked; pair dropped"),
            }
        }
        candidates
    }

    /// Evaluate convergence after an iteration and advance the phase.
    pub fn check_convergence(&mut self, outcome: &IterationOutcome) -> bool {
        let mut converged = false;

        if outcome.extend_ratio < self.config.convergence_threshold {
            tracing::info!(
                ratio = outcome.extend_ratio,
                threshold = self.config.convergence_threshold,
                "growth ratio below convergence threshold"
            );
            converged = true;
        }
        if outcome.new_edge_count == 0 {
            tracing::info!("no new edges discovered this iteration");
            converged = true;
        }
        if outcome.extend_ratio < self.config.min_growth_threshold {
            self.consecutive_low_growth += 1;
            if self.consecutive_low_growth >= 2 {
                tracing::info!(
                    streak = self.consecutive_low_growth,
                    "consecutive low-growth iterations"
                );
                converged = true;
            }
        } else {
            self.consecutive_low_growth = 0;
        }
        if self.state.version >= self.config.max_iterations {
            tracing::info!(max = self.config.max_iterations, "iteration cap reached");
            converged = true;
        }

        self.phase = if converged {
            ControllerPhase::Converged
        } else {
            ControllerPhase::RunningIteration
        };
        converged
    }

    /// Run iterations until convergence or the hard cap.
    pub async fn run(&mut self) -> Result<RunSummary> {
        if self.state.latest_artifact_path().is_none() {
            return Err(RelgraphError::Config(
                "no seed artifact; seed or resume first".to_string(),
            )
            .into());
        }

        while self.state.version < self.config.max_iterations {
            let outcome = self.run_iteration().await?;
            if self.check_convergence(&outcome) {
                break;
            }
        }
        self.phase = ControllerPhase::Converged;

        Ok(RunSummary {
            final_version: self.state.version,
            artifact_paths: self.state.artifact_paths.clone(),
            last_extend_ratio: self.state.last_extend_ratio,
        })
    }
}
