//! Relgraph CLI
//!
//! Command-line front end for the pipeline:
//! - Seeding a project from a predictions CSV
//! - Running the iterative build-extend loop (resumable)
//! - Materializing the latest reconciled edge set into the graph store
//! - Ad-hoc confidence-filtered queries

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use relgraph_core::{Normalizer, Reconciler, Vocabulary};
use relgraph_extend::{
    read_artifact_edges, seed_candidates_from_csv, BuildConfig, GeneratorConfig, HttpGenerator,
    IterationController, IterationState,
};
use relgraph_store::{
    BoltStore, GraphMaterializer, GraphStore, QueryConfig, QueryEngine, StoreConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "relgraph")]
#[command(
    author,
    version,
    about = "Incremental concept-graph construction and serving"
)]
struct Cli {
    /// Verbose (debug-level) logging.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct StoreArgs {
    /// Bolt URI of the graph store.
    #[arg(long, default_value = "bolt://localhost:7687")]
    uri: String,
    #[arg(long, default_value = "neo4j")]
    user: String,
    #[arg(long, default_value = "neo4j")]
    password: String,
}

impl StoreArgs {
    fn to_config(&self) -> StoreConfig {
        StoreConfig {
            uri: self.uri.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            ..Default::default()
        }
    }
}

#[derive(Args, Clone)]
struct ProjectArgs {
    /// Directory holding artifacts and checkpoints for this project.
    #[arg(long, default_value = "data/default")]
    data_dir: PathBuf,
    /// Optional `name,type` vocabulary CSV for entity classification.
    #[arg(long)]
    vocabulary: Option<PathBuf>,
}

impl ProjectArgs {
    fn normalizer(&self) -> Result<Normalizer> {
        let vocabulary = match &self.vocabulary {
            Some(path) => Vocabulary::from_path(path)?,
            None => Vocabulary::new(),
        };
        Ok(Normalizer::new(vocabulary))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a predictions CSV into the version-0 seed artifact.
    Seed {
        #[command(flatten)]
        project: ProjectArgs,
        /// Predictions CSV (sentence,head,tail,relation,confidence).
        #[arg(long)]
        csv: PathBuf,
        /// Confidence filter for seed reconciliation.
        #[arg(long, default_value_t = 0.7)]
        confidence_threshold: f64,
    },

    /// Run the iterative build loop until convergence.
    Build {
        #[command(flatten)]
        project: ProjectArgs,
        /// Resume from a specific checkpoint instead of the latest one.
        #[arg(long)]
        resume: Option<PathBuf>,
        /// Endpoint of the relation-prediction service.
        #[arg(long, default_value = "http://localhost:8000/predict")]
        endpoint: String,
        #[arg(long, default_value_t = 5)]
        max_iterations: u32,
        #[arg(long, default_value_t = 0.1)]
        convergence_threshold: f64,
        #[arg(long, default_value_t = 0.05)]
        min_growth_threshold: f64,
        #[arg(long, default_value_t = 0.7)]
        confidence_threshold: f64,
        /// Concurrent generator calls per iteration.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
        /// Per-call generator timeout in seconds.
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },

    /// Write the latest reconciled edge set into the graph store.
    Materialize {
        #[command(flatten)]
        project: ProjectArgs,
        #[command(flatten)]
        store: StoreArgs,
        /// Materialize a specific artifact instead of the latest one.
        #[arg(long)]
        artifact: Option<PathBuf>,
    },

    /// Query the graph store.
    Query {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        confidence_threshold: Option<f64>,
        #[command(subcommand)]
        command: QueryCommands,
    },
}

#[derive(Subcommand)]
enum QueryCommands {
    /// All relations touching an entity.
    Entity { name: String },
    /// Edges of a relation type touching any of the given entities.
    Relation {
        relation: String,
        entities: Vec<String>,
    },
    /// Relations between two entities, optionally via one intermediate.
    Between {
        a: String,
        b: String,
        /// Only match a → b (default considers both directions).
        #[arg(long)]
        directed: bool,
        /// Skip the two-hop fallback when no direct edge exists.
        #[arg(long)]
        no_indirect: bool,
    },
    /// Entities whose name contains a keyword.
    Search {
        keyword: String,
        #[arg(long)]
        limit: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match cli.command {
        Commands::Seed {
            project,
            csv,
            confidence_threshold,
        } => seed(project, &csv, confidence_threshold),
        Commands::Build {
            project,
            resume,
            endpoint,
            max_iterations,
            convergence_threshold,
            min_growth_threshold,
            confidence_threshold,
            concurrency,
            timeout_secs,
        } => {
            let config = BuildConfig {
                data_dir: project.data_dir.clone(),
                max_iterations,
                convergence_threshold,
                min_growth_threshold,
                min_confidence: confidence_threshold,
            };
            let generator_config = GeneratorConfig {
                endpoint,
                concurrency,
                timeout: Duration::from_secs(timeout_secs),
                ..Default::default()
            };
            build(project, config, generator_config, resume).await
        }
        Commands::Materialize {
            project,
            store,
            artifact,
        } => materialize(project, store, artifact).await,
        Commands::Query {
            store,
            confidence_threshold,
            command,
        } => query(store, confidence_threshold, command).await,
    }
}

// ============================================================================
// Seed
// ============================================================================

fn seed(project: ProjectArgs, csv: &Path, confidence_threshold: f64) -> Result<()> {
    let candidates = seed_candidates_from_csv(csv)?;
    println!(
        "{} {} candidate rows loaded",
        "•".green(),
        candidates.len()
    );

    let reconciler = Arc::new(Reconciler::new(project.normalizer()?));
    let mut controller = IterationController::new(
        BuildConfig {
            data_dir: project.data_dir.clone(),
            min_confidence: confidence_threshold,
            ..Default::default()
        },
        GeneratorConfig::default(),
        // Seeding never calls the generator; the mock keeps construction
        // free of network configuration.
        Arc::new(relgraph_extend::MockGenerator::empty()),
        reconciler,
    )?;

    let edge_count = controller.seed_with_candidates(&candidates)?;
    println!(
        "{} seed artifact written: {} edges under {}",
        "✓".green(),
        edge_count,
        project.data_dir.display().to_string().yellow()
    );
    Ok(())
}

// ============================================================================
// Build
// ============================================================================

/// Latest checkpoint in `<data_dir>/history`, by timestamped filename.
fn latest_checkpoint(data_dir: &Path) -> Option<PathBuf> {
    let history = data_dir.join("history");
    let mut entries: Vec<PathBuf> = std::fs::read_dir(history)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    entries.sort();
    entries.pop()
}

async fn build(
    project: ProjectArgs,
    config: BuildConfig,
    generator_config: GeneratorConfig,
    resume: Option<PathBuf>,
) -> Result<()> {
    let checkpoint = match resume {
        Some(path) => path,
        None => latest_checkpoint(&config.data_dir).ok_or_else(|| {
            anyhow!(
                "no checkpoint found under {}; run `relgraph seed` first",
                config.data_dir.display()
            )
        })?,
    };
    println!(
        "{} resuming from {}",
        "•".green(),
        checkpoint.display().to_string().yellow()
    );

    let generator = Arc::new(HttpGenerator::new(&generator_config)?);
    let reconciler = Arc::new(Reconciler::new(project.normalizer()?));
    let mut controller = IterationController::resume(
        config.clone(),
        generator_config,
        generator,
        reconciler,
        &checkpoint,
    )?;

    let summary = controller.run().await?;

    println!(
        "{} converged at version {} ({} artifacts, last growth ratio {:.4})",
        "✓".green(),
        summary.final_version,
        summary.artifact_paths.len(),
        summary.last_extend_ratio
    );
    for path in &summary.artifact_paths {
        let stats = relgraph_extend::stats::artifact_stats(path)?;
        println!(
            "  {} {} relations, {} new, high-confidence {:.1}%, mean {:.3}",
            path.display().to_string().yellow(),
            stats.total_relations,
            stats.new_relations,
            stats.high_confidence_ratio() * 100.0,
            stats.mean_confidence
        );
    }
    if let Some(final_path) = summary.artifact_paths.last() {
        let histogram = relgraph_extend::stats::confidence_histogram(final_path)?;
        println!(
            "  confidence distribution: high(≥0.8) {} / medium(0.6–0.8) {} / low(<0.6) {}",
            histogram.high, histogram.medium, histogram.low
        );
    }

    let final_state = config.data_dir.join("final_state.json");
    controller.state().save(&final_state)?;
    println!(
        "{} final state saved to {} (use --resume to continue)",
        "✓".green(),
        final_state.display().to_string().yellow()
    );
    Ok(())
}

// ============================================================================
// Materialize
// ============================================================================

/// Resolve the artifact to materialize: explicit flag, or the latest
/// checkpointed one.
fn resolve_artifact(data_dir: &Path, artifact: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = artifact {
        return Ok(path);
    }
    let checkpoint = latest_checkpoint(data_dir)
        .ok_or_else(|| anyhow!("no checkpoint found under {}", data_dir.display()))?;
    let state = IterationState::load(&checkpoint)?;
    state
        .latest_artifact_path()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("checkpoint {} has no artifacts", checkpoint.display()))
}

async fn materialize(
    project: ProjectArgs,
    store_args: StoreArgs,
    artifact: Option<PathBuf>,
) -> Result<()> {
    let artifact = resolve_artifact(&project.data_dir, artifact)?;
    let edges = read_artifact_edges(&artifact)
        .with_context(|| format!("loading artifact {}", artifact.display()))?;
    println!(
        "{} materializing {} edges from {}",
        "•".green(),
        edges.len(),
        artifact.display().to_string().yellow()
    );

    let store_config = store_args.to_config();
    let store = Arc::new(BoltStore::connect(&store_config).await?) as Arc<dyn GraphStore>;
    let materializer = GraphMaterializer::new(store, store_config, project.normalizer()?);

    let result = materializer.materialize(&edges).await?;
    println!(
        "{} graph rebuilt: {} nodes, {} relationships",
        "✓".green(),
        result.node_count,
        result.edge_count
    );
    Ok(())
}

// ============================================================================
// Query
// ============================================================================

async fn query(
    store_args: StoreArgs,
    confidence_threshold: Option<f64>,
    command: QueryCommands,
) -> Result<()> {
    let store_config = store_args.to_config();
    let store = Arc::new(BoltStore::connect(&store_config).await?) as Arc<dyn GraphStore>;
    let engine = QueryEngine::new(store, QueryConfig::default());

    match command {
        QueryCommands::Entity { name } => {
            let results = engine.entity_relations(&name, confidence_threshold).await?;
            print_records(&results)?;
        }
        QueryCommands::Relation { relation, entities } => {
            let results = engine
                .entities_by_relation(&entities, &relation, confidence_threshold)
                .await?;
            print_records(&results)?;
        }
        QueryCommands::Between {
            a,
            b,
            directed,
            no_indirect,
        } => {
            let results = engine
                .relation_between(&a, &b, !directed, !no_indirect, confidence_threshold)
                .await?;
            print_records(&results)?;
        }
        QueryCommands::Search { keyword, limit } => {
            let names = engine.entities_containing(&keyword, limit).await?;
            if names.is_empty() {
                println!("{}", "no matches".yellow());
            }
            for name in names {
                println!("{name}");
            }
        }
    }
    Ok(())
}

fn print_records(records: &[relgraph_store::QueryRecord]) -> Result<()> {
    if records.is_empty() {
        println!("{}", "no matches".yellow());
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}
