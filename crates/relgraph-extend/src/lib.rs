//! Relgraph extend: the iterative build-extend-checkpoint-converge loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────────┐
//! │                        ITERATION PIPELINE                              │
//! ├────────────────────────────────────────────────────────────────────────┤
//! │                                                                        │
//! │  seed edges (v0 artifact)                                              │
//! │        │                                                               │
//! │        ▼                                                               │
//! │  ┌───────────────┐   entity pairs    ┌──────────────────┐             │
//! │  │   Iteration    │─────────────────►│ CandidateGenerator│  (external │
//! │  │   Controller   │◄─────────────────│  worker pool)     │   NER/RE)  │
//! │  └───────┬───────┘   candidates      └──────────────────┘             │
//! │          │ barrier: all pairs done                                     │
//! │          ▼                                                             │
//! │   Reconciler (relgraph-core) ──► versioned artifact v+1                │
//! │          │                                                             │
//! │          ▼                                                             │
//! │   checkpoint (IterationState) ──► converged? ──no──► next iteration    │
//! │                                                                        │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each iteration is resumable: the [`IterationState`] checkpoint written
//! after every pass records the version, the artifact paths, and the last
//! growth ratio, so a crash never costs completed work.

pub mod artifact;
pub mod controller;
pub mod generator;
pub mod seed;
pub mod state;
pub mod stats;

pub use artifact::{read_artifact_edges, write_artifact_edges, ArtifactLine, RelationMention};
pub use controller::{BuildConfig, ControllerPhase, IterationController, IterationOutcome, RunSummary};
pub use generator::{CandidateGenerator, GeneratorConfig, MockGenerator};
pub use seed::seed_candidates_from_csv;
pub use state::IterationState;
pub use stats::{ArtifactStats, ConfidenceHistogram};

#[cfg(feature = "http-generator")]
pub use generator::HttpGenerator;
