//! Relgraph core: data model, entity normalization, candidate reconciliation
//!
//! This crate holds the pieces of the pipeline that are pure computation:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      CANDIDATE → EDGE PIPELINE                   │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  RelationCandidate ──► Normalizer ──► Reconciler ──► GraphEdge   │
//! │  (noisy, duplicate)    (canonical     (dedup +       (consistent │
//! │                         names)        arbitration)    edge set)  │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Candidates come from external extraction models (NER + relation
//! classification); we never run inference here. Reconciliation collapses
//! duplicates, drops self-relations and "none" labels, and arbitrates
//! conflicting directions so that downstream storage sees exactly one edge
//! per `(source, target, relation)` identity key.

pub mod error;
pub mod normalize;
pub mod reconcile;
pub mod types;

pub use error::RelgraphError;
pub use normalize::{Normalizer, Vocabulary};
pub use reconcile::Reconciler;
pub use types::{
    CandidateSource, EdgeKey, EntityType, GraphEdge, RelationCandidate,
};
