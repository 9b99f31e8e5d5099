//! Core data model: candidates, edges, entity types.

use serde::{Deserialize, Serialize};

// ============================================================================
// Entity Types
// ============================================================================

/// Coarse entity classification.
///
/// Every canonical name gets exactly one of these; classification is total
/// and never fails (vocabulary lookup first, keyword heuristics second,
/// `Concept` as the default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// Plain domain concept (data structures, properties, terminology).
    #[serde(rename = "CONCEPT")]
    Concept,
    /// Algorithmic process (sorting, searching, traversal).
    #[serde(rename = "ALGORITHMIC")]
    Algorithmic,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Concept => "CONCEPT",
            EntityType::Algorithmic => "ALGORITHMIC",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// Where a candidate came from. Decides how a missing confidence is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateSource {
    /// Manually curated / previously reconciled data. Authoritative: a
    /// missing or zero confidence means "trusted", i.e. 1.0.
    Seed,
    /// Output of the external relation classifier. A missing confidence is
    /// read as the configured default threshold, not as certainty.
    Generated,
}

/// An unreconciled relation triple proposed by the extraction collaborator.
///
/// Immutable once created; consumed by [`crate::Reconciler`] and discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationCandidate {
    /// Sentence the triple was extracted from (provenance).
    pub sentence: String,
    pub head: String,
    pub tail: String,
    /// Relation label; `"none"` is the no-relation sentinel and never
    /// becomes an edge.
    pub relation: String,
    /// Score in [0,1] from the extractor, opaque to us. `None` when the
    /// producing source did not report one.
    pub confidence: Option<f64>,
    /// Iteration of the build loop that produced this candidate.
    pub iteration: u32,
    pub source: CandidateSource,
}

impl RelationCandidate {
    /// Resolve the confidence, applying the missing-value policy and
    /// clamping to [0,1].
    pub fn effective_confidence(&self, default_threshold: f64) -> f64 {
        let raw = match self.confidence {
            Some(c) if c > 0.0 => c,
            // Exactly zero and missing are treated alike: the extractor
            // reported nothing usable.
            _ => match self.source {
                CandidateSource::Seed => 1.0,
                CandidateSource::Generated => default_threshold,
            },
        };
        raw.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Edges
// ============================================================================

/// Identity key of a reconciled edge: at most one edge exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub relation: String,
}

/// A reconciled, directed, labeled edge — the unit that gets persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Canonical name of the source entity.
    pub source: String,
    /// Canonical name of the target entity.
    pub target: String,
    pub relation: String,
    /// Clamped to [0,1] by construction.
    pub confidence: f64,
    /// Sentence the supporting evidence was extracted from.
    pub source_sentence: String,
}

impl GraphEdge {
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            target: self.target.clone(),
            relation: self.relation.clone(),
        }
    }

    /// Key ignoring direction, used to detect mutual-direction duplicates.
    pub fn pair_key(&self) -> EdgeKey {
        if self.source <= self.target {
            self.key()
        } else {
            EdgeKey {
                source: self.target.clone(),
                target: self.source.clone(),
                relation: self.relation.clone(),
            }
        }
    }

    /// Re-interpret this edge as a seed candidate for the next iteration.
    pub fn to_candidate(&self, iteration: u32) -> RelationCandidate {
        RelationCandidate {
            sentence: self.source_sentence.clone(),
            head: self.source.clone(),
            tail: self.target.clone(),
            relation: self.relation.clone(),
            confidence: Some(self.confidence),
            iteration,
            source: CandidateSource::Seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn candidate(confidence: Option<f64>, source: CandidateSource) -> RelationCandidate {
        RelationCandidate {
            sentence: "栈是一种后进先出的线性表".to_string(),
            head: "栈".to_string(),
            tail: "线性表".to_string(),
            relation: "属于".to_string(),
            confidence,
            iteration: 0,
            source,
        }
    }

    #[test]
    fn missing_confidence_defaults_by_source() {
        let seed = candidate(None, CandidateSource::Seed);
        assert_relative_eq!(seed.effective_confidence(0.7), 1.0);

        let generated = candidate(None, CandidateSource::Generated);
        assert_relative_eq!(generated.effective_confidence(0.7), 0.7);
    }

    #[test]
    fn zero_confidence_reads_as_missing() {
        let seed = candidate(Some(0.0), CandidateSource::Seed);
        assert_relative_eq!(seed.effective_confidence(0.7), 1.0);
    }

    #[test]
    fn confidence_clamped_to_unit_interval() {
        let over = candidate(Some(1.5), CandidateSource::Generated);
        assert_relative_eq!(over.effective_confidence(0.7), 1.0);

        let under = candidate(Some(-0.2), CandidateSource::Generated);
        // Negative is not > 0.0, so the missing-value policy applies.
        assert_relative_eq!(under.effective_confidence(0.7), 0.7);
    }

    #[test]
    fn pair_key_is_direction_independent() {
        let forward = GraphEdge {
            source: "数组".to_string(),
            target: "查找".to_string(),
            relation: "依赖".to_string(),
            confidence: 0.9,
            source_sentence: String::new(),
        };
        let backward = GraphEdge {
            source: "查找".to_string(),
            target: "数组".to_string(),
            relation: "依赖".to_string(),
            confidence: 0.8,
            source_sentence: String::new(),
        };
        assert_eq!(forward.pair_key(), backward.pair_key());
        assert_ne!(forward.key(), backward.key());
    }
}
