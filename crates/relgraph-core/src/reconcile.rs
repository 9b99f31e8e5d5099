//! Candidate reconciliation: collapse noisy candidates into a consistent
//! edge set.
//!
//! ```text
//! candidates ──┬──► normalize endpoints (drop empty / self-relations)
//!              ├──► drop "none" labels and sub-threshold confidence
//!              ├──► per identity key: keep max confidence (first-seen ties)
//!              └──► per unordered pair + label: keep the stronger direction
//! ```
//!
//! Pure: no I/O, no shared state. Reconciling an already-reconciled set is
//! a no-op, which is what lets the iteration loop feed each version's edges
//! back in as next round's seed candidates.

use crate::normalize::Normalizer;
use crate::types::{EdgeKey, GraphEdge, RelationCandidate};
use std::collections::HashMap;

/// The sentinel label meaning "the classifier saw no relation here".
const NO_RELATION: &str = "none";

/// Deduplicates and arbitrates conflicting relation candidates.
pub struct Reconciler {
    normalizer: Normalizer,
}

impl Reconciler {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Collapse `candidates` into a conflict-free edge set.
    ///
    /// `min_confidence` is both the filter threshold and the default
    /// confidence assigned to non-authoritative candidates that lack one.
    pub fn reconcile(
        &self,
        candidates: &[RelationCandidate],
        min_confidence: f64,
    ) -> Vec<GraphEdge> {
        // Steps 1+2: normalize endpoints, drop the structurally invalid.
        let mut dropped = 0usize;
        let mut filtered: Vec<GraphEdge> = Vec::new();
        for candidate in candidates {
            if candidate.relation == NO_RELATION {
                dropped += 1;
                continue;
            }
            let (Some(head), Some(tail)) = (
                self.normalizer.normalize(&candidate.head),
                self.normalizer.normalize(&candidate.tail),
            ) else {
                dropped += 1;
                continue;
            };
            if head == tail {
                dropped += 1;
                continue;
            }
            let confidence = candidate.effective_confidence(min_confidence);
            if confidence < min_confidence {
                dropped += 1;
                continue;
            }
            filtered.push(GraphEdge {
                source: head,
                target: tail,
                relation: candidate.relation.clone(),
                confidence,
                source_sentence: candidate.sentence.clone(),
            });
        }

        // Step 3: one edge per identity key, max confidence wins, first-seen
        // position and first-seen candidate on exact ties.
        let mut by_key: HashMap<EdgeKey, usize> = HashMap::new();
        let mut deduped: Vec<GraphEdge> = Vec::new();
        for edge in filtered {
            match by_key.get(&edge.key()) {
                Some(&idx) => {
                    if edge.confidence > deduped[idx].confidence {
                        deduped[idx] = edge;
                    }
                }
                None => {
                    by_key.insert(edge.key(), deduped.len());
                    deduped.push(edge);
                }
            }
        }

        // Step 4: when the same label exists in both directions for a pair,
        // only the stronger direction survives. Ties break on the
        // lexicographically smaller (source, target) pair — deterministic
        // regardless of input order.
        let mut by_pair: HashMap<EdgeKey, usize> = HashMap::new();
        let mut slots: Vec<Option<GraphEdge>> = Vec::with_capacity(deduped.len());
        for edge in deduped {
            match by_pair.get(&edge.pair_key()) {
                Some(&idx) => {
                    let kept = slots[idx]
                        .as_ref()
                        .expect("pair index points at a live edge");
                    if edge.confidence > kept.confidence
                        || (edge.confidence == kept.confidence
                            && (edge.source.as_str(), edge.target.as_str())
                                < (kept.source.as_str(), kept.target.as_str()))
                    {
                        slots[idx] = Some(edge);
                    }
                }
                None => {
                    by_pair.insert(edge.pair_key(), slots.len());
                    slots.push(Some(edge));
                }
            }
        }

        let edges: Vec<GraphEdge> = slots.into_iter().flatten().collect();
        tracing::debug!(
            input = candidates.len(),
            dropped,
            output = edges.len(),
            "reconciliation pass complete"
        );
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CandidateSource;
    use approx::assert_relative_eq;

    fn candidate(head: &str, tail: &str, relation: &str, confidence: f64) -> RelationCandidate {
        RelationCandidate {
            sentence: format!("{head}与{tail}相关"),
            head: head.to_string(),
            tail: tail.to_string(),
            relation: relation.to_string(),
            confidence: Some(confidence),
            iteration: 0,
            source: CandidateSource::Generated,
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(Normalizer::default())
    }

    #[test]
    fn drops_none_relations_and_self_loops() {
        let candidates = vec![
            candidate("栈", "队列", "none", 0.99),
            candidate("栈", "栈", "同义", 0.99),
            candidate("栈", "线性表", "属于", 0.9),
        ];
        let edges = reconciler().reconcile(&candidates, 0.7);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "栈");
        assert_eq!(edges[0].target, "线性表");
    }

    #[test]
    fn drops_empty_normalizations() {
        let candidates = vec![
            candidate("！！！", "队列", "依赖", 0.9),
            candidate("栈", "指某种结构", "依赖", 0.9),
        ];
        assert!(reconciler().reconcile(&candidates, 0.7).is_empty());
    }

    #[test]
    fn filters_below_threshold() {
        let candidates = vec![
            candidate("数组", "查找", "依赖", 0.69),
            candidate("数组", "遍历", "依赖", 0.70),
        ];
        let edges = reconciler().reconcile(&candidates, 0.7);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, "遍历");
    }

    #[test]
    fn max_confidence_wins_within_identity_key() {
        let candidates = vec![
            candidate("数组", "查找", "依赖", 0.6),
            candidate("数组", "查找", "依赖", 0.9),
        ];
        let edges = reconciler().reconcile(&candidates, 0.5);

        assert_eq!(edges.len(), 1);
        assert_relative_eq!(edges[0].confidence, 0.9);
    }

    #[test]
    fn first_seen_wins_on_exact_tie() {
        let mut first = candidate("数组", "查找", "依赖", 0.8);
        first.sentence = "first".to_string();
        let mut second = candidate("数组", "查找", "依赖", 0.8);
        second.sentence = "second".to_string();

        let edges = reconciler().reconcile(&[first, second], 0.5);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source_sentence, "first");
    }

    #[test]
    fn mutual_direction_keeps_stronger_side() {
        let candidates = vec![
            candidate("A", "B", "依赖", 0.7),
            candidate("B", "A", "依赖", 0.9),
        ];
        let edges = reconciler().reconcile(&candidates, 0.5);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "B");
        assert_eq!(edges[0].target, "A");
        assert_relative_eq!(edges[0].confidence, 0.9);
    }

    #[test]
    fn mutual_direction_tie_breaks_lexicographically() {
        let forward = vec![
            candidate("B", "A", "依赖", 0.8),
            candidate("A", "B", "依赖", 0.8),
        ];
        let edges = reconciler().reconcile(&forward, 0.5);
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].source.as_str(), edges[0].target.as_str()), ("A", "B"));

        // Same outcome with the input order reversed.
        let backward = vec![
            candidate("A", "B", "依赖", 0.8),
            candidate("B", "A", "依赖", 0.8),
        ];
        let edges = reconciler().reconcile(&backward, 0.5);
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].source.as_str(), edges[0].target.as_str()), ("A", "B"));
    }

    #[test]
    fn distinct_labels_between_same_pair_both_survive() {
        let candidates = vec![
            candidate("A", "B", "依赖", 0.8),
            candidate("B", "A", "包含", 0.8),
        ];
        let edges = reconciler().reconcile(&candidates, 0.5);
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let candidates = vec![
            candidate("数组", "查找", "依赖", 0.9),
            candidate("查找", "数组", "依赖", 0.8),
            candidate("数组", "时间复杂度", "拥有", 0.85),
            candidate("数组", "时间复杂度", "拥有", 0.95),
        ];
        let reconciler = reconciler();
        let first = reconciler.reconcile(&candidates, 0.5);

        let again: Vec<RelationCandidate> =
            first.iter().map(|e| e.to_candidate(1)).collect();
        let second = reconciler.reconcile(&again, 0.5);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.key(), b.key());
            assert_relative_eq!(a.confidence, b.confidence);
        }
    }
}
