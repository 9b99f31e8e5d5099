//! Artifact quality statistics.

use crate::artifact::read_artifact_lines;
use anyhow::Result;
use std::path::Path;

/// Per-artifact quality summary.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStats {
    pub sentences: usize,
    pub total_relations: usize,
    pub new_relations: usize,
    /// Relations with confidence ≥ 0.8.
    pub high_confidence: usize,
    pub mean_confidence: f64,
}

impl ArtifactStats {
    pub fn high_confidence_ratio(&self) -> f64 {
        if self.total_relations == 0 {
            0.0
        } else {
            self.high_confidence as f64 / self.total_relations as f64
        }
    }
}

/// Confidence distribution with the conventional 0.8 / 0.6 boundaries.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceHistogram {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Compute quality statistics for one artifact.
pub fn artifact_stats(path: &Path) -> Result<ArtifactStats> {
    let lines = read_artifact_lines(path)?;
    let mut stats = ArtifactStats {
        sentences: lines.len(),
        ..Default::default()
    };
    let mut confidence_sum = 0.0;
    for line in &lines {
        stats.total_relations += line.relations.len();
        stats.new_relations += line.new_relations_count;
        for mention in &line.relations {
            let confidence = mention.confidence.unwrap_or(0.0);
            if confidence >= 0.8 {
                stats.high_confidence += 1;
            }
            confidence_sum += confidence;
        }
    }
    if stats.total_relations > 0 {
        stats.mean_confidence = confidence_sum / stats.total_relations as f64;
    }
    Ok(stats)
}

/// Confidence histogram over an artifact's relations.
pub fn confidence_histogram(path: &Path) -> Result<ConfidenceHistogram> {
    let lines = read_artifact_lines(path)?;
    let mut histogram = ConfidenceHistogram::default();
    for line in &lines {
        for mention in &line.relations {
            match mention.confidence.unwrap_or(0.0) {
                c if c >= 0.8 => histogram.high += 1,
                c if c >= 0.6 => histogram.medium += 1,
                _ => histogram.low += 1,
            }
        }
    }
    Ok(histogram)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::write_artifact_edges;
    use approx::assert_relative_eq;
    use relgraph_core::GraphEdge;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[test]
    fn stats_over_written_artifact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("iteration_version_1.json");
        let edges = vec![
            GraphEdge {
                source: "数组".into(),
                target: "查找".into(),
                relation: "依赖".into(),
                confidence: 0.9,
                source_sentence: "s1".into(),
            },
            GraphEdge {
                source: "数组".into(),
                target: "遍历".into(),
                relation: "依赖".into(),
                confidence: 0.7,
                source_sentence: "s1".into(),
            },
            GraphEdge {
                source: "栈".into(),
                target: "线性表".into(),
                relation: "属于".into(),
                confidence: 0.5,
                source_sentence: "s2".into(),
            },
        ];
        write_artifact_edges(&path, &edges, &HashSet::new()).unwrap();

        let stats = artifact_stats(&path).unwrap();
        assert_eq!(stats.sentences, 2);
        assert_eq!(stats.total_relations, 3);
        assert_eq!(stats.new_relations, 3);
        assert_eq!(stats.high_confidence, 1);
        assert_relative_eq!(stats.mean_confidence, 0.7);

        let histogram = confidence_histogram(&path).unwrap();
        assert_eq!((histogram.high, histogram.medium, histogram.low), (1, 1, 1));
    }
}
