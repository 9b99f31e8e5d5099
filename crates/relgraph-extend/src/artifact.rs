//! Versioned reconciled-edge artifacts.
//!
//! One file per iteration version. Each line is a JSON object grouping the
//! edges extracted from one sentence:
//!
//! ```text
//! {"sentText": "...", "relationMentions": [{"em1Text": "...", "em2Text": "...",
//!  "label": "...", "confidence": 0.9}], "new_relations_count": 1}
//! ```
//!
//! A malformed line is skipped with a warning; it never aborts the load.

use anyhow::{Context, Result};
use relgraph_core::{EdgeKey, GraphEdge};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// A single relation mention inside an artifact line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationMention {
    #[serde(rename = "em1Text")]
    pub head: String,
    #[serde(rename = "em2Text")]
    pub tail: String,
    pub label: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// One artifact line: a sentence and the edges grounded in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactLine {
    #[serde(rename = "sentText")]
    pub sentence: String,
    #[serde(rename = "relationMentions")]
    pub relations: Vec<RelationMention>,
    /// Edges first seen in the iteration that wrote this file.
    #[serde(default)]
    pub new_relations_count: usize,
}

/// Parse an artifact into raw lines, skipping malformed records.
pub fn read_artifact_lines(path: &Path) -> Result<Vec<ArtifactLine>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening artifact {}", path.display()))?;
    let mut lines = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading artifact {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ArtifactLine>(&line) {
            Ok(parsed) => lines.push(parsed),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    lineno,
                    error = %err,
                    "skipping malformed artifact line"
                );
            }
        }
    }
    Ok(lines)
}

/// Load an artifact as a flat edge list.
///
/// Artifacts hold already-reconciled edges, so a mention without a recorded
/// confidence is read as authoritative (1.0).
pub fn read_artifact_edges(path: &Path) -> Result<Vec<GraphEdge>> {
    let mut edges = Vec::new();
    for line in read_artifact_lines(path)? {
        for mention in line.relations {
            edges.push(GraphEdge {
                source: mention.head,
                target: mention.tail,
                relation: mention.label,
                confidence: mention.confidence.unwrap_or(1.0).clamp(0.0, 1.0),
                source_sentence: line.sentence.clone(),
            });
        }
    }
    Ok(edges)
}

/// Write an edge set as a versioned artifact, grouped by source sentence.
///
/// `previous_keys` is the identity-key set of the prior version; it drives
/// the per-sentence `new_relations_count` bookkeeping.
pub fn write_artifact_edges(
    path: &Path,
    edges: &[GraphEdge],
    previous_keys: &HashSet<EdgeKey>,
) -> Result<()> {
    // Group by sentence, preserving first-appearance order.
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&GraphEdge>> = HashMap::new();
    for edge in edges {
        let entry = groups.entry(edge.source_sentence.as_str()).or_default();
        if entry.is_empty() {
            order.push(edge.source_sentence.as_str());
        }
        entry.push(edge);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating artifact dir {}", parent.display()))?;
    }
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("creating artifact {}", path.display()))?;

    for sentence in order {
        let group = &groups[sentence];
        let line = ArtifactLine {
            sentence: sentence.to_string(),
            relations: group
                .iter()
                .map(|edge| RelationMention {
                    head: edge.source.clone(),
                    tail: edge.target.clone(),
                    label: edge.relation.clone(),
                    confidence: Some(edge.confidence),
                })
                .collect(),
            new_relations_count: group
                .iter()
                .filter(|edge| !previous_keys.contains(&edge.key()))
                .count(),
        };
        serde_json::to_writer(&mut file, &line)?;
        writeln!(file)?;
    }

    Ok(())
}
