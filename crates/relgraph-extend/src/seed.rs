//! Seed ingestion: predictions CSV → candidate batch.
//!
//! The upstream extraction pipeline dumps its output as
//! `sentence,head,tail,relation,confidence[,head_type,tail_type]`. Rows are
//! authoritative seeds for version 0 of the build loop.

use anyhow::{Context, Result};
use relgraph_core::{CandidateSource, RelationCandidate};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct PredictionRow {
    sentence: String,
    head: String,
    tail: String,
    relation: String,
    #[serde(default)]
    confidence: Option<f64>,
    // head_type / tail_type columns are carried by some exports; typing is
    // recomputed from the vocabulary at materialization time, so they are
    // ignored here.
}

/// Load seed candidates from a predictions CSV.
///
/// Rows with the `"none"` sentinel are dropped immediately; malformed rows
/// are skipped with a warning. A missing file is a hard error.
pub fn seed_candidates_from_csv(path: &Path) -> Result<Vec<RelationCandidate>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening predictions csv {}", path.display()))?;

    let mut candidates = Vec::new();
    let mut skipped = 0usize;
    for (rowno, record) in reader.deserialize::<PredictionRow>().enumerate() {
        let row = match record {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(rowno, error = %err, "skipping malformed prediction row");
                skipped += 1;
                continue;
            }
        };
        if row.relation == "none" {
            continue;
        }
        candidates.push(RelationCandidate {
            sentence: row.sentence,
            head: row.head,
            tail: row.tail,
            relation: row.relation,
            confidence: row.confidence,
            iteration: 0,
            source: CandidateSource::Seed,
        });
    }

    tracing::info!(
        path = %path.display(),
        candidates = candidates.len(),
        skipped,
        "loaded seed predictions"
    );
    Ok(candidates)
}
