//! Iteration state: the resumable checkpoint written after every pass.

use anyhow::{Context, Result};
use relgraph_core::RelgraphError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persistent state of the iteration loop.
///
/// Owned exclusively by the controller. `artifact_paths` holds one entry for
/// the seed artifact (version 0) plus one per completed iteration, so after
/// `version` iterations the list has `version + 1` entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationState {
    pub version: u32,
    pub artifact_paths: Vec<PathBuf>,
    pub last_extend_ratio: f64,
}

impl IterationState {
    pub fn new() -> Self {
        Self {
            version: 0,
            artifact_paths: Vec::new(),
            last_extend_ratio: 1.0,
        }
    }

    pub fn latest_artifact_path(&self) -> Option<&Path> {
        self.artifact_paths.last().map(PathBuf::as_path)
    }

    /// Field-by-field range validation, applied to every loaded checkpoint.
    pub fn validate(&self) -> Result<(), RelgraphError> {
        if !self.last_extend_ratio.is_finite() || self.last_extend_ratio < 0.0 {
            return Err(RelgraphError::Config(format!(
                "checkpoint last_extend_ratio out of range: {}",
                self.last_extend_ratio
            )));
        }
        if self.artifact_paths.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(RelgraphError::Config(
                "checkpoint contains an empty artifact path".to_string(),
            ));
        }
        if !self.artifact_paths.is_empty()
            && self.artifact_paths.len() != self.version as usize + 1
        {
            return Err(RelgraphError::Config(format!(
                "checkpoint version {} inconsistent with {} artifact paths",
                self.version,
                self.artifact_paths.len()
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating checkpoint dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing checkpoint {}", path.display()))?;
        Ok(())
    }

    /// Save under `<data_dir>/history/<timestamp>_iter_v<version>.json`.
    pub fn save_to_history(&self, data_dir: &Path) -> Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let path = data_dir
            .join("history")
            .join(format!("{stamp}_iter_v{}.json", self.version));
        self.save(&path)?;
        tracing::info!(path = %path.display(), version = self.version, "checkpoint written");
        Ok(path)
    }

    /// Load and validate a checkpoint. Every field is deserialized
    /// explicitly into the struct and range-checked before use.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RelgraphError::Config(format!("checkpoint {}: {e}", path.display())))?;
        let state: IterationState = serde_json::from_str(&contents)
            .map_err(|e| RelgraphError::Config(format!("checkpoint {}: {e}", path.display())))?;
        state.validate()?;
        Ok(state)
    }
}

impl Default for IterationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let state = IterationState {
            version: 2,
            artifact_paths: vec![
                PathBuf::from("iteration_version_0.json"),
                PathBuf::from("iteration_version_1.json"),
                PathBuf::from("iteration_version_2.json"),
            ],
            last_extend_ratio: 0.25,
        };
        state.save(&path).unwrap();

        let loaded = IterationState::load(&path).unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.artifact_paths.len(), 3);
        assert!((loaded.last_extend_ratio - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"version": 0, "artifact_paths": [], "last_extend_ratio": -0.5}"#,
        )
        .unwrap();

        assert!(IterationState::load(&path).is_err());
    }

    #[test]
    fn rejects_inconsistent_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"version": 5, "artifact_paths": ["a.json"], "last_extend_ratio": 1.0}"#,
        )
        .unwrap();

        assert!(IterationState::load(&path).is_err());
    }

    #[test]
    fn rejects_wrong_field_type() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"version": "zero", "artifact_paths": [], "last_extend_ratio": 1.0}"#,
        )
        .unwrap();

        assert!(IterationState::load(&path).is_err());
    }
}
