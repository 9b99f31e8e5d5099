//! Entity normalization: canonical surface forms and coarse typing.

use crate::error::RelgraphError;
use crate::types::EntityType;
use regex::Regex;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// Keywords marking an algorithmic process when they appear inside a name.
const ALGORITHMIC_KEYWORDS: &[&str] = &["排序", "查找", "搜索", "算法", "sort", "search"];

// ============================================================================
// Vocabulary
// ============================================================================

/// Precomputed name → type table, loaded once and passed in at construction.
///
/// Immutable after load; lookups are exact-match. Names missing from the
/// table fall through to keyword heuristics in [`Normalizer::classify`].
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    entries: HashMap<String, EntityType>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, entity_type: EntityType) {
        self.entries.insert(name.into(), entity_type);
    }

    pub fn get(&self, name: &str) -> Option<EntityType> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse `name,type` lines. Unknown type labels and short lines are
    /// skipped with a warning; an unreadable file is a hard error.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, RelgraphError> {
        let mut vocab = Self::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| RelgraphError::Config(format!("vocabulary read: {e}")))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((name, label)) = line.split_once(',') else {
                tracing::warn!(lineno, line, "skipping vocabulary line without type column");
                continue;
            };
            let entity_type = match label.trim().to_ascii_uppercase().as_str() {
                "ALGORITHMIC" | "ARI" => EntityType::Algorithmic,
                "CONCEPT" | "CON" => EntityType::Concept,
                other => {
                    tracing::warn!(lineno, label = other, "skipping unknown vocabulary type");
                    continue;
                }
            };
            vocab.insert(name.trim(), entity_type);
        }
        Ok(vocab)
    }

    pub fn from_path(path: &Path) -> Result<Self, RelgraphError> {
        let file = std::fs::File::open(path).map_err(|e| {
            RelgraphError::Config(format!("vocabulary file {}: {e}", path.display()))
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }
}

// ============================================================================
// Normalizer
// ============================================================================

struct ClausePattern {
    name: &'static str,
    regex: Regex,
}

/// Canonicalizes raw entity surface strings and infers a coarse type.
pub struct Normalizer {
    /// Descriptive connective clauses stripped before collapsing.
    clause_patterns: Vec<ClausePattern>,
    /// Runs of anything that is neither a word char nor a CJK ideograph.
    collapse: Regex,
    whitespace: Regex,
    vocabulary: Vocabulary,
}

impl Normalizer {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            clause_patterns: vec![
                // "X 是 ... 的 ..." (is-a + descriptive clause)
                ClausePattern {
                    name: "is_a",
                    regex: Regex::new(r"是\p{Han}+的\p{Han}+").unwrap(),
                },
                // "指 ..." (denotes)
                ClausePattern {
                    name: "denotes",
                    regex: Regex::new(r"指\p{Han}+").unwrap(),
                },
                // "通过 ..." (via)
                ClausePattern {
                    name: "via",
                    regex: Regex::new(r"通过\p{Han}+").unwrap(),
                },
                // "利用 ..." (using)
                ClausePattern {
                    name: "using",
                    regex: Regex::new(r"利用\p{Han}+").unwrap(),
                },
                // "从 ..." (from)
                ClausePattern {
                    name: "from",
                    regex: Regex::new(r"从\p{Han}+").unwrap(),
                },
            ],
            collapse: Regex::new(r"[^\w\p{Han}]+").unwrap(),
            whitespace: Regex::new(r"\s+").unwrap(),
            vocabulary,
        }
    }

    /// Canonicalize a raw surface string.
    ///
    /// Returns `None` (never an empty string) when nothing survives
    /// stripping, signaling the caller to drop the candidate.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let mut text = raw.to_string();
        for pattern in &self.clause_patterns {
            if pattern.regex.is_match(&text) {
                tracing::trace!(pattern = pattern.name, raw, "stripping descriptive clause");
                text = pattern.regex.replace_all(&text, "").into_owned();
            }
        }

        let text = self.collapse.replace_all(&text, " ");
        let text = self.whitespace.replace_all(text.trim(), " ");
        let text = text.trim();

        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// Classify a canonical name. Total: every name gets a type.
    pub fn classify(&self, canonical_name: &str) -> EntityType {
        if let Some(entity_type) = self.vocabulary.get(canonical_name) {
            return entity_type;
        }

        let lowered = canonical_name.to_lowercase();
        if ALGORITHMIC_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            EntityType::Algorithmic
        } else {
            EntityType::Concept
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Vocabulary::new())
    }
}
