//! Input validation for everything that reaches the graph store.

use regex::Regex;
use relgraph_core::RelgraphError;

/// Longest accepted entity or relation string.
pub const MAX_ENTITY_LENGTH: usize = 100;
/// Most entities accepted per call.
pub const MAX_ENTITIES_PER_QUERY: usize = 50;

struct SuspiciousPattern {
    name: &'static str,
    regex: Regex,
}

/// Rejects injection-shaped input before any query is built.
///
/// All values are parameterized anyway; this layer exists so that hostile
/// input is refused loudly at the boundary instead of traveling further in.
pub struct InputValidator {
    suspicious: Vec<SuspiciousPattern>,
    /// Characters allowed in a structural identifier (relationship type):
    /// word chars, CJK ideographs, interior hyphens.
    identifier: Regex,
}

impl InputValidator {
    pub fn new() -> Self {
        Self {
            suspicious: vec![
                SuspiciousPattern {
                    name: "quote_or_terminator",
                    regex: Regex::new(r#"["'`;]"#).unwrap(),
                },
                SuspiciousPattern {
                    name: "destructive_keyword",
                    regex: Regex::new(r"(?i)\b(DROP|DELETE|CREATE|ALTER|MERGE)\b").unwrap(),
                },
                SuspiciousPattern {
                    name: "line_comment",
                    regex: Regex::new(r"//").unwrap(),
                },
                SuspiciousPattern {
                    name: "block_comment",
                    regex: Regex::new(r"/\*|\*/").unwrap(),
                },
            ],
            identifier: Regex::new(r"^[\w\p{Han}][\w\p{Han}-]*$").unwrap(),
        }
    }

    /// Check one free-text argument (entity name, relation filter, keyword).
    pub fn check_text(&self, text: &str) -> Result<(), RelgraphError> {
        if text.trim().is_empty() {
            return Err(RelgraphError::InvalidInput("empty argument".to_string()));
        }
        if text.len() > MAX_ENTITY_LENGTH {
            return Err(RelgraphError::InvalidInput(format!(
                "argument longer than {MAX_ENTITY_LENGTH} bytes"
            )));
        }
        for pattern in &self.suspicious {
            if pattern.regex.is_match(text) {
                return Err(RelgraphError::InvalidInput(format!(
                    "argument matches injection-risk pattern {}",
                    pattern.name
                )));
            }
        }
        Ok(())
    }

    /// Validate and trim an entity list. Any invalid member rejects the
    /// whole call; no partial query execution.
    pub fn validate_entities(&self, entities: &[String]) -> Result<Vec<String>, RelgraphError> {
        if entities.is_empty() {
            return Err(RelgraphError::InvalidInput("no entities given".to_string()));
        }
        if entities.len() > MAX_ENTITIES_PER_QUERY {
            return Err(RelgraphError::InvalidInput(format!(
                "more than {MAX_ENTITIES_PER_QUERY} entities in one call"
            )));
        }
        let mut cleaned = Vec::with_capacity(entities.len());
        for entity in entities {
            self.check_text(entity)?;
            cleaned.push(entity.trim().to_string());
        }
        Ok(cleaned)
    }

    /// Validate a confidence threshold.
    pub fn validate_threshold(&self, threshold: f64) -> Result<(), RelgraphError> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(RelgraphError::InvalidInput(format!(
                "confidence threshold out of range: {threshold}"
            )));
        }
        Ok(())
    }

    /// Validate a structural identifier for splicing into query text.
    ///
    /// The Bolt protocol cannot parameterize relationship types, so these
    /// are the one thing that gets spliced — backtick-quoted, after this
    /// whitelist has excluded backticks, quotes, whitespace and every other
    /// escape vehicle.
    pub fn cypher_identifier<'a>(&self, raw: &'a str) -> Result<&'a str, RelgraphError> {
        if raw.len() <= MAX_ENTITY_LENGTH && self.identifier.is_match(raw) {
            Ok(raw)
        } else {
            Err(RelgraphError::InvalidInput(format!(
                "invalid identifier for query splicing: {raw:?}"
            )))
        }
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}
