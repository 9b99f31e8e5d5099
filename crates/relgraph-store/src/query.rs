//! Confidence-filtered graph queries with caching.

use crate::backend::{CypherStatement, GraphStore, HopRow};
use crate::cache::QueryCache;
use crate::validate::InputValidator;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Combined confidence reported for a two-hop path when either hop carries
/// no recorded confidence.
const INDIRECT_FALLBACK_CONFIDENCE: f64 = 0.8;

// ============================================================================
// Configuration & result types
// ============================================================================

#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Default confidence threshold when the caller does not pass one.
    pub confidence_threshold: f64,
    /// Tolerance subtracted from the threshold during post-filtering, so
    /// float representation noise cannot exclude an edge sitting exactly on
    /// the boundary.
    pub epsilon: f64,
    pub cache_ttl: Duration,
    pub result_limit: i64,
    /// Row cap for the (more expensive) two-hop fallback.
    pub indirect_limit: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            epsilon: 1e-10,
            cache_ttl: Duration::from_secs(600),
            result_limit: 1000,
            indirect_limit: 10,
        }
    }
}

/// Whether a result edge was observed directly or through one intermediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationPath {
    Direct,
    Indirect,
}

/// One query result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRecord {
    pub source: String,
    pub relation: String,
    pub target: String,
    pub confidence: f64,
    pub source_sentence: String,
    pub path: RelationPath,
}

/// Combine two hop confidences into one score.
///
/// Both available: multiplied and capped to [0,1]. Either missing: the
/// fallback constant, matching how the store reads unscored legacy edges.
pub fn combine_hop_confidence(hop1: Option<f64>, hop2: Option<f64>) -> f64 {
    match (hop1, hop2) {
        (Some(a), Some(b)) => (a * b).clamp(0.0, 1.0),
        _ => INDIRECT_FALLBACK_CONFIDENCE,
    }
}

// ============================================================================
// Query engine
// ============================================================================

/// Serves confidence-filtered graph queries. Read-mostly and safe for many
/// concurrent callers; the caches sit behind their own locks.
pub struct QueryEngine {
    store: Arc<dyn GraphStore>,
    config: QueryConfig,
    validator: InputValidator,
    edge_cache: QueryCache<Vec<QueryRecord>>,
    name_cache: QueryCache<Vec<String>>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn GraphStore>, config: QueryConfig) -> Self {
        let ttl = config.cache_ttl;
        Self {
            store,
            config,
            validator: InputValidator::new(),
            edge_cache: QueryCache::new(ttl),
            name_cache: QueryCache::new(ttl),
        }
    }

    fn threshold(&self, requested: Option<f64>) -> Result<f64> {
        let threshold = requested.unwrap_or(self.config.confidence_threshold);
        self.validator.validate_threshold(threshold)?;
        Ok(threshold)
    }

    /// Keep rows at or above the threshold, with ε tolerance.
    fn filter_by_confidence(&self, records: Vec<QueryRecord>, threshold: f64) -> Vec<QueryRecord> {
        records
            .into_iter()
            .filter(|r| r.confidence >= threshold - self.config.epsilon)
            .collect()
    }

    /// All edges touching `entity` as source or target, strongest first.
    pub async fn entity_relations(
        &self,
        entity: &str,
        confidence_threshold: Option<f64>,
    ) -> Result<Vec<QueryRecord>> {
        let threshold = self.threshold(confidence_threshold)?;
        let entity = self
            .validator
            .validate_entities(&[entity.to_string()])?
            .remove(0);

        let key = QueryCache::<Vec<QueryRecord>>::key(
            "entity_relations",
            &[&entity, &threshold.to_string()],
        );
        if let Some(cached) = self.edge_cache.get(&key) {
            tracing::debug!(entity, "entity_relations served from cache");
            return Ok(cached);
        }

        let statement = CypherStatement::new(
            "MATCH (n:Entity {name: $entity})-[r]-(m:Entity) \
             WHERE r.confidence IS NULL OR r.confidence >= $threshold \
             RETURN DISTINCT startNode(r).name AS source, type(r) AS relation, \
                    endNode(r).name AS target, \
                    coalesce(r.confidence, 1.0) AS confidence, \
                    coalesce(r.source_sentence, '') AS source_sentence \
             ORDER BY confidence DESC \
             LIMIT $limit",
        )
        .param("entity", entity.as_str())
        .param("threshold", threshold)
        .param("limit", self.config.result_limit);

        let records = self.direct_records(statement, threshold).await?;
        self.edge_cache.put(key, records.clone());
        Ok(records)
    }

    /// Edges of a relation type touching any of `entities`.
    pub async fn entities_by_relation(
        &self,
        entities: &[String],
        relation: &str,
        confidence_threshold: Option<f64>,
    ) -> Result<Vec<QueryRecord>> {
        let threshold = self.threshold(confidence_threshold)?;
        let entities = self.validator.validate_entities(entities)?;
        self.validator.check_text(relation)?;
        let relation = relation.trim().to_string();

        let key = QueryCache::<Vec<QueryRecord>>::key(
            "entities_by_relation",
            &[&entities.join(","), &relation, &threshold.to_string()],
        );
        if let Some(cached) = self.edge_cache.get(&key) {
            tracing::debug!(relation, "entities_by_relation served from cache");
            return Ok(cached);
        }

        let statement = CypherStatement::new(
            "MATCH (n:Entity)-[r]-(m:Entity) \
             WHERE (n.name IN $entities OR m.name IN $entities) \
               AND type(r) CONTAINS $relation \
               AND (r.confidence IS NULL OR r.confidence >= $threshold) \
             RETURN DISTINCT startNode(r).name AS source, type(r) AS relation, \
                    endNode(r).name AS target, \
                    coalesce(r.confidence, 1.0) AS confidence, \
                    coalesce(r.source_sentence, '') AS source_sentence \
             ORDER BY confidence DESC \
             LIMIT $limit",
        )
        .param("entities", entities.clone())
        .param("relation", relation.as_str())
        .param("threshold", threshold)
        .param("limit", self.config.result_limit);

        let records = self.direct_records(statement, threshold).await?;
        self.edge_cache.put(key, records.clone());
        Ok(records)
    }

    /// Direct edges between `a` and `b`; falls back to a two-hop search
    /// through one intermediate when nothing direct exists and
    /// `include_indirect` is set.
    pub async fn relation_between(
        &self,
        a: &str,
        b: &str,
        bidirectional: bool,
        include_indirect: bool,
        confidence_threshold: Option<f64>,
    ) -> Result<Vec<QueryRecord>> {
        let threshold = self.threshold(confidence_threshold)?;
        let cleaned = self
            .validator
            .validate_entities(&[a.to_string(), b.to_string()])?;
        let (a, b) = (cleaned[0].clone(), cleaned[1].clone());

        let key = QueryCache::<Vec<QueryRecord>>::key(
            "relation_between",
            &[
                &a,
                &b,
                &bidirectional.to_string(),
                &include_indirect.to_string(),
                &threshold.to_string(),
            ],
        );
        if let Some(cached) = self.edge_cache.get(&key) {
            return Ok(cached);
        }

        let direct_text = if bidirectional {
            "MATCH (n:Entity)-[r]-(m:Entity) \
             WHERE ((n.name = $a AND m.name = $b) OR (n.name = $b AND m.name = $a)) \
               AND (r.confidence IS NULL OR r.confidence >= $threshold) \
             RETURN DISTINCT startNode(r).name AS source, type(r) AS relation, \
                    endNode(r).name AS target, \
                    coalesce(r.confidence, 1.0) AS confidence, \
                    coalesce(r.source_sentence, '') AS source_sentence \
             ORDER BY confidence DESC \
             LIMIT $limit"
        } else {
            "MATCH (n:Entity)-[r]->(m:Entity) \
             WHERE n.name = $a AND m.name = $b \
               AND (r.confidence IS NULL OR r.confidence >= $threshold) \
             RETURN DISTINCT startNode(r).name AS source, type(r) AS relation, \
                    endNode(r).name AS target, \
                    coalesce(r.confidence, 1.0) AS confidence, \
                    coalesce(r.source_sentence, '') AS source_sentence \
             ORDER BY confidence DESC \
             LIMIT $limit"
        };
        let statement = CypherStatement::new(direct_text)
            .param("a", a.as_str())
            .param("b", b.as_str())
            .param("threshold", threshold)
            .param("limit", self.config.result_limit);

        let mut records = self.direct_records(statement, threshold).await?;

        if records.is_empty() && include_indirect {
            records = self.two_hop(&a, &b, bidirectional, threshold).await?;
        }

        self.edge_cache.put(key, records.clone());
        Ok(records)
    }

    /// Distinct node names containing `keyword`.
    pub async fn entities_containing(
        &self,
        keyword: &str,
        limit: Option<i64>,
    ) -> Result<Vec<String>> {
        self.validator.check_text(keyword)?;
        let keyword = keyword.trim().to_string();
        let limit = limit.unwrap_or(50).clamp(1, self.config.result_limit);

        let key =
            QueryCache::<Vec<String>>::key("entities_containing", &[&keyword, &limit.to_string()]);
        if let Some(cached) = self.name_cache.get(&key) {
            return Ok(cached);
        }

        let statement = CypherStatement::new(
            "MATCH (n:Entity) WHERE n.name CONTAINS $keyword \
             RETURN DISTINCT n.name AS name ORDER BY name LIMIT $limit",
        )
        .param("keyword", keyword.as_str())
        .param("limit", limit);

        let names = self.store.fetch_names(statement).await?;
        self.name_cache.put(key, names.clone());
        Ok(names)
    }

    async fn direct_records(
        &self,
        statement: CypherStatement,
        threshold: f64,
    ) -> Result<Vec<QueryRecord>> {
        let rows = self.store.fetch_edges(statement).await?;
        let records = rows
            .into_iter()
            .map(|row| QueryRecord {
                source: row.source,
                relation: row.relation,
                target: row.target,
                confidence: row.confidence,
                source_sentence: row.source_sentence,
                path: RelationPath::Direct,
            })
            .collect();
        Ok(self.filter_by_confidence(records, threshold))
    }

    /// Two-hop fallback. Each hop is threshold-filtered in the query; the
    /// combined score is reported as-is, so a pair of strong hops is not
    /// re-excluded merely because their product dips under the threshold.
    async fn two_hop(
        &self,
        a: &str,
        b: &str,
        bidirectional: bool,
        threshold: f64,
    ) -> Result<Vec<QueryRecord>> {
        let text = if bidirectional {
            "MATCH (n:Entity)-[r1]-(mid:Entity)-[r2]-(m:Entity) \
             WHERE ((n.name = $a AND m.name = $b) OR (n.name = $b AND m.name = $a)) \
               AND (r1.confidence IS NULL OR r1.confidence >= $threshold) \
               AND (r2.confidence IS NULL OR r2.confidence >= $threshold) \
             RETURN DISTINCT n.name AS source, \
                    type(r1) + ' -> ' + mid.name + ' -> ' + type(r2) AS relation, \
                    m.name AS target, \
                    r1.confidence AS c1, r2.confidence AS c2, \
                    coalesce(r1.source_sentence, '') AS source_sentence \
             LIMIT $limit"
        } else {
            "MATCH (n:Entity)-[r1]->(mid:Entity)-[r2]->(m:Entity) \
             WHERE n.name = $a AND m.name = $b \
               AND (r1.confidence IS NULL OR r1.confidence >= $threshold) \
               AND (r2.confidence IS NULL OR r2.confidence >= $threshold) \
             RETURN DISTINCT n.name AS source, \
                    type(r1) + ' -> ' + mid.name + ' -> ' + type(r2) AS relation, \
                    m.name AS target, \
                    r1.confidence AS c1, r2.confidence AS c2, \
                    coalesce(r1.source_sentence, '') AS source_sentence \
             LIMIT $limit"
        };
        let statement = CypherStatement::new(text)
            .param("a", a)
            .param("b", b)
            .param("threshold", threshold)
            .param("limit", self.config.indirect_limit);

        let rows = self.store.fetch_hops(statement).await?;
        let mut records: Vec<QueryRecord> = rows
            .into_iter()
            .map(|row: HopRow| QueryRecord {
                source: row.source,
                relation: row.relation,
                target: row.target,
                confidence: combine_hop_confidence(row.hop1_confidence, row.hop2_confidence),
                source_sentence: row.source_sentence,
                path: RelationPath::Indirect,
            })
            .collect();
        records.sort_by(|x, y| {
            y.confidence
                .partial_cmp(&x.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(records)
    }
}
