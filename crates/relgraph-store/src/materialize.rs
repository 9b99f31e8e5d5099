//! Graph materialization: idempotent full rebuild of the property graph.

use crate::backend::{CypherStatement, GraphStore, StoreConfig};
use crate::validate::InputValidator;
use anyhow::Result;
use relgraph_core::{GraphEdge, Normalizer};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Counts reported after a successful rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializationResult {
    pub node_count: usize,
    pub edge_count: usize,
}

/// Writes a reconciled edge set into the store as a full rebuild.
///
/// Clear-then-write was chosen over incremental patching: the stored graph
/// is always exactly the latest reconciled model, never a drifted mixture
/// of versions. Callers must serialize rebuilds; readers during the rebuild
/// window may observe a transiently empty graph.
pub struct GraphMaterializer {
    store: Arc<dyn GraphStore>,
    config: StoreConfig,
    normalizer: Normalizer,
    validator: InputValidator,
}

impl GraphMaterializer {
    pub fn new(store: Arc<dyn GraphStore>, config: StoreConfig, normalizer: Normalizer) -> Self {
        Self {
            store,
            config,
            normalizer,
            validator: InputValidator::new(),
        }
    }

    /// Rebuild the graph from `edges`. A failed attempt is retried from a
    /// clean slate; no partially applied state survives.
    pub async fn materialize(&self, edges: &[GraphEdge]) -> Result<MaterializationResult> {
        let mut last_error = None;
        for attempt in 1..=self.config.max_rebuild_attempts.max(1) {
            match self.try_materialize(edges).await {
                Ok(result) => {
                    tracing::info!(
                        nodes = result.node_count,
                        edges = result.edge_count,
                        attempt,
                        "materialization complete"
                    );
                    return Ok(result);
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "materialization attempt failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.expect("at least one attempt ran"))
    }

    async fn try_materialize(&self, edges: &[GraphEdge]) -> Result<MaterializationResult> {
        self.clear().await?;

        // Relationship types get spliced into query text (Bolt has no
        // parameter slot for them), so an edge with a label that fails the
        // identifier whitelist is a malformed record: skipped, not fatal.
        let mut writable: Vec<&GraphEdge> = Vec::with_capacity(edges.len());
        for edge in edges {
            match self.validator.cypher_identifier(&edge.relation) {
                Ok(_) => writable.push(edge),
                Err(err) => {
                    tracing::warn!(relation = %edge.relation, error = %err, "skipping edge with unwritable relation type");
                }
            }
        }

        // Nodes: one per distinct canonical name, typed via the vocabulary,
        // upserted by unique name.
        let names: BTreeSet<&str> = writable
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect();
        let node_statements: Vec<CypherStatement> = names
            .iter()
            .map(|name| {
                CypherStatement::new(
                    "MERGE (e:Entity {name: $name}) ON CREATE SET e.type = $type",
                )
                .param("name", *name)
                .param("type", self.normalizer.classify(name).as_str())
            })
            .collect();
        for chunk in node_statements.chunks(self.config.batch_size.max(1)) {
            self.store.run_batched(chunk.to_vec()).await?;
        }

        let edge_statements: Vec<CypherStatement> = writable
            .iter()
            .map(|edge| {
                // Whitelisted above; backtick-quoted because labels may
                // carry hyphens and CJK ideographs.
                let text = format!(
                    "MATCH (s:Entity {{name: $source}}), (t:Entity {{name: $target}}) \
                     CREATE (s)-[r:`{}` {{confidence: $confidence, source_sentence: $sentence}}]->(t)",
                    edge.relation
                );
                CypherStatement::new(text)
                    .param("source", edge.source.as_str())
                    .param("target", edge.target.as_str())
                    .param("confidence", edge.confidence)
                    .param("sentence", edge.source_sentence.as_str())
            })
            .collect();
        for chunk in edge_statements.chunks(self.config.batch_size.max(1)) {
            self.store.run_batched(chunk.to_vec()).await?;
        }

        self.create_indexes().await?;

        Ok(MaterializationResult {
            node_count: names.len(),
            edge_count: writable.len(),
        })
    }

    /// Remove all graph content plus the constraint and index definitions,
    /// so a rebuild never trips over leftovers.
    async fn clear(&self) -> Result<()> {
        self.store
            .run(CypherStatement::new(
                "DROP CONSTRAINT entity_name_unique IF EXISTS",
            ))
            .await?;
        self.store
            .run(CypherStatement::new("DROP INDEX entity_type_index IF EXISTS"))
            .await?;
        self.store
            .run(CypherStatement::new("MATCH (n) DETACH DELETE n"))
            .await?;
        Ok(())
    }

    async fn create_indexes(&self) -> Result<()> {
        self.store
            .run(CypherStatement::new(
                "CREATE CONSTRAINT entity_name_unique IF NOT EXISTS \
                 FOR (e:Entity) REQUIRE e.name IS UNIQUE",
            ))
            .await?;
        self.store
            .run(CypherStatement::new(
                "CREATE INDEX entity_type_index IF NOT EXISTS FOR (e:Entity) ON (e.type)",
            ))
            .await?;
        Ok(())
    }
}
