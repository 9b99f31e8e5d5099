//! The Bolt seam: parameterized statements and the store trait.

use anyhow::{Context, Result};
use async_trait::async_trait;
use relgraph_core::RelgraphError;

// ============================================================================
// Statements
// ============================================================================

/// A parameter value. Everything that is data travels through one of these;
/// nothing else is ever interpolated into query text.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Str(String),
    Float(f64),
    Int(i64),
    StrList(Vec<String>),
}

/// One parameterized Cypher statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherStatement {
    pub text: String,
    pub params: Vec<(&'static str, Param)>,
}

impl CypherStatement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: &'static str, value: impl Into<Param>) -> Self {
        self.params.push((name, value.into()));
        self
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Str(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Str(v.to_string())
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<Vec<String>> for Param {
    fn from(v: Vec<String>) -> Self {
        Param::StrList(v)
    }
}

// ============================================================================
// Row shapes
// ============================================================================

/// A direct-edge row: `source, relation, target, confidence, source_sentence`.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRow {
    pub source: String,
    pub relation: String,
    pub target: String,
    pub confidence: f64,
    pub source_sentence: String,
}

/// A two-hop row: per-hop confidences stay separate so the engine can apply
/// the combination policy.
#[derive(Debug, Clone, PartialEq)]
pub struct HopRow {
    pub source: String,
    pub relation: String,
    pub target: String,
    pub hop1_confidence: Option<f64>,
    pub hop2_confidence: Option<f64>,
    pub source_sentence: String,
}

// ============================================================================
// Store trait
// ============================================================================

/// Minimal surface the materializer and query engine need from the graph
/// store. Implemented for the Bolt client below and for in-memory mocks in
/// tests.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Execute a statement, ignoring any rows.
    async fn run(&self, statement: CypherStatement) -> Result<()>;

    /// Execute statements inside one transaction: all commit or none do.
    async fn run_batched(&self, statements: Vec<CypherStatement>) -> Result<()>;

    async fn fetch_edges(&self, statement: CypherStatement) -> Result<Vec<EdgeRow>>;

    async fn fetch_hops(&self, statement: CypherStatement) -> Result<Vec<HopRow>>;

    /// Fetch a single `name` column.
    async fn fetch_names(&self, statement: CypherStatement) -> Result<Vec<String>>;
}

// ============================================================================
// Bolt client (neo4rs)
// ============================================================================

/// Connection settings for the graph store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Statements per write transaction during materialization.
    pub batch_size: usize,
    /// Full-rebuild attempts before giving up.
    pub max_rebuild_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
            batch_size: 500,
            max_rebuild_attempts: 3,
        }
    }
}

/// `neo4rs`-backed store.
pub struct BoltStore {
    graph: neo4rs::Graph,
}

impl BoltStore {
    /// Connect and probe. An unreachable store fails here, at construction
    /// time, with a Config-class error.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let graph = neo4rs::Graph::new(&config.uri, &config.user, &config.password)
            .await
            .map_err(|e| RelgraphError::Config(format!("graph store {}: {e}", config.uri)))?;

        let mut probe = graph
            .execute(neo4rs::query("RETURN 1 AS ok"))
            .await
            .map_err(|e| RelgraphError::Config(format!("graph store probe: {e}")))?;
        probe
            .next()
            .await
            .map_err(|e| RelgraphError::Config(format!("graph store probe: {e}")))?;

        tracing::info!(uri = %config.uri, "graph store connected");
        Ok(Self { graph })
    }

    fn build(statement: CypherStatement) -> neo4rs::Query {
        let mut query = neo4rs::query(&statement.text);
        for (name, value) in statement.params {
            query = match value {
                Param::Str(v) => query.param(name, v),
                Param::Float(v) => query.param(name, v),
                Param::Int(v) => query.param(name, v),
                Param::StrList(v) => query.param(name, v),
            };
        }
        query
    }
}

#[async_trait]
impl GraphStore for BoltStore {
    async fn run(&self, statement: CypherStatement) -> Result<()> {
        self.graph
            .run(Self::build(statement))
            .await
            .context("running statement")?;
        Ok(())
    }

    async fn run_batched(&self, statements: Vec<CypherStatement>) -> Result<()> {
        let mut txn = self.graph.start_txn().await.context("starting txn")?;
        txn.run_queries(statements.into_iter().map(Self::build).collect::<Vec<_>>())
            .await
            .context("running batched statements")?;
        txn.commit().await.context("committing txn")?;
        Ok(())
    }

    async fn fetch_edges(&self, statement: CypherStatement) -> Result<Vec<EdgeRow>> {
        let mut stream = self
            .graph
            .execute(Self::build(statement))
            .await
            .context("executing edge query")?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.context("streaming edge rows")? {
            rows.push(EdgeRow {
                source: row.get::<String>("source").unwrap_or_default(),
                relation: row.get::<String>("relation").unwrap_or_default(),
                target: row.get::<String>("target").unwrap_or_default(),
                confidence: row.get::<f64>("confidence").unwrap_or(1.0),
                source_sentence: row.get::<String>("source_sentence").unwrap_or_default(),
            });
        }
        Ok(rows)
    }

    async fn fetch_hops(&self, statement: CypherStatement) -> Result<Vec<HopRow>> {
        let mut stream = self
            .graph
            .execute(Self::build(statement))
            .await
            .context("executing two-hop query")?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.context("streaming two-hop rows")? {
            rows.push(HopRow {
                source: row.get::<String>("source").unwrap_or_default(),
                relation: row.get::<String>("relation").unwrap_or_default(),
                target: row.get::<String>("target").unwrap_or_default(),
                // A NULL confidence fails the typed get; that is exactly the
                // "unavailable" case the combination policy handles.
                hop1_confidence: row.get::<f64>("c1").ok(),
                hop2_confidence: row.get::<f64>("c2").ok(),
                source_sentence: row.get::<String>("source_sentence").unwrap_or_default(),
            });
        }
        Ok(rows)
    }

    async fn fetch_names(&self, statement: CypherStatement) -> Result<Vec<String>> {
        let mut stream = self
            .graph
            .execute(Self::build(statement))
            .await
            .context("executing name query")?;
        let mut names = Vec::new();
        while let Some(row) = stream.next().await.context("streaming name rows")? {
            if let Ok(name) = row.get::<String>("name") {
                names.push(name);
            }
        }
        Ok(names)
    }
}
