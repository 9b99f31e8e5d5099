//! Relgraph store: persistence and serving of the reconciled graph.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                        STORE LAYER                                 │
//! ├────────────────────────────────────────────────────────────────────┤
//! │                                                                    │
//! │  reconciled edges ──► GraphMaterializer ──► property graph         │
//! │                       (clear-then-write,     (Entity nodes,        │
//! │                        batched txns)          typed relationships) │
//! │                                                   ▲                │
//! │  callers ───────────► QueryEngine ───────────────┘                 │
//! │                       (validation, parameterized                   │
//! │                        queries, TTL cache)                         │
//! │                                                                    │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every value reaching the store travels through a query parameter. The
//! only spliced text is structural identifiers (relationship types), and
//! those must pass a strict character whitelist first — the Bolt protocol
//! has no parameter slot for them.

pub mod backend;
pub mod cache;
pub mod materialize;
pub mod query;
pub mod validate;

pub use backend::{BoltStore, CypherStatement, EdgeRow, GraphStore, HopRow, Param, StoreConfig};
pub use cache::QueryCache;
pub use materialize::{GraphMaterializer, MaterializationResult};
pub use query::{QueryConfig, QueryEngine, QueryRecord, RelationPath};
pub use validate::InputValidator;
