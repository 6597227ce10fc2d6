//! Graph store collaborator
//!
//! Mutations are buffered by the store and only reach durable storage on
//! [`GraphStore::commit_pending`]. Stores resolve [`NodeRef`] keys lazily at
//! commit time, so a link may reference a node whose upsert has not been
//! committed (or even submitted) yet.

mod memory;
mod neo4j;

pub use memory::{Alias, Edge, MemoryStore, Snapshot};
pub use neo4j::{Neo4jSettings, Neo4jStore};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{EdgePair, Language, Node, NodeKind, NodeRef};

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn register_node_schema(&self, kind: NodeKind) -> Result<()>;

    async fn register_edge_schema(&self, pairs: &[EdgePair]) -> Result<()>;

    /// Create the node or overwrite the properties of the node with the same key.
    async fn upsert(&self, node: Node) -> Result<NodeRef>;

    /// Link `from` to `to` with the pair's forward kind and `to` back to `from`
    /// with its inverse. Linking twice is a no-op.
    async fn link(&self, from: &NodeRef, to: &NodeRef, pair: EdgePair) -> Result<()>;

    async fn add_alias(
        &self,
        node: &NodeRef,
        language: Language,
        text: &str,
        exclusive: bool,
    ) -> Result<()>;

    /// Flush every pending mutation.
    async fn commit_pending(&self) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
