//! Neo4j-backed graph store
//!
//! Every mutation becomes a `MERGE` query held in a pending buffer. A commit
//! runs the buffer in one transaction. Link endpoints are merged by key, so an
//! edge to a node that has not been upserted yet creates a key-only node that
//! the later upsert fills in.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use neo4rs::{BoltNull, BoltType, ConfigBuilder, Graph, Query, query};
use tracing::{debug, info};

use super::GraphStore;
use crate::error::{IngestError, Result};
use crate::model::{EdgePair, Language, Node, NodeKind, NodeRef, PropertyValue};

#[derive(Debug, Clone)]
pub struct Neo4jSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
}

pub struct Neo4jStore {
    graph: Graph,
    pending: Mutex<Vec<Query>>,
}

impl Neo4jStore {
    pub async fn connect(settings: &Neo4jSettings) -> Result<Self> {
        let mut builder = ConfigBuilder::default()
            .uri(settings.uri.as_str())
            .user(settings.user.as_str())
            .password(settings.password.as_str())
            .fetch_size(500)
            .max_connections(10);
        if let Some(database) = &settings.database {
            builder = builder.db(database.as_str());
        }

        let graph = Graph::connect(builder.build()?).await?;
        info!(uri = %settings.uri, "Connected to graph store");

        Ok(Self {
            graph,
            pending: Mutex::new(Vec::new()),
        })
    }

    fn pending(&self) -> MutexGuard<'_, Vec<Query>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn bolt(value: PropertyValue) -> BoltType {
    match value {
        PropertyValue::Null => BoltType::Null(BoltNull),
        PropertyValue::Text(text) => BoltType::from(text),
        PropertyValue::Timestamp(ts) => BoltType::from(ts.to_rfc3339()),
    }
}

fn upsert_query(node: &Node) -> Query {
    let properties = node.properties();

    let assignments = properties
        .iter()
        .map(|(name, value)| match value {
            PropertyValue::Timestamp(_) => format!("n.{name} = datetime(${name})"),
            _ => format!("n.{name} = ${name}"),
        })
        .collect::<Vec<_>>();

    let mut cypher = format!("MERGE (n:{} {{key: $key}})", node.kind().label());
    if !assignments.is_empty() {
        cypher.push_str(" SET ");
        cypher.push_str(&assignments.join(", "));
    }

    properties.into_iter().fold(
        query(&cypher).param("key", node.key()),
        |q, (name, value)| q.param(name, bolt(value)),
    )
}

fn link_query(from: &NodeRef, to: &NodeRef, pair: EdgePair) -> Query {
    let cypher = format!(
        "MERGE (a:{from_label} {{key: $from}}) \
         MERGE (b:{to_label} {{key: $to}}) \
         MERGE (a)-[:{forward}]->(b) \
         MERGE (b)-[:{inverse}]->(a)",
        from_label = from.kind.label(),
        to_label = to.kind.label(),
        forward = pair.forward().name(),
        inverse = pair.inverse().name(),
    );

    query(&cypher)
        .param("from", from.key.as_str())
        .param("to", to.key.as_str())
}

fn alias_query(node: &NodeRef, language: Language, text: &str, exclusive: bool) -> Query {
    let label = node.kind.label();
    let cypher = if exclusive {
        format!(
            "MERGE (a:Alias {{language: $language, text: $text}}) \
             WITH a \
             OPTIONAL MATCH (a)-[r:AliasOf]->(other) \
             WHERE NOT (other:{label} AND other.key = $key) \
             DELETE r \
             WITH DISTINCT a \
             MERGE (n:{label} {{key: $key}}) \
             MERGE (a)-[:AliasOf]->(n)"
        )
    } else {
        format!(
            "MERGE (a:Alias {{language: $language, text: $text}}) \
             MERGE (n:{label} {{key: $key}}) \
             MERGE (a)-[:AliasOf]->(n)"
        )
    };

    query(&cypher)
        .param("key", node.key.as_str())
        .param("language", language.tag())
        .param("text", text)
}

fn ensure_flushed(pending: &[Query]) -> Result<()> {
    if pending.is_empty() {
        Ok(())
    } else {
        Err(IngestError::Store(format!(
            "closing graph store with {} uncommitted mutations",
            pending.len()
        )))
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn register_node_schema(&self, kind: NodeKind) -> Result<()> {
        let label = kind.label();
        let cypher = format!(
            "CREATE CONSTRAINT {}_key IF NOT EXISTS FOR (n:{label}) REQUIRE n.key IS UNIQUE",
            label.to_lowercase()
        );
        self.graph.run(query(&cypher)).await?;
        debug!(label, "Node schema registered");
        Ok(())
    }

    async fn register_edge_schema(&self, pairs: &[EdgePair]) -> Result<()> {
        // Relationship types need no declaration in Neo4j.
        for pair in pairs {
            debug!(forward = %pair.forward(), inverse = %pair.inverse(), "Edge schema registered");
        }
        Ok(())
    }

    async fn upsert(&self, node: Node) -> Result<NodeRef> {
        let q = upsert_query(&node);
        self.pending().push(q);
        Ok(node.node_ref())
    }

    async fn link(&self, from: &NodeRef, to: &NodeRef, pair: EdgePair) -> Result<()> {
        let q = link_query(from, to, pair);
        self.pending().push(q);
        Ok(())
    }

    async fn add_alias(
        &self,
        node: &NodeRef,
        language: Language,
        text: &str,
        exclusive: bool,
    ) -> Result<()> {
        let q = alias_query(node, language, text, exclusive);
        self.pending().push(q);
        Ok(())
    }

    async fn commit_pending(&self) -> Result<()> {
        let queries = std::mem::take(&mut *self.pending());
        if queries.is_empty() {
            return Ok(());
        }

        let count = queries.len();
        let mut txn = self.graph.start_txn().await?;
        txn.run_queries(queries).await?;
        txn.commit().await?;

        debug!(queries = count, "Committed pending mutations");
        Ok(())
    }

    /// Fails if mutations are still pending. The connection pool itself is
    /// released when the last handle to the store is dropped.
    async fn close(&self) -> Result<()> {
        ensure_flushed(&self.pending())?;
        info!("Graph store closed with no pending mutations");
        Ok(())
    }
}
