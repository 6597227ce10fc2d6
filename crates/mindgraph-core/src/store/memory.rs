//! In-process graph store
//!
//! Keeps a pending buffer and a committed graph. Used by tests and dry runs.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::GraphStore;
use crate::error::{IngestError, Result};
use crate::model::{EdgeKind, EdgePair, Language, Node, NodeKind, NodeRef, PropertyValue};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    pub from: NodeRef,
    pub to: NodeRef,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Alias {
    pub node: NodeRef,
    pub language: Language,
    pub text: String,
}

#[derive(Debug)]
enum Mutation {
    Upsert(Node),
    Link {
        from: NodeRef,
        to: NodeRef,
        pair: EdgePair,
    },
    Alias {
        alias: Alias,
        exclusive: bool,
    },
}

/// Committed graph contents
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    nodes: BTreeMap<NodeRef, BTreeMap<&'static str, PropertyValue>>,
    edges: BTreeSet<Edge>,
    aliases: BTreeSet<Alias>,
}

impl Snapshot {
    pub fn node(&self, node: &NodeRef) -> Option<&BTreeMap<&'static str, PropertyValue>> {
        self.nodes.get(node)
    }

    pub fn property(&self, node: &NodeRef, name: &str) -> Option<&PropertyValue> {
        self.nodes.get(node).and_then(|properties| properties.get(name))
    }

    pub fn node_count(&self, kind: NodeKind) -> usize {
        self.nodes.keys().filter(|n| n.kind == kind).count()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn has_edge(&self, from: &NodeRef, to: &NodeRef, kind: EdgeKind) -> bool {
        self.edges.contains(&Edge {
            from: from.clone(),
            to: to.clone(),
            kind,
        })
    }

    pub fn edges_between(&self, from: &NodeRef, to: &NodeRef) -> Vec<EdgeKind> {
        self.edges
            .iter()
            .filter(|e| &e.from == from && &e.to == to)
            .map(|e| e.kind)
            .collect()
    }

    pub fn aliases_of(&self, node: &NodeRef) -> Vec<&str> {
        self.aliases
            .iter()
            .filter(|a| &a.node == node)
            .map(|a| a.text.as_str())
            .collect()
    }

    fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Upsert(node) => {
                let properties = self.nodes.entry(node.node_ref()).or_default();
                for (name, value) in node.properties() {
                    properties.insert(name, value);
                }
            }
            Mutation::Link { from, to, pair } => {
                self.edges.insert(Edge {
                    from: from.clone(),
                    to: to.clone(),
                    kind: pair.forward(),
                });
                self.edges.insert(Edge {
                    from: to,
                    to: from,
                    kind: pair.inverse(),
                });
            }
            Mutation::Alias { alias, exclusive } => {
                if exclusive {
                    self.aliases.retain(|existing| {
                        existing.node == alias.node
                            || existing.language != alias.language
                            || existing.text != alias.text
                    });
                }
                self.aliases.insert(alias);
            }
        }
    }
}

#[derive(Debug, Default)]
struct Schema {
    nodes: HashSet<NodeKind>,
    edges: HashSet<EdgePair>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    schema: Mutex<Schema>,
    pending: Mutex<Vec<Mutation>>,
    committed: Mutex<Snapshot>,
    commits: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed graph; pending mutations are not included.
    pub fn snapshot(&self) -> Snapshot {
        lock(&self.committed).clone()
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn check_node(&self, kind: NodeKind) -> Result<()> {
        if lock(&self.schema).nodes.contains(&kind) {
            Ok(())
        } else {
            Err(IngestError::Store(format!("node type {kind} is not registered")))
        }
    }

    fn push(&self, mutation: Mutation) {
        lock(&self.pending).push(mutation);
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn register_node_schema(&self, kind: NodeKind) -> Result<()> {
        lock(&self.schema).nodes.insert(kind);
        Ok(())
    }

    async fn register_edge_schema(&self, pairs: &[EdgePair]) -> Result<()> {
        lock(&self.schema).edges.extend(pairs.iter().copied());
        Ok(())
    }

    async fn upsert(&self, node: Node) -> Result<NodeRef> {
        self.check_node(node.kind())?;
        let node_ref = node.node_ref();
        self.push(Mutation::Upsert(node));
        Ok(node_ref)
    }

    async fn link(&self, from: &NodeRef, to: &NodeRef, pair: EdgePair) -> Result<()> {
        self.check_node(from.kind)?;
        self.check_node(to.kind)?;
        if !lock(&self.schema).edges.contains(&pair) {
            return Err(IngestError::Store(format!(
                "edge pair {}/{} is not registered",
                pair.forward(),
                pair.inverse()
            )));
        }

        self.push(Mutation::Link {
            from: from.clone(),
            to: to.clone(),
            pair,
        });
        Ok(())
    }

    async fn add_alias(
        &self,
        node: &NodeRef,
        language: Language,
        text: &str,
        exclusive: bool,
    ) -> Result<()> {
        self.check_node(node.kind)?;
        self.push(Mutation::Alias {
            alias: Alias {
                node: node.clone(),
                language,
                text: text.to_string(),
            },
            exclusive,
        });
        Ok(())
    }

    async fn commit_pending(&self) -> Result<()> {
        let pending = std::mem::take(&mut *lock(&self.pending));
        let mut committed = lock(&self.committed);
        for mutation in pending {
            committed.apply(mutation);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
