//! Maps records onto graph mutations

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::NegativeImpressionPolicy;
use crate::error::Result;
use crate::model::{
    Article, Category, EdgePair, Entity, Language, Node, NodeKind, NodeRef, Subcategory, User,
};
use crate::store::GraphStore;
use crate::types::{ArticleRecord, EnrichmentOutcome, ImpressionLabel, ImpressionRecord};

/// Timestamp stored on articles whose publication date could not be extracted.
pub const EPOCH_SENTINEL: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// Counters accumulated while building
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub articles: u64,
    pub enriched: u64,
    pub degraded: u64,
    pub users: u64,
    pub links: u64,
    pub aliases: u64,
}

#[derive(Debug, Default)]
struct Counters {
    articles: AtomicU64,
    enriched: AtomicU64,
    degraded: AtomicU64,
    users: AtomicU64,
    links: AtomicU64,
    aliases: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Turns records into upserts, links and aliases on a [`GraphStore`].
///
/// Safe to share between concurrent ingestion units.
pub struct GraphBuilder {
    store: Arc<dyn GraphStore>,
    negative_impressions: NegativeImpressionPolicy,
    track_categories: bool,
    counters: Counters,
}

impl GraphBuilder {
    pub fn new(
        store: Arc<dyn GraphStore>,
        negative_impressions: NegativeImpressionPolicy,
        track_categories: bool,
    ) -> Self {
        Self {
            store,
            negative_impressions,
            track_categories,
            counters: Counters::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Register every node type and edge pair the builder writes.
    pub async fn register_schema(&self) -> Result<()> {
        for kind in NodeKind::ALL {
            self.store.register_node_schema(kind).await?;
        }
        self.store.register_edge_schema(&EdgePair::ALL).await
    }

    pub async fn ingest_article(
        &self,
        record: &ArticleRecord,
        outcome: EnrichmentOutcome,
    ) -> Result<NodeRef> {
        match &outcome {
            EnrichmentOutcome::Enriched(_) => Counters::bump(&self.counters.enriched, 1),
            EnrichmentOutcome::Failed(failure) => {
                warn!(article_id = %record.id, url = %record.url, error = %failure, "Enrichment failed, storing empty content");
                Counters::bump(&self.counters.degraded, 1);
            }
        }
        let content = outcome.into_content();

        let article = self
            .store
            .upsert(Node::from(Article {
                id: record.id.clone(),
                title: record.title.clone(),
                abstract_text: record.abstract_text.clone(),
                url: record.url.clone(),
                html: content.html,
                full_text: content.full_text,
                timestamp: content.published.unwrap_or(EPOCH_SENTINEL),
            }))
            .await?;
        Counters::bump(&self.counters.articles, 1);

        if self.track_categories {
            self.link_categories(&article, record).await?;
        }

        for mention in record.entities() {
            let entity = self
                .store
                .upsert(Node::from(Entity {
                    wikidata_id: mention.wikidata_id.clone(),
                    label: mention.label.clone(),
                    wikidata_type: mention.kind.clone(),
                }))
                .await?;
            self.link(&article, &entity, EdgePair::Mention).await?;

            for surface_form in &mention.surface_forms {
                self.store
                    .add_alias(&entity, Language::English, surface_form, false)
                    .await?;
                Counters::bump(&self.counters.aliases, 1);
            }
        }

        debug!(article_id = %record.id, "Article ingested");
        Ok(article)
    }

    async fn link_categories(&self, article: &NodeRef, record: &ArticleRecord) -> Result<()> {
        let category = self
            .store
            .upsert(Node::from(Category {
                name: record.category.clone(),
            }))
            .await?;
        let subcategory = self
            .store
            .upsert(Node::from(Subcategory {
                name: record.subcategory.clone(),
            }))
            .await?;

        self.link(article, &category, EdgePair::Category).await?;
        self.link(article, &subcategory, EdgePair::Subcategory).await?;
        self.link(&category, &subcategory, EdgePair::Subcategory).await
    }

    /// Link the user to every history and impression article. Articles are
    /// referenced by key only.
    pub async fn ingest_impression(&self, record: &ImpressionRecord) -> Result<NodeRef> {
        let user = self
            .store
            .upsert(Node::from(User {
                id: record.user_id.clone(),
            }))
            .await?;
        Counters::bump(&self.counters.users, 1);

        for article_id in &record.history {
            let article = NodeRef::key(NodeKind::Article, article_id.as_str());
            self.link(&user, &article, EdgePair::Viewed).await?;
        }

        for token in &record.impressions {
            let article = NodeRef::key(NodeKind::Article, token.article_id.as_str());
            let pair = match (token.label, self.negative_impressions) {
                (ImpressionLabel::Clicked, _) => EdgePair::Viewed,
                (ImpressionLabel::Skipped, NegativeImpressionPolicy::FoldIntoViewed) => {
                    EdgePair::Viewed
                }
                (ImpressionLabel::Skipped, NegativeImpressionPolicy::RecordIgnored) => {
                    EdgePair::Ignored
                }
            };
            self.link(&user, &article, pair).await?;
        }

        Ok(user)
    }

    async fn link(&self, from: &NodeRef, to: &NodeRef, pair: EdgePair) -> Result<()> {
        self.store.link(from, to, pair).await?;
        Counters::bump(&self.counters.links, 1);
        Ok(())
    }

    pub fn stats(&self) -> BuildStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        BuildStats {
            articles: load(&self.counters.articles),
            enriched: load(&self.counters.enriched),
            degraded: load(&self.counters.degraded),
            users: load(&self.counters.users),
            links: load(&self.counters.links),
            aliases: load(&self.counters.aliases),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnrichmentFailure;
    use crate::model::{EdgeKind, PropertyValue};
    use crate::store::MemoryStore;
    use crate::types::{EnrichedContent, EntityMention, ImpressionToken};
    use chrono::NaiveDate;

    fn record() -> ArticleRecord {
        ArticleRecord {
            id: "N1".into(),
            category: "news".into(),
            subcategory: "politics".into(),
            title: "Title".into(),
            abstract_text: "Abstract".into(),
            url: "https://x.test/AA1.html".into(),
            title_entities: vec![EntityMention {
                label: "Foo".into(),
                kind: "P".into(),
                wikidata_id: "Q1".into(),
                confidence: 1.0,
                occurrence_offsets: vec![0],
                surface_forms: vec!["Foo".into(), "F.".into()],
            }],
            abstract_entities: vec![],
        }
    }

    fn impression(tokens: &[&str]) -> ImpressionRecord {
        ImpressionRecord {
            id: "1".into(),
            user_id: "U1".into(),
            time: NaiveDate::from_ymd_opt(2019, 11, 11)
                .unwrap()
                .and_hms_opt(9, 5, 58)
                .unwrap(),
            history: vec!["N1".into()],
            impressions: tokens.iter().map(|t| ImpressionToken::parse(t).unwrap()).collect(),
        }
    }

    async fn setup(
        policy: NegativeImpressionPolicy,
        track_categories: bool,
    ) -> (Arc<MemoryStore>, GraphBuilder) {
        let store = Arc::new(MemoryStore::new());
        let builder = GraphBuilder::new(store.clone(), policy, track_categories);
        builder.register_schema().await.unwrap();
        (store, builder)
    }

    #[tokio::test]
    async fn test_article_with_categories_and_entities() {
        let (store, builder) = setup(NegativeImpressionPolicy::default(), true).await;

        let published = NaiveDate::from_ymd_opt(2019, 10, 24)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let content = EnrichedContent {
            html: Some("<p>Body</p>".into()),
            full_text: Some("Body".into()),
            published: Some(published),
        };
        let article = builder
            .ingest_article(&record(), EnrichmentOutcome::Enriched(content))
            .await
            .unwrap();
        store.commit_pending().await.unwrap();

        let graph = store.snapshot();
        let news = NodeRef::key(NodeKind::Category, "news");
        let politics = NodeRef::key(NodeKind::Subcategory, "politics");
        let q1 = NodeRef::key(NodeKind::Entity, "Q1");

        assert_eq!(
            graph.property(&article, "timestamp"),
            Some(&PropertyValue::Timestamp(published))
        );
        assert!(graph.has_edge(&article, &news, EdgeKind::HasCategory));
        assert!(graph.has_edge(&news, &article, EdgeKind::CategoryOf));
        assert!(graph.has_edge(&article, &politics, EdgeKind::HasSubcategory));
        assert!(graph.has_edge(&news, &politics, EdgeKind::HasSubcategory));
        assert!(graph.has_edge(&politics, &news, EdgeKind::SubcategoryOf));
        assert!(graph.has_edge(&article, &q1, EdgeKind::Mentions));
        assert!(graph.has_edge(&q1, &article, EdgeKind::AppearsIn));
        assert_eq!(graph.aliases_of(&q1), vec!["F.", "Foo"]);

        let stats = builder.stats();
        assert_eq!(stats.articles, 1);
        assert_eq!(stats.enriched, 1);
        assert_eq!(stats.aliases, 2);
    }

    #[tokio::test]
    async fn test_failed_enrichment_stores_empty_content() {
        let (store, builder) = setup(NegativeImpressionPolicy::default(), true).await;
        let outcome = EnrichmentOutcome::Failed(EnrichmentFailure::MissingDate);

        let article = builder.ingest_article(&record(), outcome).await.unwrap();
        store.commit_pending().await.unwrap();

        let graph = store.snapshot();
        assert_eq!(graph.property(&article, "html"), Some(&PropertyValue::Null));
        assert_eq!(graph.property(&article, "full_text"), Some(&PropertyValue::Null));
        assert_eq!(
            graph.property(&article, "timestamp"),
            Some(&PropertyValue::Timestamp(EPOCH_SENTINEL))
        );
        assert_eq!(builder.stats().degraded, 1);
    }

    #[tokio::test]
    async fn test_categories_can_be_skipped() {
        let (store, builder) = setup(NegativeImpressionPolicy::default(), false).await;
        let outcome = EnrichmentOutcome::Enriched(EnrichedContent::empty());
        builder.ingest_article(&record(), outcome).await.unwrap();
        store.commit_pending().await.unwrap();

        let graph = store.snapshot();
        assert_eq!(graph.node_count(NodeKind::Category), 0);
        assert_eq!(graph.node_count(NodeKind::Subcategory), 0);
        assert_eq!(graph.node_count(NodeKind::Entity), 1);
    }

    #[tokio::test]
    async fn test_negative_impressions_follow_policy() {
        let user = NodeRef::key(NodeKind::User, "U1");
        let n2 = NodeRef::key(NodeKind::Article, "N2");

        let (store, builder) = setup(NegativeImpressionPolicy::RecordIgnored, true).await;
        builder.ingest_impression(&impression(&["N1-1", "N2-0"])).await.unwrap();
        store.commit_pending().await.unwrap();
        let graph = store.snapshot();
        assert_eq!(graph.edges_between(&user, &n2), vec![EdgeKind::Ignored]);
        assert_eq!(graph.edges_between(&n2, &user), vec![EdgeKind::IgnoredBy]);

        let (store, builder) = setup(NegativeImpressionPolicy::FoldIntoViewed, true).await;
        builder.ingest_impression(&impression(&["N1-1", "N2-0"])).await.unwrap();
        store.commit_pending().await.unwrap();
        let graph = store.snapshot();
        assert_eq!(graph.edges_between(&user, &n2), vec![EdgeKind::Viewed]);
    }

    #[tokio::test]
    async fn test_history_and_positive_impression_share_one_edge() {
        let (store, builder) = setup(NegativeImpressionPolicy::default(), true).await;
        builder.ingest_impression(&impression(&["N1-1"])).await.unwrap();
        store.commit_pending().await.unwrap();

        let graph = store.snapshot();
        let user = NodeRef::key(NodeKind::User, "U1");
        let n1 = NodeRef::key(NodeKind::Article, "N1");
        assert_eq!(graph.edges_between(&user, &n1), vec![EdgeKind::Viewed]);
        assert_eq!(graph.edges_between(&n1, &user), vec![EdgeKind::ViewedBy]);
        assert_eq!(graph.node_count(NodeKind::User), 1);
    }
}
