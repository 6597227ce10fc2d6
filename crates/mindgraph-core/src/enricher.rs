//! Resolves page content for article records
//!
//! Each article's page is looked up in the [`HtmlCache`] by content id and
//! fetched over HTTP on a miss. The content-type tag from the [`TypeMap`]
//! decides which region of the page becomes the article's full text. Any
//! failure along the way yields [`EnrichmentOutcome::Failed`] instead of an
//! error.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use scraper::Html;
use tracing::debug;

use crate::cache::HtmlCache;
use crate::config::IngestConfig;
use crate::error::{EnrichmentFailure, Result};
use crate::parser::{self, ContentKind};
use crate::types::{ArticleRecord, EnrichedContent, EnrichmentOutcome};
use crate::url_utils::content_id_from_url;

/// Content id to content-type tag, loaded once per run from `doc_type.json`
#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    tags: HashMap<String, String>,
}

impl TypeMap {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        Ok(Self {
            tags: serde_json::from_str(json)?,
        })
    }

    pub fn kind_of(&self, content_id: &str) -> std::result::Result<ContentKind, EnrichmentFailure> {
        self.tags
            .get(content_id)
            .ok_or_else(|| EnrichmentFailure::UnknownContentId(content_id.to_string()))?
            .parse()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TypeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            tags: iter
                .into_iter()
                .map(|(id, tag)| (id.into(), tag.into()))
                .collect(),
        }
    }
}

pub struct ContentEnricher {
    client: reqwest::Client,
    cache: HtmlCache,
    type_map: Arc<TypeMap>,
}

impl ContentEnricher {
    pub fn new(config: &IngestConfig, type_map: Arc<TypeMap>) -> Result<Self> {
        let client = parser::build_client(config.fetch_timeout)?;
        Ok(Self::with_client(client, HtmlCache::new(config.cache_dir.clone()), type_map))
    }

    pub fn with_client(client: reqwest::Client, cache: HtmlCache, type_map: Arc<TypeMap>) -> Self {
        Self {
            client,
            cache,
            type_map,
        }
    }

    pub async fn enrich(&self, article: &ArticleRecord) -> EnrichmentOutcome {
        match self.try_enrich(article).await {
            Ok(content) => EnrichmentOutcome::Enriched(content),
            Err(failure) => EnrichmentOutcome::Failed(failure),
        }
    }

    async fn try_enrich(
        &self,
        article: &ArticleRecord,
    ) -> std::result::Result<EnrichedContent, EnrichmentFailure> {
        let content_id = content_id_from_url(&article.url)
            .ok_or_else(|| EnrichmentFailure::NoContentId(article.url.clone()))?;

        let html = self.load_page(&article.url, &content_id).await?;
        let kind = self.type_map.kind_of(&content_id)?;
        let (full_text, published) = extract(&html, kind)?;

        Ok(EnrichedContent {
            html: Some(html),
            full_text: Some(full_text),
            published: Some(published),
        })
    }

    async fn load_page(
        &self,
        url: &str,
        content_id: &str,
    ) -> std::result::Result<String, EnrichmentFailure> {
        if let Some(html) = self.cache.get(content_id).await? {
            debug!(content_id, "Page served from cache");
            return Ok(html);
        }

        debug!(content_id, url, "Fetching page");
        let html = parser::fetch_html(&self.client, url).await?;
        self.cache.put(content_id, &html).await?;
        Ok(html)
    }
}

// The parsed document is not Send, so it never lives across an await.
fn extract(
    html: &str,
    kind: ContentKind,
) -> std::result::Result<(String, DateTime<Utc>), EnrichmentFailure> {
    let document = Html::parse_document(html);
    let full_text = parser::extract_full_text(&document, kind);
    let published = parser::extract_publication_date(&document)?;
    Ok((full_text, published))
}
