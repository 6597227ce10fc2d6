//! Record types produced by the reader and the enricher

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EnrichmentFailure;

/// A named entity linked to Wikidata, as found in the `news.tsv` entity columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntityMention {
    pub label: String,
    #[serde(rename = "Type")]
    pub kind: String,
    pub wikidata_id: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub occurrence_offsets: Vec<i64>,
    #[serde(default)]
    pub surface_forms: Vec<String>,
}

/// One row of `news.tsv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub category: String,
    pub subcategory: String,
    pub title: String,
    pub abstract_text: String,
    pub url: String,
    pub title_entities: Vec<EntityMention>,
    pub abstract_entities: Vec<EntityMention>,
}

impl ArticleRecord {
    /// Title entities followed by abstract entities.
    pub fn entities(&self) -> impl Iterator<Item = &EntityMention> {
        self.title_entities.iter().chain(self.abstract_entities.iter())
    }
}

/// Click label attached to one candidate of an impression list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpressionLabel {
    Clicked,
    Skipped,
}

/// An `<article id>-<label>` token from the impressions column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpressionToken {
    pub article_id: String,
    pub label: ImpressionLabel,
}

impl ImpressionToken {
    /// Split at the last hyphen. Article ids may themselves contain hyphens.
    pub fn parse(token: &str) -> Result<Self, String> {
        let (id, label) = token
            .rsplit_once('-')
            .ok_or_else(|| format!("missing label suffix in `{token}`"))?;

        if id.is_empty() {
            return Err(format!("missing article id in `{token}`"));
        }

        let label = match label {
            "1" => ImpressionLabel::Clicked,
            "0" => ImpressionLabel::Skipped,
            other => return Err(format!("label must be 0 or 1, got `{other}`")),
        };

        Ok(Self {
            article_id: id.to_string(),
            label,
        })
    }
}

/// One row of `behaviors.tsv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpressionRecord {
    pub id: String,
    pub user_id: String,
    pub time: NaiveDateTime,
    pub history: Vec<String>,
    pub impressions: Vec<ImpressionToken>,
}

/// Resolved page content for one article
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichedContent {
    pub html: Option<String>,
    pub full_text: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl EnrichedContent {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Result of enriching one article. A failure is a normal outcome, not an error.
#[derive(Debug)]
pub enum EnrichmentOutcome {
    Enriched(EnrichedContent),
    Failed(EnrichmentFailure),
}

impl EnrichmentOutcome {
    pub fn is_enriched(&self) -> bool {
        matches!(self, EnrichmentOutcome::Enriched(_))
    }

    /// The content to store; empty on failure.
    pub fn into_content(self) -> EnrichedContent {
        match self {
            EnrichmentOutcome::Enriched(content) => content,
            EnrichmentOutcome::Failed(_) => EnrichedContent::empty(),
        }
    }
}
