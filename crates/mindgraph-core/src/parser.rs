//! HTML fetching and text extraction for MIND article pages

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::error::EnrichmentFailure;

/// Date format of the `span.date` element, e.g. `11/9/2019`.
pub const PUBLICATION_DATE_FORMAT: &str = "%m/%d/%Y";

/// Page layout, as tagged in the MIND `doc_type.json` map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// `ar`: body paragraphs
    Article,
    /// `ss`: slideshow captions
    Gallery,
    /// `vi`: video description
    Video,
}

impl ContentKind {
    pub fn tag(self) -> &'static str {
        match self {
            ContentKind::Article => "ar",
            ContentKind::Gallery => "ss",
            ContentKind::Video => "vi",
        }
    }

    fn selector(self) -> &'static Selector {
        match self {
            ContentKind::Article => &PARAGRAPHS,
            ContentKind::Gallery => &GALLERY_CAPTIONS,
            ContentKind::Video => &VIDEO_DESCRIPTION,
        }
    }
}

impl FromStr for ContentKind {
    type Err = EnrichmentFailure;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "ar" => Ok(ContentKind::Article),
            "ss" => Ok(ContentKind::Gallery),
            "vi" => Ok(ContentKind::Video),
            other => Err(EnrichmentFailure::UnknownContentType(other.to_string())),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e}"))
}

static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| selector("p"));
static GALLERY_CAPTIONS: Lazy<Selector> = Lazy::new(|| selector("div.gallery-caption-text"));
static VIDEO_DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector("div.video-description"));
static DATE: Lazy<Selector> = Lazy::new(|| selector("span.date"));

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("invalid spaces regex"));

/// Build the shared HTTP client used for page and dataset downloads
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(format!(
            "Mozilla/5.0 (compatible; mindgraph/{})",
            env!("CARGO_PKG_VERSION")
        ))
        .timeout(timeout)
        .build()
}

/// Fetch HTML content from a URL
pub async fn fetch_html(client: &reqwest::Client, url: &str) -> Result<String, EnrichmentFailure> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(EnrichmentFailure::Status(response.status().as_u16()));
    }

    Ok(response.text().await?)
}

/// Concatenate the visible text of the region selected by `kind`
///
/// Text nodes are joined with a single space, runs of spaces are collapsed and
/// leading/trailing spaces and line breaks are trimmed. Returns an empty string
/// when the page has no such region.
pub fn extract_full_text(document: &Html, kind: ContentKind) -> String {
    let joined = document
        .select(kind.selector())
        .flat_map(|element| element.text())
        .collect::<Vec<_>>()
        .join(" ");

    let trimmed = joined.trim_matches([' ', '\r', '\n']);
    RE_SPACES.replace_all(trimmed, " ").into_owned()
}

/// Read the publication date from the first `span.date` element
pub fn extract_publication_date(document: &Html) -> Result<DateTime<Utc>, EnrichmentFailure> {
    let element = document
        .select(&DATE)
        .next()
        .ok_or(EnrichmentFailure::MissingDate)?;

    let raw = element.text().collect::<String>();
    let raw = raw.trim_matches([' ', '\r', '\n']);

    let date = NaiveDate::parse_from_str(raw, PUBLICATION_DATE_FORMAT)
        .map_err(|_| EnrichmentFailure::InvalidDate(raw.to_string()))?;

    date.and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| EnrichmentFailure::InvalidDate(raw.to_string()))
}
