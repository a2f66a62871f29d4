// src/sources/rss.rs
//! Google News RSS search. Keyless baseline source.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::debug;

use crate::config::RssConfig;
use crate::error::{retry_after_from, SourceError};
use crate::model::{Query, RawArticle};
use crate::sources::{AdapterKind, FetchBackend};
use crate::text::{clean_html, strip_publisher_suffix, truncate_chars, SNIPPET_MAX_CHARS};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<ItemSource>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "$text", default)]
    name: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

enum Mode {
    Http {
        client: reqwest::Client,
        base_url: String,
    },
    /// Serves the same XML for every query.
    Fixture(String),
}

pub struct GoogleNewsRss {
    mode: Mode,
    hl: String,
    gl: String,
    max_age: Option<chrono::Duration>,
}

impl GoogleNewsRss {
    pub fn http(cfg: &RssConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; trend-news-collector/0.1)")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            mode: Mode::Http {
                client,
                base_url: cfg.base_url.clone(),
            },
            hl: cfg.hl.clone(),
            gl: cfg.gl.clone(),
            max_age: max_age(cfg),
        })
    }

    pub fn from_fixture(xml: &str, cfg: &RssConfig) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
            hl: cfg.hl.clone(),
            gl: cfg.gl.clone(),
            max_age: max_age(cfg),
        }
    }

    /// `{base}?q=...&hl=..&gl=..&ceid=GL:HL`
    pub fn search_url(base_url: &str, query: &str, hl: &str, gl: &str) -> String {
        format!(
            "{base_url}?q={}&hl={hl}&gl={gl}&ceid={gl}:{hl}",
            urlencoding::encode(query)
        )
    }

    async fn load(&self, query: &Query) -> Result<String, SourceError> {
        match &self.mode {
            Mode::Fixture(xml) => Ok(xml.clone()),
            Mode::Http { client, base_url } => {
                let url = Self::search_url(base_url, &query.text, &self.hl, &self.gl);
                let resp = client.get(&url).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(SourceError::from_status(
                        status,
                        retry_after_from(resp.headers()),
                    ));
                }
                Ok(resp.text().await?)
            }
        }
    }
}

fn max_age(cfg: &RssConfig) -> Option<chrono::Duration> {
    cfg.max_age_hours
        .and_then(|h| i64::try_from(h).ok())
        .map(chrono::Duration::hours)
}

/// Parse one feed document. Items without a title or link are skipped;
/// a document that is not RSS at all is a parse error.
pub fn parse_feed(
    xml: &str,
    max_age: Option<chrono::Duration>,
    now: DateTime<Utc>,
) -> Result<Vec<RawArticle>, SourceError> {
    let rss: Rss = from_str(xml)?;
    let mut out = Vec::with_capacity(rss.channel.item.len());

    for it in rss.channel.item {
        let publisher = it
            .source
            .and_then(|s| s.name)
            .map(|s| clean_html(&s));
        let title = strip_publisher_suffix(
            &clean_html(it.title.as_deref().unwrap_or_default()),
            publisher.as_deref(),
        );
        let url = it.link.as_deref().unwrap_or_default().trim().to_string();
        if title.is_empty() || url.is_empty() {
            debug!("rss item without title or link skipped");
            continue;
        }

        let published_at = it.pub_date.as_deref().and_then(parse_rfc2822);
        if let (Some(limit), Some(ts)) = (max_age, published_at) {
            if now.signed_duration_since(ts) > limit {
                continue;
            }
        }

        let snippet = clean_html(it.description.as_deref().unwrap_or_default());
        let snippet = strip_publisher_suffix(&snippet, publisher.as_deref());
        out.push(RawArticle {
            source_id: AdapterKind::Rss.id().to_string(),
            title,
            url,
            published_at,
            snippet: truncate_chars(&snippet, SNIPPET_MAX_CHARS),
            provider_category: None,
            country: None,
        });
    }

    Ok(out)
}

#[async_trait]
impl FetchBackend for GoogleNewsRss {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Rss
    }

    async fn fetch_once(
        &self,
        query: &Query,
        limit: usize,
    ) -> Result<Vec<RawArticle>, SourceError> {
        let xml = self.load(query).await?;
        let items = parse_feed(&xml, self.max_age, Utc::now())?;
        debug!(query = %query.text, parsed = items.len(), limit, "google news feed parsed");
        Ok(items)
    }
}
