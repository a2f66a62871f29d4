// src/sources/deepsearch.rs
//! DeepSearch global-articles search (keyed AI news search).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::config::DeepSearchConfig;
use crate::error::{retry_after_from, SourceError};
use crate::model::{Query, RawArticle};
use crate::sources::{AdapterKind, FetchBackend};
use crate::text::{clean_html, truncate_chars, SNIPPET_MAX_CHARS};

#[derive(Debug, Deserialize)]
struct Resp {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

pub struct DeepSearch {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    days: u32,
}

impl DeepSearch {
    pub fn new(api_key: &str, cfg: &DeepSearchConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent("trend-news-collector/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: cfg.base_url.clone(),
            days: cfg.days.max(1),
        })
    }
}

/// RFC 3339, naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC), or a bare date.
pub fn parse_published(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(ndt.and_utc());
    }
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// Decode a response body. Articles missing a title or url, or of the
/// wrong shape, are dropped without affecting the rest of the page.
pub fn parse_response(body: &str) -> Result<Vec<RawArticle>, SourceError> {
    let resp: Resp = serde_json::from_str(body)?;
    let mut out = Vec::with_capacity(resp.data.len());
    for value in resp.data {
        let Ok(a) = serde_json::from_value::<Article>(value) else {
            debug!("malformed deepsearch article skipped");
            continue;
        };
        let title = clean_html(a.title.as_deref().unwrap_or_default());
        let url = a.url.as_deref().unwrap_or_default().trim().to_string();
        if title.is_empty() || url.is_empty() {
            continue;
        }
        let snippet = clean_html(a.summary.as_deref().unwrap_or_default());
        out.push(RawArticle {
            source_id: AdapterKind::DeepSearch.id().to_string(),
            title,
            url,
            published_at: a.published_at.as_deref().and_then(parse_published),
            snippet: truncate_chars(&snippet, SNIPPET_MAX_CHARS),
            provider_category: None,
            country: None,
        });
    }
    Ok(out)
}

#[async_trait]
impl FetchBackend for DeepSearch {
    fn kind(&self) -> AdapterKind {
        AdapterKind::DeepSearch
    }

    async fn fetch_once(
        &self,
        query: &Query,
        limit: usize,
    ) -> Result<Vec<RawArticle>, SourceError> {
        let today = Utc::now().date_naive();
        let from = today - chrono::Duration::days(i64::from(self.days));
        let page_size = limit.clamp(1, 100).to_string();
        let date_from = from.format("%Y-%m-%d").to_string();
        let date_to = today.format("%Y-%m-%d").to_string();

        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("keyword", query.text.as_str()),
                ("date_from", date_from.as_str()),
                ("date_to", date_to.as_str()),
                ("page_size", page_size.as_str()),
                ("page", "1"),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::from_status(
                status,
                retry_after_from(resp.headers()),
            ));
        }
        let body = resp.text().await?;
        let items = parse_response(&body)?;
        debug!(query = %query.text, count = items.len(), "deepsearch page parsed");
        Ok(items)
    }
}
