// src/sources/naver.rs
//! Naver news search. Korean domestic coverage; needs a client id and secret.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::config::NaverConfig;
use crate::error::{retry_after_from, SourceError};
use crate::model::{Query, RawArticle};
use crate::sources::{AdapterKind, FetchBackend};
use crate::text::{clean_html, truncate_chars, SNIPPET_MAX_CHARS};

const COUNTRY: &str = "South Korea";

#[derive(Debug, Deserialize)]
struct Resp {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    originallink: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
}

pub struct Naver {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    base_url: String,
    negative_keywords: Vec<String>,
}

impl Naver {
    pub fn new(client_id: &str, client_secret: &str, cfg: &NaverConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent("trend-news-collector/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            base_url: cfg.base_url.clone(),
            negative_keywords: cfg.negative_keywords.clone(),
        })
    }
}

fn lowercase_all(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Decode a search page. Items hitting a negative keyword in title or
/// description are filtered out, as are malformed ones.
pub fn parse_response(body: &str, negative_keywords: &[String]) -> Result<Vec<RawArticle>, SourceError> {
    let resp: Resp = serde_json::from_str(body)?;
    let negative = lowercase_all(negative_keywords);
    let mut out = Vec::with_capacity(resp.items.len());
    let mut filtered = 0usize;

    for value in resp.items {
        let Ok(item) = serde_json::from_value::<Item>(value) else {
            debug!("malformed naver item skipped");
            continue;
        };
        // Search hits come back wrapped in <b> tags.
        let title = clean_html(item.title.as_deref().unwrap_or_default());
        let description = clean_html(item.description.as_deref().unwrap_or_default());
        let url = item
            .originallink
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .or_else(|| item.link.as_deref().map(str::trim))
            .unwrap_or_default()
            .to_string();
        if title.is_empty() || url.is_empty() {
            continue;
        }

        let haystack = format!("{title} {description}").to_lowercase();
        if negative.iter().any(|kw| haystack.contains(kw.as_str())) {
            filtered += 1;
            continue;
        }

        out.push(RawArticle {
            source_id: AdapterKind::Naver.id().to_string(),
            title,
            url,
            published_at: item.pub_date.as_deref().and_then(|d| {
                DateTime::parse_from_rfc2822(d.trim())
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            }),
            snippet: truncate_chars(&description, SNIPPET_MAX_CHARS),
            provider_category: None,
            country: Some(COUNTRY.to_string()),
        });
    }
    if filtered > 0 {
        debug!(filtered, kept = out.len(), "naver items dropped by negative keywords");
    }
    Ok(out)
}

#[async_trait]
impl FetchBackend for Naver {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Naver
    }

    async fn fetch_once(
        &self,
        query: &Query,
        limit: usize,
    ) -> Result<Vec<RawArticle>, SourceError> {
        let display = limit.clamp(1, 100).to_string();
        let resp = self
            .http
            .get(&self.base_url)
            .header("X-Naver-Client-Id", &self.client_id)
            .header("X-Naver-Client-Secret", &self.client_secret)
            .query(&[
                ("query", query.text.as_str()),
                ("display", display.as_str()),
                ("sort", "date"),
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
        let items = parse_response(&body, &self.negative_keywords)?;
        debug!(query = %query.text, count = items.len(), "naver page parsed");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn negatives() -> Vec<String> {
        vec!["Promotion".to_string(), "콘서트".to_string()]
    }

    #[test]
    fn negative_keywords_filter_title_and_description() {
        let body = r#"{"items":[
            {"title":"<b>KT</b> network outage in Seoul","originallink":"https://news.example.kr/1",
             "link":"https://n.news.naver.com/1","description":"Mobile data down for hours",
             "pubDate":"Mon, 03 Mar 2025 09:00:00 +0900"},
            {"title":"Spring PROMOTION for gamers","link":"https://n.news.naver.com/2","description":"x"},
            {"title":"Weekend news","link":"https://n.news.naver.com/3","description":"아이돌 콘서트 열려"},
            {"title":"Typhoon damage in Busan","originallink":"","link":"https://n.news.naver.com/4"}
        ]}"#;
        let items = parse_response(body, &negatives()).unwrap();
        let urls: Vec<&str> = items.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://news.example.kr/1", "https://n.news.naver.com/4"]);

        let first = &items[0];
        assert_eq!(first.title, "KT network outage in Seoul");
        assert_eq!(first.source_id, "naver");
        assert_eq!(first.country.as_deref(), Some("South Korea"));
        assert_eq!(
            first.published_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn malformed_items_do_not_sink_the_page() {
        let body = r#"{"items":[{"title":7},{"title":"Power cut","link":"https://n/2"}]}"#;
        let items = parse_response(body, &[]).unwrap();
        assert_eq!(items.len(), 1);
        assert!(matches!(
            parse_response("not json", &[]),
            Err(SourceError::Parse(_))
        ));
    }
}
