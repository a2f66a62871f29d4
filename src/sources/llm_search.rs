// src/sources/llm_search.rs
//! LLM prompted for a JSON list of recent news matching a query.
//! Items carry the provider's own category, so they enter the pool
//! already classified by one source.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::classify::CATEGORY_VOCABULARY;
use crate::error::SourceError;
use crate::llm::{extract_json_array, ChatClient};
use crate::model::{Query, RawArticle};
use crate::sources::{AdapterKind, FetchBackend};
use crate::text::{clean_html, truncate_chars, SNIPPET_MAX_CHARS};

const SYSTEM: &str = "You are a news analyst. Return only a valid JSON array.";

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

pub struct LlmSearch {
    client: ChatClient,
}

impl LlmSearch {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

pub fn search_prompt(query: &Query, limit: usize) -> String {
    let country = query
        .country
        .as_deref()
        .map(|c| format!(" Focus on news related to {c}."))
        .unwrap_or_default();
    format!(
        "Find up to {limit} news articles published in the last 24 hours about: {q}.{country}\n\
         Respond with a JSON array of objects with the fields \
         \"title\", \"summary\" (2-3 sentences), \"url\", \"source\", \
         \"date\" (YYYY-MM-DD), \"country\" (or null) and \"category\" \
         (exactly one of: {cats}).\n\
         Only include articles with a real, working URL. Return [] if you know none.",
        q = query.text,
        cats = CATEGORY_VOCABULARY.join(", "),
    )
}

/// Decode the model reply. Items without title, or with a non-http url, are skipped.
pub fn parse_search_reply(reply: &str, source_id: &str) -> Result<Vec<RawArticle>, SourceError> {
    let json = extract_json_array(reply)
        .ok_or_else(|| SourceError::Parse("no JSON array in reply".into()))?;
    let items: Vec<serde_json::Value> = serde_json::from_str(json)?;

    let mut out = Vec::with_capacity(items.len());
    for value in items {
        // One malformed element must not sink its siblings.
        let Ok(item) = serde_json::from_value::<Item>(value) else {
            debug!(source = source_id, "malformed search item skipped");
            continue;
        };
        let title = clean_html(item.title.as_deref().unwrap_or_default());
        let url = item.url.as_deref().unwrap_or_default().trim().to_string();
        if title.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
            continue;
        }
        let published_at = item
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|ndt| ndt.and_utc());
        out.push(RawArticle {
            source_id: source_id.to_string(),
            title,
            url,
            published_at,
            snippet: truncate_chars(
                &clean_html(item.summary.as_deref().unwrap_or_default()),
                SNIPPET_MAX_CHARS,
            ),
            provider_category: item
                .category
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            country: item
                .country
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("null")),
        });
    }
    Ok(out)
}

#[async_trait]
impl FetchBackend for LlmSearch {
    fn kind(&self) -> AdapterKind {
        AdapterKind::LlmSearch(self.client.kind())
    }

    async fn fetch_once(
        &self,
        query: &Query,
        limit: usize,
    ) -> Result<Vec<RawArticle>, SourceError> {
        let reply = self
            .client
            .complete(SYSTEM, &search_prompt(query, limit), 2_000)
            .await?;
        parse_search_reply(&reply, self.kind().id())
    }
}
