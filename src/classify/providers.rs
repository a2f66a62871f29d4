// src/classify/providers.rs
//! LLM classifiers: one prompt per article, category parsed from the JSON reply.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::classify::{Classification, Classifier, CATEGORY_VOCABULARY};
use crate::error::SourceError;
use crate::llm::{extract_json_object, ChatClient};
use crate::model::RawArticle;
use crate::retry::{RateLimiter, RetryPolicy};
use crate::text::{clean_html, truncate_chars, SUMMARY_MAX_CHARS};

const SYSTEM: &str = "You are a news analyst. Return only valid JSON.";

/// OpenAI / Claude / Groq classifier. Retries and spacing are per instance.
pub struct LlmClassifier {
    client: ChatClient,
    retry: RetryPolicy,
    limiter: RateLimiter,
}

impl LlmClassifier {
    pub fn new(client: ChatClient, retry: RetryPolicy, min_interval: Duration) -> Self {
        Self {
            client,
            retry,
            limiter: RateLimiter::new(min_interval),
        }
    }
}

pub fn classify_prompt(article: &RawArticle) -> String {
    format!(
        "Classify the following news article.\n\n\
         Title: {title}\nSnippet: {snippet}\nURL: {url}\n\n\
         Respond with a JSON object:\n\
         {{\"relevant\": true|false, \"category\": \"<one of: {cats}>\", \
         \"country\": \"<country name or null>\", \"summary\": \"<2-3 sentence English summary>\"}}\n\
         Set relevant to false if the article is advertising, finance, \
         celebrity news or otherwise unrelated to real-world events.",
        title = article.title,
        snippet = article.snippet,
        url = article.url,
        cats = CATEGORY_VOCABULARY.join(", "),
    )
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    relevant: Option<bool>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

/// Decode a model reply; a missing category is a parse error.
pub fn parse_classification(reply: &str) -> Result<Classification, SourceError> {
    let json = extract_json_object(reply)
        .ok_or_else(|| SourceError::Parse("no JSON object in reply".into()))?;
    let r: Reply = serde_json::from_str(json)?;
    let category = r
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| SourceError::Parse("reply without category".into()))?;
    Ok(Classification {
        category,
        summary: truncate_chars(
            &clean_html(r.summary.as_deref().unwrap_or_default()),
            SUMMARY_MAX_CHARS,
        ),
        relevant: r.relevant.unwrap_or(true),
        country: r
            .country
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("null")),
    })
}

#[async_trait]
impl Classifier for LlmClassifier {
    fn id(&self) -> &str {
        self.client.kind().id()
    }

    async fn classify(&self, article: &RawArticle) -> Result<Classification, SourceError> {
        let prompt = classify_prompt(article);
        let client = &self.client;
        let limiter = &self.limiter;
        let prompt = prompt.as_str();
        self.retry
            .run(self.id(), move || async move {
                limiter.acquire().await;
                let reply = client.complete(SYSTEM, prompt, 500).await?;
                parse_classification(&reply)
            })
            .await
    }
}
