// src/sources/mod.rs
//! Source adapters. Every provider implements [`FetchBackend`] (one raw
//! call); [`ResilientAdapter`] wraps it with retry, rate limiting and
//! auth-disable so each adapter degrades independently.

pub mod deepsearch;
pub mod llm_search;
pub mod naver;
pub mod rss;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::{debug, warn};

use crate::config::{Credentials, PipelineConfig, ProviderKind};
use crate::error::SourceError;
use crate::llm::ChatClient;
use crate::metrics::ensure_metrics_described;
use crate::model::{Query, RawArticle};
use crate::retry::{RateLimiter, RetryPolicy};

/// The fixed set of adapter variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    Rss,
    DeepSearch,
    Naver,
    LlmSearch(ProviderKind),
}

impl AdapterKind {
    pub fn id(&self) -> &'static str {
        match self {
            AdapterKind::Rss => "rss",
            AdapterKind::DeepSearch => "deepsearch",
            AdapterKind::Naver => "naver",
            AdapterKind::LlmSearch(ProviderKind::OpenAi) => "openai-search",
            AdapterKind::LlmSearch(ProviderKind::Claude) => "claude-search",
            AdapterKind::LlmSearch(ProviderKind::Groq) => "groq-search",
        }
    }
}

/// Non-fatal note about a degraded adapter call.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceWarning {
    pub adapter: String,
    pub query: String,
    pub kind: &'static str,
    pub message: String,
}

/// Result of one adapter call. Failures surface as an empty list plus a warning.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub articles: Vec<RawArticle>,
    pub warning: Option<SourceWarning>,
}

/// Capability shared by all adapters.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn id(&self) -> &str;

    /// At most `limit` articles, newest first where the provider has dates.
    /// Never fails; errors become a warning.
    async fn fetch(&self, query: &Query, limit: usize) -> Fetched;
}

/// One raw provider call, without retry or spacing.
#[async_trait]
pub trait FetchBackend: Send + Sync {
    fn kind(&self) -> AdapterKind;

    async fn fetch_once(&self, query: &Query, limit: usize)
        -> Result<Vec<RawArticle>, SourceError>;
}

pub struct ResilientAdapter<B> {
    backend: B,
    retry: RetryPolicy,
    limiter: RateLimiter,
    disabled: AtomicBool,
}

impl<B: FetchBackend> ResilientAdapter<B> {
    pub fn new(backend: B, retry: RetryPolicy, min_interval: Duration) -> Self {
        Self {
            backend,
            retry,
            limiter: RateLimiter::new(min_interval),
            disabled: AtomicBool::new(false),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    fn warning(&self, query: &Query, err: &SourceError) -> SourceWarning {
        SourceWarning {
            adapter: self.id().to_string(),
            query: query.text.clone(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl<B: FetchBackend> SourceAdapter for ResilientAdapter<B> {
    fn id(&self) -> &str {
        self.backend.kind().id()
    }

    async fn fetch(&self, query: &Query, limit: usize) -> Fetched {
        ensure_metrics_described();
        let id = self.id();

        if self.is_disabled() {
            return Fetched {
                articles: Vec::new(),
                warning: Some(SourceWarning {
                    adapter: id.to_string(),
                    query: query.text.clone(),
                    kind: "disabled",
                    message: "adapter disabled after authentication failure".to_string(),
                }),
            };
        }

        let t0 = Instant::now();
        let backend = &self.backend;
        let limiter = &self.limiter;
        let result = self
            .retry
            .run(id, move || async move {
                limiter.acquire().await;
                backend.fetch_once(query, limit).await
            })
            .await;
        histogram!("collector_fetch_ms", "adapter" => id.to_string())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);

        match result {
            Ok(mut articles) => {
                sort_newest_first(&mut articles);
                articles.truncate(limit);
                counter!("collector_articles_fetched_total", "adapter" => id.to_string())
                    .increment(articles.len() as u64);
                debug!(adapter = id, query = %query.text, count = articles.len(), "fetched");
                Fetched {
                    articles,
                    warning: None,
                }
            }
            Err(err) => {
                counter!(
                    "collector_provider_errors_total",
                    "adapter" => id.to_string(),
                    "kind" => err.kind()
                )
                .increment(1);
                if matches!(err, SourceError::Auth(_)) {
                    // Only the first caller to flip the flag logs.
                    if !self.disabled.swap(true, Ordering::SeqCst) {
                        warn!(adapter = id, error = %err, "authentication failed, adapter disabled for this run");
                    }
                } else {
                    warn!(adapter = id, query = %query.text, error = %err, "fetch failed, continuing without it");
                }
                Fetched {
                    articles: Vec::new(),
                    warning: Some(self.warning(query, &err)),
                }
            }
        }
    }
}

/// Dated items newest first; undated items keep their order at the end.
pub fn sort_newest_first(articles: &mut [RawArticle]) {
    articles.sort_by(|a, b| match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Statically enumerated adapter list for this run. Keys decide
/// availability; RSS needs none.
pub fn build_adapters(
    config: &PipelineConfig,
    credentials: &Credentials,
) -> Result<Vec<Arc<dyn SourceAdapter>>, SourceError> {
    let retry = RetryPolicy::from_settings(&config.retry);
    let mut out: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    if config.rss.enabled {
        let backend = rss::GoogleNewsRss::http(&config.rss)?;
        out.push(Arc::new(ResilientAdapter::new(
            backend,
            retry.clone(),
            Duration::from_millis(config.rss.min_interval_ms),
        )));
    }

    match credentials.deepsearch.as_deref() {
        Some(key) => {
            let backend = deepsearch::DeepSearch::new(key, &config.deepsearch)?;
            out.push(Arc::new(ResilientAdapter::new(
                backend,
                retry.clone(),
                Duration::from_millis(config.deepsearch.min_interval_ms),
            )));
        }
        None => debug!("DEEPSEARCH_API_KEY not set, deepsearch adapter off"),
    }

    match credentials.naver() {
        Some((id, secret)) => {
            let backend = naver::Naver::new(id, secret, &config.naver)?;
            out.push(Arc::new(ResilientAdapter::new(
                backend,
                retry.clone(),
                Duration::from_millis(config.naver.min_interval_ms),
            )));
        }
        None => debug!("NAVER_CLIENT_ID/NAVER_CLIENT_SECRET not set, naver adapter off"),
    }

    for kind in &config.llm_search {
        let Some(key) = credentials.key_for(*kind) else {
            warn!(provider = kind.id(), "llm search requested but no API key, skipping");
            continue;
        };
        let settings = config.providers.settings(*kind);
        let min_interval = Duration::from_millis(settings.min_interval_ms);
        let client = ChatClient::new(*kind, key, settings)?;
        out.push(Arc::new(ResilientAdapter::new(
            llm_search::LlmSearch::new(client),
            retry.clone(),
            min_interval,
        )));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::AtomicUsize;

    fn q(text: &str) -> Query {
        Query {
            text: text.to_string(),
            country: None,
            direction: None,
            magnitude: 0.0,
            signals: Vec::new(),
        }
    }

    fn art(url: &str, day: Option<u32>) -> RawArticle {
        RawArticle {
            source_id: "rss".into(),
            title: url.into(),
            url: url.into(),
            published_at: day.map(|d| Utc.with_ymd_and_hms(2025, 3, d, 0, 0, 0).unwrap()),
            snippet: String::new(),
            provider_category: None,
            country: None,
        }
    }

    struct AuthFails {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FetchBackend for AuthFails {
        fn kind(&self) -> AdapterKind {
            AdapterKind::DeepSearch
        }
        async fn fetch_once(&self, _: &Query, _: usize) -> Result<Vec<RawArticle>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SourceError::Auth("401".into()))
        }
    }

    struct Many;

    #[async_trait]
    impl FetchBackend for Many {
        fn kind(&self) -> AdapterKind {
            AdapterKind::Rss
        }
        async fn fetch_once(&self, _: &Query, _: usize) -> Result<Vec<RawArticle>, SourceError> {
            Ok(vec![
                art("https://a/1", Some(1)),
                art("https://a/none", None),
                art("https://a/3", Some(3)),
                art("https://a/2", Some(2)),
            ])
        }
    }

    #[tokio::test]
    async fn results_are_newest_first_and_limited() {
        let a = ResilientAdapter::new(Many, RetryPolicy::no_retry(), Duration::ZERO);
        let out = a.fetch(&q("x"), 3).await;
        let urls: Vec<_> = out.articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a/3", "https://a/2", "https://a/1"]);
        assert!(out.warning.is_none());
    }

    #[tokio::test]
    async fn auth_failure_disables_adapter_for_the_run() {
        let a = ResilientAdapter::new(
            AuthFails {
                calls: AtomicUsize::new(0),
            },
            RetryPolicy::default(),
            Duration::ZERO,
        );
        let first = a.fetch(&q("one"), 5).await;
        assert!(first.articles.is_empty());
        assert_eq!(first.warning.as_ref().map(|w| w.kind), Some("auth"));
        assert!(a.is_disabled());

        let second = a.fetch(&q("two"), 5).await;
        assert_eq!(second.warning.map(|w| w.kind), Some("disabled"));
        // No retries and no second call.
        assert_eq!(a.backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn adapter_list_depends_on_keys() {
        let mut cfg = PipelineConfig::default();
        cfg.llm_search = vec![ProviderKind::Claude, ProviderKind::OpenAi];
        let creds = Credentials {
            claude: Some("k".into()),
            ..Credentials::default()
        };
        let ids: Vec<String> = build_adapters(&cfg, &creds)
            .unwrap()
            .iter()
            .map(|a| a.id().to_string())
            .collect();
        assert_eq!(ids, vec!["rss".to_string(), "claude-search".to_string()]);
    }

    #[test]
    fn naver_needs_both_id_and_secret() {
        let cfg = PipelineConfig::default();
        let ids = |creds: &Credentials| -> Vec<String> {
            build_adapters(&cfg, creds)
                .unwrap()
                .iter()
                .map(|a| a.id().to_string())
                .collect()
        };
        let id_only = Credentials {
            naver_client_id: Some("id".into()),
            ..Credentials::default()
        };
        assert_eq!(ids(&id_only), vec!["rss".to_string()]);

        let both = Credentials {
            naver_client_id: Some("id".into()),
            naver_client_secret: Some("secret".into()),
            deepsearch: Some("ds".into()),
            ..Credentials::default()
        };
        assert_eq!(
            ids(&both),
            vec!["rss".to_string(), "deepsearch".to_string(), "naver".to_string()]
        );
    }
}
