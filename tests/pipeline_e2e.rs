// tests/pipeline_e2e.rs
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use trend_news_collector::classify::{Classification, Classifier};
use trend_news_collector::error::{PipelineError, SourceError};
use trend_news_collector::model::{CanonicalRecord, Confidence, Direction, Query, RawArticle, TrendSignal};
use trend_news_collector::output::{read_records, write_records};
use trend_news_collector::retry::RetryPolicy;
use trend_news_collector::sources::{AdapterKind, FetchBackend, Fetched, ResilientAdapter, SourceAdapter};
use trend_news_collector::{KeywordConfig, Pipeline, PipelineConfig};

struct StaticAdapter {
    id: &'static str,
    articles: Vec<RawArticle>,
    calls: AtomicUsize,
}

impl StaticAdapter {
    fn new(id: &'static str, articles: Vec<RawArticle>) -> Arc<Self> {
        Arc::new(Self {
            id,
            articles,
            calls: AtomicUsize::new(0),
        })
    }
}

fn dyn_adapter(a: &Arc<StaticAdapter>) -> Arc<dyn SourceAdapter> {
    a.clone()
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn id(&self) -> &str {
        self.id
    }

    async fn fetch(&self, _query: &Query, limit: usize) -> Fetched {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Fetched {
            articles: self.articles.iter().take(limit).cloned().collect(),
            warning: None,
        }
    }
}

struct Unauthorized;

#[async_trait]
impl FetchBackend for Unauthorized {
    fn kind(&self) -> AdapterKind {
        AdapterKind::DeepSearch
    }

    async fn fetch_once(&self, _: &Query, _: usize) -> Result<Vec<RawArticle>, SourceError> {
        Err(SourceError::Auth("401 Unauthorized".into()))
    }
}

struct Agrees(&'static str);

#[async_trait]
impl Classifier for Agrees {
    fn id(&self) -> &str {
        self.0
    }

    async fn classify(&self, a: &RawArticle) -> Result<Classification, SourceError> {
        Ok(Classification::new("trade_policy", format!("{} (via {})", a.title, self.0)))
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap()
}

fn rss_article(url: &str, title: &str) -> RawArticle {
    RawArticle {
        source_id: "rss".into(),
        title: title.into(),
        url: url.into(),
        published_at: Some(Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()),
        snippet: "Lawmakers adjourned without a vote.".into(),
        provider_category: None,
        country: None,
    }
}

fn keywords() -> KeywordConfig {
    KeywordConfig::from_countries(vec![("Japan", vec!["Japan parliament", "Japan tariffs"])]).unwrap()
}

fn signals() -> Vec<TrendSignal> {
    vec![TrendSignal {
        country: "Japan".into(),
        direction: Direction::Rising,
        magnitude: 2.0,
    }]
}

fn config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        output_path: dir.join("data").join("news.csv"),
        cache_dir: dir.join("cache"),
        max_concurrent_fetches: 1,
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn rss_only_run_publishes_low_confidence_records() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let out_path = cfg.output_path.clone();
    let rss = StaticAdapter::new(
        "rss",
        vec![rss_article("https://news.example.com/u1", "Parliament session ends quietly")],
    );
    let pipeline = Pipeline::new(cfg, keywords(), vec![dyn_adapter(&rss)], Vec::new());

    let report = pipeline.run_and_publish(&signals(), now()).await.unwrap();
    assert_eq!(report.run.plan, "baseline");
    assert_eq!(report.run.queries, 2);
    // Same article for both queries: one record.
    assert_eq!(report.written, 1);
    assert_eq!(rss.calls.load(Ordering::SeqCst), 2);

    let rows = read_records(&out_path).unwrap();
    assert_eq!(rows.len(), 1);
    let r = &rows[0];
    assert_eq!(r.url, "https://news.example.com/u1");
    assert_eq!(r.confidence, Confidence::Low);
    assert_eq!(r.country, "Japan");
    assert_eq!(r.continent, "ASIA");
    assert_eq!(r.verification_note, "sources: rss");
}

#[tokio::test]
async fn agreeing_classifiers_publish_high_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let out_path = cfg.output_path.clone();
    let rss = StaticAdapter::new(
        "rss",
        vec![rss_article("https://news.example.com/x", "Tariff talks stall in Tokyo")],
    );
    let classifiers: Vec<Arc<dyn Classifier>> =
        vec![Arc::new(Agrees("openai")), Arc::new(Agrees("claude"))];
    let pipeline = Pipeline::new(cfg, keywords(), vec![dyn_adapter(&rss)], classifiers);

    let report = pipeline.run_and_publish(&signals(), now()).await.unwrap();
    assert_eq!(report.run.plan, "cross-validate(openai + claude)");

    let rows = read_records(&out_path).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].confidence, Confidence::High);
    assert_eq!(rows[0].summary, "Tariff talks stall in Tokyo (via openai)");
    assert_eq!(
        rows[0].verification_note,
        "sources: claude, openai, rss; category: trade-policy; corroborated: trade-policy (openai+claude)"
    );
}

#[tokio::test]
async fn no_articles_anywhere_fails_and_keeps_prior_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let out_path = cfg.output_path.clone();
    let prior = vec![CanonicalRecord {
        title: "Earlier item".into(),
        summary: "From a previous run".into(),
        url: "https://news.example.com/old".into(),
        published_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        country: "Japan".into(),
        continent: "ASIA".into(),
        confidence: Confidence::Medium,
        verification_note: "sources: rss".into(),
    }];
    write_records(&out_path, &prior).unwrap();
    let before = fs::read(&out_path).unwrap();

    let empty = StaticAdapter::new("rss", Vec::new());
    let denied: Arc<dyn SourceAdapter> = Arc::new(ResilientAdapter::new(
        Unauthorized,
        RetryPolicy::no_retry(),
        Duration::ZERO,
    ));
    let pipeline = Pipeline::new(cfg, keywords(), vec![dyn_adapter(&empty), denied], Vec::new());

    let err = pipeline.run_and_publish(&signals(), now()).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::AllSourcesFailed {
            adapters: 2,
            queries: 2
        }
    ));
    assert_eq!(fs::read(&out_path).unwrap(), before);
}

#[tokio::test]
async fn auth_failure_only_disables_that_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let rss = StaticAdapter::new(
        "rss",
        vec![rss_article("https://news.example.com/u1", "Parliament session ends quietly")],
    );
    let denied: Arc<dyn SourceAdapter> = Arc::new(ResilientAdapter::new(
        Unauthorized,
        RetryPolicy::default(),
        Duration::ZERO,
    ));
    let pipeline = Pipeline::new(cfg, keywords(), vec![denied, dyn_adapter(&rss)], Vec::new());

    let report = pipeline.run(&signals()).await.unwrap();
    assert_eq!(report.records.len(), 1);
    let kinds: Vec<(&str, &str)> = report
        .warnings
        .iter()
        .map(|w| (w.adapter.as_str(), w.kind))
        .collect();
    assert_eq!(kinds, vec![("deepsearch", "auth"), ("deepsearch", "disabled")]);
}

#[tokio::test]
async fn repeated_runs_are_idempotent_and_keep_unrelated_prior_rows() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let out_path = cfg.output_path.clone();
    write_records(
        &out_path,
        &[CanonicalRecord {
            title: "Unrelated".into(),
            summary: String::new(),
            url: "https://news.example.com/other".into(),
            published_date: chrono::NaiveDate::from_ymd_opt(2025, 2, 27).unwrap(),
            country: "Brazil".into(),
            continent: "SOUTH AMERICA".into(),
            confidence: Confidence::Low,
            verification_note: "sources: rss".into(),
        }],
    )
    .unwrap();

    let rss = StaticAdapter::new(
        "rss",
        vec![
            rss_article("https://news.example.com/u1?utm_source=feed", "Parliament session ends quietly"),
            rss_article("https://news.example.com/u2", "Typhoon closes ports along the coast"),
        ],
    );
    let pipeline = Pipeline::new(cfg, keywords(), vec![dyn_adapter(&rss)], Vec::new());

    pipeline.run_and_publish(&signals(), now()).await.unwrap();
    let first = fs::read(&out_path).unwrap();
    pipeline.run_and_publish(&signals(), now()).await.unwrap();
    let second = fs::read(&out_path).unwrap();
    assert_eq!(first, second);

    let rows = read_records(&out_path).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.last().unwrap().url, "https://news.example.com/other");
    let typhoon = rows.iter().find(|r| r.url.ends_with("/u2")).unwrap();
    assert_eq!(typhoon.verification_note, "sources: rss; category: natural-disaster");
}

#[tokio::test]
async fn excluded_titles_never_reach_the_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let mut kw = keywords();
    kw.exclude_keywords = vec!["k-pop".into()];
    let rss = StaticAdapter::new(
        "rss",
        vec![
            rss_article("https://news.example.com/a", "K-Pop tour sells out in Tokyo"),
            rss_article("https://news.example.com/b", "Parliament session ends quietly"),
        ],
    );
    let pipeline = Pipeline::new(cfg, kw, vec![dyn_adapter(&rss)], Vec::new());
    let report = pipeline.run(&signals()).await.unwrap();
    assert_eq!(report.excluded, 2);
    let urls: Vec<&str> = report.records.iter().map(|m| m.record.url.as_str()).collect();
    assert_eq!(urls, vec!["https://news.example.com/b"]);
}
