// src/pipeline.rs
//! One collection run: queries → adapters → baseline classification →
//! cross-validation → dedup → (optionally) merge with prior and publish.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::classify::{build_classifiers, Classifier, RuleClassifier};
use crate::config::{Credentials, KeywordConfig, PipelineConfig};
use crate::crossval::{CrossValidator, Plan};
use crate::dedup::{self, normalize_url, Merged};
use crate::error::{PipelineError, SourceError};
use crate::metrics::ensure_metrics_described;
use crate::model::{normalize_category, ClassifiedArticle, Confidence, Query, RawArticle, TrendSignal};
use crate::output;
use crate::query::QueryBuilder;
use crate::sources::{build_adapters, Fetched, SourceAdapter, SourceWarning};
use crate::text::{truncate_chars, SUMMARY_MAX_CHARS};

/// What a run produced, before anything is written.
#[derive(Debug, Default)]
pub struct RunReport {
    pub queries: usize,
    pub raw_articles: usize,
    /// Titles matching `exclude_keywords`.
    pub excluded: usize,
    pub warnings: Vec<SourceWarning>,
    pub plan: String,
    pub dropped: usize,
    /// Adapter calls still running at the pipeline deadline.
    pub unfinished_fetches: usize,
    pub unfinished_classifications: usize,
    pub records: Vec<Merged>,
}

#[derive(Debug)]
pub struct PublishReport {
    pub run: RunReport,
    pub path: PathBuf,
    /// Rows in the written dataset, prior records included.
    pub written: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    keywords: KeywordConfig,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    classifiers: Vec<Arc<dyn Classifier>>,
    rules: RuleClassifier,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        keywords: KeywordConfig,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        classifiers: Vec<Arc<dyn Classifier>>,
    ) -> Self {
        Self {
            config,
            keywords,
            adapters,
            classifiers,
            rules: RuleClassifier,
        }
    }

    /// Wire the real adapters and classifiers for whichever keys are present.
    pub fn from_config(
        config: PipelineConfig,
        keywords: KeywordConfig,
        credentials: &Credentials,
    ) -> Result<Self, SourceError> {
        let adapters = build_adapters(&config, credentials)?;
        let classifiers = build_classifiers(&config, credentials)?;
        let ids: Vec<&str> = adapters.iter().map(|a| a.id()).collect();
        info!(adapters = ?ids, "adapters ready");
        Ok(Self::new(config, keywords, adapters, classifiers))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, signals: &[TrendSignal]) -> Result<RunReport, PipelineError> {
        self.run_at(signals, Utc::now()).await
    }

    /// Collect and reconcile. `now` dates undated articles.
    pub async fn run_at(
        &self,
        signals: &[TrendSignal],
        now: DateTime<Utc>,
    ) -> Result<RunReport, PipelineError> {
        ensure_metrics_described();
        let deadline = Instant::now() + self.config.pipeline_timeout();

        let queries = QueryBuilder::new(&self.keywords).build(signals);
        info!(
            signals = signals.len(),
            queries = queries.len(),
            adapters = self.adapters.len(),
            "run started"
        );

        let mut report = RunReport {
            queries: queries.len(),
            ..RunReport::default()
        };

        let fetched = self.fetch_all(&queries, deadline).await;
        report.unfinished_fetches = queries.len() * self.adapters.len() - fetched.len();
        if report.unfinished_fetches > 0 {
            warn!(
                unfinished = report.unfinished_fetches,
                "pipeline deadline hit while fetching, using completed results"
            );
        }

        let mut candidates: Vec<ClassifiedArticle> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        for (qi, f) in fetched {
            if let Some(w) = f.warning {
                report.warnings.push(w);
            }
            for raw in f.articles {
                report.raw_articles += 1;
                if self.keywords.is_excluded(&raw.title) {
                    debug!(title = %raw.title, "excluded by keyword");
                    report.excluded += 1;
                    continue;
                }
                // The same adapter often returns one article for several queries.
                let key = (raw.source_id.clone(), normalize_url(&raw.url));
                match index.get(&key) {
                    Some(&i) => absorb(&mut candidates[i], &queries[qi]),
                    None => {
                        index.insert(key, candidates.len());
                        candidates.push(self.baseline(raw, &queries[qi]));
                    }
                }
            }
        }

        if report.raw_articles == 0 {
            warn!(
                adapters = self.adapters.len(),
                queries = queries.len(),
                warnings = report.warnings.len(),
                "no adapter returned any article"
            );
            return Err(PipelineError::AllSourcesFailed {
                adapters: self.adapters.len(),
                queries: queries.len(),
            });
        }

        let plan = Plan::select(
            &self.classifiers,
            &self.config.cross_validation,
            self.config.classify_single,
        );
        report.plan = plan.describe();
        let validator = CrossValidator::new(
            plan,
            self.config.article_timeout(),
            self.config.max_concurrent_classifications,
        );
        let classified = validator.run(candidates, deadline).await;
        report.dropped = classified.dropped;
        report.unfinished_classifications = classified.unfinished;

        report.records = dedup::deduplicate(classified.articles, now.date_naive());

        info!(
            raw = report.raw_articles,
            excluded = report.excluded,
            dropped = report.dropped,
            records = report.records.len(),
            warnings = report.warnings.len(),
            plan = %report.plan,
            "run finished"
        );
        Ok(report)
    }

    /// Run, merge with the prior dataset and replace it atomically. Nothing
    /// is written when the run fails.
    pub async fn run_and_publish(
        &self,
        signals: &[TrendSignal],
        now: DateTime<Utc>,
    ) -> Result<PublishReport, PipelineError> {
        let run = self.run_at(signals, now).await?;
        let path = self.config.output_path.clone();

        let prior = output::load_prior(&path)?;
        let prior_len = prior.len();
        let current = run.records.iter().map(|m| m.record.clone()).collect();
        let merged = dedup::merge_with_prior(current, prior);
        output::write_records(&path, &merged)?;

        counter!("collector_records_written_total").increment(merged.len() as u64);
        gauge!("collector_last_run_ts").set(now.timestamp() as f64);
        info!(
            path = %path.display(),
            new = run.records.len(),
            prior = prior_len,
            written = merged.len(),
            "dataset published"
        );
        Ok(PublishReport {
            written: merged.len(),
            run,
            path,
        })
    }

    /// Every adapter × query, bounded; results are returned in job order.
    async fn fetch_all(&self, queries: &[Query], deadline: Instant) -> Vec<(usize, Fetched)> {
        let limit = self.config.per_query_limit;
        let jobs: Vec<(usize, usize, &Arc<dyn SourceAdapter>)> = queries
            .iter()
            .enumerate()
            .flat_map(|(qi, _)| self.adapters.iter().map(move |a| (qi, a)))
            .enumerate()
            .map(|(job, (qi, a))| (job, qi, a))
            .collect();

        let mut done: Vec<(usize, usize, Fetched)> = stream::iter(jobs)
            .map(|(job, qi, adapter)| async move {
                (job, qi, adapter.fetch(&queries[qi], limit).await)
            })
            .buffer_unordered(self.config.max_concurrent_fetches.max(1))
            .take_until(sleep_until(deadline))
            .collect()
            .await;
        done.sort_by_key(|(job, _, _)| *job);
        done.into_iter().map(|(_, qi, f)| (qi, f)).collect()
    }

    fn baseline(&self, raw: RawArticle, query: &Query) -> ClassifiedArticle {
        let (category, confidence_hint) = match raw.provider_category.as_deref() {
            Some(c) => (Some(normalize_category(c)), Confidence::Medium),
            None => (
                self.rules
                    .categorize(&raw.title, &raw.snippet)
                    .map(normalize_category),
                Confidence::Low,
            ),
        };
        let country = raw
            .country
            .clone()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| query.country.clone())
            .unwrap_or_default();
        ClassifiedArticle {
            summary: truncate_chars(&raw.snippet, SUMMARY_MAX_CHARS),
            sources: vec![raw.source_id.clone()],
            category,
            confidence_hint,
            country,
            magnitude: query.magnitude,
            notes: Vec::new(),
            raw,
        }
    }
}

fn absorb(existing: &mut ClassifiedArticle, query: &Query) {
    existing.magnitude = existing.magnitude.max(query.magnitude);
    if existing.country.is_empty() {
        if let Some(c) = &query.country {
            existing.country = c.clone();
        }
    }
}
