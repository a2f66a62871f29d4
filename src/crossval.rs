// src/crossval.rs
//! Cross-validation: classify each candidate with a primary and a secondary
//! provider, then turn agreement into a confidence rating.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use metrics::counter;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::classify::{Classification, Classifier};
use crate::config::{CrossValidationConfig, ProviderKind};
use crate::model::{normalize_category, ClassifiedArticle, Confidence};

/// How articles get classified this run.
#[derive(Clone)]
pub enum Plan {
    /// No AI classifier: adapter/rule classification only.
    Baseline,
    /// One classifier; results are capped at medium.
    Single(Arc<dyn Classifier>),
    CrossValidate {
        primary: Arc<dyn Classifier>,
        secondary: Arc<dyn Classifier>,
    },
}

impl Plan {
    /// Pick primary/secondary from the available classifiers. A missing
    /// configured provider falls back to the first other available one.
    pub fn select(
        classifiers: &[Arc<dyn Classifier>],
        cfg: &CrossValidationConfig,
        classify_single: bool,
    ) -> Plan {
        let find = |kind: ProviderKind| classifiers.iter().find(|c| c.id() == kind.id()).cloned();

        let Some(primary) = find(cfg.primary).or_else(|| classifiers.first().cloned()) else {
            return Plan::Baseline;
        };
        let secondary = cfg
            .secondary
            .and_then(find)
            .filter(|s| s.id() != primary.id())
            .or_else(|| classifiers.iter().find(|c| c.id() != primary.id()).cloned());

        match secondary {
            Some(secondary) if cfg.enabled => Plan::CrossValidate { primary, secondary },
            _ if classify_single => Plan::Single(primary),
            _ => Plan::Baseline,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Plan::Baseline => "baseline".to_string(),
            Plan::Single(c) => format!("single({})", c.id()),
            Plan::CrossValidate { primary, secondary } => {
                format!("cross-validate({} + {})", primary.id(), secondary.id())
            }
        }
    }
}

/// Outcome of one provider call for one article.
pub type CallOutcome = Result<Classification, String>;

pub struct CrossValidator {
    plan: Plan,
    article_timeout: Duration,
    max_concurrency: usize,
}

#[derive(Debug, Default)]
pub struct CrossValReport {
    pub articles: Vec<ClassifiedArticle>,
    pub dropped: usize,
    /// Articles whose calls were abandoned at the pipeline deadline.
    pub unfinished: usize,
}

impl CrossValidator {
    pub fn new(plan: Plan, article_timeout: Duration, max_concurrency: usize) -> Self {
        Self {
            plan,
            article_timeout,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Classify every article; anything not finished by `deadline` is
    /// treated as if all its calls failed.
    pub async fn run(&self, articles: Vec<ClassifiedArticle>, deadline: Instant) -> CrossValReport {
        if let Plan::Baseline = self.plan {
            return CrossValReport {
                articles,
                dropped: 0,
                unfinished: 0,
            };
        }
        info!(plan = %self.plan.describe(), articles = articles.len(), "classifying");

        let finished: Vec<(usize, Vec<(String, CallOutcome)>)> = stream::iter(articles.iter().enumerate())
            .map(|(i, a)| async move { (i, self.classify_one(a).await) })
            .buffer_unordered(self.max_concurrency)
            .take_until(sleep_until(deadline))
            .collect()
            .await;

        let mut outcomes: Vec<Option<Vec<(String, CallOutcome)>>> = vec![None; articles.len()];
        for (i, o) in finished {
            outcomes[i] = Some(o);
        }

        let mut report = CrossValReport::default();
        for (article, outcome) in articles.into_iter().zip(outcomes) {
            let outcome = match outcome {
                Some(o) => o,
                None => {
                    report.unfinished += 1;
                    self.provider_ids()
                        .into_iter()
                        .map(|id| (id, Err("pipeline deadline".to_string())))
                        .collect()
                }
            };
            let url = article.raw.url.clone();
            match reconcile(article, outcome) {
                Some(a) => report.articles.push(a),
                None => {
                    debug!(url = %url, "article dropped after classification");
                    report.dropped += 1;
                }
            }
        }
        if report.unfinished > 0 {
            warn!(unfinished = report.unfinished, "pipeline deadline hit during classification");
        }
        report
    }

    fn provider_ids(&self) -> Vec<String> {
        match &self.plan {
            Plan::Baseline => Vec::new(),
            Plan::Single(c) => vec![c.id().to_string()],
            Plan::CrossValidate { primary, secondary } => {
                vec![primary.id().to_string(), secondary.id().to_string()]
            }
        }
    }

    /// Primary first. Both calls share one per-article deadline.
    async fn classify_one(&self, article: &ClassifiedArticle) -> Vec<(String, CallOutcome)> {
        let deadline = Instant::now() + self.article_timeout;
        match &self.plan {
            Plan::Baseline => Vec::new(),
            Plan::Single(c) => vec![(c.id().to_string(), call(c.as_ref(), article, deadline).await)],
            Plan::CrossValidate { primary, secondary } => {
                let (p, s) = tokio::join!(
                    call(primary.as_ref(), article, deadline),
                    call(secondary.as_ref(), article, deadline)
                );
                vec![(primary.id().to_string(), p), (secondary.id().to_string(), s)]
            }
        }
    }
}

async fn call(c: &dyn Classifier, article: &ClassifiedArticle, deadline: Instant) -> CallOutcome {
    let (outcome, label) = match timeout_at(deadline, c.classify(&article.raw)).await {
        Ok(Ok(cls)) => (Ok(cls), "ok"),
        Ok(Err(e)) => (Err(e.to_string()), e.kind()),
        Err(_) => (Err("timeout".to_string()), "timeout"),
    };
    counter!(
        "collector_classifications_total",
        "provider" => c.id().to_string(),
        "outcome" => label
    )
    .increment(1);
    if let Err(reason) = &outcome {
        debug!(provider = c.id(), url = %article.raw.url, reason = %reason, "classification failed");
    }
    outcome
}

/// Fold provider outcomes (primary first) into the article.
///
/// An article every successful provider marked irrelevant is dropped before
/// any of the rules below apply. Otherwise:
///
/// * all succeed, same category: high, corroborated
/// * all succeed, categories differ: medium, both listed
/// * exactly one succeeds: medium at most
/// * none succeed: baseline category at low, or dropped without one
pub fn reconcile(
    mut article: ClassifiedArticle,
    outcomes: Vec<(String, CallOutcome)>,
) -> Option<ClassifiedArticle> {
    let (ok, failed): (Vec<_>, Vec<_>) = outcomes.into_iter().partition(|(_, o)| o.is_ok());
    let ok: Vec<(String, Classification)> = ok
        .into_iter()
        .filter_map(|(id, o)| o.ok().map(|c| (id, c)))
        .collect();
    let failed: Vec<(String, String)> = failed
        .into_iter()
        .filter_map(|(id, o)| o.err().map(|e| (id, e)))
        .collect();

    if !ok.is_empty() && ok.iter().all(|(_, c)| !c.relevant) {
        return None;
    }

    match ok.as_slice() {
        [] => {
            article.category.as_ref()?;
            article.confidence_hint = Confidence::Low;
            if !failed.is_empty() {
                let ids: Vec<&str> = failed.iter().map(|(id, _)| id.as_str()).collect();
                article
                    .notes
                    .push(format!("unverified: {} failed", ids.join(", ")));
            }
        }
        [(id, c)] => {
            apply(&mut article, id, c);
            article.confidence_hint = Confidence::Medium;
            let mut note = format!("single-source: {}={}", id, normalize_category(&c.category));
            if let Some((fid, reason)) = failed.first() {
                note.push_str(&format!(" ({fid} {reason})"));
            }
            article.notes.push(note);
        }
        [(pid, p), (sid, s), ..] => {
            let pc = normalize_category(&p.category);
            let sc = normalize_category(&s.category);
            apply(&mut article, pid, p);
            article.add_source(sid);
            if article.summary.is_empty() {
                article.summary = s.summary.clone();
            }
            if pc == sc {
                article.confidence_hint = Confidence::High;
                article
                    .notes
                    .push(format!("corroborated: {pc} ({pid}+{sid})"));
            } else {
                article.confidence_hint = Confidence::Medium;
                article
                    .notes
                    .push(format!("disputed: {pid}={pc} vs {sid}={sc}"));
            }
        }
    }
    Some(article)
}

fn apply(article: &mut ClassifiedArticle, provider: &str, c: &Classification) {
    article.category = Some(normalize_category(&c.category));
    if !c.summary.is_empty() {
        article.summary = c.summary.clone();
    }
    if article.country.is_empty() {
        if let Some(country) = &c.country {
            article.country = country.clone();
        }
    }
    article.add_source(provider);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawArticle;

    fn base(category: Option<&str>) -> ClassifiedArticle {
        ClassifiedArticle {
            raw: RawArticle {
                source_id: "rss".into(),
                title: "t".into(),
                url: "https://n/1".into(),
                published_at: None,
                snippet: "snippet".into(),
                provider_category: None,
                country: None,
            },
            category: category.map(str::to_string),
            summary: "snippet".into(),
            confidence_hint: Confidence::Low,
            country: String::new(),
            magnitude: 0.0,
            sources: vec!["rss".into()],
            notes: vec![],
        }
    }

    fn ok(cat: &str) -> CallOutcome {
        Ok(Classification::new(cat, format!("{cat} summary")))
    }

    #[test]
    fn agreement_after_normalization_is_high() {
        let a = reconcile(
            base(None),
            vec![("openai".into(), ok("Trade Policy")), ("claude".into(), ok("trade_policy"))],
        )
        .unwrap();
        assert_eq!(a.confidence_hint, Confidence::High);
        assert_eq!(a.category.as_deref(), Some("trade-policy"));
        assert_eq!(a.summary, "Trade Policy summary");
        assert_eq!(a.sources, vec!["rss", "openai", "claude"]);
        assert!(a.notes[0].contains("corroborated"));
    }

    #[test]
    fn both_failed_without_baseline_is_dropped() {
        let outcomes = || {
            vec![
                ("openai".to_string(), Err("timeout".to_string())),
                ("claude".to_string(), Err("timeout".to_string())),
            ]
        };
        assert!(reconcile(base(None), outcomes()).is_none());
        let kept = reconcile(base(Some("power_outage")), outcomes()).unwrap();
        assert_eq!(kept.confidence_hint, Confidence::Low);
        assert_eq!(kept.notes, vec!["unverified: openai, claude failed"]);
    }

    #[test]
    fn irrelevant_verdicts_drop_the_article() {
        let mut no = Classification::new("other", "");
        no.relevant = false;
        assert!(reconcile(
            base(Some("holiday")),
            vec![("openai".into(), Ok(no.clone())), ("claude".into(), Ok(no))]
        )
        .is_none());
    }
}
