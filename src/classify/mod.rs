// src/classify/mod.rs
//! Article classification: AI classifiers (cached, quota-limited) and the
//! keyword rules used as a baseline when no AI result is available.

pub mod cache;
pub mod providers;
pub mod rules;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Credentials, PipelineConfig, ProviderKind};
use crate::error::SourceError;
use crate::llm::ChatClient;
use crate::model::RawArticle;
use crate::retry::RetryPolicy;

pub use cache::CachedClassifier;
pub use providers::LlmClassifier;
pub use rules::RuleClassifier;

/// Categories the AI prompts ask for. Other strings are still accepted.
pub const CATEGORY_VOCABULARY: &[&str] = &[
    "internet_shutdown",
    "tech_outage",
    "power_outage",
    "censorship",
    "cyber_attack",
    "infrastructure_damage",
    "war_conflict",
    "terrorism_explosion",
    "natural_disaster",
    "protest_strike",
    "curfew",
    "pandemic",
    "economic",
    "holiday",
    "school_calendar",
    "election",
    "gaming",
    "competitor_game",
    "social_trend",
    "sports_event",
    "major_event",
    "other",
];

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub summary: String,
    /// `false` when the model judged the article off-topic.
    #[serde(default = "yes")]
    pub relevant: bool,
    #[serde(default)]
    pub country: Option<String>,
}

impl Classification {
    pub fn new(category: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            summary: summary.into(),
            relevant: true,
            country: None,
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Provider id, e.g. `openai`.
    fn id(&self) -> &str;

    async fn classify(&self, article: &RawArticle) -> Result<Classification, SourceError>;
}

/// One cached classifier per provider with a key, in `openai, claude, groq` order.
pub fn build_classifiers(
    config: &PipelineConfig,
    credentials: &Credentials,
) -> Result<Vec<Arc<dyn Classifier>>, SourceError> {
    let retry = RetryPolicy::from_settings(&config.retry);
    let mut out: Vec<Arc<dyn Classifier>> = Vec::new();

    for kind in ProviderKind::ALL {
        let Some(key) = credentials.key_for(kind) else {
            continue;
        };
        let settings = config.providers.settings(kind);
        let daily_limit = settings.daily_limit;
        let min_interval = Duration::from_millis(settings.min_interval_ms);
        let client = ChatClient::new(kind, key, settings)?;
        let inner = LlmClassifier::new(client, retry.clone(), min_interval);
        out.push(Arc::new(CachedClassifier::new(
            inner,
            config.cache_dir.join(kind.id()),
            daily_limit,
        )));
    }

    if out.is_empty() {
        warn!("no AI provider keys set, articles keep rule-based classification");
    } else {
        let ids: Vec<&str> = out.iter().map(|c| c.id()).collect();
        info!(providers = ?ids, "classifiers ready");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_defaults_to_relevant() {
        let c: Classification =
            serde_json::from_str(r#"{"category":"holiday","summary":"Eid"}"#).unwrap();
        assert!(c.relevant);
        assert_eq!(c.country, None);
    }

    #[test]
    fn classifiers_follow_available_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = PipelineConfig::default();
        cfg.cache_dir = dir.path().to_path_buf();
        let creds = Credentials {
            groq: Some("g".into()),
            openai: Some("o".into()),
            ..Credentials::default()
        };
        let ids: Vec<String> = build_classifiers(&cfg, &creds)
            .unwrap()
            .iter()
            .map(|c| c.id().to_string())
            .collect();
        assert_eq!(ids, vec!["openai".to_string(), "groq".to_string()]);
    }
}
