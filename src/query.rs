// src/query.rs
//! Trend signals + keyword configuration → ordered, deduplicated queries.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::KeywordConfig;
use crate::model::{Query, TrendSignal};

pub struct QueryBuilder<'a> {
    keywords: &'a KeywordConfig,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(keywords: &'a KeywordConfig) -> Self {
        Self { keywords }
    }

    /// Country queries in signal order, then base keywords, then one query
    /// per traffic-impact category. First occurrence of a query text wins;
    /// later duplicates only merge their signal into it.
    pub fn build(&self, signals: &[TrendSignal]) -> Vec<Query> {
        let mut acc = QueryAccumulator::default();
        let cap = self.keywords.max_keywords_per_country.unwrap_or(usize::MAX);

        for sig in signals {
            let Some(entry) = self.keywords.country(&sig.country) else {
                warn!(country = %sig.country, "no keyword entry for country, skipping signal");
                continue;
            };

            let mut texts: Vec<String> = entry.keywords.iter().take(cap).cloned().collect();
            texts.extend(
                entry
                    .topics
                    .iter()
                    .take(cap)
                    .map(|t| format!("{} {}", entry.name, t)),
            );
            texts.extend(
                self.keywords
                    .direction_topics(sig.direction)
                    .iter()
                    .map(|t| format!("{} {}", entry.name, t)),
            );

            if texts.is_empty() {
                warn!(country = %entry.name, "keyword entry is empty, skipping signal");
                continue;
            }
            for text in texts {
                acc.push_signal(text, &entry.name, sig);
            }
        }

        for kw in &self.keywords.base_keywords {
            acc.push_global(kw.clone());
        }
        // One query per impact category, in category-name order, up to the cap.
        let mut added = 0;
        for kw in self
            .keywords
            .traffic_impact_keywords
            .values()
            .filter_map(|v| v.first())
        {
            if added >= self.keywords.max_global_queries {
                break;
            }
            if acc.push_global(kw.clone()) {
                added += 1;
            }
        }

        debug!(queries = acc.queries.len(), signals = signals.len(), "queries built");
        acc.queries
    }
}

/// Lower-cased, whitespace-collapsed query text.
pub fn query_key(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Default)]
struct QueryAccumulator {
    queries: Vec<Query>,
    index: HashMap<String, usize>,
}

impl QueryAccumulator {
    fn push_signal(&mut self, text: String, country: &str, sig: &TrendSignal) {
        let key = query_key(&text);
        if key.is_empty() {
            return;
        }
        if let Some(&i) = self.index.get(&key) {
            let q = &mut self.queries[i];
            if !q.signals.contains(sig) {
                q.signals.push(sig.clone());
            }
            q.magnitude = q.magnitude.max(sig.magnitude);
            return;
        }
        self.index.insert(key, self.queries.len());
        self.queries.push(Query {
            text: text.split_whitespace().collect::<Vec<_>>().join(" "),
            country: Some(country.to_string()),
            direction: Some(sig.direction),
            magnitude: sig.magnitude,
            signals: vec![sig.clone()],
        });
    }

    /// Returns whether a new query was added.
    fn push_global(&mut self, text: String) -> bool {
        let key = query_key(&text);
        if key.is_empty() || self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.queries.len());
        self.queries.push(Query {
            text: text.split_whitespace().collect::<Vec<_>>().join(" "),
            country: None,
            direction: None,
            magnitude: 0.0,
            signals: Vec::new(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_case_and_spacing() {
        assert_eq!(query_key("  Japan   Outage "), "japan outage");
        assert_eq!(query_key("JAPAN outage"), query_key("japan  OUTAGE"));
    }
}
