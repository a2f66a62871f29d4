// src/model.rs
//! Data carried between pipeline stages.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rising,
    Falling,
}

/// Externally supplied indicator that a country is moving in a tracked metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    pub country: String,
    pub direction: Direction,
    #[serde(default)]
    pub magnitude: f64,
}

/// Search text handed to every adapter. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub text: String,
    /// `None` for global base keywords.
    pub country: Option<String>,
    pub direction: Option<Direction>,
    /// Max magnitude over contributing signals.
    pub magnitude: f64,
    pub signals: Vec<TrendSignal>,
}

/// One article exactly as a single adapter call produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArticle {
    pub source_id: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub snippet: String,
    /// Set by AI adapters that classify while searching.
    pub provider_category: Option<String>,
    /// Country reported by the provider, if any.
    pub country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            other => Err(format!("unknown confidence level: {other}")),
        }
    }
}

/// Raw article plus a classification and the context it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedArticle {
    pub raw: RawArticle,
    pub category: Option<String>,
    pub summary: String,
    pub confidence_hint: Confidence,
    pub country: String,
    pub magnitude: f64,
    /// Provider ids that produced or classified this article.
    pub sources: Vec<String>,
    /// Cross-validation notes.
    pub notes: Vec<String>,
}

impl ClassifiedArticle {
    pub fn add_source(&mut self, id: &str) {
        if !self.sources.iter().any(|s| s == id) {
            self.sources.push(id.to_string());
        }
    }
}

/// One row of the published dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub title: String,
    pub summary: String,
    pub url: String,
    #[serde(rename = "publishedDate")]
    pub published_date: NaiveDate,
    pub country: String,
    pub continent: String,
    pub confidence: Confidence,
    #[serde(rename = "verificationNote")]
    pub verification_note: String,
}

/// Lower-case, trim, and fold `_`/whitespace runs to `-` so that
/// "Trade Policy", "trade_policy" and "trade-policy" compare equal.
pub fn normalize_category(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_sep = false;
    for ch in s.trim().chars() {
        if ch == '_' || ch == '-' || ch.is_whitespace() {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('-');
            pending_sep = false;
        }
        out.extend(ch.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_orders_low_to_high() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
        assert_eq!(
            [Confidence::Medium, Confidence::High, Confidence::Low]
                .into_iter()
                .max(),
            Some(Confidence::High)
        );
    }

    #[test]
    fn confidence_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Confidence>().unwrap(), Confidence::High);
        assert_eq!(" medium ".parse::<Confidence>().unwrap(), Confidence::Medium);
        assert!("certain".parse::<Confidence>().is_err());
    }

    #[test]
    fn category_normalization_folds_separators() {
        assert_eq!(normalize_category("Trade Policy"), "trade-policy");
        assert_eq!(normalize_category(" trade_policy "), "trade-policy");
        assert_eq!(normalize_category("trade--policy"), "trade-policy");
        assert_eq!(normalize_category("Diplomacy"), "diplomacy");
        assert_eq!(normalize_category(""), "");
    }
}
