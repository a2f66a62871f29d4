// src/config/keywords.rs
//! Keyword configuration: country → search keywords (+ optional topics).
//! Accepts TOML or JSON; structural problems fail fast at load time.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::Direction;

pub const ENV_KEYWORDS_PATH: &str = "KEYWORDS_PATH";

/// Validated, normalized keyword configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordConfig {
    /// Global queries issued once per run, with no country attached.
    pub base_keywords: Vec<String>,
    /// Category → keywords; the first keyword of each category becomes a global query.
    pub traffic_impact_keywords: BTreeMap<String, Vec<String>>,
    pub max_global_queries: usize,
    countries: BTreeMap<String, CountryKeywords>,
    pub rising_topics: Vec<String>,
    pub falling_topics: Vec<String>,
    pub max_keywords_per_country: Option<usize>,
    /// Titles containing any of these (case-insensitive) are dropped.
    pub exclude_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryKeywords {
    /// Country name as written in the config.
    pub name: String,
    pub keywords: Vec<String>,
    pub topics: Vec<String>,
}

impl KeywordConfig {
    /// Case-insensitive lookup by country name.
    pub fn country(&self, name: &str) -> Option<&CountryKeywords> {
        self.countries.get(&country_key(name))
    }

    pub fn direction_topics(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Rising => &self.rising_topics,
            Direction::Falling => &self.falling_topics,
        }
    }

    pub fn is_excluded(&self, title: &str) -> bool {
        if self.exclude_keywords.is_empty() {
            return false;
        }
        let t = title.to_lowercase();
        self.exclude_keywords
            .iter()
            .any(|kw| t.contains(&kw.to_lowercase()))
    }

    /// Build from an in-memory country map (mainly for tests and embedding).
    pub fn from_countries<I, S, K>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, Vec<K>)>,
        S: Into<String>,
        K: Into<String>,
    {
        let raw = RawKeywordConfig {
            countries: entries
                .into_iter()
                .map(|(c, kws)| {
                    (
                        c.into(),
                        RawCountryEntry::List(kws.into_iter().map(Into::into).collect()),
                    )
                })
                .collect(),
            ..RawKeywordConfig::default()
        };
        raw.validate()
    }
}

/// Load from an explicit path. The extension picks the format; unknown
/// extensions try TOML, then JSON.
pub fn load_keywords_from(path: &Path) -> Result<KeywordConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let raw = parse_keywords(&content, &ext).map_err(|message| ConfigError::Format {
        path: path.display().to_string(),
        message,
    })?;
    raw.validate()
}

/// Load using env var + fallbacks:
/// 1) $KEYWORDS_PATH (must exist)
/// 2) config/keywords.toml
/// 3) config/keywords.json
pub fn load_keywords_default() -> Result<KeywordConfig, ConfigError> {
    if let Ok(p) = std::env::var(ENV_KEYWORDS_PATH) {
        return load_keywords_from(Path::new(&p));
    }
    for candidate in ["config/keywords.toml", "config/keywords.json"] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_keywords_from(&pb);
        }
    }
    Err(ConfigError::Invalid(
        "no keyword configuration found (set KEYWORDS_PATH or add config/keywords.toml)".into(),
    ))
}

fn parse_keywords(s: &str, hint_ext: &str) -> Result<RawKeywordConfig, String> {
    match hint_ext {
        "toml" => toml::from_str(s).map_err(|e| e.to_string()),
        "json" => serde_json::from_str(s).map_err(|e| e.to_string()),
        _ => match toml::from_str(s) {
            Ok(v) => Ok(v),
            Err(toml_err) => serde_json::from_str(s)
                .map_err(|json_err| format!("not TOML ({toml_err}) nor JSON ({json_err})")),
        },
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawKeywordConfig {
    base_keywords: Vec<String>,
    traffic_impact_keywords: BTreeMap<String, Vec<String>>,
    max_global_queries: Option<usize>,
    #[serde(alias = "priority_countries")]
    countries: BTreeMap<String, RawCountryEntry>,
    rising_topics: Vec<String>,
    falling_topics: Vec<String>,
    max_keywords_per_country: Option<usize>,
    exclude_keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCountryEntry {
    List(Vec<String>),
    Detailed {
        #[serde(default)]
        keywords: Vec<String>,
        #[serde(default)]
        topics: Vec<String>,
    },
}

impl RawKeywordConfig {
    fn validate(self) -> Result<KeywordConfig, ConfigError> {
        if self.max_keywords_per_country == Some(0) {
            return Err(ConfigError::Invalid(
                "max_keywords_per_country must be > 0".into(),
            ));
        }

        let mut countries = BTreeMap::new();
        for (name, entry) in self.countries {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::Invalid("empty country name".into()));
            }
            let (keywords, topics) = match entry {
                RawCountryEntry::List(k) => (k, Vec::new()),
                RawCountryEntry::Detailed { keywords, topics } => (keywords, topics),
            };
            let ck = CountryKeywords {
                name: name.clone(),
                keywords: clean_list(keywords),
                topics: clean_list(topics),
            };
            if countries.insert(country_key(&name), ck).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "country {name:?} listed more than once"
                )));
            }
        }

        Ok(KeywordConfig {
            base_keywords: clean_list(self.base_keywords),
            traffic_impact_keywords: self
                .traffic_impact_keywords
                .into_iter()
                .map(|(k, v)| (k, clean_list(v)))
                .collect(),
            max_global_queries: self.max_global_queries.unwrap_or(15),
            countries,
            rising_topics: clean_list(self.rising_topics),
            falling_topics: clean_list(self.falling_topics),
            max_keywords_per_country: self.max_keywords_per_country,
            exclude_keywords: clean_list(self.exclude_keywords),
        })
    }
}

fn country_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Trim, drop empties, drop exact duplicates; keeps order.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}
