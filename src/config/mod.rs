// src/config/mod.rs
//! Typed run configuration. Loaded once at startup and passed explicitly
//! into the pipeline; components never read the environment themselves.

pub mod credentials;
pub mod keywords;
pub mod signals;

pub use credentials::Credentials;
pub use keywords::{CountryKeywords, KeywordConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

pub const ENV_PIPELINE_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_PIPELINE_CONFIG_PATH: &str = "config/pipeline.toml";

/// AI providers able to classify (and optionally search).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Claude,
    Groq,
}

impl ProviderKind {
    /// Fallback order when picking a secondary classifier.
    pub const ALL: [ProviderKind; 3] = [ProviderKind::OpenAi, ProviderKind::Claude, ProviderKind::Groq];

    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
            ProviderKind::Groq => "groq",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub output_path: PathBuf,
    pub cache_dir: PathBuf,
    /// When set, the Prometheus exposition text is written here after a run.
    pub metrics_path: Option<PathBuf>,
    /// Max articles per adapter call.
    pub per_query_limit: usize,
    pub pipeline_timeout_secs: u64,
    pub article_timeout_secs: u64,
    pub max_concurrent_fetches: usize,
    pub max_concurrent_classifications: usize,
    /// Classify with the only available provider when cross-validation cannot run.
    pub classify_single: bool,
    pub cross_validation: CrossValidationConfig,
    pub rss: RssConfig,
    pub deepsearch: DeepSearchConfig,
    pub naver: NaverConfig,
    pub retry: RetrySettings,
    /// AI providers also used as search adapters.
    pub llm_search: Vec<ProviderKind>,
    pub providers: ProvidersConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("data/news.csv"),
            cache_dir: PathBuf::from("cache/classify"),
            metrics_path: None,
            per_query_limit: 10,
            pipeline_timeout_secs: 600,
            article_timeout_secs: 45,
            max_concurrent_fetches: 8,
            max_concurrent_classifications: 4,
            classify_single: true,
            cross_validation: CrossValidationConfig::default(),
            rss: RssConfig::default(),
            deepsearch: DeepSearchConfig::default(),
            naver: NaverConfig::default(),
            retry: RetrySettings::default(),
            llm_search: Vec::new(),
            providers: ProvidersConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossValidationConfig {
    pub enabled: bool,
    pub primary: ProviderKind,
    pub secondary: Option<ProviderKind>,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            primary: ProviderKind::OpenAi,
            secondary: Some(ProviderKind::Claude),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RssConfig {
    pub enabled: bool,
    pub base_url: String,
    pub hl: String,
    pub gl: String,
    /// Items older than this are dropped. `None` keeps everything.
    pub max_age_hours: Option<u64>,
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://news.google.com/rss/search".to_string(),
            hl: "en".to_string(),
            gl: "US".to_string(),
            max_age_hours: Some(24),
            min_interval_ms: 1_000,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepSearchConfig {
    pub base_url: String,
    /// Search window ending today.
    pub days: u32,
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for DeepSearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-v2.deepsearch.com/v1/global-articles".to_string(),
            days: 1,
            min_interval_ms: 1_000,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NaverConfig {
    pub base_url: String,
    /// Items whose title or description contains any of these are dropped.
    pub negative_keywords: Vec<String>,
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for NaverConfig {
    fn default() -> Self {
        let negative_keywords = [
            // marketing
            "캠페인", "프로모션", "이벤트", "출시", "신제품", "할인", "세일", "팝업", "콜라보",
            "campaign", "promotion", "launch", "sale", "popup", "collaboration",
            // entertainment
            "걸그룹", "보이그룹", "아이돌", "콘서트", "앨범", "뮤직비디오", "팬미팅",
            // lifestyle and brands
            "패션", "뷰티", "화장품", "의류", "쇼핑",
        ];
        Self {
            base_url: "https://openapi.naver.com/v1/search/news.json".to_string(),
            negative_keywords: negative_keywords.iter().map(|s| s.to_string()).collect(),
            // 10 requests per second
            min_interval_ms: 100,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    /// Longest Retry-After we are willing to sleep for.
    pub max_rate_limit_wait_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ms: 250,
            max_rate_limit_wait_secs: 60,
        }
    }
}

/// Effective settings for one AI provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub model: String,
    pub base_url: String,
    pub daily_limit: u32,
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
}

impl ProviderSettings {
    pub fn builtin(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenAi => Self {
                model: "gpt-4o-mini".to_string(),
                base_url: "https://api.openai.com/v1/chat/completions".to_string(),
                daily_limit: 500,
                min_interval_ms: 200,
                timeout_secs: 30,
            },
            ProviderKind::Claude => Self {
                model: "claude-3-5-sonnet-20241022".to_string(),
                base_url: "https://api.anthropic.com/v1/messages".to_string(),
                daily_limit: 500,
                min_interval_ms: 500,
                timeout_secs: 30,
            },
            ProviderKind::Groq => Self {
                model: "llama-3.3-70b-versatile".to_string(),
                base_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
                daily_limit: 1_000,
                // 30 requests per minute on the free tier
                min_interval_ms: 2_000,
                timeout_secs: 30,
            },
        }
    }
}

/// Per-provider overrides from `[providers.<name>]`; unset keys keep the built-ins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub daily_limit: Option<u32>,
    pub min_interval_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderOverrides,
    pub claude: ProviderOverrides,
    pub groq: ProviderOverrides,
}

impl ProvidersConfig {
    pub fn settings(&self, kind: ProviderKind) -> ProviderSettings {
        let o = match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Claude => &self.claude,
            ProviderKind::Groq => &self.groq,
        };
        let mut s = ProviderSettings::builtin(kind);
        if let Some(m) = &o.model {
            s.model = m.clone();
        }
        if let Some(u) = &o.base_url {
            s.base_url = u.clone();
        }
        if let Some(n) = o.daily_limit {
            s.daily_limit = n;
        }
        if let Some(ms) = o.min_interval_ms {
            s.min_interval_ms = ms;
        }
        if let Some(t) = o.timeout_secs {
            s.timeout_secs = t;
        }
        s
    }
}

impl PipelineConfig {
    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline_timeout_secs)
    }

    pub fn article_timeout(&self) -> Duration {
        Duration::from_secs(self.article_timeout_secs)
    }

    /// Load from an explicit TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let cfg: PipelineConfig = toml::from_str(&content).map_err(|e| ConfigError::Format {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallback:
    /// 1) $PIPELINE_CONFIG_PATH (must exist)
    /// 2) config/pipeline.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(p) = std::env::var(ENV_PIPELINE_CONFIG_PATH) {
            return Self::load_from(Path::new(&p));
        }
        let p = PathBuf::from(DEFAULT_PIPELINE_CONFIG_PATH);
        if p.exists() {
            return Self::load_from(&p);
        }
        info!(path = DEFAULT_PIPELINE_CONFIG_PATH, "pipeline config not found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_query_limit == 0 {
            return Err(ConfigError::Invalid("per_query_limit must be > 0".into()));
        }
        if self.pipeline_timeout_secs == 0 || self.article_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be > 0".into()));
        }
        if self.max_concurrent_fetches == 0 || self.max_concurrent_classifications == 0 {
            return Err(ConfigError::Invalid("concurrency limits must be > 0".into()));
        }
        if self.cross_validation.secondary == Some(self.cross_validation.primary) {
            return Err(ConfigError::Invalid(
                "cross_validation.primary and secondary must differ".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.base_delay_ms exceeds retry.max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}
