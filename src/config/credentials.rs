// src/config/credentials.rs
use std::fmt;

use super::ProviderKind;

/// Per-provider API keys. Absent key disables that provider only.
#[derive(Clone, Default)]
pub struct Credentials {
    pub openai: Option<String>,
    pub claude: Option<String>,
    pub groq: Option<String>,
    pub deepsearch: Option<String>,
    pub naver_client_id: Option<String>,
    pub naver_client_secret: Option<String>,
}

impl Credentials {
    /// Read keys from the process environment. Empty values count as absent.
    /// `CLAUDE_API_KEY` wins over `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            openai: get("OPENAI_API_KEY"),
            claude: get("CLAUDE_API_KEY").or_else(|| get("ANTHROPIC_API_KEY")),
            groq: get("GROQ_API_KEY"),
            deepsearch: get("DEEPSEARCH_API_KEY"),
            naver_client_id: get("NAVER_CLIENT_ID"),
            naver_client_secret: get("NAVER_CLIENT_SECRET"),
        }
    }

    pub fn key_for(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::OpenAi => self.openai.as_deref(),
            ProviderKind::Claude => self.claude.as_deref(),
            ProviderKind::Groq => self.groq.as_deref(),
        }
    }

    /// Naver needs both halves of its credential pair.
    pub fn naver(&self) -> Option<(&str, &str)> {
        Some((
            self.naver_client_id.as_deref()?,
            self.naver_client_secret.as_deref()?,
        ))
    }

    pub fn available_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|k| self.key_for(*k).is_some())
            .collect()
    }
}

// Only key lengths are ever printed.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = |k: &Option<String>| k.as_ref().map(|s| s.len());
        f.debug_struct("Credentials")
            .field("openai_len", &len(&self.openai))
            .field("claude_len", &len(&self.claude))
            .field("groq_len", &len(&self.groq))
            .field("deepsearch_len", &len(&self.deepsearch))
            .field("naver_id_len", &len(&self.naver_client_id))
            .field("naver_secret_len", &len(&self.naver_client_secret))
            .finish()
    }
}
