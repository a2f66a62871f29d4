// src/llm.rs
//! Chat transport for the AI providers. OpenAI and Groq share the
//! chat-completions wire format; Claude uses the messages API.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{ProviderKind, ProviderSettings};
use crate::error::{retry_after_from, SourceError};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const USER_AGENT: &str = "trend-news-collector/0.1";

static RE_JSON_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());
static RE_JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

pub struct ChatClient {
    kind: ProviderKind,
    http: reqwest::Client,
    api_key: String,
    settings: ProviderSettings,
}

impl ChatClient {
    pub fn new(
        kind: ProviderKind,
        api_key: impl Into<String>,
        settings: ProviderSettings,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            kind,
            http,
            api_key: api_key.into(),
            settings,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// One request, one reply text. No retries here.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, SourceError> {
        if self.api_key.is_empty() {
            return Err(SourceError::Auth(format!("{} key missing", self.kind.id())));
        }
        match self.kind {
            ProviderKind::OpenAi | ProviderKind::Groq => {
                self.chat_completions(system, user, max_tokens).await
            }
            ProviderKind::Claude => self.messages(system, user, max_tokens).await,
        }
    }

    async fn chat_completions(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, SourceError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model: &self.settings.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            max_tokens,
        };

        let resp = self
            .http
            .post(&self.settings.base_url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::from_status(
                status,
                retry_after_from(resp.headers()),
            ));
        }
        let body: Resp = resp.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| SourceError::Parse("empty completion".into()))
    }

    async fn messages(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, SourceError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            system: &'a str,
            messages: Vec<Msg<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            content: Vec<Block>,
        }
        #[derive(Deserialize)]
        struct Block {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            text: String,
        }

        let req = Req {
            model: &self.settings.model,
            max_tokens,
            system,
            messages: vec![Msg {
                role: "user",
                content: user,
            }],
        };

        let resp = self
            .http
            .post(&self.settings.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&req)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::from_status(
                status,
                retry_after_from(resp.headers()),
            ));
        }
        let body: Resp = resp.json().await?;
        let text: String = body
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(SourceError::Parse("empty message content".into()));
        }
        Ok(text)
    }
}

/// First `[` … last `]` of a model reply (models like to wrap JSON in prose or fences).
pub fn extract_json_array(reply: &str) -> Option<&str> {
    RE_JSON_ARRAY.find(reply).map(|m| m.as_str())
}

/// First `{` … last `}` of a model reply.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    RE_JSON_OBJECT.find(reply).map(|m| m.as_str())
}
