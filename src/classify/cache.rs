// src/classify/cache.rs
//! File cache + daily request quota around a classifier.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::classify::{Classification, Classifier};
use crate::error::SourceError;
use crate::model::RawArticle;

/// Cache hits never touch the quota; only successful real calls count.
/// A slot is reserved before each real call and returned if the call fails.
pub struct CachedClassifier<C> {
    inner: C,
    cache_dir: PathBuf,
    daily_limit: u32,
    counter: Mutex<DailyCounter>,
}

impl<C: Classifier> CachedClassifier<C> {
    pub fn new(inner: C, cache_dir: PathBuf, daily_limit: u32) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!(dir = %cache_dir.display(), error = %e, "cannot create classification cache dir");
        }
        let counter = Mutex::new(load_daily_counter(&cache_dir).unwrap_or_default());
        Self {
            inner,
            cache_dir,
            daily_limit,
            counter,
        }
    }

    /// Calls counted today.
    pub fn used_today(&self) -> u32 {
        let mut g = self.counter.lock().unwrap_or_else(|e| e.into_inner());
        g.roll_over();
        g.count
    }

    /// Count one call against today's quota. Returns the day it was counted on.
    fn reserve(&self) -> Result<String, SourceError> {
        let mut g = self.counter.lock().unwrap_or_else(|e| e.into_inner());
        g.roll_over();
        if g.count >= self.daily_limit {
            return Err(SourceError::RateLimited { retry_after: None });
        }
        g.count = g.count.saturating_add(1);
        let _ = save_daily_counter(&self.cache_dir, &g);
        Ok(g.date.clone())
    }

    /// Hand back a slot whose call failed. No-op once the day has rolled over.
    fn release(&self, day: &str) {
        let mut g = self.counter.lock().unwrap_or_else(|e| e.into_inner());
        if g.date == day {
            g.count = g.count.saturating_sub(1);
            let _ = save_daily_counter(&self.cache_dir, &g);
        }
    }
}

#[async_trait]
impl<C: Classifier> Classifier for CachedClassifier<C> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn classify(&self, article: &RawArticle) -> Result<Classification, SourceError> {
        let key = cache_key(self.id(), article);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            debug!(provider = self.id(), key = %key, "classification cache hit");
            return Ok(hit);
        }

        // The slot is taken before the call so concurrent callers cannot overrun the quota.
        let day = self.reserve()?;
        let fresh = match self.inner.classify(article).await {
            Ok(c) => c,
            Err(e) => {
                self.release(&day);
                return Err(e);
            }
        };
        if let Err(e) = write_cache_file(&self.cache_dir, &key, &fresh) {
            warn!(provider = self.id(), error = %e, "classification cache write failed");
        }
        Ok(fresh)
    }
}

/// sha256(provider, title, url), first 16 bytes as hex.
pub fn cache_key(provider: &str, article: &RawArticle) -> String {
    let mut h = Sha256::new();
    h.update(provider.as_bytes());
    h.update([0u8]);
    h.update(article.title.as_bytes());
    h.update([0u8]);
    h.update(article.url.as_bytes());
    h.finalize()[..16]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<Classification> {
    let s = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&s).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &Classification) -> io::Result<()> {
    let path = cache_path(dir, key);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp, json)?;
    fs::rename(tmp, path)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    /// Reset when the UTC day changed. Returns whether it did.
    fn roll_over(&mut self) -> bool {
        let t = today();
        if self.date != t {
            self.date = t;
            self.count = 0;
            return true;
        }
        false
    }
}

fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let p = counter_path(dir);
    let tmp = p.with_extension("json.tmp");
    let s = serde_json::to_string(dc).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp, s)?;
    fs::rename(tmp, p)
}
