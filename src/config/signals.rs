// src/config/signals.rs
//! Trend signal input: JSON array of `{country, direction, magnitude}`
//! (or an object with a `signals` array).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;
use crate::model::TrendSignal;

pub const ENV_SIGNALS_PATH: &str = "TREND_SIGNALS_PATH";
pub const DEFAULT_SIGNALS_PATH: &str = "config/trend_signals.json";

#[derive(Deserialize)]
#[serde(untagged)]
enum SignalsDoc {
    List(Vec<TrendSignal>),
    Wrapped { signals: Vec<TrendSignal> },
}

pub fn parse_signals(s: &str) -> Result<Vec<TrendSignal>, String> {
    let doc: SignalsDoc = serde_json::from_str(s).map_err(|e| e.to_string())?;
    let signals = match doc {
        SignalsDoc::List(v) | SignalsDoc::Wrapped { signals: v } => v,
    };
    for (i, sig) in signals.iter().enumerate() {
        if sig.country.trim().is_empty() {
            return Err(format!("signal #{i} has an empty country"));
        }
        if !sig.magnitude.is_finite() {
            return Err(format!("signal #{i} has a non-finite magnitude"));
        }
    }
    Ok(signals)
}

pub fn load_signals_from(path: &Path) -> Result<Vec<TrendSignal>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_signals(&content).map_err(|message| ConfigError::Format {
        path: path.display().to_string(),
        message,
    })
}

/// $TREND_SIGNALS_PATH (must exist), else config/trend_signals.json, else no signals.
pub fn load_signals_default() -> Result<Vec<TrendSignal>, ConfigError> {
    if let Ok(p) = std::env::var(ENV_SIGNALS_PATH) {
        return load_signals_from(Path::new(&p));
    }
    let pb = PathBuf::from(DEFAULT_SIGNALS_PATH);
    if pb.exists() {
        return load_signals_from(&pb);
    }
    warn!(path = DEFAULT_SIGNALS_PATH, "no trend signals file, only global keywords will run");
    Ok(Vec::new())
}
