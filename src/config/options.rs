// src/config/options.rs
use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;

use super::consts::*;
use crate::error::ConfigError;
use crate::window::Band;

pub const ENV_SOURCE_URL: &str = "CLAN_WATCH_SOURCE_URL";
pub const ENV_STORE_PATH: &str = "CLAN_WATCH_STORE_PATH";
pub const ENV_OUT_DIR: &str = "CLAN_WATCH_OUT_DIR";
pub const ENV_TIMEOUT: &str = "CLAN_WATCH_HTTP_TIMEOUT_SECS";
pub const ENV_WINDOW_HOURS: &str = "CLAN_WATCH_WINDOW_HOURS";
pub const ENV_RETENTION_DAYS: &str = "CLAN_WATCH_RETENTION_DAYS";
pub const ENV_RETENTION_MODE: &str = "CLAN_WATCH_RETENTION";

/// How old observations leave the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetentionMode {
    /// Drop the whole artifact once the container is older than the retention age.
    Wholesale,
    /// Keep the artifact, drop individual observations older than the retention age.
    PerEntry,
}

impl RetentionMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wholesale" => Some(RetentionMode::Wholesale),
            "per-entry" | "per_entry" | "perentry" => Some(RetentionMode::PerEntry),
            _ => None,
        }
    }
}

/// One chart: which ranks go in, what it is called, where the PNG lands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartSpec {
    pub band: Band,
    pub title: String,
    pub file_name: String,
}

impl ChartSpec {
    pub fn new(band: Band, title: &str, file_name: &str) -> Self {
        Self { band, title: title.to_string(), file_name: file_name.to_string() }
    }
}

pub fn default_charts() -> Vec<ChartSpec> {
    vec![
        ChartSpec::new(Band::new(1, 5), CHART_TITLE, "top_5_clans_rankings.png"),
        ChartSpec::new(Band::new(6, 10), CHART_TITLE, "top_6_to_10_clans_rankings.png"),
    ]
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunOptions {
    pub source_url: String,
    pub store_path: PathBuf,
    pub out_dir: PathBuf,
    pub webhook_url: Option<String>,
    pub http_timeout: Duration,
    pub max_entries: usize,
    pub window: TimeDelta,
    pub retention: TimeDelta,
    pub retention_mode: RetentionMode,
    pub caption: String,
    pub charts: Vec<ChartSpec>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            source_url: SOURCE_URL.to_string(),
            store_path: PathBuf::from(STORE_DIR).join(STORE_FILE),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            webhook_url: None,
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            max_entries: MAX_ENTRIES,
            window: TimeDelta::hours(WINDOW_HOURS),
            retention: TimeDelta::days(RETENTION_DAYS),
            retention_mode: RetentionMode::Wholesale,
            caption: CHART_CAPTION.to_string(),
            charts: default_charts(),
        }
    }
}

impl RunOptions {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each known variable.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut opts = Self::default();

        if let Some(url) = get(ENV_SOURCE_URL) {
            opts.source_url = url;
        }
        if let Some(p) = get(ENV_STORE_PATH) {
            opts.store_path = PathBuf::from(p);
        }
        if let Some(p) = get(ENV_OUT_DIR) {
            opts.out_dir = PathBuf::from(p);
        }
        opts.webhook_url = get(WEBHOOK_ENV);

        if let Some(v) = get(ENV_TIMEOUT) {
            let secs = parse_positive(ENV_TIMEOUT, &v)?;
            opts.http_timeout = Duration::from_secs(secs as u64);
        }
        if let Some(v) = get(ENV_WINDOW_HOURS) {
            opts.window = TimeDelta::hours(parse_positive(ENV_WINDOW_HOURS, &v)?);
        }
        if let Some(v) = get(ENV_RETENTION_DAYS) {
            opts.retention = TimeDelta::days(parse_positive(ENV_RETENTION_DAYS, &v)?);
        }
        if let Some(v) = get(ENV_RETENTION_MODE) {
            opts.retention_mode = RetentionMode::parse(&v).ok_or_else(|| ConfigError::Invalid {
                var: ENV_RETENTION_MODE,
                value: v.clone(),
                reason: "expected `wholesale` or `per-entry`".to_string(),
            })?;
        }

        Ok(opts)
    }
}

// Capped at ten years worth of hours so the TimeDelta constructors never overflow.
fn parse_positive(var: &'static str, value: &str) -> Result<i64, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let n: i64 = value.parse().map_err(|_| invalid("not an integer"))?;
    if n <= 0 {
        return Err(invalid("must be greater than zero"));
    }
    if n > 87_600 {
        return Err(invalid("too large"));
    }
    Ok(n)
}
