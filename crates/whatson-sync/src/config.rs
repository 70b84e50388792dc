use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_STORAGE_URL: &str = "https://firebasestorage.googleapis.com/v0";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

/// How the poller decides that the events collection has grown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeDetection {
    /// Fire only when the event count went up since the last observation.
    /// A delete plus an insert inside one interval is not noticed.
    #[default]
    Count,
    /// Fire when any identifier not seen before shows up.
    NewIdentifiers,
}

impl FromStr for ChangeDetection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(Self::Count),
            "ids" | "identifiers" | "new_identifiers" => Ok(Self::NewIdentifiers),
            other => bail!("unknown change detection mode: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => bail!("unknown log format: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub project_id: String,
    pub api_key: Option<String>,
    pub auth_token: Option<String>,
    pub storage_bucket: String,
    pub firestore_url: String,
    pub storage_url: String,
    pub geocoder_url: String,
    pub cache_path: PathBuf,
    pub poll_interval: Duration,
    pub change_detection: ChangeDetection,
    pub request_timeout: Duration,
    pub allowed_business_codes: Vec<String>,
    pub otlp_endpoint: Option<String>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so callers can layer other
    /// sources (a config file) underneath the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let project_id = var("FIREBASE_PROJECT_ID").context("FIREBASE_PROJECT_ID required")?;
        let storage_bucket = var("FIREBASE_STORAGE_BUCKET")
            .unwrap_or_else(|| format!("{project_id}.appspot.com"));
        let cache_path = match var("CACHE_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_cache_path()?,
        };

        Ok(Self {
            api_key: var("FIREBASE_API_KEY"),
            auth_token: var("FIREBASE_AUTH_TOKEN"),
            storage_bucket,
            firestore_url: var("FIRESTORE_BASE_URL").unwrap_or_else(|| DEFAULT_FIRESTORE_URL.into()),
            storage_url: var("FIREBASE_STORAGE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_STORAGE_URL.into()),
            geocoder_url: var("GEOCODER_URL").unwrap_or_else(|| DEFAULT_GEOCODER_URL.into()),
            cache_path,
            poll_interval: poll_interval(var("POLL_INTERVAL_SECS"))?,
            change_detection: var("POLL_CHANGE_DETECTION")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            request_timeout: Duration::from_secs(
                var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|| "30".into())
                    .parse()
                    .context("REQUEST_TIMEOUT_SECS must be a number of seconds")?,
            ),
            allowed_business_codes: var("ALLOWED_BUSINESS_CODES")
                .map(|codes| {
                    codes
                        .split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            otlp_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT"),
            log_format: var("LOG_FORMAT").map(|v| v.parse()).transpose()?.unwrap_or_default(),
            project_id,
        })
    }
}

fn poll_interval(raw: Option<String>) -> Result<Duration> {
    let secs: u64 = raw
        .unwrap_or_else(|| "30".into())
        .parse()
        .context("POLL_INTERVAL_SECS must be a number of seconds")?;
    if secs == 0 {
        bail!("POLL_INTERVAL_SECS must be at least 1");
    }
    Ok(Duration::from_secs(secs))
}

fn default_cache_path() -> Result<PathBuf> {
    let dir = dirs::data_dir()
        .context("could not find data directory")?
        .join("whatson");
    Ok(dir.join("cache.json"))
}
