use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings persisted by `whatson config set`. Environment variables take
/// precedence over anything stored here.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    pub storage_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub business_codes: Vec<String>,
    pub poll_interval_secs: Option<u64>,
}

pub fn config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .context("could not find config directory")?
        .join("whatson");
    Ok(dir.join("config.toml"))
}

impl FileConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// The stored value for an environment variable name.
    pub fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "FIREBASE_PROJECT_ID" => self.project_id.clone(),
            "FIREBASE_API_KEY" => self.api_key.clone(),
            "FIREBASE_STORAGE_BUCKET" => self.storage_bucket.clone(),
            "ALLOWED_BUSINESS_CODES" if !self.business_codes.is_empty() => {
                Some(self.business_codes.join(","))
            }
            "POLL_INTERVAL_SECS" => self.poll_interval_secs.map(|s| s.to_string()),
            // Keep stdout clean for tables and JSON.
            "LOG_FORMAT" => Some("pretty".into()),
            _ => None,
        }
    }

    /// Resolves the library config: command-line overrides first, then the
    /// process environment, then this file.
    pub fn resolve(
        &self,
        overrides: &HashMap<&'static str, String>,
    ) -> Result<whatson_sync::config::Config> {
        whatson_sync::config::Config::from_lookup(|key| {
            overrides
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
                .or_else(|| self.lookup(key))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whatson").join("config.toml");

        assert_eq!(FileConfig::load_from(&path).unwrap(), FileConfig::default());

        let cfg = FileConfig {
            project_id: Some("byron-whats-on".into()),
            business_codes: vec!["CAFEX".into(), "BREW42".into()],
            poll_interval_secs: Some(45),
            ..Default::default()
        };
        cfg.save_to(&path).unwrap();
        assert_eq!(FileConfig::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn maps_env_names() {
        let cfg = FileConfig {
            api_key: Some("k".into()),
            business_codes: vec!["A".into(), "B".into()],
            ..Default::default()
        };
        assert_eq!(cfg.lookup("FIREBASE_API_KEY").as_deref(), Some("k"));
        assert_eq!(cfg.lookup("ALLOWED_BUSINESS_CODES").as_deref(), Some("A,B"));
        assert_eq!(cfg.lookup("FIREBASE_PROJECT_ID"), None);
        assert_eq!(FileConfig::default().lookup("ALLOWED_BUSINESS_CODES"), None);
    }

    #[test]
    fn overrides_win() {
        let cfg = FileConfig {
            project_id: Some("from-file".into()),
            ..Default::default()
        };
        let mut overrides = HashMap::new();
        overrides.insert("FIREBASE_PROJECT_ID", "from-flag".to_string());
        overrides.insert("CACHE_PATH", "/tmp/whatson-cli-test.json".to_string());

        let resolved = cfg.resolve(&overrides).unwrap();
        assert_eq!(resolved.project_id, "from-flag");
    }
}
