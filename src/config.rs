use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// Bundled defaults, consulted after the process environment
const BUNDLED_CONFIG: &str = include_str!("../assets/config.env");

pub const ENDPOINT_VAR: &str = "CHAT_API_URL";
pub const DATA_DIR_VAR: &str = "ASSISTANT_DATA_DIR";
pub const LOG_LEVEL_VAR: &str = "ASSISTANT_LOG";

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api/v1/ask";
const APP_DIR_NAME: &str = "gunadarma-assistant";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub endpoint: String,
    pub data_dir: PathBuf,
    pub log_level: Level,
}

impl AppConfig {
    /// Resolve configuration from the process environment, then bundled defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| bundled_value(key))
        };

        let endpoint = value(ENDPOINT_VAR).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = endpoint.trim().to_string();
        let parsed = reqwest::Url::parse(&endpoint)
            .with_context(|| format!("{ENDPOINT_VAR} is not a valid URL: {endpoint}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("{ENDPOINT_VAR} must use http or https, got {}", parsed.scheme());
        }

        let data_dir = value(DATA_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let log_level = match value(LOG_LEVEL_VAR) {
            Some(raw) => Level::from_str(raw.trim())
                .with_context(|| format!("{LOG_LEVEL_VAR} has an unknown level: {raw}"))?,
            None => Level::INFO,
        };

        Ok(Self {
            endpoint,
            data_dir,
            log_level,
        })
    }
}

/// Load a `.env` file from the working directory if one exists.
pub fn load_dotenv() -> bool {
    dotenvy::dotenv().is_ok()
}

fn default_data_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join(APP_DIR_NAME);
    }

    PathBuf::from("cache").join(APP_DIR_NAME)
}

fn bundled_value(key: &str) -> Option<String> {
    BUNDLED_CONFIG.lines().find_map(|line| {
        let line = line.trim();
        // Skip comments and empty lines
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (k, v) = line.split_once('=')?;
        let v = v.trim();
        (k.trim() == key && !v.is_empty()).then(|| v.to_string())
    })
}
