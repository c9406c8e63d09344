use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FunclogsError, Result};
use crate::executor::ErrorClassification;

pub const CREDENTIALS_ENV_VAR: &str = "GOOGLE_SERVICE_ACCOUNT_CREDENTIALS_PATH";

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub listen_addr: String,
    pub db_path: PathBuf,
    pub credentials_path: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub project_id: Option<String>,
    pub logging_endpoint: String,
    pub token_uri: Option<String>,
    pub backend_timeout: Duration,
    pub page_size: u32,
    pub error_classification: ErrorClassification,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("db_path", &self.db_path)
            .field("credentials_path", &self.credentials_path)
            .field("access_token", &self.access_token.as_ref().map(|_| ".."))
            .field("project_id", &self.project_id)
            .field("logging_endpoint", &self.logging_endpoint)
            .field("token_uri", &self.token_uri)
            .field("backend_timeout", &self.backend_timeout)
            .field("page_size", &self.page_size)
            .field("error_classification", &self.error_classification)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let data_root = env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(home).join(".local/share"));

        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            db_path: data_root.join("funclogs/funclogs.duckdb"),
            credentials_path: None,
            access_token: None,
            project_id: None,
            logging_endpoint: "https://logging.googleapis.com".to_string(),
            token_uri: None,
            backend_timeout: Duration::from_secs(30),
            page_size: 1000,
            error_classification: ErrorClassification::Narrow,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(FunclogsError::Config(
                "page_size must be greater than zero".to_string(),
            ));
        }
        if !(self.logging_endpoint.starts_with("http://")
            || self.logging_endpoint.starts_with("https://"))
        {
            return Err(FunclogsError::Config(format!(
                "logging_endpoint must be an http(s) URL, got {}",
                self.logging_endpoint
            )));
        }
        Ok(())
    }
}

#[derive(Default, Deserialize)]
struct ConfigOverrides {
    listen_addr: Option<String>,
    db_path: Option<PathBuf>,
    credentials_path: Option<PathBuf>,
    access_token: Option<String>,
    project_id: Option<String>,
    logging_endpoint: Option<String>,
    token_uri: Option<String>,
    backend_timeout: Option<String>,
    page_size: Option<u32>,
    error_classification: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("FUNCLOGS_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("funclogs/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| FunclogsError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| FunclogsError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let page_size = match env::var("FUNCLOGS_PAGE_SIZE") {
        Ok(v) => Some(v.parse::<u32>().map_err(|e| {
            FunclogsError::Config(format!("bad FUNCLOGS_PAGE_SIZE in environment: {e}"))
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        listen_addr: env::var("FUNCLOGS_LISTEN_ADDR").ok(),
        db_path: env::var("FUNCLOGS_DB_PATH").ok().map(PathBuf::from),
        credentials_path: env::var(CREDENTIALS_ENV_VAR).ok().map(PathBuf::from),
        access_token: env::var("FUNCLOGS_ACCESS_TOKEN").ok(),
        project_id: env::var("FUNCLOGS_PROJECT_ID").ok(),
        logging_endpoint: env::var("FUNCLOGS_LOGGING_ENDPOINT").ok(),
        token_uri: env::var("FUNCLOGS_TOKEN_URI").ok(),
        backend_timeout: env::var("FUNCLOGS_BACKEND_TIMEOUT").ok(),
        page_size,
        error_classification: env::var("FUNCLOGS_ERROR_CLASSIFICATION").ok(),
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.listen_addr {
        cfg.listen_addr = v;
    }
    if let Some(v) = overrides.db_path {
        cfg.db_path = v;
    }
    if let Some(v) = overrides.credentials_path {
        cfg.credentials_path = Some(v);
    }
    if let Some(v) = overrides.access_token.filter(|v| !v.is_empty()) {
        cfg.access_token = Some(v);
    }
    if let Some(v) = overrides.project_id {
        cfg.project_id = Some(v);
    }
    if let Some(v) = overrides.logging_endpoint {
        cfg.logging_endpoint = v.trim_end_matches('/').to_string();
    }
    if let Some(v) = overrides.token_uri {
        cfg.token_uri = Some(v);
    }
    if let Some(v) = overrides.backend_timeout {
        cfg.backend_timeout = humantime::parse_duration(&v).map_err(|e| {
            FunclogsError::Config(format!("bad backend_timeout in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.page_size {
        cfg.page_size = v;
    }
    if let Some(v) = overrides.error_classification {
        cfg.error_classification = v.parse().map_err(|e| {
            FunclogsError::Config(format!("bad error_classification in {source}: {e}"))
        })?;
    }
    Ok(())
}
