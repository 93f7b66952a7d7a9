//! CLI configuration handling.
//!
//! Settings come from `tuyalink.toml` in the platform config directory (or
//! the file given with `--config`), then `TUYA_*` environment variables on
//! top.

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tuyalink_core::{ClientConfig, DEFAULT_BASE_URL, Secret};

pub const ENV_BASE_URL: &str = "TUYA_BASE_URL";
pub const ENV_CLIENT_ID: &str = "TUYA_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "TUYA_CLIENT_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Cloud data center, e.g. https://openapi.tuyaus.com
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Project access id.
    #[serde(default)]
    pub client_id: String,

    /// Project access secret.
    #[serde(default)]
    pub client_secret: Option<Secret>,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Logging level used when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub concurrency_limit: Option<usize>,

    #[serde(default)]
    pub device_page_size: Option<u32>,

    #[serde(default)]
    pub aggregate_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            client_id: String::new(),
            client_secret: None,
            config_path: PathBuf::new(),
            log_level: default_log_level(),
            request_timeout_secs: None,
            concurrency_limit: None,
            device_page_size: None,
            aggregate_timeout_secs: None,
        }
    }
}

impl CliConfig {
    /// Overlay non-empty `TUYA_*` values returned by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = get(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(client_id) = get(ENV_CLIENT_ID) {
            self.client_id = client_id;
        }
        if let Some(secret) = get(ENV_CLIENT_SECRET) {
            self.client_secret = Some(Secret::new(secret));
        }
    }

    /// Build the library configuration, failing on missing credentials.
    pub fn to_client_config(&self) -> Result<ClientConfig> {
        if self.client_id.trim().is_empty() {
            bail!(
                "client_id is not set; add it to {:?} or set {}",
                self.config_path,
                ENV_CLIENT_ID
            );
        }
        let secret = match &self.client_secret {
            Some(secret) if !secret.is_blank() => secret.clone(),
            _ => bail!(
                "client_secret is not set; add it to {:?} or set {}",
                self.config_path,
                ENV_CLIENT_SECRET
            ),
        };

        let mut config = ClientConfig::new(&self.base_url, &self.client_id, secret);
        if let Some(secs) = self.request_timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(limit) = self.concurrency_limit {
            config = config.with_concurrency_limit(limit);
        }
        if let Some(page_size) = self.device_page_size {
            config = config.with_device_page_size(page_size);
        }
        if let Some(secs) = self.aggregate_timeout_secs {
            config = config.with_aggregate_timeout(Duration::from_secs(secs));
        }

        config.validate().context("Invalid client configuration")?;
        Ok(config)
    }
}

/// Load configuration from `explicit` or the default location.
///
/// An explicit path must exist; a missing default file just means defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig> {
    let mut config = read_config(explicit)?;
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

fn read_config(explicit: Option<&Path>) -> Result<CliConfig> {
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Config file {:?} does not exist", path);
            }
            path.to_path_buf()
        }
        None => default_config_path(),
    };

    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        CliConfig::default()
    };

    config.config_path = config_path;
    Ok(config)
}

pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("tuyalink.toml"))
        .unwrap_or_else(|| PathBuf::from("tuyalink.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "raibid-labs", "tuyalink")
}
