//! Configuration management for the ebdeploy CLI.
//!
//! Values come from defaults, then `.ebdeploy.toml` (or `--config`), then
//! `EBDEPLOY_*` environment variables, then command line flags.

use anyhow::{Context, bail};
use ebdeploy_core::{
    DatabaseSettings, FetchSettings, LogConfig, LogFormat, NetworkSettings, PlatformSettings,
    PollPolicy, ProvisionSettings, RetryPolicy,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = ".ebdeploy.toml";

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where prompts are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UiMode {
    /// Interactive terminal prompts
    #[default]
    Terminal,
    /// Relay prompts through the local prompt daemon
    Daemon,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub mode: UiMode,

    /// Prompt daemon base URL; the port comes from `SDK_SPEAK_PORT`
    #[serde(default = "default_daemon_url")]
    pub daemon_url: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            mode: UiMode::default(),
            daemon_url: default_daemon_url(),
        }
    }
}

fn default_daemon_url() -> String {
    "http://127.0.0.1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_web_base")]
    pub web_base: String,

    /// Where archives are downloaded and unpacked
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            web_base: default_web_base(),
            work_dir: default_work_dir(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_web_base() -> String {
    "https://github.com".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_allocated_storage_gb")]
    pub allocated_storage_gb: i32,

    #[serde(default = "default_instance_class")]
    pub instance_class: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Readiness checks before giving up; 0 waits indefinitely
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Port opened from the environment to the database
    #[serde(default = "default_db_port")]
    pub port: u16,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            allocated_storage_gb: default_allocated_storage_gb(),
            instance_class: default_instance_class(),
            poll_interval_secs: default_poll_interval_secs(),
            max_polls: default_max_polls(),
            port: default_db_port(),
        }
    }
}

fn default_allocated_storage_gb() -> i32 {
    5
}

fn default_instance_class() -> String {
    "db.t3.micro".to_string()
}

fn default_poll_interval_secs() -> u64 {
    15
}

fn default_max_polls() -> u32 {
    240
}

fn default_db_port() -> u16 {
    5432
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_deploy_interval_secs")]
    pub deploy_interval_secs: u64,

    #[serde(default = "default_deploy_max_retries")]
    pub deploy_max_retries: u32,

    #[serde(default = "default_go_stack")]
    pub go_stack: String,

    #[serde(default = "default_node_stack")]
    pub node_stack: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            deploy_interval_secs: default_deploy_interval_secs(),
            deploy_max_retries: default_deploy_max_retries(),
            go_stack: default_go_stack(),
            node_stack: default_node_stack(),
        }
    }
}

fn default_deploy_interval_secs() -> u64 {
    30
}

fn default_deploy_max_retries() -> u32 {
    20
}

fn default_go_stack() -> String {
    PlatformSettings::default().go_stack
}

fn default_node_stack() -> String {
    PlatformSettings::default().node_stack
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Command line arguments (applied by the caller)
    /// 2. Environment variables
    /// 3. Configuration file (`path`, or `.ebdeploy.toml` when present)
    /// 4. Default values
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                // Logging is not initialised yet, so a bad file is an error
                if default_path.exists() {
                    Config::from_file(default_path)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Override values from `EBDEPLOY_*` variables
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(mode) = var("EBDEPLOY_UI_MODE") {
            self.ui.mode = match mode.to_lowercase().as_str() {
                "terminal" => UiMode::Terminal,
                "daemon" => UiMode::Daemon,
                other => bail!("Invalid EBDEPLOY_UI_MODE: {}", other),
            };
        }
        if let Some(url) = var("EBDEPLOY_DAEMON_URL") {
            self.ui.daemon_url = url;
        }
        if let Some(api_base) = var("EBDEPLOY_GITHUB_API_BASE") {
            self.github.api_base = api_base;
        }
        if let Some(web_base) = var("EBDEPLOY_GITHUB_WEB_BASE") {
            self.github.web_base = web_base;
        }
        if let Some(work_dir) = var("EBDEPLOY_WORK_DIR") {
            self.github.work_dir = PathBuf::from(work_dir);
        }
        if let Some(class) = var("EBDEPLOY_DB_INSTANCE_CLASS") {
            self.database.instance_class = class;
        }
        if let Some(value) = var("EBDEPLOY_DB_POLL_INTERVAL_SECS") {
            self.database.poll_interval_secs = parse_var("EBDEPLOY_DB_POLL_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = var("EBDEPLOY_DB_MAX_POLLS") {
            self.database.max_polls = parse_var("EBDEPLOY_DB_MAX_POLLS", &value)?;
        }
        if let Some(value) = var("EBDEPLOY_DEPLOY_INTERVAL_SECS") {
            self.platform.deploy_interval_secs = parse_var("EBDEPLOY_DEPLOY_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = var("EBDEPLOY_DEPLOY_MAX_RETRIES") {
            self.platform.deploy_max_retries = parse_var("EBDEPLOY_DEPLOY_MAX_RETRIES", &value)?;
        }
        if let Some(level) = var("EBDEPLOY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("EBDEPLOY_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                other => bail!("Invalid EBDEPLOY_LOG_FORMAT: {}", other),
            };
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            ("ui.daemon_url", &self.ui.daemon_url),
            ("github.api_base", &self.github.api_base),
            ("github.web_base", &self.github.web_base),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("Invalid {}: must start with http:// or https://", name);
            }
        }

        if self.database.poll_interval_secs == 0 {
            bail!("database.poll_interval_secs must be greater than 0");
        }
        if self.database.allocated_storage_gb <= 0 {
            bail!("database.allocated_storage_gb must be greater than 0");
        }
        if self.platform.deploy_interval_secs == 0 {
            bail!("platform.deploy_interval_secs must be greater than 0");
        }
        if self.platform.go_stack.trim().is_empty() || self.platform.node_stack.trim().is_empty() {
            bail!("Solution stack names cannot be empty");
        }
        if self.database.instance_class.trim().is_empty() {
            bail!("database.instance_class cannot be empty");
        }
        ebdeploy_core::parse_log_level(&self.logging.level)?;

        Ok(())
    }

    /// Settings for the provisioning pipelines
    pub fn provision_settings(&self) -> ProvisionSettings {
        let max_polls = (self.database.max_polls > 0).then_some(self.database.max_polls);
        ProvisionSettings {
            database: DatabaseSettings {
                allocated_storage_gb: self.database.allocated_storage_gb,
                instance_class: self.database.instance_class.clone(),
                poll: PollPolicy::new(Duration::from_secs(self.database.poll_interval_secs), max_polls),
                ..Default::default()
            },
            platform: PlatformSettings {
                go_stack: self.platform.go_stack.clone(),
                node_stack: self.platform.node_stack.clone(),
                deploy: RetryPolicy::new(
                    Duration::from_secs(self.platform.deploy_interval_secs),
                    self.platform.deploy_max_retries,
                ),
            },
            network: NetworkSettings {
                ingress_port: self.database.port,
                ..Default::default()
            },
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            api_base: self.github.api_base.clone(),
            web_base: self.github.web_base.clone(),
            work_dir: self.github.work_dir.clone(),
        }
    }

    /// Logging setup; `--verbose` raises the level to debug
    pub fn log_config(&self, verbose: bool) -> LogConfig {
        LogConfig {
            level: if verbose {
                "debug".to_string()
            } else {
                self.logging.level.clone()
            },
            format: self.logging.format,
            include_location: verbose,
            ..Default::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid {}={}: {}", name, value, e))
}
