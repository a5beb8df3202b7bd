use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Overrides the config directory (store and config.toml live there)
pub const CONFIG_DIR_ENV: &str = "HUDDLE_CONFIG_DIR";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format
    #[serde(default = "default_format")]
    pub default_format: String,
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
    /// Program that receives JSON on stdin and the `--jq` expression as its argument
    #[serde(default = "default_filter_program")]
    pub filter_program: String,
}

fn default_format() -> String {
    "table".to_string()
}

fn default_true() -> bool {
    true
}

fn default_filter_program() -> String {
    "jq".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            color: default_true(),
            filter_program: default_filter_program(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Web API origin used with plain tokens
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Client identifier sent with browser-session requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://slack.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!(
        "huddle/{} (terminal client; browser-session compatible)",
        env!("CARGO_PKG_VERSION")
    )
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Get the project directories
    pub fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "huddle", "huddle")
    }

    /// Get the config directory
    pub fn config_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        let dirs = Self::project_dirs().context("Could not determine config directory")?;
        Ok(dirs.config_dir().to_path_buf())
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))
        } else {
            Ok(Self::default())
        }
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
