//! Configuration for end-to-end sessions
//!
//! Sessions are configured with a TOML file naming the application under
//! test, API credentials, command/network timeouts and browser settings.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `app.base_url`
pub const BASE_URL_ENV: &str = "MODEL_METADATA_E2E_BASE_URL";

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application under test
    pub app: AppConfig,
    /// REST API credentials
    #[serde(default)]
    pub api: ApiConfig,
    /// Command and network timeouts
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// Browser launch settings
    #[serde(default)]
    pub browser: BrowserSettings,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - Required fields are missing
    ///
    /// # Example
    ///
    /// ```no_run
    /// use model_metadata_e2e::config::Config;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = Config::from_file("e2e.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use model_metadata_e2e::config::Config;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let toml = r#"
    ///     [app]
    ///     base_url = "http://localhost:3000"
    /// "#;
    /// let config = Config::parse(toml)?;
    /// assert_eq!(config.timeouts.command_ms, 4000);
    /// # Ok(())
    /// # }
    /// ```
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// Default configuration pointing at `base_url`
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            app: AppConfig {
                base_url: base_url.into(),
            },
            api: ApiConfig::default(),
            timeouts: TimeoutsConfig::default(),
            browser: BrowserSettings::default(),
        }
    }

    /// Replace `app.base_url` with the value of [`BASE_URL_ENV`] when set
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.is_empty() {
                self.app.base_url = url;
            }
        }
    }
}

/// Application under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin of the application, e.g. `http://localhost:3000`
    pub base_url: String,
}

/// REST API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Existing session token, sent as `X-Metabase-Session`
    #[serde(default)]
    pub session_token: Option<String>,
    /// Username used by `ApiClient::login`
    #[serde(default)]
    pub username: Option<String>,
    /// Password used by `ApiClient::login`
    #[serde(default)]
    pub password: Option<String>,
}

/// Command and network timeouts, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// How long element commands retry (default: 4000)
    #[serde(default = "default_command_ms")]
    pub command_ms: u64,
    /// How long a wait allows for the aliased request to be sent (default: 5000)
    #[serde(default = "default_request_ms")]
    pub request_ms: u64,
    /// How long a wait allows for the aliased response (default: 30000)
    #[serde(default = "default_response_ms")]
    pub response_ms: u64,
    /// Delay between retries (default: 50)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long a layout precondition may take to settle (default: 1000)
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl TimeoutsConfig {
    pub fn command(&self) -> Duration {
        Duration::from_millis(self.command_ms)
    }

    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn response(&self) -> Duration {
        Duration::from_millis(self.response_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            command_ms: default_command_ms(),
            request_ms: default_request_ms(),
            response_ms: default_response_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

fn default_command_ms() -> u64 {
    4000
}

fn default_request_ms() -> u64 {
    5000
}

fn default_response_ms() -> u64 {
    30000
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_settle_ms() -> u64 {
    1000
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Run without a visible window (default: true)
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Explicit Chrome binary; Chrome for Testing or auto-detection otherwise
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
    /// Viewport width (default: 1280)
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    /// Viewport height (default: 800)
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_executable: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    800
}
