//! Acceptance test configuration
//!
//! Every section and key is optional; anything absent binds to its default.
//! After the file is read, `ACCEPTEST_*` environment variables override
//! individual settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceConfig {
    /// Browser automation settings
    pub playwright: PlaywrightConfig,

    /// Dev server spawned for web tests
    pub server: DevServerConfig,

    /// HTTP client for API tests
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::InvalidConfig(format!("unknown browser: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// What a browser trace records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingOptions {
    pub screenshots: bool,
    pub snapshots: bool,
    pub sources: bool,
}

/// Configuration for Playwright
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub enabled: bool,
    pub headless: bool,
    pub browser: Browser,

    /// Default timeout for every page operation
    pub wait_timeout_ms: u64,

    pub viewport: Viewport,

    /// Record a Playwright trace per page
    pub tracing: bool,
    pub tracing_options: TracingOptions,

    /// Screenshot the page when a scenario fails
    pub capture_screenshots: bool,
    pub full_page_screenshots: bool,

    /// Screenshots and traces are written here
    pub artifacts_path: PathBuf,

    /// Directory `node` runs in; must be able to `require('playwright')`
    pub node_project_dir: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: false,
            browser: Browser::Chromium,
            wait_timeout_ms: 10_000,
            viewport: Viewport::default(),
            tracing: false,
            tracing_options: TracingOptions::default(),
            capture_screenshots: false,
            full_page_screenshots: false,
            artifacts_path: PathBuf::from("TestResults"),
            node_project_dir: PathBuf::from("."),
        }
    }
}

impl PlaywrightConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.artifacts_path.join("screenshots")
    }

    pub fn trace_dir(&self) -> PathBuf {
        self.artifacts_path.join("traces")
    }
}

/// Configuration for spawning a dev server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevServerConfig {
    /// Program to run (e.g. `npx`)
    pub program: String,

    /// Arguments; `{port}` is replaced with the chosen port
    pub args: Vec<String>,

    /// Working directory for the process
    pub working_dir: PathBuf,

    /// Port to serve on (None = find a free port)
    pub port: Option<u16>,

    /// Extra environment for the process
    pub env: Vec<(String, String)>,

    /// Output lines that mean the server is ready (case-insensitive substring match)
    pub ready_patterns: Vec<String>,

    /// Timeout for the ready line to appear
    pub startup_timeout_secs: u64,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            args: vec![
                "ng".to_string(),
                "serve".to_string(),
                "--port".to_string(),
                "{port}".to_string(),
            ],
            working_dir: PathBuf::from("."),
            port: Some(4200),
            env: Vec::new(),
            ready_patterns: vec!["Compiled successfully".to_string(), "Local:".to_string()],
            startup_timeout_secs: 240,
        }
    }
}

impl DevServerConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

/// Configuration for the API client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,

    /// Test servers commonly run with self-signed certificates
    pub accept_invalid_certs: bool,

    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            accept_invalid_certs: true,
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AcceptanceConfig {
    /// Parse configuration from a TOML string, without environment overrides
    pub fn from_toml_str(content: &str) -> E2eResult<Self> {
        toml::from_str(content).map_err(E2eError::from)
    }

    /// Load configuration from a TOML file and apply environment overrides
    pub fn load(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        info!("Loaded acceptance config from {}", path.display());
        Ok(config)
    }

    /// Like [`load`](Self::load), falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            return Self::load(path);
        }
        debug!("No config at {}, using defaults", path.display());
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `ACCEPTEST_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("ACCEPTEST_HEADLESS") {
            self.playwright.headless = parse_bool("ACCEPTEST_HEADLESS", &value)?;
        }
        if let Some(value) = lookup("ACCEPTEST_BROWSER") {
            self.playwright.browser = value.parse()?;
        }
        if let Some(value) = lookup("ACCEPTEST_ARTIFACTS_PATH") {
            self.playwright.artifacts_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("ACCEPTEST_BASE_URL") {
            self.api.base_url = value;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> E2eResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(E2eError::InvalidConfig(format!("{key}: expected a boolean, got '{other}'"))),
    }
}
