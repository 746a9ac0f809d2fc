//! Error types for the acceptance collaborators

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server did not report ready within {0} seconds")]
    ServerReadyTimeout(u64),

    #[error("{url} did not respond within {seconds} seconds ({attempts} attempts)")]
    NotResponsive {
        url: String,
        seconds: u64,
        attempts: usize,
    },

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Page command '{command}' failed: {reason}")]
    PageCommand { command: String, reason: String },

    #[error("open_page_in_new_browser needs to be called before page")]
    PageNotOpened,

    #[error("Browser is not open")]
    BrowserNotOpen,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
