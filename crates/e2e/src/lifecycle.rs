//! Test-run and scenario hooks for browser scenarios

use tracing::{info, warn};

use crate::config::PlaywrightConfig;
use crate::error::E2eResult;
use crate::page::{ContextOptions, Page, TraceCapture};
use crate::provider::{BrowserProvider, PageProvider};

/// Opens the browser around a test run and a fresh page around each scenario
pub struct TestLifecycle<B> {
    pages: PageProvider<B>,
    config: PlaywrightConfig,
}

impl<B: BrowserProvider> TestLifecycle<B> {
    pub fn new(browser: B, config: PlaywrightConfig) -> Self {
        Self {
            pages: PageProvider::new(browser),
            config,
        }
    }

    pub fn pages(&self) -> &PageProvider<B> {
        &self.pages
    }

    pub fn pages_mut(&mut self) -> &mut PageProvider<B> {
        &mut self.pages
    }

    /// Page for the running scenario
    pub fn page(&self) -> E2eResult<Page> {
        self.pages.page()
    }

    pub async fn before_test_run(&mut self) -> E2eResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        self.pages.browser_mut().open_browser().await
    }

    pub async fn after_test_run(&mut self) -> E2eResult<()> {
        self.pages.close_browser().await
    }

    pub async fn before_scenario(&mut self, scenario: &str) -> E2eResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let options = self.context_options(scenario);
        self.pages.open_page_in_new_browser(Some(&options)).await
    }

    /// Close the scenario's page, screenshotting it first if the scenario failed
    pub async fn after_scenario(&mut self, scenario: &str, failed: bool) -> E2eResult<()> {
        if failed && self.config.capture_screenshots {
            if let Ok(page) = self.pages.page() {
                let path = self
                    .config
                    .screenshot_dir()
                    .join(format!("{}.png", file_stem(scenario)));
                match page.screenshot(&path, self.config.full_page_screenshots).await {
                    Ok(path) => info!("Saved failure screenshot to {}", path.display()),
                    Err(e) => warn!("Failed to capture screenshot for '{}': {}", scenario, e),
                }
            }
        }
        self.pages.close_page().await
    }

    fn context_options(&self, scenario: &str) -> ContextOptions {
        let trace = self.config.tracing.then(|| TraceCapture {
            path: self
                .config
                .trace_dir()
                .join(format!("{}.zip", file_stem(scenario))),
            options: self.config.tracing_options,
        });
        ContextOptions {
            viewport: Some(self.config.viewport),
            trace,
            ..Default::default()
        }
    }
}

/// Scenario name made safe to use as a file name
fn file_stem(scenario: &str) -> String {
    let stem: String = scenario
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "scenario".to_string()
    } else {
        stem
    }
}
