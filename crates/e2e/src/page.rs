//! Browser page handle and the commands it understands

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::{TracingOptions, Viewport};
use crate::error::{E2eError, E2eResult};

/// Element state to wait for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

/// A single operation against an open page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PageCommand {
    /// Navigate to an absolute URL
    Goto { url: String },

    Click { selector: String },

    Fill { selector: String, value: String },

    /// Press a key on an element, or on the keyboard when no selector is given
    Press {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        key: String,
    },

    WaitFor {
        selector: String,
        #[serde(default)]
        state: WaitState,
    },

    /// Fail unless the element becomes visible within the page timeout
    ExpectVisible { selector: String },

    /// Fail unless the element's text contains `text`
    ExpectText { selector: String, text: String },

    Screenshot {
        path: PathBuf,
        #[serde(default)]
        full_page: bool,
    },

    /// Evaluate a JavaScript expression and return its JSON value
    Evaluate { script: String },

    Title,

    Url,

    SetDefaultTimeout { timeout_ms: u64 },
}

impl PageCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PageCommand::Goto { .. } => "goto",
            PageCommand::Click { .. } => "click",
            PageCommand::Fill { .. } => "fill",
            PageCommand::Press { .. } => "press",
            PageCommand::WaitFor { .. } => "wait_for",
            PageCommand::ExpectVisible { .. } => "expect_visible",
            PageCommand::ExpectText { .. } => "expect_text",
            PageCommand::Screenshot { .. } => "screenshot",
            PageCommand::Evaluate { .. } => "evaluate",
            PageCommand::Title => "title",
            PageCommand::Url => "url",
            PageCommand::SetDefaultTimeout { .. } => "set_default_timeout",
        }
    }
}

/// Trace recording for a browser context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceCapture {
    /// Zip file the trace is saved to when the page closes
    pub path: PathBuf,
    #[serde(flatten)]
    pub options: TracingOptions,
}

/// Options for the browser context a page is created in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,

    #[serde(rename = "baseURL", default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(rename = "ignoreHTTPSErrors", default)]
    pub ignore_https_errors: bool,

    #[serde(skip)]
    pub trace: Option<TraceCapture>,
}

/// Executes page commands against a live page
#[async_trait]
pub trait PageDriver: Send {
    async fn send(&mut self, command: &PageCommand) -> E2eResult<Value>;

    /// Close the page and release its browser resources
    async fn close(&mut self) -> E2eResult<()>;
}

/// Cloneable handle to an open page.
///
/// Clones share the same driver, so a page opened in one place can be
/// reused by later scenarios.
#[derive(Clone)]
pub struct Page {
    driver: Arc<Mutex<Box<dyn PageDriver>>>,
}

impl Page {
    pub fn new(driver: impl PageDriver + 'static) -> Self {
        Self {
            driver: Arc::new(Mutex::new(Box::new(driver))),
        }
    }

    pub async fn send(&self, command: PageCommand) -> E2eResult<Value> {
        self.driver.lock().await.send(&command).await
    }

    pub async fn goto(&self, url: impl Into<String>) -> E2eResult<()> {
        self.send(PageCommand::Goto { url: url.into() }).await?;
        Ok(())
    }

    pub async fn click(&self, selector: impl Into<String>) -> E2eResult<()> {
        self.send(PageCommand::Click {
            selector: selector.into(),
        })
        .await?;
        Ok(())
    }

    pub async fn fill(&self, selector: impl Into<String>, value: impl Into<String>) -> E2eResult<()> {
        self.send(PageCommand::Fill {
            selector: selector.into(),
            value: value.into(),
        })
        .await?;
        Ok(())
    }

    pub async fn press(&self, selector: Option<&str>, key: impl Into<String>) -> E2eResult<()> {
        self.send(PageCommand::Press {
            selector: selector.map(String::from),
            key: key.into(),
        })
        .await?;
        Ok(())
    }

    pub async fn wait_for(&self, selector: impl Into<String>, state: WaitState) -> E2eResult<()> {
        self.send(PageCommand::WaitFor {
            selector: selector.into(),
            state,
        })
        .await?;
        Ok(())
    }

    pub async fn expect_visible(&self, selector: impl Into<String>) -> E2eResult<()> {
        self.send(PageCommand::ExpectVisible {
            selector: selector.into(),
        })
        .await?;
        Ok(())
    }

    pub async fn expect_text(&self, selector: impl Into<String>, text: impl Into<String>) -> E2eResult<()> {
        self.send(PageCommand::ExpectText {
            selector: selector.into(),
            text: text.into(),
        })
        .await?;
        Ok(())
    }

    /// Save a PNG screenshot to `path`, returning the path written
    pub async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<PathBuf> {
        self.send(PageCommand::Screenshot {
            path: path.to_path_buf(),
            full_page,
        })
        .await?;
        Ok(path.to_path_buf())
    }

    pub async fn evaluate(&self, script: impl Into<String>) -> E2eResult<Value> {
        self.send(PageCommand::Evaluate {
            script: script.into(),
        })
        .await
    }

    pub async fn title(&self) -> E2eResult<String> {
        let value = self.send(PageCommand::Title).await?;
        as_string("title", value)
    }

    pub async fn url(&self) -> E2eResult<String> {
        let value = self.send(PageCommand::Url).await?;
        as_string("url", value)
    }

    pub async fn set_default_timeout(&self, timeout: Duration) -> E2eResult<()> {
        self.send(PageCommand::SetDefaultTimeout {
            timeout_ms: timeout.as_millis() as u64,
        })
        .await?;
        Ok(())
    }

    pub async fn close(&self) -> E2eResult<()> {
        self.driver.lock().await.close().await
    }

    /// Whether two handles refer to the same underlying page
    pub fn same_page(&self, other: &Page) -> bool {
        Arc::ptr_eq(&self.driver, &other.driver)
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("handles", &Arc::strong_count(&self.driver))
            .finish()
    }
}

fn as_string(command: &str, value: Value) -> E2eResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(E2eError::PageCommand {
            command: command.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
    }
}
