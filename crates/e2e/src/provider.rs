//! Browser and page provisioning for scenarios

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{E2eError, E2eResult};
use crate::page::{ContextOptions, Page};

/// Opens and closes a browser and creates pages in it
#[async_trait]
pub trait BrowserProvider: Send {
    /// Open the browser. Does nothing if it is already open.
    async fn open_browser(&mut self) -> E2eResult<()>;

    async fn close_browser(&mut self) -> E2eResult<()>;

    fn is_open(&self) -> bool;

    /// Create a page, in a fresh context built from `options` when given
    async fn new_page(&mut self, options: Option<&ContextOptions>) -> E2eResult<Page>;

    /// Timeout applied to every page this browser creates
    fn default_timeout(&self) -> Option<Duration> {
        None
    }
}

/// Holds the page the current scenario drives
pub struct PageProvider<B> {
    id: Uuid,
    browser: B,
    page: Option<Page>,
}

impl<B: BrowserProvider> PageProvider<B> {
    pub fn new(browser: B) -> Self {
        let id = Uuid::new_v4();
        debug!("Created page provider {}", id);
        Self {
            id,
            browser,
            page: None,
        }
    }

    /// Unique per provider; handy when tracking which provider a hook was given
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn browser_mut(&mut self) -> &mut B {
        &mut self.browser
    }

    /// Open the browser if needed and create a new page in it
    pub async fn open_page_in_new_browser(&mut self, options: Option<&ContextOptions>) -> E2eResult<()> {
        self.browser.open_browser().await?;
        let page = self.browser.new_page(options).await?;
        if let Some(timeout) = self.browser.default_timeout() {
            page.set_default_timeout(timeout).await?;
        }
        info!("Page provider {} opened a page", self.id);
        self.page = Some(page);
        Ok(())
    }

    /// The page opened by [`open_page_in_new_browser`](Self::open_page_in_new_browser)
    /// or handed over with [`use_page`](Self::use_page)
    pub fn page(&self) -> E2eResult<Page> {
        self.page.clone().ok_or(E2eError::PageNotOpened)
    }

    /// Drive an already open page, e.g. one kept from an earlier batch of scenarios
    pub fn use_page(&mut self, page: Page) {
        self.page = Some(page);
    }

    /// Close the current page. Does nothing when no page is open.
    pub async fn close_page(&mut self) -> E2eResult<()> {
        match self.page.take() {
            Some(page) => page.close().await,
            None => Ok(()),
        }
    }

    /// Close the page, then the browser
    pub async fn close_browser(&mut self) -> E2eResult<()> {
        self.close_page().await?;
        self.browser.close_browser().await
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::page::{PageCommand, PageDriver};
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::Arc;

    pub type Journal = Arc<Mutex<Vec<String>>>;

    /// Records every command; `fail_on` makes a command fail
    pub struct FakeDriver {
        pub journal: Journal,
        pub fail_on: Option<&'static str>,
        pub closed: bool,
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        async fn send(&mut self, command: &PageCommand) -> E2eResult<Value> {
            if self.closed {
                return Err(E2eError::PageCommand {
                    command: command.name().to_string(),
                    reason: "page is closed".to_string(),
                });
            }
            self.journal.lock().push(command.name().to_string());
            if self.fail_on == Some(command.name()) {
                return Err(E2eError::PageCommand {
                    command: command.name().to_string(),
                    reason: "forced failure".to_string(),
                });
            }
            Ok(match command {
                PageCommand::Title => Value::String("Fake".to_string()),
                PageCommand::Screenshot { path, .. } => Value::String(path.display().to_string()),
                _ => Value::Null,
            })
        }

        async fn close(&mut self) -> E2eResult<()> {
            if !self.closed {
                self.journal.lock().push("close".to_string());
                self.closed = true;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct FakeBrowser {
        pub journal: Journal,
        pub open: bool,
        pub opens: usize,
        pub timeout: Option<Duration>,
        pub fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl BrowserProvider for FakeBrowser {
        async fn open_browser(&mut self) -> E2eResult<()> {
            if !self.open {
                self.open = true;
                self.opens += 1;
                self.journal.lock().push("open_browser".to_string());
            }
            Ok(())
        }

        async fn close_browser(&mut self) -> E2eResult<()> {
            self.open = false;
            self.journal.lock().push("close_browser".to_string());
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }

        async fn new_page(&mut self, options: Option<&ContextOptions>) -> E2eResult<Page> {
            if !self.open {
                return Err(E2eError::BrowserNotOpen);
            }
            let entry = match options {
                Some(_) => "new_page(context)",
                None => "new_page",
            };
            self.journal.lock().push(entry.to_string());
            Ok(Page::new(FakeDriver {
                journal: self.journal.clone(),
                fail_on: self.fail_on,
                closed: false,
            }))
        }

        fn default_timeout(&self) -> Option<Duration> {
            self.timeout
        }
    }
}
