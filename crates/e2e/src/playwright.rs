//! Playwright browser automation
//!
//! Each page is served by a long-lived `node` process running a small driver
//! script. The process launches the browser, opens a context and a page, then
//! answers newline-delimited JSON requests on stdin with one reply line each.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::PlaywrightConfig;
use crate::error::{E2eError, E2eResult};
use crate::page::{ContextOptions, Page, PageCommand, PageDriver, TraceCapture};
use crate::provider::BrowserProvider;

const DRIVER_JS: &str = r#"
const readline = require('readline');
const playwright = require('playwright');

let browser, context, page, trace;

async function handle(cmd) {
  switch (cmd.action) {
    case 'launch':
      browser = await playwright[cmd.browser].launch({ headless: cmd.headless });
      context = await browser.newContext(cmd.context || {});
      if (cmd.trace) {
        trace = cmd.trace.path;
        await context.tracing.start({
          screenshots: cmd.trace.screenshots,
          snapshots: cmd.trace.snapshots,
          sources: cmd.trace.sources,
        });
      }
      page = await context.newPage();
      return null;
    case 'goto': await page.goto(cmd.url); return null;
    case 'click': await page.click(cmd.selector); return null;
    case 'fill': await page.fill(cmd.selector, cmd.value); return null;
    case 'press':
      if (cmd.selector) await page.locator(cmd.selector).press(cmd.key);
      else await page.keyboard.press(cmd.key);
      return null;
    case 'wait_for': await page.waitForSelector(cmd.selector, { state: cmd.state }); return null;
    case 'expect_visible': await page.locator(cmd.selector).first().waitFor({ state: 'visible' }); return null;
    case 'expect_text': {
      const text = (await page.locator(cmd.selector).first().textContent()) || '';
      if (!text.includes(cmd.text)) throw new Error(`'${cmd.selector}' has text '${text}', expected it to contain '${cmd.text}'`);
      return text;
    }
    case 'screenshot': await page.screenshot({ path: cmd.path, fullPage: cmd.full_page }); return cmd.path;
    case 'evaluate': return await page.evaluate(cmd.script);
    case 'title': return await page.title();
    case 'url': return page.url();
    case 'set_default_timeout': page.setDefaultTimeout(cmd.timeout_ms); return null;
    case 'close':
      if (trace) await context.tracing.stop({ path: trace });
      if (context) await context.close();
      if (browser) await browser.close();
      return null;
    default: throw new Error(`unknown action: ${cmd.action}`);
  }
}

(async () => {
  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    const req = JSON.parse(line);
    try {
      const value = await handle(req.command);
      process.stdout.write(JSON.stringify({ id: req.id, ok: true, value: value === undefined ? null : value }) + '\n');
    } catch (e) {
      process.stdout.write(JSON.stringify({ id: req.id, ok: false, error: e.message }) + '\n');
    }
    if (req.command.action === 'close') break;
  }
  process.exit(0);
})();
"#;

/// Driver-level commands outside the page command set
#[derive(Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Control<'a> {
    Launch {
        browser: &'a str,
        headless: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<&'a ContextOptions>,
        #[serde(skip_serializing_if = "Option::is_none")]
        trace: Option<&'a TraceCapture>,
    },
    Close,
}

#[derive(Serialize)]
struct Request<'a, C: Serialize> {
    id: u64,
    command: &'a C,
}

#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// A page served by a `node` Playwright process
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    reply_timeout: Duration,
    closed: bool,
}

impl PlaywrightDriver {
    /// Spawn the driver process and launch a browser with one page
    pub async fn spawn(config: &PlaywrightConfig, options: Option<&ContextOptions>) -> E2eResult<Self> {
        info!(
            "Launching {} (headless: {})",
            config.browser.as_str(),
            config.headless
        );

        let mut child = Command::new("node")
            .arg("-e")
            .arg(DRIVER_JS)
            .current_dir(&config.node_project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("Failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "playwright", "{}", line);
                }
            });
        }

        let mut driver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            // Launch and page operations time out on the node side first
            reply_timeout: config.wait_timeout() + Duration::from_secs(30),
            closed: false,
        };

        let launch = Control::Launch {
            browser: config.browser.as_str(),
            headless: config.headless,
            context: options,
            trace: options.and_then(|o| o.trace.as_ref()),
        };
        driver.request(&launch, "launch").await?;
        Ok(driver)
    }

    async fn request<C: Serialize>(&mut self, command: &C, name: &str) -> E2eResult<Value> {
        if self.closed {
            return Err(E2eError::PageCommand {
                command: name.to_string(),
                reason: "page is closed".to_string(),
            });
        }

        self.next_id += 1;
        let id = self.next_id;
        let mut line = serde_json::to_string(&Request { id, command })?;
        line.push('\n');

        debug!("-> {}", line.trim_end());
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let reply_timeout = self.reply_timeout;
        let reply = timeout(reply_timeout, self.read_reply(id))
            .await
            .map_err(|_| E2eError::PageCommand {
                command: name.to_string(),
                reason: format!("no reply within {:?}", reply_timeout),
            })??;

        if reply.ok {
            Ok(reply.value.unwrap_or(Value::Null))
        } else {
            Err(E2eError::PageCommand {
                command: name.to_string(),
                reason: reply.error.unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }

    async fn read_reply(&mut self, id: u64) -> E2eResult<Reply> {
        loop {
            let Some(line) = self.stdout.next_line().await? else {
                self.closed = true;
                return Err(E2eError::Playwright("driver process exited".to_string()));
            };
            match serde_json::from_str::<Reply>(&line) {
                Ok(reply) if reply.id == id => return Ok(reply),
                Ok(reply) => debug!("Ignoring stale reply {}", reply.id),
                // Anything else is console output from the driver
                Err(_) => debug!(target: "playwright", "{}", line),
            }
        }
    }
}

#[async_trait]
impl PageDriver for PlaywrightDriver {
    async fn send(&mut self, command: &PageCommand) -> E2eResult<Value> {
        self.request(command, command.name()).await
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.request(&Control::Close, "close").await;
        self.closed = true;

        if timeout(Duration::from_secs(10), self.child.wait()).await.is_err() {
            warn!("Playwright driver did not exit, killing it");
            let _ = self.child.kill().await;
        }
        result.map(|_| ())
    }
}

/// Check if Playwright is installed
pub async fn check_playwright_installed() -> E2eResult<()> {
    let status = Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

/// Launches Playwright pages according to a [`PlaywrightConfig`]
pub struct PlaywrightBrowserProvider {
    config: PlaywrightConfig,
    open: bool,
    verified: bool,
}

impl PlaywrightBrowserProvider {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self {
            config,
            open: false,
            verified: false,
        }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }
}

#[async_trait]
impl BrowserProvider for PlaywrightBrowserProvider {
    async fn open_browser(&mut self) -> E2eResult<()> {
        if self.open {
            return Ok(());
        }
        if !self.verified {
            check_playwright_installed().await?;
            self.verified = true;
        }

        tokio::fs::create_dir_all(self.config.screenshot_dir()).await?;
        if self.config.tracing {
            tokio::fs::create_dir_all(self.config.trace_dir()).await?;
        }

        self.open = true;
        Ok(())
    }

    async fn close_browser(&mut self) -> E2eResult<()> {
        // Pages own their processes and are closed by their provider
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn new_page(&mut self, options: Option<&ContextOptions>) -> E2eResult<Page> {
        if !self.open {
            return Err(E2eError::BrowserNotOpen);
        }
        let driver = PlaywrightDriver::spawn(&self.config, options).await?;
        Ok(Page::new(driver))
    }

    fn default_timeout(&self) -> Option<Duration> {
        Some(self.config.wait_timeout())
    }
}
