//! Acceptest E2E Collaborators
//!
//! Everything an acceptance scenario talks to outside the process:
//! - Opens browser pages through Playwright, driven over a JSON-lines protocol
//! - Spawns the dev server under test and waits for it to report ready
//! - Calls HTTP APIs and records the last response status
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TestLifecycle                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  before_test_run / after_test_run  -> BrowserProvider       │
//! │  before_scenario / after_scenario  -> PageProvider          │
//! │    └── Page ── PageDriver ── node (Playwright driver)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  DevServer    spawn, ANSI-stripped output, ready patterns   │
//! │  ApiClient    JSON GET/POST via UrlBuilder, last_status     │
//! │  AcceptanceConfig   TOML + ACCEPTEST_* overrides            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod page;
pub mod playwright;
pub mod provider;
pub mod server;
pub mod url;

pub use api::ApiClient;
pub use config::{AcceptanceConfig, ApiConfig, Browser, DevServerConfig, PlaywrightConfig};
pub use error::{E2eError, E2eResult};
pub use lifecycle::TestLifecycle;
pub use logging::init_tracing;
pub use page::{ContextOptions, Page, PageCommand, PageDriver, WaitState};
pub use playwright::{PlaywrightBrowserProvider, PlaywrightDriver};
pub use provider::{BrowserProvider, PageProvider};
pub use server::DevServer;
pub use url::UrlBuilder;
