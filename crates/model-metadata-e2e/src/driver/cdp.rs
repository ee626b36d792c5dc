//! Chrome DevTools Protocol driver built on chromiumoxide

use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::network::spawn_network_pump;
use super::scripts;
use super::{Action, Driver, ElementHandle, Probe};
use crate::config::BrowserSettings;
use crate::error::{HelperError, Result};
use crate::intercept::InterceptRegistry;
use crate::locator::Locator;

/// Resolver output
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResolveOutcome {
    Elements { elements: Vec<ElementHandle> },
    Ambiguous { ambiguous: Ambiguity },
}

#[derive(Debug, Deserialize)]
struct Ambiguity {
    step: usize,
    count: usize,
}

/// Driver for a single chromiumoxide page
pub struct CdpDriver {
    page: Page,
    // Kept alive for the lifetime of the page; dropping it closes Chrome.
    _browser: Option<Browser>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CdpDriver {
    /// Launch Chrome with `settings` and open a blank page
    ///
    /// # Example
    ///
    /// ```no_run
    /// use model_metadata_e2e::config::BrowserSettings;
    /// use model_metadata_e2e::driver::CdpDriver;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let driver = CdpDriver::launch(&BrowserSettings::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn launch(settings: &BrowserSettings) -> anyhow::Result<Self> {
        static BROWSER_ID: AtomicU64 = AtomicU64::new(0);

        let mut builder = BrowserConfig::builder()
            .window_size(settings.window_width, settings.window_height);
        if !settings.headless {
            builder = builder.with_head();
        }

        let executable = settings
            .chrome_executable
            .clone()
            .or_else(find_chrome_for_testing);
        if let Some(chrome_path) = executable {
            debug!("Using Chrome at {}", chrome_path.display());
            builder = builder.chrome_executable(chrome_path);
        }

        // Unique per process and launch so parallel test binaries never share a profile
        let browser_id = BROWSER_ID.fetch_add(1, Ordering::SeqCst);
        let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let user_data_dir = std::env::temp_dir().join(format!(
            "model-metadata-e2e-{}-{}-{}",
            std::process::id(),
            browser_id,
            timestamp
        ));
        builder = builder.user_data_dir(user_data_dir);

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        info!("Launching browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser handler error: {:?}", e);
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;
        info!("Browser launched successfully");

        Ok(Self {
            page,
            _browser: Some(browser),
            tasks: Mutex::new(vec![handle]),
        })
    }

    /// Drive a page owned by someone else
    pub fn from_page(page: Page) -> Self {
        Self {
            page,
            _browser: None,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn element(&self, handle: &ElementHandle) -> Result<Element> {
        self.page
            .find_element(scripts::handle_selector(&handle.id))
            .await
            .map_err(|e| {
                HelperError::Driver(format!("element <{}> #{} is gone: {}", handle.tag, handle.id, e))
            })
    }

    async fn call_bool(element: &Element, function: &str) -> Result<bool> {
        let returns = element.call_js_fn(function, false).await?;
        Ok(returns
            .result
            .value
            .as_ref()
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

#[async_trait]
impl Driver for CdpDriver {
    #[instrument(skip(self))]
    async fn goto(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(locator = %locator))]
    async fn resolve(&self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        let steps = serde_json::to_string(&locator.to_json()?)?;
        let params = EvaluateParams::builder()
            .expression(scripts::resolve_expression(&steps))
            .return_by_value(true)
            .build()
            .map_err(HelperError::Driver)?;
        let outcome: ResolveOutcome = self.page.evaluate_expression(params).await?.into_value()?;

        match outcome {
            ResolveOutcome::Elements { elements } => Ok(elements),
            ResolveOutcome::Ambiguous {
                ambiguous: Ambiguity { step, count },
            } => {
                debug!("Step {} matched {} elements", step, count);
                Err(HelperError::AmbiguousMatch {
                    locator: locator.to_string(),
                    count,
                })
            }
        }
    }

    #[instrument(skip(self, element), fields(element = %element.id))]
    async fn perform(&self, element: &ElementHandle, action: &Action) -> Result<()> {
        let target = self.element(element).await?;
        match action {
            Action::Click { force: false } => {
                target.click().await?;
            }
            Action::Click { force: true } => {
                target.call_js_fn(scripts::FORCE_CLICK_FN, false).await?;
            }
            Action::Clear => {
                target.call_js_fn(scripts::CLEAR_FN, false).await?;
            }
            Action::Type(text) => {
                target.focus().await?;
                target.type_str(text).await?;
            }
            Action::RealType(text) => {
                target.click().await?;
                target.type_str(text).await?;
            }
            Action::Blur => {
                target.call_js_fn(scripts::BLUR_FN, false).await?;
            }
            Action::ScrollIntoView => {
                target.scroll_into_view().await?;
            }
            Action::ScrollTo { x, y } => {
                target
                    .call_js_fn(scripts::scroll_to_fn(*x, *y), false)
                    .await?;
            }
        }
        Ok(())
    }

    async fn probe(&self, element: &ElementHandle, probe: Probe) -> Result<bool> {
        let target = self.element(element).await?;
        let function = match probe {
            Probe::Unobstructed => scripts::UNOBSTRUCTED_FN,
            Probe::ScrolledToTop => scripts::SCROLLED_TO_TOP_FN,
        };
        Self::call_bool(&target, function).await
    }

    async fn observe_network(&self, registry: Arc<InterceptRegistry>) -> Result<()> {
        let task = spawn_network_pump(&self.page, registry).await?;
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(task);
        Ok(())
    }
}

/// Find Chrome for Testing installed by Puppeteer
pub fn find_chrome_for_testing() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let puppeteer_cache = std::path::Path::new(&home).join(".cache/puppeteer/chrome");

    let entries = std::fs::read_dir(&puppeteer_cache).ok()?;
    let mut versions: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    versions.sort_by(|a, b| b.cmp(a));

    const CANDIDATES: [&str; 3] = [
        "chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
        "chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
        "chrome-linux64/chrome",
    ];
    versions.iter().find_map(|version_dir| {
        CANDIDATES
            .iter()
            .map(|candidate| version_dir.join(candidate))
            .find(|path| path.exists())
    })
}
