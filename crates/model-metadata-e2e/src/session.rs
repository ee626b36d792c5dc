//! Test session: the page, its network registry and the API client
//!
//! Element commands retry until they succeed or the command timeout
//! expires, so helpers read as straight-line scripts:
//!
//! ```no_run
//! use model_metadata_e2e::{Config, Session};
//! use model_metadata_e2e::helpers::{open_column_options, rename_column, save_metadata_changes};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let session = Session::launch(Config::from_file("e2e.toml")?).await?;
//! session.visit("/model/7/metadata").await?;
//!
//! open_column_options(&session, "Tax").await?;
//! rename_column(&session, "Tax", "Sales tax").await?;
//! save_metadata_changes(&session).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::api::ApiClient;
use crate::config::Config;
use crate::driver::{Action, CdpDriver, Driver, ElementHandle, Probe};
use crate::error::{HelperError, Result};
use crate::intercept::{InterceptRegistry, RequestRecord};
use crate::locator::Locator;

/// Options for [`Session::click`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickOptions {
    /// Skip the visibility check and dispatch the click on the node itself
    pub force: bool,
}

pub struct Session {
    driver: Arc<dyn Driver>,
    intercepts: Arc<InterceptRegistry>,
    api: ApiClient,
    config: Config,
}

impl Session {
    /// Wrap a driver and start observing its network traffic
    pub async fn new(driver: Arc<dyn Driver>, config: Config) -> Result<Self> {
        let intercepts = Arc::new(InterceptRegistry::new());
        driver.observe_network(intercepts.clone()).await?;
        Ok(Self {
            driver,
            intercepts,
            api: ApiClient::from_config(&config),
            config,
        })
    }

    /// Launch Chrome per `config.browser` and open a session on it.
    ///
    /// Logs in with `api.username`/`api.password` when no session token is
    /// configured.
    pub async fn launch(config: Config) -> anyhow::Result<Self> {
        let driver = CdpDriver::launch(&config.browser).await?;
        let mut session = Self::new(Arc::new(driver), config).await?;

        if session.api.session_token().is_none() {
            if let (Some(username), Some(password)) = (
                session.config.api.username.clone(),
                session.config.api.password.clone(),
            ) {
                session
                    .api
                    .login(&username, &password)
                    .await
                    .context("Failed to log in to the application")?;
            }
        }
        Ok(session)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Mutable access, e.g. to log in before visiting pages
    pub fn api_mut(&mut self) -> &mut ApiClient {
        &mut self.api
    }

    pub fn intercepts(&self) -> &InterceptRegistry {
        &self.intercepts
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    fn command_timeout(&self) -> Duration {
        self.config.timeouts.command()
    }

    fn poll_interval(&self) -> Duration {
        self.config.timeouts.poll_interval()
    }

    /// Navigate to a path under `app.base_url`, or to an absolute URL
    #[instrument(skip(self))]
    pub async fn visit(&self, path: &str) -> Result<()> {
        let url = self.api.url(path);
        debug!("Visiting {}", url);
        self.driver.goto(&url).await
    }

    /// First element matched by `locator`, retried until the command timeout
    #[instrument(skip(self), fields(locator = %locator))]
    pub async fn get(&self, locator: &Locator) -> Result<ElementHandle> {
        let mut all = self.get_all(locator).await?;
        Ok(all.remove(0))
    }

    /// All elements matched by `locator`; at least one, or `ElementNotFound`
    pub async fn get_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        let timeout = self.command_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            let found = self.driver.resolve(locator).await?;
            if !found.is_empty() {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(HelperError::ElementNotFound {
                    locator: locator.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    /// Assert the first match becomes visible
    #[instrument(skip(self), fields(locator = %locator))]
    pub async fn should_be_visible(&self, locator: &Locator) -> Result<ElementHandle> {
        let timeout = self.command_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            let found = self.driver.resolve(locator).await?;
            let exists = !found.is_empty();
            if let Some(first) = found.into_iter().next().filter(|e| e.visible) {
                return Ok(first);
            }
            if Instant::now() >= deadline {
                return Err(if exists {
                    HelperError::AssertionFailed(format!(
                        "expected {} to be visible within {:?}",
                        locator, timeout
                    ))
                } else {
                    HelperError::ElementNotFound {
                        locator: locator.to_string(),
                        timeout,
                    }
                });
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    /// Assert nothing matches `locator` any more
    #[instrument(skip(self), fields(locator = %locator))]
    pub async fn should_not_exist(&self, locator: &Locator) -> Result<()> {
        let timeout = self.command_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            if self.driver.resolve(locator).await?.is_empty() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(HelperError::AssertionFailed(format!(
                    "expected {} not to exist within {:?}",
                    locator, timeout
                )));
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    /// Click the first match. Unforced clicks wait for it to be visible.
    #[instrument(skip(self), fields(locator = %locator))]
    pub async fn click(&self, locator: &Locator, options: ClickOptions) -> Result<ElementHandle> {
        let element = if options.force {
            self.get(locator).await?
        } else {
            self.should_be_visible(locator).await?
        };
        self.act(&element, Action::Click {
            force: options.force,
        })
        .await?;
        Ok(element)
    }

    /// Type with real key events after a pointer click into the control
    #[instrument(skip(self), fields(locator = %locator))]
    pub async fn real_type(&self, locator: &Locator, text: &str) -> Result<ElementHandle> {
        self.get_and_act(locator, Action::RealType(text.to_string())).await
    }

    #[instrument(skip(self), fields(locator = %locator))]
    pub async fn scroll_into_view(&self, locator: &Locator) -> Result<ElementHandle> {
        self.get_and_act(locator, Action::ScrollIntoView).await
    }

    /// Scroll the first match's content back to the origin and wait until
    /// it reports being there
    #[instrument(skip(self), fields(locator = %locator))]
    pub async fn scroll_to_top(&self, locator: &Locator) -> Result<ElementHandle> {
        let element = self.get(locator).await?;
        self.act(&element, Action::ScrollTo { x: 0, y: 0 }).await?;
        if !self.settle(&element, Probe::ScrolledToTop).await? {
            return Err(HelperError::AssertionFailed(format!(
                "expected {} to be scrolled to the top",
                locator
            )));
        }
        Ok(element)
    }

    async fn get_and_act(&self, locator: &Locator, action: Action) -> Result<ElementHandle> {
        let element = self.get(locator).await?;
        self.act(&element, action).await?;
        Ok(element)
    }

    /// Perform one action on an element resolved earlier
    pub async fn act(&self, element: &ElementHandle, action: Action) -> Result<()> {
        debug!("{:?} on <{}> #{}", action, element.tag, element.id);
        self.driver.perform(element, &action).await
    }

    /// Poll `probe` until it holds or the settle window passes
    pub async fn settle(&self, element: &ElementHandle, probe: Probe) -> Result<bool> {
        let deadline = Instant::now() + self.config.timeouts.settle();
        loop {
            if self.driver.probe(element, probe).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                debug!("{:?} did not settle for #{}", probe, element.id);
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    /// Register `method url` as `@alias`, replacing an existing registration
    pub fn intercept(&self, method: &str, url: &str, alias: &str) -> Result<()> {
        self.intercepts.intercept(method, url, alias)
    }

    /// Register `@alias` unless it already exists
    pub fn intercept_if_not_defined(&self, method: &str, url: &str, alias: &str) -> Result<bool> {
        self.intercepts.intercept_if_not_defined(method, url, alias)
    }

    /// Wait for the next round trip on `@alias`
    pub async fn wait(&self, alias: &str) -> Result<RequestRecord> {
        self.intercepts
            .wait(
                alias,
                self.config.timeouts.request(),
                self.config.timeouts.response(),
            )
            .await
    }
}
