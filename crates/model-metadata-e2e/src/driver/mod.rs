//! Browser driver seam
//!
//! The session talks to the page only through [`Driver`]. [`CdpDriver`]
//! implements it over the Chrome DevTools Protocol; tests substitute an
//! in-memory page.

pub mod cdp;
mod network;
mod scripts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::intercept::InterceptRegistry;
use crate::locator::Locator;

pub use cdp::{find_chrome_for_testing, CdpDriver};

/// A resolved element, valid until the page replaces the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Value of the element's `data-e2e-handle` attribute
    pub id: String,
    /// Lowercase tag name
    pub tag: String,
    /// Rendered with a non-empty box and not hidden by style
    pub visible: bool,
    /// Whitespace-normalized text content
    pub text: String,
    /// Current value of form controls
    #[serde(default)]
    pub value: Option<String>,
}

/// Interaction performed on a resolved element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Pointer click at the element's center, or a DOM `click()` when forced
    Click { force: bool },
    /// Empty a text control the way a user would, firing `input`/`change`
    Clear,
    /// Focus and type
    Type(String),
    /// Click to focus, then type with real key events
    RealType(String),
    Blur,
    ScrollIntoView,
    /// Scroll the element's own content
    ScrollTo { x: i64, y: i64 },
}

/// Layout conditions a helper can wait on before interacting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The element is the topmost hit at its center point
    Unobstructed,
    /// The element's own scroll offset is back at the origin
    ScrolledToTop,
}

#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigate the page
    async fn goto(&self, url: &str) -> Result<()>;

    /// All elements the locator currently matches, in document order
    async fn resolve(&self, locator: &Locator) -> Result<Vec<ElementHandle>>;

    async fn perform(&self, element: &ElementHandle, action: &Action) -> Result<()>;

    async fn probe(&self, element: &ElementHandle, probe: Probe) -> Result<bool>;

    /// Start reporting network traffic into `registry`
    async fn observe_network(&self, registry: Arc<InterceptRegistry>) -> Result<()>;
}
