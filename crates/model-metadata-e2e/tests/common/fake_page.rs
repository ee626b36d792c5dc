//! In-memory page for exercising helpers without a browser
//!
//! Elements are scripted per locator (keyed by the locator's display
//! string). Clicking an element can trigger reactions: emitting network
//! traffic into the session's registry, or removing elements once a wait
//! has drained an alias.

use async_trait::async_trait;
use model_metadata_e2e::driver::{Action, Driver, ElementHandle, Probe};
use model_metadata_e2e::error::{HelperError, Result};
use model_metadata_e2e::intercept::{InterceptRegistry, NetworkEvent};
use model_metadata_e2e::locator::Locator;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// What happens when an element is clicked
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Reaction {
    /// A request is sent and completes with `status`
    Request {
        method: String,
        url: String,
        status: u16,
    },
    /// A request is sent and fails at the network level
    FailRequest {
        method: String,
        url: String,
        reason: String,
    },
    /// Elements matched by the locator disappear on the first resolve after
    /// `alias` has nothing queued, and `then` runs at that moment
    RemoveAfterWait {
        locator: Locator,
        alias: String,
        then: Vec<Reaction>,
    },
}

#[allow(dead_code)]
impl Reaction {
    pub fn request(method: &str, url: &str, status: u16) -> Self {
        Reaction::Request {
            method: method.to_string(),
            url: url.to_string(),
            status,
        }
    }

    pub fn fail(method: &str, url: &str, reason: &str) -> Self {
        Reaction::FailRequest {
            method: method.to_string(),
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn remove_after_wait(locator: Locator, alias: &str, then: Vec<Reaction>) -> Self {
        Reaction::RemoveAfterWait {
            locator,
            alias: alias.to_string(),
            then,
        }
    }
}

/// A removal held back until its alias queue drains
struct Deferred {
    locator: String,
    alias: String,
    then: Vec<Reaction>,
}

/// Something the page saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Trace {
    Goto(String),
    Perform(String, Action),
    Request(String, String),
    Removed(String),
}

#[derive(Default)]
struct Inner {
    elements: HashMap<String, Vec<ElementHandle>>,
    hidden_polls: HashMap<String, usize>,
    reactions: HashMap<String, Vec<Reaction>>,
    obstructed: HashSet<String>,
    scrolled: HashSet<String>,
    deferred: Vec<Deferred>,
    trace: Vec<Trace>,
    next_request: u64,
}

#[derive(Default)]
pub struct FakePage {
    inner: Mutex<Inner>,
    registry: Mutex<Option<Arc<InterceptRegistry>>>,
}

/// A visible element
#[allow(dead_code)]
pub fn element(id: &str, tag: &str, text: &str) -> ElementHandle {
    ElementHandle {
        id: id.to_string(),
        tag: tag.to_string(),
        visible: true,
        text: text.to_string(),
        value: None,
    }
}

/// A visible text input holding `value`
#[allow(dead_code)]
pub fn input(id: &str, value: &str) -> ElementHandle {
    ElementHandle {
        value: Some(value.to_string()),
        ..element(id, "input", "")
    }
}

#[allow(dead_code)]
impl FakePage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Make `locator` resolve to `handle` (appended after earlier ones)
    pub fn add(&self, locator: &Locator, handle: ElementHandle) {
        self.inner()
            .elements
            .entry(locator.to_string())
            .or_default()
            .push(handle);
    }

    /// Report matches of `locator` as invisible for the next `polls` resolves
    pub fn hide_for(&self, locator: &Locator, polls: usize) {
        self.inner().hidden_polls.insert(locator.to_string(), polls);
    }

    /// Element `id` is covered by an overlay
    pub fn obstruct(&self, id: &str) {
        self.inner().obstructed.insert(id.to_string());
    }

    pub fn on_click(&self, id: &str, reaction: Reaction) {
        self.inner()
            .reactions
            .entry(id.to_string())
            .or_default()
            .push(reaction);
    }

    pub fn trace(&self) -> Vec<Trace> {
        self.inner().trace.clone()
    }

    /// Actions performed on element `id`
    pub fn actions_on(&self, id: &str) -> Vec<Action> {
        self.inner()
            .trace
            .iter()
            .filter_map(|t| match t {
                Trace::Perform(target, action) if target == id => Some(action.clone()),
                _ => None,
            })
            .collect()
    }

    /// Send a request from the page, as application code would
    pub fn send_request(&self, method: &str, url: &str, status: u16) {
        self.run(&Reaction::request(method, url, status));
    }

    fn emit(&self, event: NetworkEvent) {
        if let Some(registry) = self.registry.lock().unwrap().as_ref() {
            registry.observe(event);
        }
    }

    fn next_request_id(&self, method: &str, url: &str) -> String {
        let mut inner = self.inner();
        inner.next_request += 1;
        inner
            .trace
            .push(Trace::Request(method.to_string(), url.to_string()));
        format!("fake.{}", inner.next_request)
    }

    /// Deferred removals on `key` whose alias has drained
    fn release_deferred(&self, key: &str) -> Vec<Reaction> {
        let Some(registry) = self.registry.lock().unwrap().clone() else {
            return Vec::new();
        };
        let mut inner = self.inner();
        let Some(pos) = inner
            .deferred
            .iter()
            .position(|d| d.locator == key && registry.pending_requests(&d.alias).is_empty())
        else {
            return Vec::new();
        };
        let deferred = inner.deferred.remove(pos);
        inner.elements.remove(key);
        inner.trace.push(Trace::Removed(key.to_string()));
        deferred.then
    }

    fn run(&self, reaction: &Reaction) {
        match reaction {
            Reaction::RemoveAfterWait {
                locator,
                alias,
                then,
            } => {
                self.inner().deferred.push(Deferred {
                    locator: locator.to_string(),
                    alias: alias.clone(),
                    then: then.clone(),
                });
            }
            Reaction::Request {
                method,
                url,
                status,
            } => {
                let request_id = self.next_request_id(method, url);
                self.emit(NetworkEvent::RequestSent {
                    request_id: request_id.clone(),
                    method: method.clone(),
                    url: url.clone(),
                });
                self.emit(NetworkEvent::ResponseReceived {
                    request_id: request_id.clone(),
                    status: *status,
                });
                self.emit(NetworkEvent::Finished { request_id });
            }
            Reaction::FailRequest {
                method,
                url,
                reason,
            } => {
                let request_id = self.next_request_id(method, url);
                self.emit(NetworkEvent::RequestSent {
                    request_id: request_id.clone(),
                    method: method.clone(),
                    url: url.clone(),
                });
                self.emit(NetworkEvent::Failed {
                    request_id,
                    reason: reason.clone(),
                });
            }
        }
    }
}

#[async_trait]
impl Driver for FakePage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.inner().trace.push(Trace::Goto(url.to_string()));
        Ok(())
    }

    async fn resolve(&self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        let key = locator.to_string();
        for reaction in self.release_deferred(&key) {
            self.run(&reaction);
        }
        let mut inner = self.inner();
        let mut found = inner.elements.get(&key).cloned().unwrap_or_default();

        let single = locator.steps().last().is_some_and(|step| step.is_single());
        if single && found.len() > 1 {
            return Err(HelperError::AmbiguousMatch {
                locator: key,
                count: found.len(),
            });
        }

        if let Some(polls) = inner.hidden_polls.get_mut(&key) {
            if *polls > 0 {
                *polls -= 1;
                for handle in &mut found {
                    handle.visible = false;
                }
            }
        }
        Ok(found)
    }

    async fn perform(&self, element: &ElementHandle, action: &Action) -> Result<()> {
        let reactions = {
            let mut inner = self.inner();
            inner
                .trace
                .push(Trace::Perform(element.id.clone(), action.clone()));
            if let Action::ScrollTo { x: 0, y: 0 } = action {
                inner.scrolled.insert(element.id.clone());
            }
            match action {
                Action::Click { .. } => inner.reactions.get(&element.id).cloned().unwrap_or_default(),
                _ => Vec::new(),
            }
        };
        for reaction in &reactions {
            self.run(reaction);
        }
        Ok(())
    }

    async fn probe(&self, element: &ElementHandle, probe: Probe) -> Result<bool> {
        let inner = self.inner();
        Ok(match probe {
            Probe::Unobstructed => !inner.obstructed.contains(&element.id),
            Probe::ScrolledToTop => inner.scrolled.contains(&element.id),
        })
    }

    async fn observe_network(&self, registry: Arc<InterceptRegistry>) -> Result<()> {
        *self.registry.lock().unwrap() = Some(registry);
        Ok(())
    }
}
