//! Network interception registry
//!
//! Tests synchronize with the application by registering a route under an
//! alias and later waiting for the next request on that alias to complete.
//! The registry is owned by the session and fed [`NetworkEvent`]s by the
//! driver. Registration state lives here explicitly, so "intercept unless
//! already defined" is a lookup rather than global test-runner state.
//!
//! Semantics:
//! - a request is attributed to every alias registered *when it is sent*;
//!   registering later never sees earlier traffic
//! - re-registering an alias replaces it and starts an empty queue
//! - [`InterceptRegistry::wait`] consumes requests in arrival order

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, instrument, trace};

use crate::error::{HelperError, Result, WaitStage};

/// Method plus URL glob
///
/// The glob applies to the URL path (query and fragment are ignored) unless
/// it is itself an absolute URL. `*` matches within one path segment, `**`
/// matches across segments.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    method: String,
    pattern: String,
    regex: regex::Regex,
}

impl RouteMatcher {
    pub fn new(method: &str, pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| HelperError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };
        if method.trim().is_empty() {
            return Err(invalid("empty method"));
        }
        if !(pattern.starts_with('/') || pattern.contains("://")) {
            return Err(invalid("route must be a path or an absolute URL"));
        }

        let mut source = String::from("^");
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '*' {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    source.push_str(".*");
                } else {
                    source.push_str("[^/]*");
                }
            } else {
                source.push_str(&regex::escape(&c.to_string()));
            }
        }
        source.push('$');

        let regex = regex::Regex::new(&source).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            method: method.trim().to_ascii_uppercase(),
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, method: &str, url: &str) -> bool {
        if !self.method.eq_ignore_ascii_case(method) {
            return false;
        }
        let target = if self.pattern.contains("://") {
            strip_query(url)
        } else {
            url_path(url)
        };
        self.regex.is_match(target)
    }
}

impl std::fmt::Display for RouteMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.pattern)
    }
}

fn strip_query(url: &str) -> &str {
    let end = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
    &url[..end]
}

fn url_path(url: &str) -> &str {
    let url = strip_query(url);
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => url,
    }
}

/// Network activity reported by a driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    RequestSent {
        request_id: String,
        method: String,
        url: String,
    },
    ResponseReceived {
        request_id: String,
        status: u16,
    },
    Finished {
        request_id: String,
    },
    Failed {
        request_id: String,
        reason: String,
    },
}

/// Lifecycle of an observed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Completed,
    Failed(String),
}

/// A request attributed to an alias
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub request_id: String,
    pub method: String,
    pub url: String,
    pub status: Option<u16>,
    pub state: RequestState,
    pub sent_at: DateTime<Utc>,
}

struct Interception {
    matcher: RouteMatcher,
    queue: VecDeque<RequestRecord>,
}

impl Interception {
    fn new(matcher: RouteMatcher) -> Self {
        Self {
            matcher,
            queue: VecDeque::new(),
        }
    }
}

/// Completion events kept for requests not seen yet. CDP events reach the
/// pump through separate listeners, so a `Finished` can overtake its
/// `RequestSent`.
const EARLY_EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct RegistryState {
    aliases: HashMap<String, Interception>,
    early: VecDeque<NetworkEvent>,
}

impl RegistryState {
    /// Apply a response/completion event; false when no record took it.
    ///
    /// `Finished` only completes a record that already has its status, so a
    /// completion that overtakes its response stays buffered.
    fn apply(&mut self, event: &NetworkEvent) -> bool {
        if matches!(event, NetworkEvent::RequestSent { .. }) {
            return false;
        }
        let request_id = event_request_id(event);
        let mut applied = false;
        for record in self.aliases.values_mut().flat_map(|i| i.queue.iter_mut()) {
            if record.request_id != request_id {
                continue;
            }
            match event {
                NetworkEvent::RequestSent { .. } => continue,
                NetworkEvent::ResponseReceived { status, .. } => record.status = Some(*status),
                NetworkEvent::Finished { .. } => {
                    if record.status.is_none() {
                        continue;
                    }
                    if record.state == RequestState::Pending {
                        record.state = RequestState::Completed;
                    }
                }
                NetworkEvent::Failed { reason, .. } => {
                    record.state = RequestState::Failed(reason.clone());
                }
            }
            applied = true;
        }
        applied
    }

    /// Apply buffered events for `request_id` until none of them applies
    fn replay_early(&mut self, request_id: &str) {
        loop {
            let early = std::mem::take(&mut self.early);
            let mut progressed = false;
            for pending in early {
                if event_request_id(&pending) == request_id && self.apply(&pending) {
                    progressed = true;
                } else {
                    self.early.push_back(pending);
                }
            }
            if !progressed {
                break;
            }
        }
    }

    fn buffer(&mut self, event: NetworkEvent) {
        self.early.push_back(event);
        if self.early.len() > EARLY_EVENT_CAPACITY {
            self.early.pop_front();
        }
    }
}

/// Alias registrations and the requests attributed to them
pub struct InterceptRegistry {
    state: Mutex<RegistryState>,
    notify: Notify,
}

impl InterceptRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `method url` under `alias`, replacing any previous registration
    #[instrument(skip(self))]
    pub fn intercept(&self, method: &str, url: &str, alias: &str) -> Result<()> {
        let matcher = RouteMatcher::new(method, url)?;
        debug!("Registering @{} for {}", alias, matcher);
        self.lock()
            .aliases
            .insert(alias.to_string(), Interception::new(matcher));
        Ok(())
    }

    /// Register unless `alias` already exists. Returns whether it registered.
    #[instrument(skip(self))]
    pub fn intercept_if_not_defined(&self, method: &str, url: &str, alias: &str) -> Result<bool> {
        let matcher = RouteMatcher::new(method, url)?;
        let mut state = self.lock();
        if state.aliases.contains_key(alias) {
            debug!("@{} already defined, keeping existing registration", alias);
            return Ok(false);
        }
        debug!("Registering @{} for {}", alias, matcher);
        state
            .aliases
            .insert(alias.to_string(), Interception::new(matcher));
        Ok(true)
    }

    pub fn is_defined(&self, alias: &str) -> bool {
        self.lock().aliases.contains_key(alias)
    }

    /// Requests currently queued (not yet consumed) for `alias`
    pub fn pending_requests(&self, alias: &str) -> Vec<RequestRecord> {
        self.lock()
            .aliases
            .get(alias)
            .map(|i| i.queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Feed one network event
    pub fn observe(&self, event: NetworkEvent) {
        let mut state = self.lock();
        match event {
            NetworkEvent::RequestSent {
                request_id,
                method,
                url,
            } => {
                let mut attributed = false;
                for (alias, interception) in state.aliases.iter_mut() {
                    if interception.matcher.matches(&method, &url) {
                        trace!("{} {} attributed to @{}", method, url, alias);
                        interception.queue.push_back(RequestRecord {
                            request_id: request_id.clone(),
                            method: method.clone(),
                            url: url.clone(),
                            status: None,
                            state: RequestState::Pending,
                            sent_at: Utc::now(),
                        });
                        attributed = true;
                    }
                }
                if attributed {
                    state.replay_early(&request_id);
                }
            }
            other => {
                if state.apply(&other) {
                    let request_id = event_request_id(&other).to_string();
                    state.replay_early(&request_id);
                } else {
                    state.buffer(other);
                }
            }
        }
        drop(state);
        self.notify.notify_waiters();
    }

    /// Wait for the next request on `alias` to be sent and then to complete.
    ///
    /// The request is consumed, so a second wait needs a second request.
    #[instrument(skip(self))]
    pub async fn wait(
        &self,
        alias: &str,
        request_timeout: Duration,
        response_timeout: Duration,
    ) -> Result<RequestRecord> {
        let request_deadline = Instant::now() + request_timeout;
        let request_id = self
            .wait_until(alias, WaitStage::Request, request_timeout, request_deadline, |queue| {
                queue.front().map(|r| r.request_id.clone())
            })
            .await?;
        debug!("@{} request {} sent", alias, request_id);

        let response_deadline = Instant::now() + response_timeout;
        let record = self
            .wait_until(alias, WaitStage::Response, response_timeout, response_deadline, |queue| {
                match queue.front() {
                    Some(r) if r.request_id == request_id && r.state != RequestState::Pending => {
                        queue.pop_front()
                    }
                    _ => None,
                }
            })
            .await?;

        if let RequestState::Failed(reason) = &record.state {
            return Err(HelperError::NetworkFailure {
                method: record.method.clone(),
                url: record.url.clone(),
                reason: reason.clone(),
            });
        }
        debug!("@{} completed with status {:?}", alias, record.status);
        Ok(record)
    }

    async fn wait_until<T>(
        &self,
        alias: &str,
        stage: WaitStage,
        timeout: Duration,
        deadline: Instant,
        mut check: impl FnMut(&mut VecDeque<RequestRecord>) -> Option<T>,
    ) -> Result<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                let interception = state
                    .aliases
                    .get_mut(alias)
                    .ok_or_else(|| HelperError::UnknownAlias(alias.to_string()))?;
                if let Some(found) = check(&mut interception.queue) {
                    return Ok(found);
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                error!("Timed out waiting for {} of @{} after {:?}", stage, alias, timeout);
                return Err(HelperError::Timeout {
                    alias: alias.to_string(),
                    stage,
                    timeout,
                });
            }
        }
    }
}

impl Default for InterceptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn event_request_id(event: &NetworkEvent) -> &str {
    match event {
        NetworkEvent::RequestSent { request_id, .. }
        | NetworkEvent::ResponseReceived { request_id, .. }
        | NetworkEvent::Finished { request_id }
        | NetworkEvent::Failed { request_id, .. } => request_id,
    }
}
