//! Page lifecycle orchestration
//!
//! Owns the session state and drives the engines across page loads,
//! single-page-app navigations, scroll re-population and transport messages.
//! The controller is a tick-driven state machine: the host arms real timers
//! through the [`Scheduler`] trait and forwards each tick (and each sidebar
//! mutation) into the matching entry point here. No native navigation event
//! is assumed to exist; path changes are detected by comparing the polled
//! path against the session's.

use log::{debug, warn};
use serde::Deserialize;

use crate::blacklist::{Blacklist, EntryKind};
use crate::dom::{Dom, Selector};
use crate::extract;
use crate::filter::{FilterEngine, PassReport};
use crate::page::{classify, PageType};
use crate::recommend;
use crate::storage::{BlacklistStore, KeyValueBackend, StoreError};

// =============================================================================
// Polling Contract
// =============================================================================

/// Periodic checks the host runs for the controller. Arming an already-armed
/// task replaces its timer; duplicate timers must never accumulate across
/// repeated navigations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollTask {
    /// URL path comparison, armed once at init and never cleared.
    PathChange,
    /// Page-type-specific loaded indicator, armed per navigation.
    PageLoad,
    /// Re-filter after scroll-driven re-population, armed once a page is up.
    ScrollSettle,
}

pub const PATH_POLL_MS: u32 = 200;
pub const PAGE_LOAD_POLL_MS: u32 = 250;
pub const SCROLL_POLL_MS: u32 = 1000;

/// Cancellable periodic-check primitive supplied by the host.
pub trait Scheduler {
    /// Arm `task` at a fixed interval, clearing any previous timer for it.
    fn arm(&mut self, task: PollTask, interval_ms: u32);
    /// Clear `task`'s timer; idempotent.
    fn clear(&mut self, task: PollTask);
}

// =============================================================================
// Transport Messages
// =============================================================================

/// Messages delivered by the extension messaging transport.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TransportMessage {
    /// A full blacklist replacing the current one (management UI edit or
    /// sync from another instance). Triggers save plus immediate re-filter.
    Blacklist {
        #[serde(rename = "blacklistedItems")]
        blacklisted_items: Blacklist,
    },
    /// Extension-wide enable/disable toggle.
    Extension { extension: ToggleCommand },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleCommand {
    Enable,
    Disable,
}

// =============================================================================
// Session State
// =============================================================================

/// Process-wide page/session state, reset on reload. Owned here and passed
/// into the engines, never global.
#[derive(Debug)]
pub struct Session {
    /// Current page type; `None` on unsupported pages.
    pub page: Option<PageType>,
    /// Persisted master switch; gates every filter entry point.
    pub enabled: bool,
    /// A navigation-triggered load is in flight; suppresses the scroll
    /// re-filter path so the two triggers cannot double-process the DOM.
    pub page_loading: bool,
    /// Path the session last navigated to.
    pub path: String,
    first_load_done: bool,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            page: None,
            enabled: true,
            page_loading: false,
            path: String::new(),
            first_load_done: false,
        }
    }
}

// =============================================================================
// Load Indicators
// =============================================================================

/// Root-level attribute the host page sets once its app shell has mounted.
/// Only trustworthy on the very first document load; in-page navigations
/// leave it set while the directory is still re-rendering.
const PAGE_LOADED_MARK: Selector = Selector::attr("data-a-page-loaded");

fn page_ready<D: Dom>(dom: &D, page: PageType, first_load: bool) -> bool {
    if first_load {
        dom.matches(dom.root(), &PAGE_LOADED_MARK)
            || dom.query(dom.root(), &PAGE_LOADED_MARK).is_some()
    } else {
        extract::page_has_containers(dom, page)
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Orchestrates load detection, navigation transitions and re-invocation of
/// the filtering engines.
pub struct LifecycleController<B: KeyValueBackend> {
    store: BlacklistStore<B>,
    engine: FilterEngine,
    session: Session,
}

impl<B: KeyValueBackend> LifecycleController<B> {
    pub fn new(backend: B) -> Self {
        LifecycleController {
            store: BlacklistStore::new(backend),
            engine: FilterEngine::new(),
            session: Session::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &BlacklistStore<B> {
        &self.store
    }

    pub fn blacklist(&self) -> &Blacklist {
        self.store.cache()
    }

    /// Initial load: read persisted state, arm the path poller, and start
    /// the first navigation cycle for `path`.
    pub fn init<S: Scheduler>(&mut self, scheduler: &mut S, path: &str) -> Result<(), StoreError> {
        self.session.enabled = self.store.load_enabled()?;
        self.store.load()?;
        scheduler.arm(PollTask::PathChange, PATH_POLL_MS);
        self.begin_navigation(scheduler, path);
        Ok(())
    }

    /// Path poll tick. A changed path starts a new navigation cycle.
    pub fn poll_path<S: Scheduler>(&mut self, scheduler: &mut S, current_path: &str) {
        if current_path == self.session.path {
            return;
        }
        debug!("path changed: {:?} -> {current_path:?}", self.session.path);
        self.begin_navigation(scheduler, current_path);
    }

    fn begin_navigation<S: Scheduler>(&mut self, scheduler: &mut S, path: &str) {
        self.session.path = path.to_string();
        self.session.page = classify(path);

        // Pollers from the previous page must not survive the transition.
        scheduler.clear(PollTask::PageLoad);
        scheduler.clear(PollTask::ScrollSettle);

        match self.session.page {
            None => {
                debug!("unsupported page {path:?}; filtering skipped");
                self.session.page_loading = false;
            }
            Some(page) => {
                debug!("navigating to {} page", page.as_str());
                self.session.page_loading = true;
                scheduler.arm(PollTask::PageLoad, PAGE_LOAD_POLL_MS);
            }
        }
    }

    /// Page-load poll tick. Once the page-type-specific loaded indicator
    /// appears, runs the full sequence exactly once for this transition:
    /// filter pass, sidebar pass, scroll poller arming.
    pub fn poll_page_load<D: Dom, S: Scheduler>(
        &mut self,
        dom: &mut D,
        scheduler: &mut S,
    ) -> Option<PassReport> {
        if !self.session.page_loading {
            return None;
        }
        let page = self.session.page?;
        if !page_ready(dom, page, !self.session.first_load_done) {
            return None;
        }

        scheduler.clear(PollTask::PageLoad);
        self.session.first_load_done = true;

        let report = self.filter_now(dom);
        self.sidebar_pass(dom);
        self.session.page_loading = false;
        scheduler.arm(PollTask::ScrollSettle, SCROLL_POLL_MS);
        report
    }

    /// Scroll-settle poll tick: re-filter items the host page appended.
    /// Suppressed while a navigation-triggered load is in flight.
    pub fn poll_scroll<D: Dom>(&mut self, dom: &mut D) -> Option<PassReport> {
        if self.session.page_loading {
            return None;
        }
        match self.session.page {
            Some(PageType::Categories) | Some(PageType::Channels) => self.filter_now(dom),
            _ => None,
        }
    }

    /// Sidebar mutation observer callback.
    pub fn on_sidebar_mutation<D: Dom>(&mut self, dom: &mut D) -> usize {
        if self.session.page_loading {
            return 0;
        }
        self.sidebar_pass(dom)
    }

    /// Transport message dispatch. Storage errors propagate to the caller
    /// for user-visible reporting; they never stop the polling loops.
    pub fn on_message<D: Dom>(
        &mut self,
        dom: &mut D,
        message: TransportMessage,
    ) -> Result<Option<PassReport>, StoreError> {
        match message {
            TransportMessage::Blacklist { blacklisted_items } => {
                debug!(
                    "received blacklist update with {} entries",
                    blacklisted_items.len()
                );
                self.store.save(blacklisted_items)?;
                Ok(self.refilter(dom))
            }
            TransportMessage::Extension { extension } => {
                let enabled = extension == ToggleCommand::Enable;
                self.session.enabled = enabled;
                self.store.save_enabled(enabled)?;
                if enabled {
                    Ok(self.refilter(dom))
                } else {
                    // The host reloads the page on disable; nothing to unhide.
                    Ok(None)
                }
            }
        }
    }

    /// User-initiated hide action from an attached hide button.
    pub fn hide_item<D: Dom>(
        &mut self,
        dom: &mut D,
        kind: EntryKind,
        name: &str,
    ) -> Result<Option<PassReport>, StoreError> {
        self.store.hide(kind, name)?;
        Ok(self.refilter(dom))
    }

    fn refilter<D: Dom>(&mut self, dom: &mut D) -> Option<PassReport> {
        let report = self.filter_now(dom);
        self.sidebar_pass(dom);
        report
    }

    fn filter_now<D: Dom>(&mut self, dom: &mut D) -> Option<PassReport> {
        if !self.session.enabled {
            return None;
        }
        let page = self.session.page?;
        let report = self.engine.run(dom, page, self.store.cache())?;
        if report.structural_mismatch {
            warn!("filter pass found no containers on {} page", page.as_str());
        }
        Some(report)
    }

    fn sidebar_pass<D: Dom>(&mut self, dom: &mut D) -> usize {
        if !self.session.enabled {
            return 0;
        }
        // No recommendations exist on the frontpage.
        match self.session.page {
            Some(PageType::Categories) | Some(PageType::Channels) => {
                recommend::run(dom, self.store.cache())
            }
            _ => 0,
        }
    }
}
