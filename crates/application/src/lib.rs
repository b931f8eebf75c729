//! Application orchestration layer for Quire: the reader session state
//! machine and the gateway traits the chrome talks through.

use std::time::{Duration, Instant};

use quire_core::{
    Account, AccountId, AuthError, DisplaySettings, Document, DocumentId, DocumentUpdate,
    Progress, StoreError,
};
use quire_engine::{LayoutConfig, MeasurementSurface, PageSet, PaginateError, Paginator};

/// Quiet period after a layout-affecting settings or content change before
/// re-pagination runs; geometry read immediately after a change can be stale.
pub const SETTLE_DELAY: Duration = Duration::from_millis(120);
/// Quiet period for viewport resize bursts (drag-resizing fires constantly).
pub const RESIZE_QUIET: Duration = Duration::from_millis(150);
/// Trailing-edge delay for persistence writes.
pub const SAVE_DELAY: Duration = Duration::from_millis(1000);
/// Delay before the single pagination retry after a measurement failure.
pub const RETRY_DELAY: Duration = Duration::from_millis(200);

/// The slice of a document the reader session writes back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavedState {
    pub current_page: u32,
    pub settings: DisplaySettings,
}

/// Debounced position/settings writes go through this seam.
pub trait StateStore {
    fn save_document_state(&mut self, id: DocumentId, state: &SavedState)
    -> Result<(), StoreError>;
}

/// Document CRUD, as exposed by the persistence gateway.
pub trait DocumentStore: StateStore {
    fn create_document(
        &mut self,
        owner: AccountId,
        title: &str,
        content: &str,
    ) -> Result<DocumentId, StoreError>;
    fn get_document(
        &mut self,
        owner: AccountId,
        id: DocumentId,
    ) -> Result<Option<Document>, StoreError>;
    fn list_documents(&mut self, owner: AccountId) -> Result<Vec<Document>, StoreError>;
    fn update_document(
        &mut self,
        owner: AccountId,
        id: DocumentId,
        update: DocumentUpdate,
    ) -> Result<(), StoreError>;
    fn delete_document(&mut self, owner: AccountId, id: DocumentId) -> Result<(), StoreError>;
}

/// Auth collaborator; errors arrive already normalized.
pub trait AuthGateway {
    fn sign_up(&mut self, email: &str, password: &str) -> Result<Account, AuthError>;
    fn sign_in(&mut self, email: &str, password: &str) -> Result<Account, AuthError>;
    fn sign_in_with_provider(&mut self) -> Result<Account, AuthError>;
    fn sign_out(&mut self);
}

/// Coalescing timer: each `arm` restarts a fixed-delay deadline; `fire`
/// reports (and clears) once the quiet period has elapsed. Trailing edge
/// only; the first call never dispatches immediately.
#[derive(Debug, Clone, Copy)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No book loaded.
    Idle,
    /// Re-pagination in flight or pending retry; the chrome shows a loading
    /// indicator, never a stale page set.
    Paginating,
    /// Page set valid, page visible.
    Ready,
    /// Page-change animation in flight; navigation input suppressed.
    Transitioning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFailure {
    /// Measurement failed twice; terminal for the session, recover by
    /// reloading the book.
    PaginationFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Next,
    Previous,
    JumpTo(usize),
}

/// Tracks the open document, its page set, and the current page across
/// content and settings changes. All time-sensitive entry points take `now`
/// explicitly so tests can drive a synthetic clock through `tick`.
#[derive(Debug)]
pub struct ReaderSession {
    document: Option<Document>,
    page_set: Option<PageSet>,
    current_page: usize,
    phase: SessionPhase,
    failure: Option<SessionFailure>,
    layout: Option<LayoutConfig>,
    paginator: Paginator,
    settle: Debounce,
    resize: Debounce,
    save: Debounce,
    transition_until: Option<Instant>,
    pending_page: usize,
    retry_at: Option<Instant>,
    retried: bool,
}

impl Default for ReaderSession {
    fn default() -> Self {
        Self::new(Paginator::default())
    }
}

impl ReaderSession {
    pub fn new(paginator: Paginator) -> Self {
        Self {
            document: None,
            page_set: None,
            current_page: 0,
            phase: SessionPhase::Idle,
            failure: None,
            layout: None,
            paginator,
            settle: Debounce::new(SETTLE_DELAY),
            resize: Debounce::new(RESIZE_QUIET),
            save: Debounce::new(SAVE_DELAY),
            transition_until: None,
            pending_page: 0,
            retry_at: None,
            retried: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn failure(&self) -> Option<SessionFailure> {
        self.failure
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn settings(&self) -> Option<DisplaySettings> {
        self.document.as_ref().map(|doc| doc.settings)
    }

    pub fn current_page_index(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.page_set.as_ref().map_or(0, PageSet::len)
    }

    pub fn current_page_content(&self) -> Option<&str> {
        self.page_set.as_ref()?.page(self.current_page)
    }

    /// The layout that produced the visible page set; the chrome renders
    /// with exactly this configuration.
    pub fn page_layout(&self) -> Option<&LayoutConfig> {
        self.page_set.as_ref().map(PageSet::layout)
    }

    pub fn progress(&self) -> Option<Progress> {
        let set = self.page_set.as_ref()?;
        Some(Progress {
            current_page: self.current_page as u32 + 1,
            total_pages: set.len() as u32,
        })
    }

    pub fn is_input_suppressed(&self) -> bool {
        self.phase == SessionPhase::Transitioning
    }

    /// Open a book: Idle/Ready -> Paginating, then Ready once the first
    /// page set lands, with the persisted page clamped to the new count.
    pub fn load_book(&mut self, doc: Document, layout: LayoutConfig, surface: &dyn MeasurementSurface, now: Instant) {
        self.current_page = doc.current_page as usize;
        self.document = Some(doc);
        self.layout = Some(layout);
        self.page_set = None;
        self.phase = SessionPhase::Paginating;
        self.failure = None;
        self.retried = false;
        self.retry_at = None;
        self.transition_until = None;
        self.settle.clear();
        self.resize.clear();
        self.try_paginate(now, surface);
    }

    /// End the session; flushes a pending debounced write so the last page
    /// turn is never lost on the way out.
    pub fn close(&mut self, store: &mut dyn StateStore) {
        if self.save.is_armed() {
            self.save.clear();
            self.write_state(store);
        }
        *self = Self::new(self.paginator.clone());
    }

    pub fn step_font_size(&mut self, delta: i16, now: Instant) {
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        let next = doc.settings.step_font_size(delta);
        if next != doc.settings {
            doc.settings = next;
            self.settle.arm(now);
            self.save.arm(now);
        }
    }

    pub fn set_font_family(&mut self, family: quire_core::FontFamily, now: Instant) {
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        let next = doc.settings.with_font_family(family);
        if next != doc.settings {
            doc.settings = next;
            self.settle.arm(now);
            self.save.arm(now);
        }
    }

    /// Theme is presentation-only: no re-pagination, just a deferred write.
    pub fn set_theme(&mut self, theme: quire_core::Theme, now: Instant) {
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        let next = doc.settings.with_theme(theme);
        if next != doc.settings {
            doc.settings = next;
            self.save.arm(now);
        }
    }

    pub fn set_animation(&mut self, animation: quire_core::Animation, now: Instant) {
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        let next = doc.settings.with_animation(animation);
        if next != doc.settings {
            doc.settings = next;
            self.save.arm(now);
        }
    }

    pub fn content_changed(&mut self, content: String, now: Instant) {
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        if doc.content != content {
            doc.content = content;
            self.settle.arm(now);
        }
    }

    /// Record the latest viewport geometry; re-pagination waits for the
    /// resize burst to go quiet.
    pub fn viewport_resized(&mut self, layout: LayoutConfig, now: Instant) {
        if self.document.is_none() || self.layout == Some(layout) {
            return;
        }
        self.layout = Some(layout);
        self.resize.arm(now);
    }

    /// Page-turn intent. Ignored unless Ready; the commit happens when the
    /// animation timer completes.
    pub fn navigate(&mut self, nav: Nav, now: Instant) {
        if self.phase != SessionPhase::Ready {
            return;
        }
        let count = self.page_count().max(1);
        let target = match nav {
            Nav::Next => self.current_page.saturating_add(1),
            Nav::Previous => self.current_page.saturating_sub(1),
            Nav::JumpTo(page) => page,
        }
        .min(count - 1);

        if target == self.current_page {
            return;
        }

        let duration = self
            .settings()
            .map_or(Duration::from_millis(500), |s| s.animation.duration());
        self.pending_page = target;
        self.phase = SessionPhase::Transitioning;
        self.transition_until = Some(now + duration);
    }

    /// Drive timers: transition commits, coalesced re-pagination, the single
    /// retry, and the debounced persistence write.
    pub fn tick(
        &mut self,
        now: Instant,
        surface: &dyn MeasurementSurface,
        store: &mut dyn StateStore,
    ) {
        if self.phase == SessionPhase::Transitioning
            && let Some(until) = self.transition_until
            && now >= until
        {
            self.current_page = self.pending_page;
            self.transition_until = None;
            self.phase = SessionPhase::Ready;
            self.save.arm(now);
        }

        // Fire both timers before paginating so a settle and a resize landing
        // in the same quiet window coalesce into one pass with the latest
        // layout. Pagination runs synchronously here, so two passes can never
        // race against the shared probe.
        let settle_due = self.settle.fire(now);
        let resize_due = self.resize.fire(now);
        if (settle_due || resize_due) && self.document.is_some() {
            self.phase = SessionPhase::Paginating;
            self.failure = None;
            self.retried = false;
            self.retry_at = None;
            self.try_paginate(now, surface);
        }

        if let Some(at) = self.retry_at
            && now >= at
        {
            self.retry_at = None;
            self.try_paginate(now, surface);
        }

        if self.save.fire(now) {
            self.write_state(store);
        }
    }

    fn try_paginate(&mut self, now: Instant, surface: &dyn MeasurementSurface) {
        let (Some(doc), Some(base)) = (self.document.as_ref(), self.layout) else {
            return;
        };

        // The chrome owns the geometry; typography comes from the live
        // settings so a pending font change paginates with the new metrics.
        let mut layout = base;
        layout.font_size_px = doc.settings.font_size_px;
        layout.font_family = doc.settings.font_family;

        match self.paginator.paginate(&doc.content, &layout, surface) {
            Ok(set) => {
                // Clamp immediately: the set may have shrunk.
                self.current_page = self.current_page.min(set.len() - 1);
                self.page_set = Some(set);
                self.phase = SessionPhase::Ready;
                self.failure = None;
                self.retried = false;
            }
            Err(PaginateError::MeasurementUnavailable) if !self.retried => {
                log::debug!("measurement surface unavailable, retrying once");
                self.retried = true;
                self.retry_at = Some(now + RETRY_DELAY);
            }
            Err(PaginateError::MeasurementUnavailable) => {
                log::warn!("pagination failed after retry");
                self.failure = Some(SessionFailure::PaginationFailed);
            }
        }
    }

    fn write_state(&mut self, store: &mut dyn StateStore) {
        let Some(doc) = self.document.as_ref() else {
            return;
        };
        let state = SavedState {
            current_page: self.current_page as u32,
            settings: doc.settings,
        };
        // Fire and forget: a failed write must never take down the session.
        if let Err(err) = store.save_document_state(doc.id, &state) {
            log::warn!("deferred state write for document {} failed: {err}", doc.id);
        }
    }
}
