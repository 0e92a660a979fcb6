//! The extraction engine: cache, provider dispatch and frame observation for
//! one page.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mailsnap::{EngineOptions, ExtractionEngine, LiveDocument, Page, ProviderRegistry};
//! use std::sync::Arc;
//!
//! # async fn run() -> mailsnap::Result<()> {
//! let page = Arc::new(Page::new(
//!     "https://mail.google.com/mail/u/0/#inbox/abc",
//!     LiveDocument::new("<h2 class=\"hP\">Hello</h2>"),
//! )?);
//!
//! let options = EngineOptions::default();
//! let registry = ProviderRegistry::with_builtin(&options)?;
//! let engine = ExtractionEngine::attach(page, registry, options);
//!
//! let snapshot = engine.email_snapshot(false).await;
//! println!("Subject: {}", snapshot.subject);
//! # Ok(())
//! # }
//! ```

use crate::document::DocumentId;
use crate::error::Result;
use crate::message::{ExtractionRequest, ExtractionResponse};
use crate::observer::{FrameObserver, ObservedDocumentSet, RefreshTarget};
use crate::options::EngineOptions;
use crate::page::Page;
use crate::providers::ProviderRegistry;
use crate::snapshot::EmailSnapshot;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Last known-good snapshot and when it was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub data: EmailSnapshot,
    pub captured_at: Instant,
}

impl CacheEntry {
    pub fn new(data: EmailSnapshot) -> Self {
        Self {
            data,
            captured_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

struct Shared {
    page: Arc<Page>,
    registry: ProviderRegistry,
    options: EngineOptions,
    cache: RwLock<Option<CacheEntry>>,
    observer: FrameObserver,
}

impl Shared {
    async fn email_snapshot(&self, force: bool) -> EmailSnapshot {
        if !force {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.as_ref().filter(|e| e.is_fresh(self.options.cache_ttl)) {
                debug!(age_ms = entry.age().as_millis() as u64, "serving cached snapshot");
                return entry.data.clone();
            }
        }

        let snapshot = self.extract(force).await;
        self.store(&snapshot).await;
        snapshot
    }

    async fn extract(&self, force: bool) -> EmailSnapshot {
        let Some(extractor) = self.registry.route(self.page.address()) else {
            debug!(address = self.page.address(), "no provider for page");
            return EmailSnapshot::default();
        };
        debug!(provider = extractor.name(), force, "extracting");
        extractor.extract(&self.page, force).await
    }

    /// Replace the cache entry if `snapshot` carries anything.
    async fn store(&self, snapshot: &EmailSnapshot) -> bool {
        if !snapshot.has_content() {
            return false;
        }
        *self.cache.write().await = Some(CacheEntry::new(snapshot.clone()));
        true
    }

    fn rescan(self: &Arc<Self>) -> usize {
        let target: Weak<dyn RefreshTarget> = Arc::downgrade(self) as Weak<dyn RefreshTarget>;
        self.observer.scan_and_observe(&self.page, &target)
    }
}

#[async_trait]
impl RefreshTarget for Shared {
    async fn refresh(&self, trigger: DocumentId) {
        let snapshot = self.extract(true).await;
        if self.store(&snapshot).await {
            debug!(document = %trigger, "cache refreshed after mutation");
        }
    }
}

async fn rescan_loop(shared: Weak<Shared>, period: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let Some(engine) = shared.upgrade() else {
            return;
        };
        let attached = engine.rescan();
        if attached > 0 {
            debug!(attached, "rescan found new documents");
        }
    }
}

/// Extraction entry point for one page.
///
/// On a top-level page the engine watches the top document and every
/// readable iframe, refreshing its cache when they change, and rescans
/// periodically for frames inserted later. Nested pages only extract on
/// demand and never answer transport requests, so a child frame cannot
/// overwrite its parent's answer with a partial one.
///
/// Dropping the engine stops every timer and watcher it started.
pub struct ExtractionEngine {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl ExtractionEngine {
    /// Attach an engine to `page`. Must be called inside a tokio runtime.
    pub fn attach(page: Arc<Page>, registry: ProviderRegistry, options: EngineOptions) -> Self {
        let shutdown = CancellationToken::new();
        let shared = Arc::new(Shared {
            observer: FrameObserver::new(options.debounce, shutdown.clone()),
            page,
            registry,
            options,
            cache: RwLock::new(None),
        });

        if shared.page.is_top_level() {
            let attached = shared.rescan();
            debug!(address = shared.page.address(), attached, "engine attached");
            tokio::spawn(rescan_loop(
                Arc::downgrade(&shared),
                shared.options.rescan_interval,
                shutdown.clone(),
            ));
        }

        Self { shared, shutdown }
    }

    /// Attach with the built-in Gmail, Outlook and NetEase layouts.
    pub fn with_builtin(page: Arc<Page>, options: EngineOptions) -> Result<Self> {
        options.validate()?;
        let registry = ProviderRegistry::with_builtin(&options)?;
        Ok(Self::attach(page, registry, options))
    }

    /// Current email snapshot.
    ///
    /// A non-forced call returns a fresh cached snapshot without touching the
    /// page. Otherwise the page's provider runs (with the forced retry budget
    /// when `force` is set) and a non-empty result replaces the cache. Never
    /// fails: an unsupported page or a failing provider yields an empty
    /// snapshot.
    pub async fn email_snapshot(&self, force: bool) -> EmailSnapshot {
        self.shared.email_snapshot(force).await
    }

    /// Answer a transport message. Returns `None` for messages that are not
    /// extraction requests and on nested pages.
    pub async fn handle_request(&self, request: &ExtractionRequest) -> Option<ExtractionResponse> {
        if !self.shared.page.is_top_level() || !request.is_extraction() {
            return None;
        }
        Some(ExtractionResponse::ok(self.email_snapshot(request.force).await))
    }

    /// The cached snapshot regardless of age.
    pub async fn cached(&self) -> Option<EmailSnapshot> {
        self.shared
            .cache
            .read()
            .await
            .as_ref()
            .map(|entry| entry.data.clone())
    }

    /// Drop the cached snapshot.
    pub async fn invalidate(&self) {
        *self.shared.cache.write().await = None;
    }

    /// Look for new readable documents now instead of waiting for the next
    /// periodic rescan. Returns how many were newly attached; always zero on
    /// nested pages.
    pub fn rescan(&self) -> usize {
        if !self.shared.page.is_top_level() {
            return 0;
        }
        self.shared.rescan()
    }

    /// Documents currently watched.
    pub fn observed_documents(&self) -> ObservedDocumentSet {
        self.shared.observer.observed()
    }

    pub fn page(&self) -> &Arc<Page> {
        &self.shared.page
    }

    pub fn options(&self) -> &EngineOptions {
        &self.shared.options
    }

    /// Stop all watchers and timers. Equivalent to dropping the engine.
    pub fn detach(self) {}
}

impl Drop for ExtractionEngine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
