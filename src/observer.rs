//! Mutation watching for the top document and its readable iframes.
//!
//! Each observed document gets one watcher task. A content mutation arms the
//! document's debounce timer; further mutations re-arm it; once the document
//! has been quiet for the debounce period the watcher asks its
//! [`RefreshTarget`] to re-extract. Watchers end when their document is
//! detached, when the target is gone, or on shutdown.

use crate::document::{DocumentId, LiveDocument, Mutations, Revision};
use crate::page::{iframes, Page};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Something that re-extracts when a watched document changes.
#[async_trait]
pub(crate) trait RefreshTarget: Send + Sync {
    async fn refresh(&self, trigger: DocumentId);
}

/// Identities of the documents that currently have a watcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedDocumentSet {
    ids: HashSet<DocumentId>,
}

impl ObservedDocumentSet {
    /// Returns `false` when the document was already observed.
    pub(crate) fn insert(&mut self, id: DocumentId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub(crate) struct FrameObserver {
    observed: Mutex<ObservedDocumentSet>,
    filter: Mutations,
    debounce: Duration,
    shutdown: CancellationToken,
}

impl FrameObserver {
    pub(crate) fn new(debounce: Duration, shutdown: CancellationToken) -> Self {
        Self {
            observed: Mutex::new(ObservedDocumentSet::default()),
            filter: Mutations::CONTENT,
            debounce,
            shutdown,
        }
    }

    /// Attach watchers to the top document and every readable iframe
    /// document not yet observed. Returns how many were newly attached.
    ///
    /// Must run inside a tokio runtime.
    pub(crate) fn scan_and_observe(&self, page: &Page, target: &Weak<dyn RefreshTarget>) -> usize {
        let mut documents = vec![page.top().clone()];
        match page.top().parse() {
            Ok(top) => documents.extend(iframes(&top).filter_map(|frame| page.content_document(frame))),
            Err(_) => return 0,
        }

        documents
            .into_iter()
            .filter(|document| self.attach(document, target))
            .count()
    }

    fn attach(&self, document: &LiveDocument, target: &Weak<dyn RefreshTarget>) -> bool {
        if document.is_detached() {
            return false;
        }
        {
            let mut observed = self.observed.lock().unwrap_or_else(|e| e.into_inner());
            if !observed.insert(document.id()) {
                return false;
            }
        }

        debug!(document = %document.id(), "observing document");
        let rx = document.subscribe();
        let seen = rx.borrow().version;
        tokio::spawn(watch_document(
            document.clone(),
            rx,
            seen,
            self.filter,
            self.debounce,
            target.clone(),
            self.shutdown.clone(),
        ));
        true
    }

    pub(crate) fn observed(&self) -> ObservedDocumentSet {
        self.observed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Consume the change notification and report whether anything since the
/// last revision this watcher saw touched content.
fn is_relevant(rx: &mut watch::Receiver<Revision>, seen: &mut u64, filter: Mutations) -> bool {
    let revision = rx.borrow_and_update();
    let changes = revision.changes_since(*seen);
    *seen = revision.version;
    changes.intersects(filter)
}

async fn watch_document(
    document: LiveDocument,
    mut rx: watch::Receiver<Revision>,
    mut seen: u64,
    filter: Mutations,
    debounce: Duration,
    target: Weak<dyn RefreshTarget>,
    shutdown: CancellationToken,
) {
    let id = document.id();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            changed = rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
        if document.is_detached() {
            debug!(document = %id, "document detached, watcher stopping");
            return;
        }
        if !is_relevant(&mut rx, &mut seen, filter) {
            continue;
        }

        // One pending timer per document; later mutations push it back.
        let timer = tokio::time::sleep(debounce);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = &mut timer => break,
                changed = rx.changed() => {
                    if changed.is_err() || document.is_detached() {
                        return;
                    }
                    if is_relevant(&mut rx, &mut seen, filter) {
                        timer.as_mut().reset(Instant::now() + debounce);
                    }
                }
            }
        }

        let Some(target) = target.upgrade() else {
            return;
        };
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = target.refresh(id) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counter {
        refreshes: AtomicUsize,
    }

    #[async_trait]
    impl RefreshTarget for Counter {
        async fn refresh(&self, _trigger: DocumentId) {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup() -> (Page, LiveDocument, Arc<Counter>, FrameObserver) {
        let frame = LiveDocument::new("<div></div>");
        let page = Page::new(
            "https://mail.163.com/js6/main.jsp",
            LiveDocument::new(r#"<iframe id="read"></iframe><iframe id="ad"></iframe>"#),
        )
        .unwrap();
        page.mount_frame("read", "/read.jsp", frame.clone()).unwrap();
        page.mount_frame("ad", "https://ads.example.net/", LiveDocument::new(""))
            .unwrap();
        let observer = FrameObserver::new(Duration::from_millis(300), CancellationToken::new());
        (page, frame, Arc::new(Counter::default()), observer)
    }

    #[tokio::test(start_paused = true)]
    async fn attach_is_idempotent_and_skips_cross_origin() {
        let (page, frame, counter, observer) = setup();
        let target: Weak<dyn RefreshTarget> = Arc::downgrade(&counter) as Weak<dyn RefreshTarget>;

        assert_eq!(observer.scan_and_observe(&page, &target), 2);
        assert_eq!(observer.scan_and_observe(&page, &target), 0);

        let observed = observer.observed();
        assert_eq!(observed.len(), 2);
        assert!(observed.contains(page.top().id()));
        assert!(observed.contains(frame.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_mutations_refreshes_once() {
        let (page, frame, counter, observer) = setup();
        let target: Weak<dyn RefreshTarget> = Arc::downgrade(&counter) as Weak<dyn RefreshTarget>;
        observer.scan_and_observe(&page, &target);

        for i in 0..5 {
            frame.replace(format!("<div>{i}</div>"));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(counter.refreshes.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(counter.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attribute_changes_are_ignored() {
        let (page, frame, counter, observer) = setup();
        let target: Weak<dyn RefreshTarget> = Arc::downgrade(&counter) as Weak<dyn RefreshTarget>;
        observer.scan_and_observe(&page, &target);

        frame.mutate(r#"<div class="x"></div>"#, Mutations::ATTRIBUTES);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.refreshes.load(Ordering::SeqCst), 0);

        frame.mutate("<div>typed</div>", Mutations::CHARACTER_DATA);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn content_change_is_not_masked_by_later_attribute_change() {
        let (page, frame, counter, observer) = setup();
        let target: Weak<dyn RefreshTarget> = Arc::downgrade(&counter) as Weak<dyn RefreshTarget>;
        observer.scan_and_observe(&page, &target);

        frame.replace("<div>message body</div>");
        frame.mutate(r#"<div class="read">message body</div>"#, Mutations::ATTRIBUTES);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_pending_refresh() {
        let (page, frame, counter, observer) = setup();
        let target: Weak<dyn RefreshTarget> = Arc::downgrade(&counter) as Weak<dyn RefreshTarget>;
        observer.scan_and_observe(&page, &target);

        frame.replace("<div>new</div>");
        tokio::time::sleep(Duration::from_millis(100)).await;
        observer.shutdown.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.refreshes.load(Ordering::SeqCst), 0);
    }
}
