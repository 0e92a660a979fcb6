//! Live documents: HTML that changes while the engine is watching it.
//!
//! A [`LiveDocument`] is a cheap, shareable handle. Writers replace its HTML
//! and say which kinds of mutation happened; every replacement bumps the
//! revision and wakes any watcher subscribed to the document. Readers parse a
//! snapshot of the current HTML with `scraper`; the parsed tree is theirs and
//! never observes later mutations.

use crate::error::{ExtractError, Result};
use bitflags::bitflags;
use scraper::Html;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

bitflags! {
    /// Kinds of change carried by a mutation, mirroring what a DOM mutation
    /// observer reports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Mutations: u8 {
        /// Children of the observed root were added or removed.
        const CHILD_LIST = 1 << 0;
        /// Something below the observed root's children changed.
        const SUBTREE = 1 << 1;
        /// Text node contents changed.
        const CHARACTER_DATA = 1 << 2;
        /// Attributes changed.
        const ATTRIBUTES = 1 << 3;
    }
}

impl Mutations {
    /// Changes that can alter extracted text.
    pub const CONTENT: Self = Self::CHILD_LIST
        .union(Self::SUBTREE)
        .union(Self::CHARACTER_DATA);
}

/// Process-unique identity of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Number of mutation kinds tracked per revision.
const KINDS: usize = Mutations::all().bits().count_ones() as usize;

/// One state of a document.
///
/// The channel only holds the latest revision, so each revision remembers
/// the version at which every mutation kind last happened. A watcher that
/// skipped intermediate revisions still learns every kind of change it
/// missed through [`changes_since`](Revision::changes_since).
#[derive(Debug, Clone)]
pub(crate) struct Revision {
    pub(crate) html: Arc<str>,
    pub(crate) version: u64,
    last_changed: [u64; KINDS],
}

impl Revision {
    fn initial(html: Arc<str>) -> Self {
        Self {
            html,
            version: 0,
            last_changed: [0; KINDS],
        }
    }

    fn record(&mut self, mutations: Mutations) {
        self.version += 1;
        for (slot, kind) in self.last_changed.iter_mut().zip(Mutations::all().iter()) {
            if mutations.contains(kind) {
                *slot = self.version;
            }
        }
    }

    /// Every kind of change made after `version`.
    pub(crate) fn changes_since(&self, version: u64) -> Mutations {
        self.last_changed
            .iter()
            .zip(Mutations::all().iter())
            .filter(|(at, _)| **at > version)
            .fold(Mutations::empty(), |acc, (_, kind)| acc | kind)
    }
}

struct Inner {
    id: DocumentId,
    tx: watch::Sender<Revision>,
    detached: AtomicBool,
}

/// Shared handle to a mutable HTML document.
#[derive(Clone)]
pub struct LiveDocument {
    inner: Arc<Inner>,
}

impl LiveDocument {
    pub fn new(html: impl Into<String>) -> Self {
        let html: String = html.into();
        let (tx, _rx) = watch::channel(Revision::initial(Arc::from(html)));
        Self {
            inner: Arc::new(Inner {
                id: DocumentId::next(),
                tx,
                detached: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.inner.id
    }

    pub fn version(&self) -> u64 {
        self.inner.tx.borrow().version
    }

    pub fn is_detached(&self) -> bool {
        self.inner.detached.load(Ordering::Acquire)
    }

    /// Current HTML source.
    pub fn html(&self) -> Result<Arc<str>> {
        if self.is_detached() {
            return Err(ExtractError::DocumentDetached(self.id()));
        }
        Ok(Arc::clone(&self.inner.tx.borrow().html))
    }

    /// Parse the current HTML into a private tree.
    pub fn parse(&self) -> Result<Html> {
        let html = self.html()?;
        Ok(Html::parse_document(&html))
    }

    /// Replace the document's HTML, recording what kind of change it was.
    /// Mutating a detached document is a no-op.
    pub fn mutate(&self, html: impl Into<String>, mutations: Mutations) {
        if self.is_detached() {
            return;
        }
        let html: String = html.into();
        let html: Arc<str> = Arc::from(html);
        self.inner.tx.send_modify(|revision| {
            revision.html = html;
            revision.record(mutations);
        });
    }

    /// Replace the document's content. Reported as a child-list and subtree
    /// change, which is what re-rendering a mail view looks like.
    pub fn replace(&self, html: impl Into<String>) {
        self.mutate(html, Mutations::CHILD_LIST | Mutations::SUBTREE);
    }

    /// Remove the document from its page. Readers get
    /// [`ExtractError::DocumentDetached`] and watchers stop.
    pub fn detach(&self) {
        if self.inner.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner
            .tx
            .send_modify(|revision| revision.record(Mutations::CHILD_LIST));
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Revision> {
        self.inner.tx.subscribe()
    }
}

impl fmt::Debug for LiveDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveDocument")
            .field("id", &self.id())
            .field("version", &self.version())
            .field("detached", &self.is_detached())
            .finish()
    }
}
