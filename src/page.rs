//! The page context an engine is attached to.
//!
//! A [`Page`] owns the page address, the top-level document and the frame
//! documents the host has mounted. Frame documents are only handed out
//! through [`Page::content_document`], which applies the same-origin rule a
//! browser applies to `iframe.contentDocument`.

use crate::document::LiveDocument;
use crate::error::{ExtractError, Result};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::RwLock;
use url::Url;

static IFRAME: Lazy<Selector> = Lazy::new(|| Selector::parse("iframe").unwrap());

/// All `<iframe>` elements of a parsed document, in document order.
pub(crate) fn iframes(doc: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    doc.select(&IFRAME)
}

/// Where a page context sits in the frame tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRole {
    /// The browsing context of the tab itself.
    TopLevel,
    /// A context running inside some other page's frame.
    Nested,
}

#[derive(Debug, Clone)]
struct MountedFrame {
    url: Url,
    document: LiveDocument,
}

/// A webmail page: address, top document, and mounted frames.
#[derive(Debug)]
pub struct Page {
    url: Url,
    role: FrameRole,
    top: LiveDocument,
    frames: RwLock<HashMap<String, MountedFrame>>,
}

impl Page {
    /// Create a top-level page.
    ///
    /// # Arguments
    /// * `url` - The page address; must be absolute
    /// * `document` - The top-level document
    pub fn new(url: &str, document: LiveDocument) -> Result<Self> {
        Self::with_role(url, document, FrameRole::TopLevel)
    }

    /// Create a page context for a nested frame.
    pub fn nested(url: &str, document: LiveDocument) -> Result<Self> {
        Self::with_role(url, document, FrameRole::Nested)
    }

    fn with_role(url: &str, document: LiveDocument, role: FrameRole) -> Result<Self> {
        let url = Url::parse(url).map_err(|_| ExtractError::InvalidUrl(url.to_string()))?;
        Ok(Self {
            url,
            role,
            top: document,
            frames: RwLock::new(HashMap::new()),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The page address as a string, used for provider routing.
    pub fn address(&self) -> &str {
        self.url.as_str()
    }

    pub fn role(&self) -> FrameRole {
        self.role
    }

    pub fn is_top_level(&self) -> bool {
        self.role == FrameRole::TopLevel
    }

    /// The top-level document.
    pub fn top(&self) -> &LiveDocument {
        &self.top
    }

    /// Attach a document to the frame element identified by `key`.
    ///
    /// `key` is matched against an `<iframe>`'s `id`, then its `name`, then
    /// its `src` resolved against the page address. `url` is the address the
    /// frame document was loaded from; it decides whether the page may read
    /// it. Mounting over an existing key replaces the previous document.
    pub fn mount_frame(&self, key: &str, url: &str, document: LiveDocument) -> Result<()> {
        let url = self
            .url
            .join(url)
            .map_err(|_| ExtractError::InvalidUrl(url.to_string()))?;
        let mut frames = self.frames.write().unwrap_or_else(|e| e.into_inner());
        frames.insert(key.to_string(), MountedFrame { url, document });
        Ok(())
    }

    /// Remove a frame and detach its document.
    pub fn unmount_frame(&self, key: &str) -> Option<LiveDocument> {
        let mut frames = self.frames.write().unwrap_or_else(|e| e.into_inner());
        let frame = frames.remove(key)?;
        frame.document.detach();
        Some(frame.document)
    }

    /// The content document of an `<iframe>` element, if this page may read
    /// it.
    ///
    /// Returns `None` when no document is mounted for the frame, when the
    /// frame was loaded from another origin, or when its document has been
    /// detached. None of these is an error: they are the normal state of
    /// most frames on a webmail page.
    pub fn content_document(&self, iframe: ElementRef<'_>) -> Option<LiveDocument> {
        let frames = self.frames.read().ok()?;
        let frame = self
            .frame_keys(iframe)
            .into_iter()
            .find_map(|key| frames.get(&key))?;

        if !self.same_origin(&frame.url) || frame.document.is_detached() {
            return None;
        }
        Some(frame.document.clone())
    }

    fn frame_keys(&self, iframe: ElementRef<'_>) -> Vec<String> {
        let element = iframe.value();
        let mut keys = Vec::with_capacity(3);
        for attr in ["id", "name"] {
            if let Some(value) = element.attr(attr).map(str::trim).filter(|v| !v.is_empty()) {
                keys.push(value.to_string());
            }
        }
        if let Some(src) = element.attr("src").map(str::trim).filter(|v| !v.is_empty()) {
            match self.url.join(src) {
                Ok(resolved) => keys.push(resolved.to_string()),
                Err(_) => keys.push(src.to_string()),
            }
        }
        keys
    }

    /// `about:` frames inherit the embedding page's origin.
    fn same_origin(&self, frame_url: &Url) -> bool {
        frame_url.scheme() == "about" || frame_url.origin() == self.url.origin()
    }
}
