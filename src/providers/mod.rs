//! Provider extractors and address-based routing.
//!
//! Every webmail layout is handled by an [`Extractor`]. The built-in ones are
//! described by data ([`LayoutProfile`]) and compile to one of two
//! implementations:
//!
//! - [`StaticLayoutExtractor`] reads every field from the top document in a
//!   single pass (Gmail, Outlook).
//! - [`FrameScanExtractor`] reads headers from the top document and the body
//!   from whichever visible, same-origin iframe holds the longest message
//!   text, retrying while frames are still loading (NetEase 163).
//!
//! [`ProviderRegistry`] picks the extractor for a page by substring match on
//! the page address.

mod frame_scan;
mod profile;
mod static_layout;

pub use frame_scan::FrameScanExtractor;
pub use profile::{BodySource, LayoutProfile};
pub use static_layout::StaticLayoutExtractor;

use crate::error::{ExtractError, Result};
use crate::normalize::{element_text, normalize_address, normalize_text};
use crate::options::EngineOptions;
use crate::page::Page;
use crate::selectors::SelectorChain;
use crate::snapshot::EmailSnapshot;
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Extraction strategy for one webmail layout.
///
/// Implementors provide [`try_extract`](Extractor::try_extract); callers use
/// [`extract`](Extractor::extract), which never fails.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Provider identity used in logs.
    fn name(&self) -> &str;

    /// Run the extraction. `force` asks for a fresh read and may widen the
    /// retry budget.
    async fn try_extract(&self, page: &Page, force: bool) -> Result<EmailSnapshot>;

    /// Run the extraction, degrading any failure to an empty snapshot.
    async fn extract(&self, page: &Page, force: bool) -> EmailSnapshot {
        match self.try_extract(page, force).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(provider = self.name(), %error, "extraction failed");
                EmailSnapshot::default()
            }
        }
    }
}

/// Compiled subject/sender/recipient tables shared by both extractor kinds.
#[derive(Debug, Clone)]
pub(crate) struct HeaderFields {
    subject: SelectorChain,
    from: SelectorChain,
    to: SelectorChain,
}

impl HeaderFields {
    pub(crate) fn compile(profile: &LayoutProfile) -> Result<Self> {
        Ok(Self {
            subject: SelectorChain::compile(&profile.subject)?,
            from: SelectorChain::compile(&profile.from)?,
            to: SelectorChain::compile(&profile.to)?,
        })
    }

    /// Read the header fields. Each field is independent: a miss leaves it
    /// empty and the others are still read. Bounds apply to the trimmed raw
    /// text; addresses are normalized after a candidate is accepted.
    pub(crate) fn read(&self, doc: &Html) -> EmailSnapshot {
        EmailSnapshot {
            subject: self.subject.first_text(doc, trimmed_text).unwrap_or_default(),
            from: self
                .from
                .first_text(doc, trimmed_text)
                .map(|raw| normalize_address(&raw))
                .unwrap_or_default(),
            to: self
                .to
                .first_text(doc, trimmed_text)
                .map(|raw| normalize_address(&raw))
                .unwrap_or_default(),
            body: String::new(),
        }
    }
}

fn trimmed_text(element: ElementRef<'_>) -> String {
    normalize_text(&element_text(element))
}

#[derive(Clone)]
struct Route {
    patterns: Vec<String>,
    extractor: Arc<dyn Extractor>,
}

/// Ordered mapping from address substrings to extractors.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    routes: Vec<Route>,
}

impl ProviderRegistry {
    /// An empty registry; every page routes to nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gmail, Outlook and NetEase 163, configured from `options`.
    pub fn with_builtin(options: &EngineOptions) -> Result<Self> {
        let mut registry = Self::new();
        for profile in LayoutProfile::builtin(options) {
            registry.register_profile(&profile, options)?;
        }
        Ok(registry)
    }

    /// Load a JSON array of [`LayoutProfile`]s.
    pub fn from_json(json: &str, options: &EngineOptions) -> Result<Self> {
        let profiles: Vec<LayoutProfile> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for profile in &profiles {
            registry.register_profile(profile, options)?;
        }
        Ok(registry)
    }

    /// Route pages whose address contains any of `patterns` to `extractor`.
    /// Earlier registrations win.
    pub fn register<I, S>(&mut self, patterns: I, extractor: Arc<dyn Extractor>) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        if patterns.is_empty() || patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(ExtractError::Config(format!(
                "provider `{}` needs non-empty address patterns",
                extractor.name()
            )));
        }
        self.routes.push(Route {
            patterns,
            extractor,
        });
        Ok(())
    }

    /// Compile and register a profile.
    pub fn register_profile(&mut self, profile: &LayoutProfile, options: &EngineOptions) -> Result<()> {
        let extractor = profile.compile(options)?;
        self.register(profile.patterns.iter().cloned(), extractor)
    }

    /// The extractor responsible for `address`, if any.
    pub fn route(&self, address: &str) -> Option<Arc<dyn Extractor>> {
        self.routes
            .iter()
            .find(|route| route.patterns.iter().any(|p| address.contains(p.as_str())))
            .map(|route| Arc::clone(&route.extractor))
    }

    /// Whether any provider handles `address`.
    pub fn supports(&self, address: &str) -> bool {
        self.route(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.routes
                    .iter()
                    .map(|route| (route.extractor.name(), &route.patterns)),
            )
            .finish()
    }
}
