//! # mailsnap
//!
//! Resilient extraction of the email currently shown on a webmail page.
//!
//! ## Overview
//!
//! Webmail clients render messages with vendor-specific, frequently changing
//! markup, often asynchronously and often inside iframes. mailsnap turns such
//! a page into a four-field [`EmailSnapshot`] (`from`, `to`, `subject`,
//! `body`) that can be handed to whatever builds the downstream request.
//!
//! ## Key Features
//!
//! - **Provider Layouts**: Gmail, Outlook and NetEase 163 out of the box, each
//!   described as ordered selector tables; new layouts are added as data
//! - **Frame Scanning**: Reads message bodies from visible, same-origin
//!   iframes and picks the longest qualifying text
//! - **Retry**: Bounded retries while frame content is still loading
//! - **Caching**: Short-lived cache with forced-refresh semantics
//! - **Mutation Watching**: Refreshes the cache when watched documents change
//!   and picks up iframes inserted after load
//! - **Never Fails**: Every failure degrades to empty fields
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use mailsnap::{EngineOptions, ExtractionEngine, ExtractionRequest, LiveDocument, Page};
//! use std::sync::Arc;
//!
//! # async fn run() -> mailsnap::Result<()> {
//! let top = LiveDocument::new(r#"<div class="nui-subject">Hello</div><iframe id="read"></iframe>"#);
//! let page = Arc::new(Page::new("https://mail.163.com/js6/main.jsp", top)?);
//!
//! // Frames the page may read are mounted by the host.
//! let frame = LiveDocument::new("<div class=\"netease_mail_readhtml\">...</div>");
//! page.mount_frame("read", "/js6/read/readhtml.jsp", frame.clone())?;
//!
//! let engine = ExtractionEngine::with_builtin(page, EngineOptions::default())?;
//!
//! // Direct call
//! let snapshot = engine.email_snapshot(true).await;
//! println!("{} from {}", snapshot.subject, snapshot.from);
//!
//! // Or through the transport boundary
//! if let Some(response) = engine.handle_request(&ExtractionRequest::new(false)).await {
//!     println!("{}", serde_json::to_string(&response).unwrap());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Layouts
//!
//! ```rust
//! use mailsnap::{EngineOptions, ProviderRegistry};
//!
//! let options = EngineOptions::default();
//! let registry = ProviderRegistry::from_json(r#"[{
//!     "name": "fastmail",
//!     "patterns": ["app.fastmail.com"],
//!     "subject": [{ "selector": ".v-Message-subject" }],
//!     "from": [{ "selector": ".v-Message-fromEmail" }],
//!     "body": { "source": "top_document", "selectors": [{ "selector": ".v-Message-body" }] }
//! }]"#, &options).unwrap();
//!
//! assert!(registry.supports("https://app.fastmail.com/mail/Inbox"));
//! ```
//!
//! ## Logging
//!
//! Events are emitted through `tracing`; install any subscriber to see them.
//! Provider failures are logged at `warn`, cache and observer activity at
//! `debug`.

mod document;
mod engine;
mod error;
mod message;
mod normalize;
mod observer;
mod options;
mod page;
mod providers;
mod selectors;
mod snapshot;
mod visibility;

// Public exports
pub use document::{DocumentId, LiveDocument, Mutations};
pub use engine::{CacheEntry, ExtractionEngine};
pub use error::{ExtractError, Result};
pub use message::{ExtractionRequest, ExtractionResponse, EXTRACT_ACTION};
pub use normalize::{
    normalize_address, normalize_body, normalize_body_html, normalize_text, normalize_whitespace,
};
pub use observer::ObservedDocumentSet;
pub use options::{EngineOptions, EngineOptionsBuilder, RetryPolicy};
pub use page::{FrameRole, Page};
pub use providers::{
    BodySource, Extractor, FrameScanExtractor, LayoutProfile, ProviderRegistry,
    StaticLayoutExtractor,
};
pub use selectors::{table as selector_table, FieldSelector, SelectorChain};
pub use snapshot::EmailSnapshot;
pub use visibility::{is_visible, ComputedStyle};
