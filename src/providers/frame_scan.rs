use super::{Extractor, HeaderFields, LayoutProfile};
use crate::error::Result;
use crate::normalize::normalize_body;
use crate::options::RetryPolicy;
use crate::page::{iframes, Page};
use crate::selectors::{FieldSelector, SelectorChain};
use crate::snapshot::EmailSnapshot;
use crate::visibility::is_visible;
use async_trait::async_trait;
use scraper::Html;
use tracing::debug;

/// Extractor for layouts that render the message inside an iframe that may
/// still be loading when extraction is requested.
///
/// Subject and sender come from the top document. The body is the longest
/// accepted text found by any body selector in any visible iframe this page
/// may read. The whole read is retried on the configured schedule until
/// subject, sender or body turns up.
#[derive(Debug, Clone)]
pub struct FrameScanExtractor {
    name: String,
    fields: HeaderFields,
    body: SelectorChain,
    retry: RetryPolicy,
}

impl FrameScanExtractor {
    pub fn new(profile: &LayoutProfile, body: &[FieldSelector], retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            name: profile.name.clone(),
            fields: HeaderFields::compile(profile)?,
            body: SelectorChain::compile(body)?,
            retry,
        })
    }

    /// One complete read of the page.
    fn attempt(&self, page: &Page) -> Result<EmailSnapshot> {
        let top = page.top().parse()?;
        let mut snapshot = self.fields.read(&top);
        snapshot.body = self.best_frame_body(page, &top);
        Ok(snapshot)
    }

    fn best_frame_body(&self, page: &Page, top: &Html) -> String {
        let mut best = String::new();
        let mut best_len = 0;

        for iframe in iframes(top).filter(|frame| is_visible(*frame)) {
            let Some(document) = page.content_document(iframe) else {
                continue;
            };
            // Detached between lookup and read; same as inaccessible.
            let Ok(frame) = document.parse() else {
                continue;
            };
            for text in self.body.candidates(&frame, normalize_body) {
                let len = text.chars().count();
                if len > best_len {
                    best = text;
                    best_len = len;
                }
            }
        }

        best
    }
}

#[async_trait]
impl Extractor for FrameScanExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_extract(&self, page: &Page, force: bool) -> Result<EmailSnapshot> {
        let attempts = self.retry.attempts_for(force);
        let mut snapshot = EmailSnapshot::default();

        for attempt in 1..=attempts {
            snapshot = self.attempt(page)?;
            if snapshot.has_primary_content() {
                debug!(provider = %self.name, attempt, "frame content found");
                break;
            }
            if attempt < attempts {
                tokio::time::sleep(self.retry.delay).await;
            }
        }

        Ok(snapshot)
    }
}
