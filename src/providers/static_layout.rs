use super::{Extractor, HeaderFields, LayoutProfile};
use crate::error::Result;
use crate::normalize::normalize_body;
use crate::page::Page;
use crate::selectors::{FieldSelector, SelectorChain};
use crate::snapshot::EmailSnapshot;
use async_trait::async_trait;

/// Single-pass extractor for layouts that render the whole message in the
/// top document.
#[derive(Debug, Clone)]
pub struct StaticLayoutExtractor {
    name: String,
    fields: HeaderFields,
    body: SelectorChain,
}

impl StaticLayoutExtractor {
    pub fn new(profile: &LayoutProfile, body: &[FieldSelector]) -> Result<Self> {
        Ok(Self {
            name: profile.name.clone(),
            fields: HeaderFields::compile(profile)?,
            body: SelectorChain::compile(body)?,
        })
    }

    fn read(&self, page: &Page) -> Result<EmailSnapshot> {
        let doc = page.top().parse()?;
        let mut snapshot = self.fields.read(&doc);
        snapshot.body = self.body.first_text(&doc, normalize_body).unwrap_or_default();
        Ok(snapshot)
    }
}

#[async_trait]
impl Extractor for StaticLayoutExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_extract(&self, page: &Page, _force: bool) -> Result<EmailSnapshot> {
        self.read(page)
    }
}
