//! Declarative provider layouts.

use super::{Extractor, FrameScanExtractor, StaticLayoutExtractor};
use crate::error::Result;
use crate::options::EngineOptions;
use crate::selectors::{table, FieldSelector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a layout keeps the message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum BodySource {
    /// In the top document; the first accepted selector wins.
    TopDocument { selectors: Vec<FieldSelector> },
    /// In one of the page's visible, same-origin iframes; the longest
    /// accepted text across all frames and selectors wins.
    Frames { selectors: Vec<FieldSelector> },
}

/// Selector tables and address patterns for one webmail layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutProfile {
    /// Provider identity, used in logs.
    pub name: String,
    /// Address substrings that select this layout.
    pub patterns: Vec<String>,
    #[serde(default)]
    pub subject: Vec<FieldSelector>,
    #[serde(default)]
    pub from: Vec<FieldSelector>,
    #[serde(default)]
    pub to: Vec<FieldSelector>,
    pub body: BodySource,
}

impl LayoutProfile {
    /// Gmail: one stable class hook per field.
    pub fn gmail() -> Self {
        Self {
            name: "gmail".to_string(),
            patterns: vec!["mail.google.com".to_string()],
            subject: table(&["h2.hP"], None, None),
            from: table(&["span.go"], None, None),
            to: table(&["span.g2"], None, None),
            body: BodySource::TopDocument {
                selectors: table(&["div.a3s.aiL"], None, None),
            },
        }
    }

    /// Outlook: ARIA roles and the localized sender label.
    pub fn outlook() -> Self {
        Self {
            name: "outlook".to_string(),
            patterns: vec![
                "outlook.live.com".to_string(),
                "outlook.office.com".to_string(),
            ],
            subject: table(&[r#"[role="heading"]"#], None, None),
            from: table(&[r#"[aria-label*="发件人"]"#, r#"[aria-label*="From"]"#], None, None),
            to: Vec::new(),
            body: BodySource::TopDocument {
                selectors: table(&[r#"[role="document"]"#], None, None),
            },
        }
    }

    /// NetEase 163: headers in the shell page, the message in a frame.
    pub fn netease(options: &EngineOptions) -> Self {
        Self {
            name: "netease".to_string(),
            patterns: vec!["mail.163.com".to_string()],
            subject: table(
                &[
                    ".subject",
                    r#"[class*="subject"]"#,
                    ".nui-subject",
                    ".gWel-title",
                    "h2",
                    "h3",
                ],
                None,
                Some(options.subject_max_len),
            ),
            from: table(
                &[
                    ".nui-addr-email",
                    ".from",
                    r#"[class*="from"]"#,
                    ".nui-from",
                    "[data-from]",
                    ".sender",
                ],
                None,
                None,
            ),
            to: Vec::new(),
            body: BodySource::Frames {
                selectors: table(
                    &[
                        ".netease_mail_readhtml",
                        ".public-DraftEditor-content",
                        r#"[class*="mail_readhtml"]"#,
                        ".body",
                        r#"[class*="mailContent"]"#,
                        ".mail-body",
                        ".nui-mailBody",
                        ".content",
                        "#contentDiv",
                    ],
                    Some(options.body_min_len),
                    None,
                ),
            },
        }
    }

    /// The built-in layouts, in routing order.
    pub fn builtin(options: &EngineOptions) -> Vec<Self> {
        vec![Self::gmail(), Self::outlook(), Self::netease(options)]
    }

    /// Compile the tables into an extractor.
    pub fn compile(&self, options: &EngineOptions) -> Result<Arc<dyn Extractor>> {
        let extractor: Arc<dyn Extractor> = match &self.body {
            BodySource::TopDocument { selectors } => {
                Arc::new(StaticLayoutExtractor::new(self, selectors)?)
            }
            BodySource::Frames { selectors } => Arc::new(FrameScanExtractor::new(
                self,
                selectors,
                options.retry_policy(),
            )?),
        };
        Ok(extractor)
    }
}
