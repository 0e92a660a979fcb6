//! Ordered selector tables.
//!
//! Each field of each provider is described by a list of [`FieldSelector`]s
//! tried in order: the first selector whose first matching element yields
//! non-empty text within the length bounds wins. Bounds are exclusive and
//! counted in characters.

use crate::error::{ExtractError, Result};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// One candidate location for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
    /// CSS selector.
    pub selector: String,
    /// Text must be longer than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    /// Text must be shorter than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
}

impl FieldSelector {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            min_len: None,
            max_len: None,
        }
    }

    pub fn min_len(mut self, len: usize) -> Self {
        self.min_len = Some(len);
        self
    }

    pub fn max_len(mut self, len: usize) -> Self {
        self.max_len = Some(len);
        self
    }

    /// Whether `text` is non-empty and within bounds.
    pub fn accepts(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let len = text.chars().count();
        self.min_len.map_or(true, |min| len > min) && self.max_len.map_or(true, |max| len < max)
    }
}

/// Build a table from plain selectors sharing the same bounds.
pub fn table(selectors: &[&str], min_len: Option<usize>, max_len: Option<usize>) -> Vec<FieldSelector> {
    selectors
        .iter()
        .map(|selector| FieldSelector {
            selector: (*selector).to_string(),
            min_len,
            max_len,
        })
        .collect()
}

#[derive(Debug, Clone)]
struct Compiled {
    spec: FieldSelector,
    selector: Selector,
}

/// A compiled, ordered selector table.
#[derive(Debug, Clone, Default)]
pub struct SelectorChain {
    entries: Vec<Compiled>,
}

impl SelectorChain {
    /// Compile every selector up front so a bad table fails at configuration
    /// time rather than during extraction.
    pub fn compile(specs: &[FieldSelector]) -> Result<Self> {
        let entries = specs
            .iter()
            .map(|spec| {
                Selector::parse(&spec.selector)
                    .map(|selector| Compiled {
                        spec: spec.clone(),
                        selector,
                    })
                    .map_err(|e| ExtractError::InvalidSelector {
                        selector: spec.selector.clone(),
                        reason: format!("{e:?}"),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// First accepted text, reading each selector's first match with `read`.
    pub fn first_text<F>(&self, doc: &Html, read: F) -> Option<String>
    where
        F: Fn(ElementRef<'_>) -> String,
    {
        self.entries
            .iter()
            .find_map(|entry| entry.read_accepted(doc, &read))
    }

    /// Every accepted text, in table order, one per selector at most.
    pub fn candidates<F>(&self, doc: &Html, read: F) -> Vec<String>
    where
        F: Fn(ElementRef<'_>) -> String,
    {
        self.entries
            .iter()
            .filter_map(|entry| entry.read_accepted(doc, &read))
            .collect()
    }
}

impl Compiled {
    fn read_accepted<F>(&self, doc: &Html, read: &F) -> Option<String>
    where
        F: Fn(ElementRef<'_>) -> String,
    {
        let element = doc.select(&self.selector).next()?;
        let text = read(element);
        self.spec.accepts(&text).then_some(text)
    }
}
