//! Text normalization for extracted fields.
//!
//! Nothing here touches the live page: bodies are normalized from a copy of
//! the subtree, and address/label helpers work on plain strings.

use kuchikikiki::traits::*;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

/// First `local@domain.tld`-shaped run without brackets or quotes.
static ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^\s<>"]+@[^\s<>"]+\.[^\s<>"]+"#).unwrap());

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Labels webmail clients show instead of the signed-in user's address.
const SELF_REFERENCES: [&str; 5] = ["我", "me", "myself", "自己", "self"];

/// Descendants that never contribute readable text.
const NON_TEXT_ELEMENTS: &str = "script, style, svg, img, video, audio";

/// Canonicalize a sender/recipient label to a bare address.
///
/// Self references normalize to the empty string. When no address-shaped
/// substring is present the trimmed input is returned unchanged, so callers
/// must still check the shape before trusting it.
///
/// ```rust
/// use mailsnap::normalize_address;
///
/// assert_eq!(normalize_address("Alice <alice@example.com>"), "alice@example.com");
/// assert_eq!(normalize_address("  Me "), "");
/// assert_eq!(normalize_address("not-an-email"), "not-an-email");
/// ```
pub fn normalize_address(raw: &str) -> String {
    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase();
    if SELF_REFERENCES.contains(&lowered.as_str()) {
        return String::new();
    }

    match ADDRESS.find(trimmed) {
        Some(found) => found.as_str().trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Trim heading or label text.
pub fn normalize_text(raw: &str) -> String {
    raw.trim().to_string()
}

/// Collapse whitespace runs to single spaces and blank-line runs to single
/// newlines, then trim. Applying it twice changes nothing.
pub fn normalize_whitespace(text: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(text, " ");
    let collapsed = BLANK_LINES.replace_all(&collapsed, "\n");
    collapsed.trim().to_string()
}

/// Plain text of a DOM subtree with scripts, styles and media stripped.
pub fn normalize_body(element: ElementRef<'_>) -> String {
    normalize_body_html(&element.html())
}

/// Plain text of an HTML fragment with scripts, styles and media stripped.
///
/// The fragment is re-parsed into a private mutable tree; non-text elements
/// are detached from that copy before its text is read.
pub fn normalize_body_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let copy = kuchikikiki::parse_html().one(html);
    let junk: Vec<_> = match copy.select(NON_TEXT_ELEMENTS) {
        Ok(matches) => matches.collect(),
        Err(()) => Vec::new(),
    };
    for node in junk {
        node.as_node().detach();
    }

    normalize_whitespace(&copy.text_contents())
}

/// Concatenated text of an element, untouched.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}
