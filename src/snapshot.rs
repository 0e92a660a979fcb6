//! The structured result handed to callers.
//!
//! ## Example
//!
//! ```rust
//! use mailsnap::EmailSnapshot;
//!
//! let snapshot = EmailSnapshot {
//!     from: "alice@example.com".to_string(),
//!     subject: "Quarterly numbers".to_string(),
//!     ..Default::default()
//! };
//!
//! assert!(snapshot.has_content());
//! let json = serde_json::to_string(&snapshot).unwrap();
//! assert!(json.contains("\"to\":\"\""));
//! ```

use serde::{Deserialize, Serialize};

/// Sender, recipient, subject and body of the email shown on a page.
///
/// Every field is always present. Missing data is the empty string: an empty
/// `from` or `to` means either "unknown" or "the signed-in user", since the
/// self-reference labels webmail clients render (`me`, `我`, ...) normalize
/// to nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailSnapshot {
    /// Normalized sender address.
    #[serde(default)]
    pub from: String,

    /// Normalized recipient address.
    #[serde(default)]
    pub to: String,

    /// Trimmed subject line.
    #[serde(default)]
    pub subject: String,

    /// Whitespace-normalized plain text of the message body.
    #[serde(default)]
    pub body: String,
}

impl EmailSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when all four fields are empty.
    pub fn is_empty(&self) -> bool {
        !self.has_content()
    }

    /// True when any of the four fields carries data. Only such snapshots are
    /// worth caching.
    pub fn has_content(&self) -> bool {
        !(self.from.is_empty()
            && self.to.is_empty()
            && self.subject.is_empty()
            && self.body.is_empty())
    }

    /// True when subject, sender or body carries data.
    ///
    /// The recipient is ignored: webmail clients render it long before the
    /// message itself, so it says nothing about whether the page is ready.
    pub fn has_primary_content(&self) -> bool {
        !(self.subject.is_empty() && self.from.is_empty() && self.body.is_empty())
    }
}
