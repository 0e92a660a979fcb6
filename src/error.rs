//! Error types for the extraction engine.
//!
//! Errors only surface at construction time (bad page address, bad selector
//! table, malformed configuration). Once an engine is running, every failure
//! degrades to an empty or partial [`EmailSnapshot`](crate::EmailSnapshot).

use crate::document::DocumentId;
use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors that can occur while configuring or running an extraction
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The page or frame address could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A selector in a provider table is not valid CSS
    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// The document was removed from the page while it was being read
    #[error("Document {0} is detached")]
    DocumentDetached(DocumentId),

    /// Options or profiles are inconsistent
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration JSON could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
