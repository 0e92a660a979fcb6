//! Request and response values exchanged with the extension transport.
//!
//! ```rust
//! use mailsnap::ExtractionRequest;
//!
//! let request: ExtractionRequest =
//!     serde_json::from_str(r#"{ "requestExtraction": true, "force": true }"#).unwrap();
//! assert!(request.is_extraction());
//! assert!(request.force);
//!
//! // The popup's legacy message shape is understood as well.
//! let legacy: ExtractionRequest =
//!     serde_json::from_str(r#"{ "action": "extractEmail" }"#).unwrap();
//! assert!(legacy.is_extraction());
//! assert!(!legacy.force);
//! ```

use crate::snapshot::EmailSnapshot;
use serde::{Deserialize, Serialize};

/// Action name used by popup-originated extraction messages.
pub const EXTRACT_ACTION: &str = "extractEmail";

/// Inbound message. Anything that is not an extraction request is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    #[serde(default)]
    pub request_extraction: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Bypass the cache and widen the retry budget.
    #[serde(default)]
    pub force: bool,
}

impl ExtractionRequest {
    pub fn new(force: bool) -> Self {
        Self {
            request_extraction: true,
            action: None,
            force,
        }
    }

    pub fn is_extraction(&self) -> bool {
        self.request_extraction || self.action.as_deref() == Some(EXTRACT_ACTION)
    }
}

/// Outbound answer. Extraction itself never fails, so `success` is always
/// true; missing data shows up as empty fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub success: bool,
    pub data: EmailSnapshot,
}

impl ExtractionResponse {
    pub fn ok(data: EmailSnapshot) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
