use serde::{Deserialize, Serialize};

use super::kinds::DataFormatError;

/// JSON error body returned to clients: `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    /// Create an error body with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }

    /// Build the body for a crate error.
    ///
    /// The message includes the whole cause chain so that an I/O failure
    /// underneath a serialization error stays visible to the caller.
    pub fn from_error(err: &DataFormatError) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(err);
        let mut previous = message.clone();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !previous.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            previous = text;
            source = cause.source();
        }
        Self::new(message)
    }

    /// Convert to compact JSON string (single line).
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
