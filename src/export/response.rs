//! Outbound responses of an export
//!
//! The HTTP layer turns an [`ExportResponse`] into its wire form using
//! [`ExportResponse::status`], [`ExportResponse::headers`] and
//! [`ExportResponse::body`].

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{DataFormatError, ErrorResponse};

/// Body acknowledging an export written to a server-local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub acknowledged: bool,
    pub file: String,
}

/// Result of one export session, ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportResponse {
    /// Streamed file content
    Attachment {
        content_type: &'static str,
        file_name: String,
        body: Vec<u8>,
    },
    /// Output left in a caller-named file
    Acknowledged { file: PathBuf },
    /// Failed export
    Error { status: u16, error: ErrorResponse },
    /// The client went away; nothing can be sent
    Disconnected,
}

impl ExportResponse {
    /// Response for a failed export
    pub fn from_error(err: &DataFormatError) -> Self {
        if err.is_disconnect() {
            return ExportResponse::Disconnected;
        }
        ExportResponse::Error {
            status: err.status_code(),
            error: ErrorResponse::from_error(err),
        }
    }

    /// HTTP status code
    pub fn status(&self) -> u16 {
        match self {
            ExportResponse::Attachment { .. } | ExportResponse::Acknowledged { .. } => 200,
            ExportResponse::Error { status, .. } => *status,
            ExportResponse::Disconnected => 499,
        }
    }

    /// Response headers
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match self {
            ExportResponse::Attachment {
                content_type,
                file_name,
                body,
            } => vec![
                ("Content-Type", content_type.to_string()),
                ("Content-Length", body.len().to_string()),
                ("Content-Disposition", format!("attachment; filename=\"{file_name}\"")),
                ("Set-Cookie", "fileDownload=true; path=/".to_string()),
            ],
            ExportResponse::Acknowledged { .. } | ExportResponse::Error { .. } => {
                vec![("Content-Type", "application/json; charset=UTF-8".to_string())]
            }
            ExportResponse::Disconnected => Vec::new(),
        }
    }

    /// Response body
    pub fn body(&self) -> Vec<u8> {
        match self {
            ExportResponse::Attachment { body, .. } => body.clone(),
            ExportResponse::Acknowledged { file } => {
                let ack = Acknowledgement {
                    acknowledged: true,
                    file: file.display().to_string(),
                };
                serde_json::to_vec(&ack).unwrap_or_default()
            }
            ExportResponse::Error { error, .. } => serde_json::to_vec(error).unwrap_or_default(),
            ExportResponse::Disconnected => Vec::new(),
        }
    }

    /// Whether the export succeeded
    pub fn is_success(&self) -> bool {
        self.status() == 200
    }
}
