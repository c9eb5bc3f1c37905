//! Error handling for export operations.
//!
//! This module provides:
//! - The error kinds an export can fail with (configuration, backend,
//!   serialization, size limit, disconnect)
//! - Their HTTP-equivalent status codes
//! - The JSON error body sent back to clients
//!
//! # Example
//!
//! ```rust
//! use dataformat::error::{ConfigError, DataFormatError, ErrorResponse};
//!
//! let err: DataFormatError = ConfigError::UnknownFormat("pdf".to_string()).into();
//! assert_eq!(err.status_code(), 400);
//! let body = ErrorResponse::from_error(&err).to_json().unwrap();
//! assert!(body.starts_with("{\"error\":"));
//! ```

pub mod kinds;
pub mod response;

// Re-export commonly used types
pub use kinds::{
    BackendError, ConfigError, DataFormatError, Result, SerializationError,
};
pub use response::ErrorResponse;
