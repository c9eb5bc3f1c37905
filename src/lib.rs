//! dataformat library
//!
//! Streams the hits of a paginated search into a single downloadable file.
//! It can be embedded behind an HTTP endpoint or driven by the bundled CLI.
//!
//! # Modules
//!
//! - `backend`: In-memory search backend with scroll support
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Export sessions, format writers and output sinks
//! - `record`: Search hits, flattening and field selection
//! - `utils`: Utility functions and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dataformat::backend::MemoryBackend;
//! use dataformat::export::{AlwaysOpen, ExportSession, RequestParams};
//! use dataformat::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let backend = MemoryBackend::new(config.export.page_size);
//!     backend.load_ndjson("data.ndjson".as_ref(), "dataset0").await?;
//!
//!     let session = ExportSession::new(Arc::new(backend), config.export);
//!     let params = RequestParams::new().with_param("format", "geojson");
//!     let response = session.execute(&params, Arc::new(AlwaysOpen)).await;
//!     println!("status {}", response.status());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod record;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{DataFormatError, Result};
pub use export::{ExportFormat, ExportResponse, ExportSession, RequestParams};
pub use record::SearchHit;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
