//! Export module for streaming search results into files
//!
//! This module turns a paginated search into one downloadable file:
//! - Streaming pages from the backend so memory stays bounded by one page
//! - Six output formats (CSV, Excel, Excel 2007, bulk JSON, JSON array, GeoJSON)
//! - Temporary or caller-named output sinks with a transmission size limit
//!
//! # Architecture
//!
//! 1. **StreamingQuery**: walks the scroll chain of a [`SearchBackend`]
//! 2. **FormatWriter**: appends each page to the sink in the requested format
//! 3. **ProgressTracker**: counts records and pages
//!
//! These components are orchestrated by the **ExportCoordinator**. An
//! **ExportSession** wraps one request: option parsing, sink management and
//! the mapping of the outcome to an [`ExportResponse`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dataformat::backend::MemoryBackend;
//! use dataformat::config::ExportConfig;
//! use dataformat::export::{AlwaysOpen, ExportSession, RequestParams};
//!
//! # async fn run() {
//! let backend = Arc::new(MemoryBackend::new(500));
//! let session = ExportSession::new(backend, ExportConfig::default());
//!
//! let params = RequestParams::new().with_param("format", "csv").with_param("index", "dataset0");
//! let response = session.execute(&params, Arc::new(AlwaysOpen)).await;
//! assert!(response.is_success());
//! # }
//! ```

pub mod connection;
pub mod coordinator;
pub mod format;
pub mod geometry;
pub mod options;
pub mod progress;
pub mod response;
pub mod session;
pub mod sink;
pub mod streaming;
pub mod writers;

pub use connection::{AlwaysOpen, ConnectionStatus};
pub use coordinator::{ExportCoordinator, ExportResult};
pub use format::ExportFormat;
pub use geometry::{GeometryExtractor, GeometryOptions};
pub use options::{ExportOptions, RequestParams};
pub use progress::ProgressTracker;
pub use response::ExportResponse;
pub use session::ExportSession;
pub use sink::{SinkManager, SizeLimit};
pub use streaming::{ScrollingQuery, SearchBackend, SearchPage, SearchRequest, StreamingQuery};
pub use writers::FormatWriter;
