//! Export session boundary
//!
//! One [`ExportSession::execute`] call serves one export request end to end:
//! options are validated and the sink acquired before the backend is called,
//! every failure is logged with its context and turned into an
//! [`ExportResponse`], and the sink is released on every path.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::ExportConfig;
use crate::error::Result;

use super::connection::ConnectionStatus;
use super::coordinator::{ExportCoordinator, ExportResult};
use super::options::{ExportOptions, RequestParams};
use super::progress::ProgressTracker;
use super::response::ExportResponse;
use super::sink::{Delivery, OutputSink, SinkManager};
use super::streaming::{ScrollingQuery, SearchBackend, SearchPage, StreamingQuery};

/// Context reported when an export fails.
#[derive(Debug, Default)]
struct SessionContext {
    sink_path: Option<PathBuf>,
    pages: u64,
}

/// Runs export requests against a search backend.
///
/// Holds only process-wide, read-only state; concurrent requests share a
/// session without sharing anything mutable.
pub struct ExportSession {
    backend: Arc<dyn SearchBackend>,
    config: ExportConfig,
    sinks: SinkManager,
    show_progress: bool,
}

impl ExportSession {
    /// Create a session
    ///
    /// # Arguments
    /// * `backend` - Search backend
    /// * `config` - Process-wide export configuration
    pub fn new(backend: Arc<dyn SearchBackend>, config: ExportConfig) -> Self {
        let sinks = SinkManager::new(config.temp_dir.clone());
        Self {
            backend,
            config,
            sinks,
            show_progress: false,
        }
    }

    /// Show a terminal progress bar while exporting
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Serve one export request
    ///
    /// # Arguments
    /// * `params` - Request parameters, header and body
    /// * `connection` - Liveness of the requesting client
    ///
    /// # Returns
    /// * `ExportResponse` - Attachment, acknowledgement or error response
    pub async fn execute(
        &self,
        params: &RequestParams,
        connection: Arc<dyn ConnectionStatus>,
    ) -> ExportResponse {
        let mut context = SessionContext::default();
        match self.run(params, connection, &mut context).await {
            Ok(response) => response,
            Err(e) => {
                let sink = context
                    .sink_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string());
                if e.is_disconnect() {
                    info!(
                        "Export aborted by client (sink: {}, pages written: {})",
                        sink, context.pages
                    );
                } else {
                    error!(
                        "Export failed (sink: {}, pages written: {}): {}",
                        sink, context.pages, e
                    );
                }
                ExportResponse::from_error(&e)
            }
        }
    }

    async fn run(
        &self,
        params: &RequestParams,
        connection: Arc<dyn ConnectionStatus>,
        context: &mut SessionContext,
    ) -> Result<ExportResponse> {
        let options = ExportOptions::from_params(params, &self.config)?;
        let sink = self.sinks.acquire(options.file.as_deref())?;
        context.sink_path = Some(sink.path().to_path_buf());

        info!(
            "Exporting {} as {} to {}",
            options.format.file_name(&options.request.indices, &options.request.types),
            options.format,
            if sink.is_temporary() { "response" } else { "file" }
        );

        let exported = match self.backend.search(&options.request).await {
            Ok(initial) => self.export_page(initial, &options, &sink, connection, context).await,
            Err(e) => Err(e),
        };
        if let Err(e) = exported {
            sink.discard();
            return Err(e);
        }

        let limit = options.limit.resolve(self.config.memory_ceiling);
        let response = match sink.deliver(limit).await? {
            Delivery::Body(body) => ExportResponse::Attachment {
                content_type: options.format.content_type(),
                file_name: options
                    .format
                    .file_name(&options.request.indices, &options.request.types),
                body,
            },
            Delivery::File(file) => ExportResponse::Acknowledged { file },
        };
        Ok(response)
    }

    /// Write `initial` and every page after it into the sink
    async fn export_page(
        &self,
        initial: SearchPage,
        options: &ExportOptions,
        sink: &OutputSink,
        connection: Arc<dyn ConnectionStatus>,
        context: &mut SessionContext,
    ) -> Result<ExportResult> {
        let total = if options.request.is_scroll() {
            initial.total_hits
        } else {
            initial.hits.len() as u64
        };
        let mut query = ScrollingQuery::new(self.backend.clone(), initial, options.request.scroll);

        let writer = match options.format.create_writer(sink.path(), options).await {
            Ok(writer) => writer,
            Err(e) => {
                if let Err(close_err) = query.close().await {
                    warn!("Failed to close query after error: {}", close_err);
                }
                return Err(e);
            }
        };

        let tracker = ProgressTracker::new(Some(total), self.show_progress);
        let mut coordinator = ExportCoordinator::new(Box::new(query), tracker, writer, connection);
        let result = coordinator.execute().await;
        context.pages = coordinator.pages_written();
        result
    }
}
