//! Export coordinator for orchestrating export operations
//!
//! Pages are fetched and written strictly one after another: the next page is
//! only requested once the previous one has been handed to the writer. The
//! client connection is checked before every fetch and before every write.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::{DataFormatError, Result};

use super::connection::ConnectionStatus;
use super::progress::ProgressTracker;
use super::streaming::StreamingQuery;
use super::writers::FormatWriter;

/// Result of an export operation
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResult {
    /// Number of records exported
    pub records_exported: u64,
    /// Number of non-empty pages written
    pub pages: u64,
    /// File size in bytes
    pub file_size_bytes: u64,
    /// Time taken for export
    pub elapsed_ms: u64,
}

/// Coordinator for export operations
///
/// Drives the streaming query until it is exhausted, feeding each page to the
/// format writer.
pub struct ExportCoordinator {
    /// Streaming query for fetching pages
    query: Box<dyn StreamingQuery>,
    /// Progress tracker
    tracker: ProgressTracker,
    /// Format writer for output
    writer: Box<dyn FormatWriter>,
    /// Liveness of the client connection
    connection: Arc<dyn ConnectionStatus>,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    pub fn new(
        query: Box<dyn StreamingQuery>,
        tracker: ProgressTracker,
        writer: Box<dyn FormatWriter>,
        connection: Arc<dyn ConnectionStatus>,
    ) -> Self {
        Self {
            query,
            tracker,
            writer,
            connection,
        }
    }

    /// Number of pages written so far
    pub fn pages_written(&self) -> u64 {
        self.tracker.pages()
    }

    /// Execute the export operation
    ///
    /// On failure the writer is aborted and the query closed, both best
    /// effort, and the original error is returned.
    ///
    /// # Returns
    /// * `Result<ExportResult>` - Export statistics or error
    pub async fn execute(&mut self) -> Result<ExportResult> {
        let start_time = Instant::now();
        info!("Starting export operation");

        if let Err(e) = self.run().await {
            self.writer.abort().await;
            if let Err(close_err) = self.query.close().await {
                warn!("Failed to close query after error: {}", close_err);
            }
            self.tracker.finish();
            return Err(e);
        }

        self.tracker.finish();
        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        let file_size_bytes = self.writer.file_size().await?;
        let records_exported = self.tracker.records();

        info!(
            "Export completed: {} records, {} pages, {} bytes, {} ms",
            records_exported,
            self.tracker.pages(),
            file_size_bytes,
            elapsed_ms
        );

        Ok(ExportResult {
            records_exported,
            pages: self.tracker.pages(),
            file_size_bytes,
            elapsed_ms,
        })
    }

    async fn run(&mut self) -> Result<()> {
        loop {
            self.ensure_connected()?;

            debug!("Fetching page #{}", self.tracker.pages() + 1);
            let Some(hits) = self.query.next_batch().await? else {
                debug!("No more pages available");
                break;
            };

            self.ensure_connected()?;
            let count = self.writer.write_batch(&hits).await?;
            self.tracker.page_written(count as u64);

            if self.tracker.pages() % 10 == 0 {
                info!(
                    "Progress: {} records exported ({} pages)",
                    self.tracker.records(),
                    self.tracker.pages()
                );
            }
        }

        debug!("Finalizing output file");
        self.writer.finalize().await?;
        self.query.close().await?;
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connection.is_open() {
            Ok(())
        } else {
            info!("Client disconnected after {} pages", self.tracker.pages());
            Err(DataFormatError::Disconnected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::Map;

    use crate::error::SerializationError;
    use crate::export::connection::AlwaysOpen;
    use crate::record::SearchHit;

    struct MockStreamingQuery {
        batches: Vec<Vec<SearchHit>>,
        current: usize,
        closed: Arc<AtomicBool>,
    }

    impl MockStreamingQuery {
        fn new(batches: Vec<Vec<SearchHit>>, closed: Arc<AtomicBool>) -> Self {
            Self {
                batches,
                current: 0,
                closed,
            }
        }
    }

    #[async_trait]
    impl StreamingQuery for MockStreamingQuery {
        async fn next_batch(&mut self) -> Result<Option<Vec<SearchHit>>> {
            if self.current < self.batches.len() {
                let batch = self.batches[self.current].clone();
                self.current += 1;
                Ok(Some(batch))
            } else {
                Ok(None)
            }
        }

        async fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockWriter {
        written: Vec<SearchHit>,
        fail_on_batch: Option<usize>,
        batches: usize,
        finalized: bool,
        aborted: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FormatWriter for MockWriter {
        async fn write_batch(&mut self, hits: &[SearchHit]) -> Result<usize> {
            self.batches += 1;
            if self.fail_on_batch == Some(self.batches) {
                return Err(SerializationError::Record("bad record".to_string()).into());
            }
            self.written.extend_from_slice(hits);
            Ok(hits.len())
        }

        async fn finalize(&mut self) -> Result<()> {
            self.finalized = true;
            Ok(())
        }

        async fn file_size(&self) -> Result<u64> {
            Ok(self.written.len() as u64 * 100)
        }

        async fn abort(&mut self) {
            self.aborted.store(true, Ordering::SeqCst);
        }
    }

    /// Open for the first `checks` liveness checks, closed afterwards.
    struct ClosesAfter {
        checks: AtomicUsize,
    }

    impl ConnectionStatus for ClosesAfter {
        fn is_open(&self) -> bool {
            self.checks
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    fn batch(ids: &[&str]) -> Vec<SearchHit> {
        ids.iter().map(|id| SearchHit::new("idx", *id, Map::new())).collect()
    }

    #[tokio::test]
    async fn test_coordinator_basic() {
        let closed = Arc::new(AtomicBool::new(false));
        let batches = vec![batch(&["1", "2"]), batch(&["3"])];
        let query = Box::new(MockStreamingQuery::new(batches, closed.clone()));
        let writer = Box::new(MockWriter::default());

        let mut coordinator =
            ExportCoordinator::new(query, ProgressTracker::default(), writer, Arc::new(AlwaysOpen));
        let result = coordinator.execute().await.unwrap();

        assert_eq!(result.records_exported, 3);
        assert_eq!(result.pages, 2);
        assert_eq!(result.file_size_bytes, 300);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_coordinator_empty_query() {
        let closed = Arc::new(AtomicBool::new(false));
        let query = Box::new(MockStreamingQuery::new(vec![], closed));
        let writer = Box::new(MockWriter::default());

        let mut coordinator =
            ExportCoordinator::new(query, ProgressTracker::default(), writer, Arc::new(AlwaysOpen));
        let result = coordinator.execute().await.unwrap();

        assert_eq!(result.records_exported, 0);
        assert_eq!(result.pages, 0);
    }

    #[tokio::test]
    async fn test_write_failure_aborts_and_closes() {
        let closed = Arc::new(AtomicBool::new(false));
        let aborted = Arc::new(AtomicBool::new(false));
        let query = Box::new(MockStreamingQuery::new(
            vec![batch(&["1"]), batch(&["2"]), batch(&["3"])],
            closed.clone(),
        ));
        let writer = Box::new(MockWriter {
            fail_on_batch: Some(2),
            aborted: aborted.clone(),
            ..Default::default()
        });

        let mut coordinator =
            ExportCoordinator::new(query, ProgressTracker::default(), writer, Arc::new(AlwaysOpen));
        let err = coordinator.execute().await.unwrap_err();

        assert!(matches!(err, DataFormatError::Serialization(_)));
        assert_eq!(coordinator.pages_written(), 1);
        assert!(aborted.load(Ordering::SeqCst));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_disconnect_stops_before_next_fetch() {
        let closed = Arc::new(AtomicBool::new(false));
        let query = Box::new(MockStreamingQuery::new(
            vec![batch(&["1"]), batch(&["2"]), batch(&["3"])],
            closed.clone(),
        ));
        let writer = Box::new(MockWriter::default());
        // one page: check before fetch, check before write
        let connection = Arc::new(ClosesAfter {
            checks: AtomicUsize::new(2),
        });

        let mut coordinator =
            ExportCoordinator::new(query, ProgressTracker::default(), writer, connection);
        let err = coordinator.execute().await.unwrap_err();

        assert!(err.is_disconnect());
        assert_eq!(coordinator.pages_written(), 1);
        assert!(closed.load(Ordering::SeqCst));
    }
}
