//! Format writers for export operations
//!
//! Every writer consumes one page of hits at a time and appends to its sink
//! file. Opening framing is written when the writer is created, closing
//! framing in [`FormatWriter::finalize`]. The sink file itself belongs to the
//! sink manager; writers never delete it.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::BufWriter;

use crate::error::{DataFormatError, Result, SerializationError};
use crate::record::SearchHit;

pub mod bulk;
pub mod csv;
pub mod excel;
pub mod geojson;
pub mod json_list;

pub use bulk::BulkJsonWriter;
pub use csv::CsvWriter;
pub use excel::ExcelWriter;
pub use geojson::GeoJsonWriter;
pub use json_list::JsonListWriter;

/// Trait for writing hits to different file formats
#[async_trait]
pub trait FormatWriter: Send {
    /// Write a batch of hits
    ///
    /// # Arguments
    /// * `hits` - Hits of one page, possibly empty
    ///
    /// # Returns
    /// * `Result<usize>` - Number of records written
    async fn write_batch(&mut self, hits: &[SearchHit]) -> Result<usize>;

    /// Write closing framing and flush
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    async fn finalize(&mut self) -> Result<()>;

    /// Get the current file size in bytes
    async fn file_size(&self) -> Result<u64>;

    /// Release writer resources after a failure, without finishing the output
    async fn abort(&mut self) {}
}

/// Helper function to create a buffered file writer
///
/// # Arguments
/// * `path` - File path to create (truncated if it exists)
///
/// # Returns
/// * `Result<BufWriter<File>>` - Buffered writer or error
pub(crate) async fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).await.map_err(|e| write_failed(path, e))?;
    Ok(BufWriter::with_capacity(8 * 1024 * 1024, file)) // 8MB buffer
}

/// Size of the file at `path`
pub(crate) async fn file_size(path: &Path) -> Result<u64> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| write_failed(path, e))?;
    Ok(metadata.len())
}

pub(crate) fn write_failed(path: &Path, err: io::Error) -> DataFormatError {
    SerializationError::write(path.display().to_string(), err).into()
}
