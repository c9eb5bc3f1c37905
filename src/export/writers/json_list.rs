//! JSON array writer for export operations
//!
//! Sources are written one per line inside a single array:
//! `[` at open, `,` between records, `]` at finalize.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::Result;
use crate::record::SearchHit;

use super::{create_writer, file_size, write_failed, FormatWriter};

/// Writer for JSON array format
pub struct JsonListWriter {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Path to the output file
    path: PathBuf,
    /// Number of records written
    written: usize,
}

impl JsonListWriter {
    /// Create a new JSON array writer and open the array
    ///
    /// # Arguments
    /// * `path` - Output file path
    ///
    /// # Returns
    /// * `Result<Self>` - New writer instance or error
    pub async fn new(path: &Path) -> Result<Self> {
        let mut writer = create_writer(path).await?;
        writer.write_all(b"[").await.map_err(|e| write_failed(path, e))?;

        debug!("Created JSON list writer for: {}", path.display());

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            written: 0,
        })
    }
}

#[async_trait]
impl FormatWriter for JsonListWriter {
    async fn write_batch(&mut self, hits: &[SearchHit]) -> Result<usize> {
        let mut buffer = Vec::with_capacity(hits.len() * 256);
        for (i, hit) in hits.iter().enumerate() {
            if self.written + i > 0 {
                buffer.push(b',');
            }
            buffer.push(b'\n');
            serde_json::to_writer(&mut buffer, &hit.source)?;
        }

        self.writer
            .write_all(&buffer)
            .await
            .map_err(|e| write_failed(&self.path, e))?;

        self.written += hits.len();
        debug!("Wrote {} records to JSON list (total: {})", hits.len(), self.written);

        Ok(hits.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.writer
            .write_all(b"\n]")
            .await
            .map_err(|e| write_failed(&self.path, e))?;
        self.writer.flush().await.map_err(|e| write_failed(&self.path, e))?;

        debug!("Finalized JSON list file: {} ({} records)", self.path.display(), self.written);
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        file_size(&self.path).await
    }
}
