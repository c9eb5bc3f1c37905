//! Bulk JSON writer for export operations
//!
//! Two lines per hit: the `index` action naming where the document goes,
//! then its source. The output can be replayed through a bulk API as is.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::Result;
use crate::export::options::BulkOptions;
use crate::record::SearchHit;

use super::{create_writer, file_size, write_failed, FormatWriter};

/// Writer for bulk action/source pairs
pub struct BulkJsonWriter {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Path to the output file
    path: PathBuf,
    /// Action-line overrides
    target: BulkOptions,
    /// Number of records written
    written: usize,
}

impl BulkJsonWriter {
    /// Create a new bulk JSON writer
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `target` - `bulk.index` / `bulk.type` overrides
    pub async fn new(path: &Path, target: &BulkOptions) -> Result<Self> {
        let writer = create_writer(path).await?;

        debug!("Created bulk JSON writer for: {} ({:?})", path.display(), target);

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            target: target.clone(),
            written: 0,
        })
    }

    /// Action line for `hit`; `_type` is left out when neither the hit nor
    /// the override has one
    fn action(&self, hit: &SearchHit) -> Value {
        let mut meta = Map::new();
        let index = self.target.index.as_deref().unwrap_or(&hit.index);
        meta.insert("_index".to_string(), json!(index));
        if let Some(doc_type) = self.target.doc_type.as_deref().or(hit.doc_type.as_deref()) {
            meta.insert("_type".to_string(), json!(doc_type));
        }
        meta.insert("_id".to_string(), json!(hit.id));
        json!({ "index": meta })
    }
}

#[async_trait]
impl FormatWriter for BulkJsonWriter {
    async fn write_batch(&mut self, hits: &[SearchHit]) -> Result<usize> {
        let mut buffer = Vec::with_capacity(hits.len() * 320);
        for hit in hits {
            serde_json::to_writer(&mut buffer, &self.action(hit))?;
            buffer.push(b'\n');
            serde_json::to_writer(&mut buffer, &hit.source)?;
            buffer.push(b'\n');
        }

        self.writer
            .write_all(&buffer)
            .await
            .map_err(|e| write_failed(&self.path, e))?;

        self.written += hits.len();
        debug!("Wrote {} records to bulk JSON (total: {})", hits.len(), self.written);

        Ok(hits.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.writer.flush().await.map_err(|e| write_failed(&self.path, e))?;

        debug!("Finalized bulk JSON file: {} ({} records)", self.path.display(), self.written);
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        file_size(&self.path).await
    }
}
