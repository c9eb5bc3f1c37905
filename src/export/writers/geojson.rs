//! GeoJSON writer for export operations
//!
//! Each hit becomes a `Feature` whose geometry comes from the
//! [`GeometryExtractor`] and whose properties are the rest of the source.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::Result;
use crate::export::geometry::{GeometryExtractor, GeometryOptions};
use crate::record::SearchHit;

use super::{create_writer, file_size, write_failed, FormatWriter};

const PRELUDE: &[u8] = br#"{"type": "FeatureCollection", "features": ["#;
const EPILOGUE: &[u8] = b"\n]}";

/// Writer for GeoJSON feature collections
pub struct GeoJsonWriter {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Path to the output file
    path: PathBuf,
    extractor: GeometryExtractor,
    /// Number of features written
    written: usize,
}

impl GeoJsonWriter {
    /// Create a new GeoJSON writer and open the feature collection
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `geometry` - Geometry field mappings
    pub async fn new(path: &Path, geometry: GeometryOptions) -> Result<Self> {
        let mut writer = create_writer(path).await?;
        writer.write_all(PRELUDE).await.map_err(|e| write_failed(path, e))?;

        debug!("Created GeoJSON writer for: {} ({:?})", path.display(), geometry);

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            extractor: GeometryExtractor::new(geometry),
            written: 0,
        })
    }
}

#[async_trait]
impl FormatWriter for GeoJsonWriter {
    async fn write_batch(&mut self, hits: &[SearchHit]) -> Result<usize> {
        let mut buffer = Vec::with_capacity(hits.len() * 256);
        for (i, hit) in hits.iter().enumerate() {
            let feature = self.extractor.feature(hit.source.clone())?;
            if self.written + i > 0 {
                buffer.push(b',');
            }
            buffer.push(b'\n');
            serde_json::to_writer(&mut buffer, &feature)?;
        }

        self.writer
            .write_all(&buffer)
            .await
            .map_err(|e| write_failed(&self.path, e))?;

        self.written += hits.len();
        debug!("Wrote {} features to GeoJSON (total: {})", hits.len(), self.written);

        Ok(hits.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.writer
            .write_all(EPILOGUE)
            .await
            .map_err(|e| write_failed(&self.path, e))?;
        self.writer.flush().await.map_err(|e| write_failed(&self.path, e))?;

        debug!("Finalized GeoJSON file: {} ({} features)", self.path.display(), self.written);
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        file_size(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_feature_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.geojson");
        let options = GeometryOptions {
            lon_field: Some("x_lon".to_string()),
            lat_field: Some("x_lat".to_string()),
            ..Default::default()
        };
        let mut writer = GeoJsonWriter::new(&path, options).await.unwrap();

        let hits: Vec<SearchHit> = (0..3)
            .map(|i| {
                let source = json!({ "name": format!("p{i}"), "x_lon": i, "x_lat": i * 2 });
                SearchHit::new("geo", i.to_string(), source.as_object().cloned().unwrap())
            })
            .collect();
        writer.write_batch(&hits[..2]).await.unwrap();
        writer.write_batch(&hits[2..]).await.unwrap();
        writer.finalize().await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["type"], "FeatureCollection");
        let features = parsed["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[2]["geometry"], json!({ "type": "Point", "coordinates": [2, 4] }));
        assert_eq!(features[2]["properties"], json!({ "name": "p2" }));
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.geojson");
        let mut writer = GeoJsonWriter::new(&path, GeometryOptions::default()).await.unwrap();
        writer.finalize().await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["features"], json!([]));
    }
}
