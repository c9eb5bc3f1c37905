//! Output sink management
//!
//! A sink is where one export writes its bytes:
//! - a caller-named file, left on disk and acknowledged with a small JSON body
//! - a server-managed temporary file, size-checked, read back as the response
//!   body and always deleted
//!
//! The temporary file is held as a [`TempPath`], so it is removed on every
//! path out of the export: delivered, failed, or dropped after a disconnect.

use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::error::{ConfigError, DataFormatError, Result};
use crate::utils::convert::{format_bytes, parse_bytes};
use crate::utils::fs::validate_parent;

/// Upper bound for bytes transmitted from a temporary sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeLimit {
    /// Absolute number of bytes
    Bytes(u64),
    /// Percentage of the memory ceiling
    Percent(f64),
}

impl SizeLimit {
    /// Parse "10%", "10MB" or "1048576"
    ///
    /// # Arguments
    /// * `value` - Limit as given in a request or the configuration
    ///
    /// # Returns
    /// * `Result<SizeLimit>` - Parsed limit or a configuration error
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let invalid = || -> DataFormatError {
            ConfigError::InvalidValue {
                field: "limit".to_string(),
                value: value.to_string(),
            }
            .into()
        };

        if let Some(percent) = trimmed.strip_suffix('%') {
            let percent: f64 = percent.trim().parse().map_err(|_| invalid())?;
            if !(0.0..=100.0).contains(&percent) {
                return Err(invalid());
            }
            return Ok(SizeLimit::Percent(percent));
        }

        parse_bytes(trimmed).map(SizeLimit::Bytes).ok_or_else(invalid)
    }

    /// Resolve the limit in bytes against the memory ceiling
    pub fn resolve(&self, memory_ceiling: u64) -> u64 {
        match self {
            SizeLimit::Bytes(bytes) => *bytes,
            SizeLimit::Percent(percent) => (memory_ceiling as f64 * percent / 100.0) as u64,
        }
    }
}

/// Where an export writes.
#[derive(Debug)]
pub enum SinkKind {
    /// Caller-named file; no size limit, kept on disk
    File,
    /// Server-managed temporary file; deleted when the sink is dropped
    Temporary(TempPath),
}

/// Destination of a single export.
///
/// Exclusively owned by one export session for its whole lifetime.
#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    kind: SinkKind,
}

/// What the sink produced once the export has completed.
#[derive(Debug)]
pub enum Delivery {
    /// Content of the temporary sink, to be sent as the response body
    Body(Vec<u8>),
    /// Absolute path of the caller-named file
    File(PathBuf),
}

impl OutputSink {
    /// Path the format writer should write to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this sink is a server-managed temporary file
    pub fn is_temporary(&self) -> bool {
        matches!(self.kind, SinkKind::Temporary(_))
    }

    /// Hand the finished output over
    ///
    /// For a temporary sink the size is checked against `limit` before the
    /// file is read; the file is deleted whatever the outcome.
    ///
    /// # Arguments
    /// * `limit` - Maximum body size in bytes (ignored for caller files)
    ///
    /// # Returns
    /// * `Result<Delivery>` - Response body or acknowledged file path
    pub async fn deliver(self, limit: u64) -> Result<Delivery> {
        match self.kind {
            SinkKind::File => {
                let absolute = tokio::fs::canonicalize(&self.path).await?;
                debug!("Export written to {}", absolute.display());
                Ok(Delivery::File(absolute))
            }
            SinkKind::Temporary(temp) => {
                let result = read_within_limit(&self.path, limit).await;
                discard(temp);
                result.map(Delivery::Body)
            }
        }
    }

    /// Drop the sink after a failed export
    ///
    /// Temporary files are deleted; caller files are left where they are.
    pub fn discard(self) {
        match self.kind {
            SinkKind::File => {
                debug!("Leaving partial output at {}", self.path.display());
            }
            SinkKind::Temporary(temp) => discard(temp),
        }
    }
}

async fn read_within_limit(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let size = tokio::fs::metadata(path).await?.len();
    if size > limit {
        return Err(DataFormatError::SizeExceeded { size, limit });
    }
    debug!(
        "Reading {} ({}) for transmission",
        path.display(),
        format_bytes(size)
    );
    Ok(tokio::fs::read(path).await?)
}

fn discard(temp: TempPath) {
    let shown = temp.display().to_string();
    if let Err(e) = temp.close() {
        warn!("Failed to delete: {} ({})", shown, e);
    }
}

/// Creates sinks for export sessions.
#[derive(Debug, Clone, Default)]
pub struct SinkManager {
    /// Directory for temporary sinks; the system temp dir when None
    temp_dir: Option<PathBuf>,
}

impl SinkManager {
    /// Create a sink manager
    ///
    /// # Arguments
    /// * `temp_dir` - Directory for temporary sinks (None for the system default)
    pub fn new(temp_dir: Option<PathBuf>) -> Self {
        Self { temp_dir }
    }

    /// Acquire the sink for one export
    ///
    /// # Arguments
    /// * `caller_path` - Server-local file requested by the caller, if any
    ///
    /// # Returns
    /// * `Result<OutputSink>` - Sink, or a configuration error when the
    ///   caller path cannot be used
    pub fn acquire(&self, caller_path: Option<&str>) -> Result<OutputSink> {
        match caller_path {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.is_absolute() {
                    return Err(ConfigError::InvalidPath(format!(
                        "{} is not an absolute path",
                        path.display()
                    ))
                    .into());
                }
                validate_parent(&path)?;
                Ok(OutputSink {
                    path,
                    kind: SinkKind::File,
                })
            }
            None => {
                let mut builder = tempfile::Builder::new();
                builder.prefix("dataformat_output_").suffix(".dat");
                let file = match &self.temp_dir {
                    Some(dir) => builder.tempfile_in(dir)?,
                    None => builder.tempfile()?,
                };
                let temp = file.into_temp_path();
                debug!("Temporary sink: {}", temp.display());
                Ok(OutputSink {
                    path: temp.to_path_buf(),
                    kind: SinkKind::Temporary(temp),
                })
            }
        }
    }
}
