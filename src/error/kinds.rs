use std::{fmt, io};

/// Crate-wide `Result` type using [`DataFormatError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, DataFormatError>;

/// Top-level error type for export operations.
///
/// Every component-level failure is folded into this type so that the
/// export-session boundary can log it, map it to a status and clean up.
#[derive(Debug)]
pub enum DataFormatError {
    /// Bad request parameters or configuration; raised before any backend call.
    Config(ConfigError),

    /// Failure reported by the search backend.
    Backend(BackendError),

    /// Failure while serializing a page into the output sink.
    Serialization(SerializationError),

    /// The temporary sink grew beyond the configured transmission limit.
    SizeExceeded { size: u64, limit: u64 },

    /// The client closed the connection before the export completed.
    Disconnected,

    /// I/O errors outside of page serialization.
    Io(io::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Requested output format is not supported.
    UnknownFormat(String),

    /// Output path cannot be used (missing parent directory, not absolute, ...).
    InvalidPath(String),

    /// Invalid parameter or field value.
    InvalidValue { field: String, value: String },

    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),
}

/// Search backend errors.
#[derive(Debug)]
pub enum BackendError {
    /// The initial search request failed.
    SearchFailed(String),

    /// A continuation request failed.
    ScrollFailed(String),

    /// Requested index does not exist.
    IndexNotFound(String),
}

/// Errors raised while writing records into a sink.
#[derive(Debug)]
pub enum SerializationError {
    /// Writing to the sink file failed.
    Write { path: String, source: io::Error },

    /// A record could not be encoded in the target format or charset.
    Encode(String),

    /// The spreadsheet engine rejected an operation.
    Workbook(String),

    /// A record has an unexpected shape.
    Record(String),
}

impl SerializationError {
    /// Wrap an I/O error raised while writing `path`.
    pub fn write(path: impl Into<String>, source: io::Error) -> Self {
        SerializationError::Write {
            path: path.into(),
            source,
        }
    }
}

impl DataFormatError {
    /// HTTP-equivalent status code for this error.
    ///
    /// Configuration problems are the caller's fault (4xx), everything that
    /// happens once the export is running is reported as a server error.
    /// A disconnect uses 499 since no response can reach the client anyway.
    pub fn status_code(&self) -> u16 {
        match self {
            DataFormatError::Config(_) => 400,
            DataFormatError::Backend(BackendError::IndexNotFound(_)) => 404,
            DataFormatError::Disconnected => 499,
            DataFormatError::Backend(_)
            | DataFormatError::Serialization(_)
            | DataFormatError::SizeExceeded { .. }
            | DataFormatError::Io(_)
            | DataFormatError::Generic(_) => 500,
        }
    }

    /// Whether the export was aborted because the client went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, DataFormatError::Disconnected)
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for DataFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormatError::Config(e) => write!(f, "Configuration error: {e}"),
            DataFormatError::Backend(e) => write!(f, "Backend error: {e}"),
            DataFormatError::Serialization(e) => write!(f, "Failed to write data: {e}"),
            DataFormatError::SizeExceeded { size, limit } => write!(
                f,
                "Content size is too large: {size} bytes exceeds the limit of {limit} bytes"
            ),
            DataFormatError::Disconnected => write!(f, "Client disconnected"),
            DataFormatError::Io(e) => write!(f, "I/O error: {e}"),
            DataFormatError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownFormat(name) => write!(f, "Unknown content type: {name}"),
            ConfigError::InvalidPath(msg) => write!(f, "Invalid output path: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::SearchFailed(msg) => write!(f, "Search failed: {msg}"),
            BackendError::ScrollFailed(msg) => write!(f, "Scroll failed: {msg}"),
            BackendError::IndexNotFound(index) => write!(f, "No such index: {index}"),
        }
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::Write { path, source } => {
                write!(f, "Could not write {path}: {source}")
            }
            SerializationError::Encode(msg) => write!(f, "Encoding failed: {msg}"),
            SerializationError::Workbook(msg) => write!(f, "Workbook error: {msg}"),
            SerializationError::Record(msg) => write!(f, "Malformed record: {msg}"),
        }
    }
}

impl std::error::Error for DataFormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataFormatError::Config(e) => Some(e),
            DataFormatError::Backend(e) => Some(e),
            DataFormatError::Serialization(e) => Some(e),
            DataFormatError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for BackendError {}

impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializationError::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

/* ========================= Conversions to DataFormatError ========================= */

impl From<io::Error> for DataFormatError {
    fn from(err: io::Error) -> Self {
        DataFormatError::Io(err)
    }
}

impl From<ConfigError> for DataFormatError {
    fn from(err: ConfigError) -> Self {
        DataFormatError::Config(err)
    }
}

impl From<BackendError> for DataFormatError {
    fn from(err: BackendError) -> Self {
        DataFormatError::Backend(err)
    }
}

impl From<SerializationError> for DataFormatError {
    fn from(err: SerializationError) -> Self {
        DataFormatError::Serialization(err)
    }
}

impl From<rust_xlsxwriter::XlsxError> for DataFormatError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        DataFormatError::Serialization(SerializationError::Workbook(err.to_string()))
    }
}

impl From<serde_json::Error> for DataFormatError {
    fn from(err: serde_json::Error) -> Self {
        DataFormatError::Serialization(SerializationError::Encode(err.to_string()))
    }
}

impl From<String> for DataFormatError {
    fn from(msg: String) -> Self {
        DataFormatError::Generic(msg)
    }
}

impl From<&str> for DataFormatError {
    fn from(msg: &str) -> Self {
        DataFormatError::Generic(msg.to_owned())
    }
}
