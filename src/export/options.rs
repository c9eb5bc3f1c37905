//! Per-request export options
//!
//! [`RequestParams`] is what the HTTP layer (or the CLI) collected from the
//! request: query parameters, the `Content-Type` header and the body.
//! [`ExportOptions::from_params`] validates all of it up front so that a bad
//! parameter fails before the backend is ever called.

use std::collections::HashMap;

use encoding_rs::Encoding;
use serde_json::Value;

use super::format::ExportFormat;
use super::geometry::GeometryOptions;
use super::sink::SizeLimit;
use super::streaming::SearchRequest;
use crate::config::ExportConfig;
use crate::error::{ConfigError, DataFormatError, Result};
use crate::utils::time::parse_duration;

/// Raw request as seen by the export endpoint.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    params: HashMap<String, String>,
    content_type: Option<String>,
    body: Option<String>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set the `Content-Type` request header
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the request body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Raw parameter value
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    fn string(&self, key: &str) -> Option<String> {
        self.param(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Boolean parameter, accepting true/false, yes/no, on/off and 1/0
    fn bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.param(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "" | "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(invalid(key, &v)),
            },
        }
    }

    /// Comma-separated list, entries trimmed, blanks dropped
    fn list(&self, key: &str) -> Vec<String> {
        self.param(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn u64(&self, key: &str) -> Result<Option<u64>> {
        self.param(key)
            .map(|v| v.trim().parse::<u64>().map_err(|_| invalid(key, v)))
            .transpose()
    }

    /// Single-byte character parameter
    fn byte(&self, key: &str, default: u8) -> Result<u8> {
        match self.param(key) {
            None => Ok(default),
            Some(v) => {
                let mut chars = v.chars();
                match chars.next() {
                    Some(c) if c.is_ascii() => Ok(c as u8),
                    _ => Err(invalid(key, v)),
                }
            }
        }
    }
}

/// CSV writer settings.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub separator: u8,
    pub quote: u8,
    pub escape: u8,
    pub quote_disabled: bool,
    pub escape_disabled: bool,
    /// Text written for missing or null values
    pub null_string: String,
    pub encoding: &'static Encoding,
    /// Write the header line
    pub append_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            quote: b'"',
            escape: b'"',
            quote_disabled: false,
            escape_disabled: false,
            null_string: String::new(),
            encoding: encoding_rs::UTF_8,
            append_header: true,
        }
    }
}

/// Excel writer settings.
#[derive(Debug, Clone)]
pub struct ExcelOptions {
    /// Placeholder for blank cells
    pub blank_value: String,
    /// Rows replayed per batch by the streaming writer
    pub flush_rows: usize,
    /// Write the header row
    pub append_header: bool,
}

impl Default for ExcelOptions {
    fn default() -> Self {
        Self {
            blank_value: "-".to_string(),
            flush_rows: 1000,
            append_header: true,
        }
    }
}

/// Bulk action-line overrides.
#[derive(Debug, Clone, Default)]
pub struct BulkOptions {
    pub index: Option<String>,
    pub doc_type: Option<String>,
}

/// Everything one export needs to know about its request.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub request: SearchRequest,
    /// Server-local output file
    pub file: Option<String>,
    /// Transmission limit for temporary sinks
    pub limit: SizeLimit,
    /// Caller field allowlist (`fl` / `fields_name`); discovery when None
    pub fields: Option<Vec<String>>,
    pub csv: CsvOptions,
    pub excel: ExcelOptions,
    pub bulk: BulkOptions,
    pub geometry: GeometryOptions,
}

impl ExportOptions {
    /// Parse and validate the request
    ///
    /// # Arguments
    /// * `params` - Request parameters, header and body
    /// * `config` - Process-wide export configuration
    ///
    /// # Returns
    /// * `Result<ExportOptions>` - Options or a configuration error
    pub fn from_params(params: &RequestParams, config: &ExportConfig) -> Result<Self> {
        let format_name = params
            .string("format")
            .or_else(|| params.content_type().map(str::to_string))
            .ok_or_else(|| ConfigError::UnknownFormat("(none)".to_string()))?;
        let format = ExportFormat::from_name(&format_name)?;

        let request = search_request(params, config)?;

        let limit = match params.string("limit") {
            Some(limit) => SizeLimit::parse(&limit)?,
            None => config.limit()?,
        };

        let fields = {
            let mut fields = params.list("fl");
            if fields.is_empty() {
                fields = params.list("fields_name");
            }
            if fields.is_empty() { None } else { Some(fields) }
        };

        let csv = CsvOptions {
            separator: params.byte("csv.separator", b',')?,
            quote: params.byte("csv.quote", b'"')?,
            escape: params.byte("csv.escape", b'"')?,
            quote_disabled: params.bool("csv.quoteDisabled", false)?,
            escape_disabled: params.bool("csv.escapeDisabled", false)?,
            null_string: params.param("csv.nullString").unwrap_or_default().to_string(),
            encoding: match params.string("csv.encoding") {
                Some(label) => Encoding::for_label(label.as_bytes())
                    .ok_or_else(|| invalid("csv.encoding", &label))?,
                None => encoding_rs::UTF_8,
            },
            append_header: params.bool("append.header", true)?,
        };

        let excel = ExcelOptions {
            blank_value: params
                .param("xls.blankValue")
                .map(str::to_string)
                .unwrap_or_else(|| config.excel_blank_value.clone()),
            flush_rows: config.excel_flush_rows,
            append_header: csv.append_header,
        };

        let bulk = BulkOptions {
            index: params.string("bulk.index"),
            doc_type: params.string("bulk.type"),
        };

        let geometry = GeometryOptions {
            lon_field: params.string("geometry.lon_field"),
            lat_field: params.string("geometry.lat_field"),
            alt_field: params.string("geometry.alt_field"),
            type_field: params.string("geometry.type_field"),
            coord_field: params.string("geometry.coord_field"),
            keep_geometry_info: params.bool("keep_geometry_info", false)?,
            exclude_fields: params.list("exclude_fields"),
        };

        Ok(Self {
            format,
            request,
            file: params.string("file"),
            limit,
            fields,
            csv,
            excel,
            bulk,
            geometry,
        })
    }
}

/// Build the search request; pagination bounds anywhere disable scrolling,
/// and so does `disableScroll=true`.
fn search_request(params: &RequestParams, config: &ExportConfig) -> Result<SearchRequest> {
    let source = match params.string("source").or_else(|| params.body().map(str::to_string)) {
        Some(text) if !text.trim().is_empty() => {
            let value: Value = serde_json::from_str(&text).map_err(|_| invalid("source", &text))?;
            if !value.is_object() {
                return Err(invalid("source", &text));
            }
            Some(value)
        }
        _ => None,
    };

    let body_bound = |key: &str| -> Result<Option<u64>> {
        match source.as_ref().and_then(|s| s.get(key)) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| invalid(key, &v.to_string())),
        }
    };

    let from = match params.u64("from")? {
        Some(from) => Some(from),
        None => body_bound("from")?,
    };
    let size = match params.u64("size")? {
        Some(size) => Some(size),
        None => body_bound("size")?,
    };

    let scroll = if from.is_some() || size.is_some() || params.bool("disableScroll", false)? {
        None
    } else {
        match params.string("scroll") {
            Some(value) => Some(parse_duration(&value).ok_or_else(|| invalid("scroll", &value))?),
            None => Some(config.keep_alive()?),
        }
    };

    Ok(SearchRequest {
        indices: params.list("index"),
        types: params.list("type"),
        source,
        query_string: params.string("q"),
        from,
        size,
        scroll,
    })
}

fn invalid(field: &str, value: &str) -> DataFormatError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}
