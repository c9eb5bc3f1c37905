//! Output formats
//!
//! Each [`ExportFormat`] carries its content type, its download file name and
//! the factory for its [`FormatWriter`].

use std::fmt;
use std::path::Path;

use super::options::ExportOptions;
use super::writers::{
    BulkJsonWriter, CsvWriter, ExcelWriter, FormatWriter, GeoJsonWriter, JsonListWriter,
};
use crate::error::{ConfigError, Result};
use crate::record::FieldSet;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Comma-separated values
    Csv,
    /// Spreadsheet built in memory, header placed last
    Excel,
    /// Spreadsheet streamed row by row
    Excel2007,
    /// Bulk action/source line pairs
    Json,
    /// JSON array of sources
    JsonList,
    /// GeoJSON feature collection
    GeoJson,
}

impl ExportFormat {
    /// Resolve a `format` parameter or a `Content-Type` header
    ///
    /// Names match case-insensitively; media type parameters such as
    /// `; charset=UTF-8` are ignored.
    ///
    /// # Arguments
    /// * `name` - Format name or MIME type
    ///
    /// # Returns
    /// * `Result<ExportFormat>` - Format or `ConfigError::UnknownFormat`
    pub fn from_name(name: &str) -> Result<Self> {
        let normalized = name
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let format = match normalized.as_str() {
            "csv" | "text/csv" | "text/comma-separated-values" => ExportFormat::Csv,
            "xls"
            | "application/excel"
            | "application/msexcel"
            | "application/vnd.ms-excel"
            | "application/x-excel"
            | "application/x-msexcel" => ExportFormat::Excel,
            "xlsx" | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                ExportFormat::Excel2007
            }
            "json" | "application/json" | "text/javascript" => ExportFormat::Json,
            "jsonlist" => ExportFormat::JsonList,
            "geojson" | "application/geo+json" => ExportFormat::GeoJson,
            _ => return Err(ConfigError::UnknownFormat(name.to_string()).into()),
        };
        Ok(format)
    }

    /// MIME type sent with the streamed body
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            // legacy MIME type, but the body is an .xlsx (OOXML) workbook
            ExportFormat::Excel => "application/vnd.ms-excel",
            ExportFormat::Excel2007 => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Json | ExportFormat::JsonList => "application/json",
            ExportFormat::GeoJson => "application/geo+json",
        }
    }

    /// File extension of the download
    ///
    /// Both spreadsheet flavors produce an Office Open XML workbook.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel | ExportFormat::Excel2007 => "xlsx",
            ExportFormat::Json | ExportFormat::JsonList => "json",
            ExportFormat::GeoJson => "geojson",
        }
    }

    /// Download file name: `<index>[_<type>].<ext>`, `_all` without an index
    pub fn file_name(&self, indices: &[String], types: &[String]) -> String {
        let mut name = if indices.is_empty() {
            "_all".to_string()
        } else {
            indices.join(",")
        };
        if !types.is_empty() {
            name.push('_');
            name.push_str(&types.join(","));
        }
        format!("{}.{}", name, self.extension())
    }

    /// Open the writer for this format on `path`
    ///
    /// # Arguments
    /// * `path` - Sink file
    /// * `options` - Request options
    ///
    /// # Returns
    /// * `Result<Box<dyn FormatWriter>>` - Writer with its opening framing written
    pub async fn create_writer(
        &self,
        path: &Path,
        options: &ExportOptions,
    ) -> Result<Box<dyn FormatWriter>> {
        let fields = match &options.fields {
            Some(names) => FieldSet::fixed(names),
            None => FieldSet::discovered(),
        };

        let writer: Box<dyn FormatWriter> = match self {
            ExportFormat::Csv => Box::new(CsvWriter::new(path, &options.csv, fields).await?),
            ExportFormat::Excel => {
                Box::new(ExcelWriter::workbook(path, &options.excel, fields).await?)
            }
            ExportFormat::Excel2007 => {
                Box::new(ExcelWriter::streaming(path, &options.excel, fields).await?)
            }
            ExportFormat::Json => Box::new(BulkJsonWriter::new(path, &options.bulk).await?),
            ExportFormat::JsonList => Box::new(JsonListWriter::new(path).await?),
            ExportFormat::GeoJson => {
                Box::new(GeoJsonWriter::new(path, options.geometry.clone()).await?)
            }
        };
        Ok(writer)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xls",
            ExportFormat::Excel2007 => "xlsx",
            ExportFormat::Json => "json",
            ExportFormat::JsonList => "jsonlist",
            ExportFormat::GeoJson => "geojson",
        };
        write!(f, "{name}")
    }
}
