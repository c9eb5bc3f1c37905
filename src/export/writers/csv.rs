//! CSV writer for export operations
//!
//! Rows are flattened sources in field-set order. With a fixed field set the
//! header goes first; with a discovered one the data is written unheadered
//! and the header is prepended in [`FormatWriter::finalize`] by copying the
//! data behind it into a sibling file that then replaces the sink.

use std::path::{Path, PathBuf};

use ::csv::{QuoteStyle, Terminator, WriterBuilder};
use async_trait::async_trait;
use encoding_rs::Encoding;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::{Result, SerializationError};
use crate::export::options::CsvOptions;
use crate::record::{flatten_source, FieldSet, SearchHit};

use super::{create_writer, file_size, write_failed, FormatWriter};

/// Writer for CSV format
pub struct CsvWriter {
    /// Buffered file writer; None once finalized
    writer: Option<BufWriter<File>>,
    /// Path to the output file
    path: PathBuf,
    /// Output columns
    fields: FieldSet,
    /// Row encoder settings
    builder: WriterBuilder,
    /// Header encoder settings; header names are always quoted
    header_builder: WriterBuilder,
    /// Quote written verbatim around each row value when escaping is off
    raw_quote: Option<u8>,
    header_raw_quote: Option<u8>,
    encoding: &'static Encoding,
    null_string: String,
    append_header: bool,
    /// Number of records written
    written: usize,
}

impl CsvWriter {
    /// Create a new CSV writer
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `options` - Separator, quoting, null string, charset and header settings
    /// * `fields` - Fixed or discovered field set
    ///
    /// # Returns
    /// * `Result<Self>` - New writer instance or error
    pub async fn new(path: &Path, options: &CsvOptions, fields: FieldSet) -> Result<Self> {
        let writer = create_writer(path).await?;

        let builder = encoder_builder(options, !options.quote_disabled);
        let header_builder = encoder_builder(options, true);
        let header_raw_quote = options.escape_disabled.then_some(options.quote);
        let raw_quote = header_raw_quote.filter(|_| !options.quote_disabled);

        debug!(
            "Created CSV writer for: {} (fields: {:?}, encoding: {})",
            path.display(),
            fields.to_vec(),
            options.encoding.name()
        );

        let mut csv = Self {
            writer: Some(writer),
            path: path.to_path_buf(),
            fields,
            builder,
            header_builder,
            raw_quote,
            header_raw_quote,
            encoding: options.encoding,
            null_string: options.null_string.clone(),
            append_header: options.append_header,
            written: 0,
        };

        if csv.fields.is_fixed() && csv.append_header {
            let header = csv.header()?;
            csv.write_bytes(&header).await?;
        }

        Ok(csv)
    }

    /// Header line, encoded
    fn header(&self) -> Result<Vec<u8>> {
        let mut encoder = self.header_builder.from_writer(Vec::new());
        encode_record(&mut encoder, self.fields.iter(), self.header_raw_quote)?;
        self.finish_encoding(encoder)
    }

    /// Encode the rows of one page
    fn rows(&mut self, hits: &[SearchHit]) -> Result<Vec<u8>> {
        let mut encoder = self.builder.from_writer(Vec::with_capacity(hits.len() * 128));
        for hit in hits {
            let flat = flatten_source(&hit.source);
            let added = self.fields.observe(flat.keys());
            if added > 0 && self.written > 0 {
                debug!("Discovered {} new fields after {} rows", added, self.written);
            }

            let null = self.null_string.as_str();
            let row = self.fields.iter().map(|name| match flat.get(name) {
                Some(Some(value)) => value.as_str(),
                _ => null,
            });
            encode_record(&mut encoder, row, self.raw_quote)?;
        }
        self.finish_encoding(encoder)
    }

    fn finish_encoding(&self, encoder: ::csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
        let bytes = encoder
            .into_inner()
            .map_err(|e| SerializationError::Encode(e.to_string()))?;
        if self.encoding == encoding_rs::UTF_8 {
            return Ok(bytes);
        }

        let text = String::from_utf8(bytes).map_err(|e| SerializationError::Encode(e.to_string()))?;
        let (encoded, _, unmappable) = self.encoding.encode(&text);
        if unmappable {
            debug!("Characters not representable in {} were replaced", self.encoding.name());
        }
        Ok(encoded.into_owned())
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            let message = "CSV writer already finalized".to_string();
            return Err(SerializationError::Record(message).into());
        };
        writer.write_all(bytes).await.map_err(|e| write_failed(&self.path, e))
    }

    /// Rewrite `path` as `header` followed by its current content
    async fn prepend_header(path: &Path, header: &[u8]) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staged = tempfile::Builder::new()
            .prefix(".dataformat_header_")
            .tempfile_in(dir)
            .map_err(|e| write_failed(dir, e))?;
        let (file, staged_path) = staged.into_parts();

        let mut out = BufWriter::with_capacity(8 * 1024 * 1024, File::from_std(file));
        out.write_all(header).await.map_err(|e| write_failed(&staged_path, e))?;
        let mut data = File::open(path).await.map_err(|e| write_failed(path, e))?;
        tokio::io::copy(&mut data, &mut out)
            .await
            .map_err(|e| write_failed(&staged_path, e))?;
        out.flush().await.map_err(|e| write_failed(&staged_path, e))?;
        drop(out);
        drop(data);

        staged_path.persist(path).map_err(|e| write_failed(path, e.error))?;
        Ok(())
    }
}

/// Encoder settings; `quoted` selects quoting of every value
fn encoder_builder(options: &CsvOptions, quoted: bool) -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder
        .has_headers(false)
        .delimiter(options.separator)
        .quote(options.quote)
        .terminator(Terminator::Any(b'\n'));
    if !quoted || options.escape_disabled {
        builder.quote_style(QuoteStyle::Never);
    } else {
        builder.quote_style(QuoteStyle::Always);
        if options.escape == options.quote {
            builder.double_quote(true);
        } else {
            builder.double_quote(false).escape(options.escape);
        }
    }
    builder
}

/// Write one record, wrapping each value in `raw_quote` when set
fn encode_record<'a, I>(
    encoder: &mut ::csv::Writer<Vec<u8>>,
    values: I,
    raw_quote: Option<u8>,
) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let written = match raw_quote {
        None => encoder.write_record(values),
        Some(quote) => encoder.write_record(values.into_iter().map(|value| {
            let mut wrapped = Vec::with_capacity(value.len() + 2);
            wrapped.push(quote);
            wrapped.extend_from_slice(value.as_bytes());
            wrapped.push(quote);
            wrapped
        })),
    };
    written.map_err(encode_failed)?;
    Ok(())
}

fn encode_failed(err: ::csv::Error) -> SerializationError {
    SerializationError::Encode(err.to_string())
}

#[async_trait]
impl FormatWriter for CsvWriter {
    async fn write_batch(&mut self, hits: &[SearchHit]) -> Result<usize> {
        if hits.is_empty() {
            return Ok(0);
        }

        let rows = self.rows(hits)?;
        self.write_bytes(&rows).await?;

        self.written += hits.len();
        debug!("Wrote {} records to CSV (total: {})", hits.len(), self.written);

        Ok(hits.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush().await.map_err(|e| write_failed(&self.path, e))?;
        writer.shutdown().await.map_err(|e| write_failed(&self.path, e))?;
        drop(writer);

        if !self.fields.is_fixed() && self.append_header && !self.fields.is_empty() {
            let header = self.header()?;
            Self::prepend_header(&self.path, &header).await?;
            debug!("Prepended header with {} fields to {}", self.fields.len(), self.path.display());
        }

        debug!("Finalized CSV file: {} ({} records)", self.path.display(), self.written);
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        file_size(&self.path).await
    }

    async fn abort(&mut self) {
        self.writer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn hit(id: &str, source: Value) -> SearchHit {
        SearchHit::new("idx", id, source.as_object().cloned().unwrap())
    }

    async fn write_all(options: &CsvOptions, fields: FieldSet, pages: &[Vec<SearchHit>]) -> String {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut writer = CsvWriter::new(&path, options, fields).await.unwrap();
        for page in pages {
            writer.write_batch(page).await.unwrap();
        }
        writer.finalize().await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(writer.file_size().await.unwrap(), content.len() as u64);
        content
    }

    #[tokio::test]
    async fn test_discovered_header_is_prepended() {
        let pages = vec![
            vec![hit("1", json!({ "aaa": "test 1", "bbb": 1 }))],
            vec![hit("2", json!({ "aaa": "test 2", "eee": { "fff": "x" } }))],
        ];
        let content = write_all(&CsvOptions::default(), FieldSet::discovered(), &pages).await;

        assert_eq!(
            content,
            "\"aaa\",\"bbb\",\"eee.fff\"\n\"test 1\",\"1\"\n\"test 2\",\"\",\"x\"\n"
        );
    }

    #[tokio::test]
    async fn test_fixed_fields_drop_unknown_columns() {
        let pages = vec![vec![
            hit("1", json!({ "aaa": "a", "bbb": null, "ccc": "dropped" })),
            hit("2", json!({ "bbb": "b" })),
        ]];
        let options = CsvOptions {
            null_string: "NULL".to_string(),
            ..Default::default()
        };
        let content = write_all(&options, FieldSet::fixed(["bbb", "aaa"]), &pages).await;

        assert_eq!(content, "\"bbb\",\"aaa\"\n\"NULL\",\"a\"\n\"b\",\"NULL\"\n");
    }

    #[tokio::test]
    async fn test_escaping_and_separator() {
        let pages = vec![vec![hit("1", json!({ "text": "say \"hi\"; bye" }))]];
        let options = CsvOptions {
            separator: b';',
            escape: b'\\',
            append_header: false,
            ..Default::default()
        };
        let content = write_all(&options, FieldSet::discovered(), &pages).await;
        assert_eq!(content, "\"say \\\"hi\\\"; bye\"\n");

        let options = CsvOptions {
            quote_disabled: true,
            ..Default::default()
        };
        let content = write_all(&options, FieldSet::fixed(["text"]), &pages).await;
        assert_eq!(content, "\"text\"\nsay \"hi\"; bye\n");
    }

    #[tokio::test]
    async fn test_escape_disabled_keeps_quotes() {
        let pages = vec![vec![hit("1", json!({ "text": "say \"hi\"", "n": 1 }))]];
        let options = CsvOptions {
            escape_disabled: true,
            ..Default::default()
        };

        let content = write_all(&options, FieldSet::discovered(), &pages).await;
        assert_eq!(content, "\"text\",\"n\"\n\"say \"hi\"\",\"1\"\n");

        let content = write_all(&options, FieldSet::fixed(["n", "text"]), &pages).await;
        assert_eq!(content, "\"n\",\"text\"\n\"1\",\"say \"hi\"\"\n");
    }

    #[tokio::test]
    async fn test_quote_disabled_header_stays_quoted() {
        let pages = vec![vec![hit("1", json!({ "text": "say \"hi\"" }))]];
        let options = CsvOptions {
            quote_disabled: true,
            ..Default::default()
        };

        let content = write_all(&options, FieldSet::discovered(), &pages).await;
        assert_eq!(content, "\"text\"\nsay \"hi\"\n");
    }

    #[tokio::test]
    async fn test_zero_records() {
        let content = write_all(&CsvOptions::default(), FieldSet::fixed(["a", "b"]), &[]).await;
        assert_eq!(content, "\"a\",\"b\"\n");

        let content = write_all(&CsvOptions::default(), FieldSet::discovered(), &[vec![]]).await;
        assert_eq!(content, "");
    }

    #[tokio::test]
    async fn test_charset_encoding() {
        let pages = vec![vec![hit("1", json!({ "name": "é" }))]];
        let options = CsvOptions {
            encoding: encoding_rs::WINDOWS_1252,
            append_header: false,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        let mut writer = CsvWriter::new(&path, &options, FieldSet::discovered()).await.unwrap();
        writer.write_batch(&pages[0]).await.unwrap();
        writer.finalize().await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"\"\xe9\"\n");
    }
}
