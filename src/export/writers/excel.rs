//! Excel writer for export operations
//!
//! Two flavors share one writer:
//! - workbook: rows are kept in memory and may be written out of order, so a
//!   discovered header is simply placed at row 0 once all pages are in
//! - streaming: rows go through a constant-memory worksheet and must arrive
//!   in order; with a discovered field set they are staged to a line file and
//!   replayed behind the header in batches of `flush_rows`
//!
//! Blank cells get the configured placeholder. The workbook is released
//! right after it has been saved.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_xlsxwriter::{Workbook, Worksheet};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;

use crate::error::{Result, SerializationError};
use crate::export::options::ExcelOptions;
use crate::record::{flatten_source, FieldSet, FlatRecord, SearchHit};

use super::{file_size, write_failed, FormatWriter};

/// Longest text a cell accepts
const MAX_CELL_CHARS: usize = 32_767;

/// Flattened rows waiting for the final field set.
struct StagedRows {
    writer: BufWriter<File>,
    path: TempPath,
}

/// Writer for Excel workbooks
pub struct ExcelWriter {
    /// Workbook with a single worksheet; None once saved or aborted.
    /// Only ever accessed through `Mutex::get_mut`.
    workbook: Mutex<Option<Workbook>>,
    /// Path to the output file
    path: PathBuf,
    /// Output columns
    fields: FieldSet,
    options: ExcelOptions,
    /// Rows awaiting replay (streaming flavor with discovered fields)
    staged: Option<StagedRows>,
    /// Column count of every data row (workbook flavor), to pad blanks at the end
    widths: Vec<u16>,
    /// Number of records written
    written: usize,
}

impl ExcelWriter {
    /// Create an in-memory workbook writer
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `options` - Placeholder, header and flush settings
    /// * `fields` - Fixed or discovered field set
    pub async fn workbook(path: &Path, options: &ExcelOptions, fields: FieldSet) -> Result<Self> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        if fields.is_fixed() && options.append_header {
            write_header(sheet, &fields)?;
        }

        debug!("Created Excel workbook writer for: {}", path.display());
        Ok(Self::with_workbook(workbook, path, options, fields, None))
    }

    /// Create a constant-memory streaming writer
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `options` - Placeholder, header and flush settings
    /// * `fields` - Fixed or discovered field set
    pub async fn streaming(path: &Path, options: &ExcelOptions, fields: FieldSet) -> Result<Self> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet_with_constant_memory();

        let staged = if fields.is_fixed() {
            if options.append_header {
                write_header(sheet, &fields)?;
            }
            None
        } else {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let file = tempfile::Builder::new()
                .prefix(".dataformat_rows_")
                .suffix(".ndjson")
                .tempfile_in(dir)
                .map_err(|e| write_failed(dir, e))?;
            let (file, staged_path) = file.into_parts();
            Some(StagedRows {
                writer: BufWriter::new(File::from_std(file)),
                path: staged_path,
            })
        };

        debug!("Created streaming Excel writer for: {}", path.display());
        Ok(Self::with_workbook(workbook, path, options, fields, staged))
    }

    fn with_workbook(
        workbook: Workbook,
        path: &Path,
        options: &ExcelOptions,
        fields: FieldSet,
        staged: Option<StagedRows>,
    ) -> Self {
        Self {
            workbook: Mutex::new(Some(workbook)),
            path: path.to_path_buf(),
            fields,
            options: options.clone(),
            staged,
            widths: Vec::new(),
            written: 0,
        }
    }

    /// Row index of the `n`th data row
    fn data_row(&self, n: usize) -> Result<u32> {
        let offset = usize::from(self.options.append_header);
        u32::try_from(n + offset)
            .map_err(|_| SerializationError::Workbook(format!("row {n} out of range")).into())
    }

    fn sheet(workbook: &mut Mutex<Option<Workbook>>) -> Result<&mut Worksheet> {
        let workbook = workbook
            .get_mut()
            .map_err(|_| SerializationError::Workbook("workbook lock poisoned".to_string()))?
            .as_mut()
            .ok_or_else(|| SerializationError::Workbook("workbook already closed".to_string()))?;
        Ok(workbook.worksheet_from_index(0)?)
    }

    /// Replay staged rows behind the header, `flush_rows` at a time
    async fn replay_staged(&mut self, staged: StagedRows) -> Result<()> {
        let StagedRows { mut writer, path } = staged;
        writer.flush().await.map_err(|e| write_failed(&path, e))?;
        drop(writer);

        if self.options.append_header {
            write_header(Self::sheet(&mut self.workbook)?, &self.fields)?;
        }

        let file = File::open(&path).await.map_err(|e| write_failed(&path, e))?;
        let mut lines = BufReader::new(file).lines();
        let batch_size = self.options.flush_rows.max(1);
        let mut replayed = 0usize;
        let mut done = false;

        while !done {
            let mut batch: Vec<FlatRecord> = Vec::with_capacity(batch_size);
            while batch.len() < batch_size {
                match lines.next_line().await.map_err(|e| write_failed(&path, e))? {
                    Some(line) => batch.push(serde_json::from_str(&line)?),
                    None => {
                        done = true;
                        break;
                    }
                }
            }

            let first_row = self.data_row(replayed)?;
            let sheet = Self::sheet(&mut self.workbook)?;
            for (i, flat) in batch.iter().enumerate() {
                let row = first_row + i as u32;
                write_row(sheet, row, &self.fields, flat, &self.options.blank_value)?;
            }
            replayed += batch.len();
        }

        debug!("Replayed {} staged rows into {}", replayed, self.path.display());
        Ok(())
    }

    /// Fill cells of columns discovered after a row was written
    fn pad_short_rows(&mut self) -> Result<()> {
        let width = self.fields.len();
        let blank = self.options.blank_value.clone();
        let widths = std::mem::take(&mut self.widths);
        let first_row = self.data_row(0)?;
        let sheet = Self::sheet(&mut self.workbook)?;

        for (i, written) in widths.iter().enumerate() {
            for col in usize::from(*written)..width {
                sheet.write_string(first_row + i as u32, column(col)?, &blank)?;
            }
        }
        Ok(())
    }
}

fn column(index: usize) -> Result<u16> {
    u16::try_from(index)
        .map_err(|_| SerializationError::Workbook(format!("column {index} out of range")).into())
}

fn cell_text(value: &str) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

fn write_header(sheet: &mut Worksheet, fields: &FieldSet) -> Result<()> {
    for (col, name) in fields.iter().enumerate() {
        sheet.write_string(0, column(col)?, cell_text(name))?;
    }
    Ok(())
}

fn write_row(
    sheet: &mut Worksheet,
    row: u32,
    fields: &FieldSet,
    flat: &FlatRecord,
    blank: &str,
) -> Result<()> {
    for (col, name) in fields.iter().enumerate() {
        let value = match flat.get(name) {
            Some(Some(value)) if !value.is_empty() => value.as_str(),
            _ => blank,
        };
        sheet.write_string(row, column(col)?, cell_text(value))?;
    }
    Ok(())
}

#[async_trait]
impl FormatWriter for ExcelWriter {
    async fn write_batch(&mut self, hits: &[SearchHit]) -> Result<usize> {
        if hits.is_empty() {
            return Ok(0);
        }

        if let Some(staged) = self.staged.as_mut() {
            let mut buffer = Vec::with_capacity(hits.len() * 128);
            for hit in hits {
                let flat = flatten_source(&hit.source);
                self.fields.observe(flat.keys());
                serde_json::to_writer(&mut buffer, &flat)?;
                buffer.push(b'\n');
            }
            staged
                .writer
                .write_all(&buffer)
                .await
                .map_err(|e| write_failed(&staged.path, e))?;
        } else {
            let first_row = self.data_row(self.written)?;
            let track_widths = !self.fields.is_fixed();
            let sheet = Self::sheet(&mut self.workbook)?;
            for (i, hit) in hits.iter().enumerate() {
                let flat = flatten_source(&hit.source);
                self.fields.observe(flat.keys());
                let row = first_row + i as u32;
                write_row(sheet, row, &self.fields, &flat, &self.options.blank_value)?;
                if track_widths {
                    self.widths.push(column(self.fields.len())?);
                }
            }
        }

        self.written += hits.len();
        debug!("Wrote {} records to Excel (total: {})", hits.len(), self.written);

        Ok(hits.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        if let Some(staged) = self.staged.take() {
            self.replay_staged(staged).await?;
        } else if !self.fields.is_fixed() {
            if self.options.append_header {
                write_header(Self::sheet(&mut self.workbook)?, &self.fields)?;
            }
            self.pad_short_rows()?;
        }

        let taken = self
            .workbook
            .get_mut()
            .map_err(|_| SerializationError::Workbook("workbook lock poisoned".to_string()))?
            .take();
        let Some(mut workbook) = taken else {
            return Ok(());
        };
        workbook.save(&self.path)?;
        drop(workbook);

        debug!("Finalized Excel file: {} ({} records)", self.path.display(), self.written);
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        file_size(&self.path).await
    }

    async fn abort(&mut self) {
        if let Ok(workbook) = self.workbook.get_mut() {
            *workbook = None;
        }
        self.staged = None;
    }
}
