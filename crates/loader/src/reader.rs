// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Record reader for folders of event CSV files.
//!
//! Files are read whole, the header decides which of the file's columns
//! are projected, and every projected cell arrives as text (empty cells as
//! null). Typing is left to the normalizer.

use crate::error::{Error, Result};
use crate::normalize::SOURCE_COLUMNS;
use crate::record::{RawRecord, RawValue};
use arrow_array::{Array, RecordBatch};
use arrow_array::cast::AsArray;
use arrow_csv::ReaderBuilder;
use arrow_csv::reader::Format;
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use diagnostics::{debug, info};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of raw rows, one file at a time
#[async_trait]
pub trait RecordReader: Send + Sync {
    /// Files to read, in the order their rows are concatenated
    async fn discover(&self) -> Result<Vec<PathBuf>>;

    /// Rows of one file, restricted to `SOURCE_COLUMNS`
    async fn read(&self, file: &Path) -> Result<Vec<RawRecord>>;
}

/// Read every discovered file and concatenate rows in discovery order.
pub async fn read_all(reader: &dyn RecordReader) -> Result<Vec<RawRecord>> {
    let files = reader.discover().await?;
    let num_files = files.len();
    info!("{num_files} files found", num_files: num_files);

    let mut records = Vec::new();
    for (i, file) in files.iter().enumerate() {
        let rows = reader.read(file).await?;
        let row_count = rows.len();
        let done = i + 1;
        let file_name = file.display().to_string();
        debug!(
            "Read {row_count} rows from {file_name}",
            row_count: row_count,
            file_name: file_name
        );
        info!("{done}/{num_files} files processed", done: done, num_files: num_files);
        records.extend(rows);
    }
    Ok(records)
}

/// Reads `*.csv` files directly inside one folder, sorted by file name
#[derive(Debug, Clone)]
pub struct CsvEventReader {
    dir: PathBuf,
    batch_size: usize,
}

impl CsvEventReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            batch_size: 8192,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_error(path: &Path, source: arrow_schema::ArrowError) -> Error {
    Error::Csv {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl RecordReader for CsvEventReader {
    async fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.dir, e))?
        {
            let path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .map_err(|e| io_error(&path, e))?
                .is_file();
            let is_csv = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if is_file && is_csv {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read(&self, file: &Path) -> Result<Vec<RawRecord>> {
        let bytes = tokio::fs::read(file).await.map_err(|e| io_error(file, e))?;
        parse_events(file, bytes, self.batch_size)
    }
}

/// Parse one event file held in memory.
fn parse_events(path: &Path, bytes: Vec<u8>, batch_size: usize) -> Result<Vec<RawRecord>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::schema_mismatch(
            path.display().to_string(),
            "file is empty, expected a header row",
        ));
    }

    let (header, _) = Format::default()
        .with_header(true)
        .infer_schema(Cursor::new(&bytes), Some(0))
        .map_err(|e| csv_error(path, e))?;

    // Every column as nullable text; typing happens in the normalizer
    let schema = Schema::new(
        header
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );

    let projection = SOURCE_COLUMNS
        .iter()
        .map(|column| {
            schema.index_of(column).map_err(|_| {
                Error::schema_mismatch(
                    path.display().to_string(),
                    format!("missing column {column}"),
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let reader = ReaderBuilder::new(Arc::new(schema))
        .with_header(true)
        .with_batch_size(batch_size)
        .with_projection(projection)
        .build(Cursor::new(bytes))
        .map_err(|e| csv_error(path, e))?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| csv_error(path, e))?;
        append_batch(path, &batch, &mut records)?;
    }
    Ok(records)
}

fn append_batch(path: &Path, batch: &RecordBatch, records: &mut Vec<RawRecord>) -> Result<()> {
    let schema = batch.schema();
    let mut columns = Vec::with_capacity(batch.num_columns());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let strings = column.as_string_opt::<i32>().ok_or_else(|| {
            Error::schema_mismatch(
                path.display().to_string(),
                format!("column {} was not read as text", field.name()),
            )
        })?;
        columns.push((field.name().clone(), strings));
    }

    for row in 0..batch.num_rows() {
        let record = columns
            .iter()
            .map(|(name, strings)| {
                let value = if strings.is_null(row) || strings.value(row).is_empty() {
                    RawValue::Null
                } else {
                    RawValue::Text(strings.value(row).to_string())
                };
                (name.clone(), value)
            })
            .collect();
        records.push(record);
    }
    Ok(())
}
