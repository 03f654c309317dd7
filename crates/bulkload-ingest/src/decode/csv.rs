//! CSV batch decoding
//!
//! Header-driven: rows are mapped to fields by column name, so column
//! order is free and absent columns simply deserialize to `None`.
//! Cells are whitespace-trimmed and blank lines skipped by the reader.

use super::BatchSource;
use crate::error::IngestResult;
use ::csv::{ReaderBuilder, StringRecord, Trim};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::marker::PhantomData;

pub struct CsvBatchSource<R: Read, T> {
    reader: ::csv::Reader<R>,
    headers: StringRecord,
    batch_size: usize,
    total: u64,
    _row: PhantomData<T>,
}

impl<R: Read, T: DeserializeOwned> CsvBatchSource<R, T> {
    pub fn new(input: R, batch_size: usize) -> IngestResult<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(input);
        let headers = reader.headers()?.clone();
        Ok(Self {
            reader,
            headers,
            batch_size,
            total: 0,
            _row: PhantomData,
        })
    }

    /// Column names declared by the file's header record
    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }
}

impl<R: Read, T: DeserializeOwned> BatchSource<T> for CsvBatchSource<R, T> {
    fn next_batch(&mut self) -> IngestResult<Option<Vec<T>>> {
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut record = StringRecord::new();
        while batch.len() < self.batch_size {
            if !self.reader.read_record(&mut record)? {
                break;
            }
            let row: T = record.deserialize(Some(&self.headers))?;
            batch.push(row);
            self.total += 1;
        }
        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }

    fn total(&self) -> u64 {
        self.total
    }
}

/// Read only the header record of a CSV stream, for submit-time
/// preflight checks
pub fn read_csv_headers<R: Read>(input: R) -> IngestResult<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input);
    Ok(reader.headers()?.iter().map(str::to_owned).collect())
}
