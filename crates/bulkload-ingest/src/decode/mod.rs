//! Streaming batch decoders
//!
//! Both formats are exposed behind the same pull interface: the caller
//! asks for the next batch of rows and drives the loop, so at most one
//! batch is resident at a time no matter how large the upload is.

pub mod csv;
pub mod json;

pub use csv::{read_csv_headers, CsvBatchSource};
pub use json::JsonBatchSource;

use crate::error::IngestResult;

/// A source of decoded rows, delivered in batches of a configured size.
///
/// `next_batch` returns `Ok(None)` once the input is exhausted; every
/// earlier call yields between 1 and `batch_size` rows. `total` is the
/// running count of rows yielded so far.
pub trait BatchSource<T> {
    fn next_batch(&mut self) -> IngestResult<Option<Vec<T>>>;
    fn total(&self) -> u64;
}
