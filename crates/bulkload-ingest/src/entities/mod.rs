//! Per-entity batch processors
//!
//! One processor per upload type. A processor consumes decoded row
//! batches, validates them against a running row counter, coerces the
//! valid subset into typed records and drives them into the store.
//! Validation and reference misses are absorbed into the returned
//! counters; only infrastructure failures surface as errors.

mod customer;
mod order;
mod product;

pub use customer::CustomerProcessor;
pub use order::OrderProcessor;
pub use product::ProductProcessor;

use crate::error::IngestResult;
use async_trait::async_trait;
use tracing::warn;

/// Row accounting for one processed batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub processed: u64,
    pub failed: u64,
}

/// Batch-at-a-time row consumer driven by the pipeline loop
#[async_trait]
pub trait EntityProcessor<T>: Send {
    async fn process_batch(&mut self, rows: &[T]) -> IngestResult<BatchOutcome>;
}

/// Validate a batch against the running row counter, keeping the rows
/// that passed. The counter spans every batch of one job, so error
/// messages refer to absolute row numbers in the source file.
fn split_valid<'r, T, F>(rows: &'r [T], row_offset: &mut u64, validate: F) -> (Vec<&'r T>, u64)
where
    F: Fn(&T, u64) -> Vec<String>,
{
    let mut valid = Vec::with_capacity(rows.len());
    let mut failed = 0u64;
    for row in rows {
        *row_offset += 1;
        let errors = validate(row, *row_offset);
        if errors.is_empty() {
            valid.push(row);
        } else {
            failed += 1;
            warn!(row = *row_offset, errors = ?errors, "row failed validation");
        }
    }
    (valid, failed)
}

/// Trim an optional field, mapping blank to `None`
fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::rows::CustomerRow;
    use crate::validate::validate_customer;

    #[test]
    fn test_split_valid_advances_offset_across_batches() {
        let good = CustomerRow {
            customer_code: Some("C1".into()),
            first_name: Some("A".into()),
            last_name: Some("B".into()),
            email: Some("a@x.com".into()),
            ..Default::default()
        };
        let bad = CustomerRow::default();

        let mut offset = 0;
        let batch1 = vec![good.clone(), bad.clone(), good.clone()];
        let (valid, failed) = split_valid(&batch1, &mut offset, validate_customer);
        assert_eq!(valid.len(), 2);
        assert_eq!(failed, 1);
        assert_eq!(offset, 3);

        let batch2 = vec![bad, good];
        let (valid, failed) = split_valid(&batch2, &mut offset, validate_customer);
        assert_eq!(valid.len(), 1);
        assert_eq!(failed, 1);
        assert_eq!(offset, 5);
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(&Some("  x  ".into())), Some("x".to_owned()));
        assert_eq!(clean(&Some("   ".into())), None);
        assert_eq!(clean(&None), None);
    }
}
