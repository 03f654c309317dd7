//! Customer batch processing

use super::{clean, split_valid, BatchOutcome, EntityProcessor};
use crate::coerce::{parse_boolean, parse_date, parse_integer};
use crate::error::IngestResult;
use crate::rows::CustomerRow;
use crate::store::{CustomerRecord, Store};
use crate::upsert::BatchUpserter;
use crate::validate::validate_customer;
use async_trait::async_trait;
use futures::FutureExt;

pub struct CustomerProcessor<'a, S: Store> {
    store: &'a S,
    upserter: BatchUpserter,
    row_offset: u64,
}

impl<'a, S: Store> CustomerProcessor<'a, S> {
    pub fn new(store: &'a S, chunk_size: usize) -> Self {
        Self {
            store,
            upserter: BatchUpserter::new(chunk_size),
            row_offset: 0,
        }
    }
}

#[async_trait]
impl<S: Store> EntityProcessor<CustomerRow> for CustomerProcessor<'_, S> {
    async fn process_batch(&mut self, rows: &[CustomerRow]) -> IngestResult<BatchOutcome> {
        let (valid, invalid) = split_valid(rows, &mut self.row_offset, validate_customer);
        let records: Vec<CustomerRecord> = valid.iter().map(|row| to_record(row)).collect();

        let store = self.store;
        let outcome = self
            .upserter
            .execute(&records, |chunk| {
                async move { store.upsert_customers(chunk).await }.boxed()
            })
            .await;

        Ok(BatchOutcome {
            processed: outcome.affected,
            failed: invalid + outcome.failed,
        })
    }
}

/// Validated row to typed record. Required fields are known non-blank;
/// email is normalized to lowercase, missing loyalty points default to
/// 0 and missing active flags to true.
fn to_record(row: &CustomerRow) -> CustomerRecord {
    CustomerRecord {
        customer_code: row.customer_code.as_deref().unwrap_or_default().trim().to_owned(),
        first_name: row.first_name.as_deref().unwrap_or_default().trim().to_owned(),
        last_name: row.last_name.as_deref().unwrap_or_default().trim().to_owned(),
        email: row.email.as_deref().unwrap_or_default().trim().to_lowercase(),
        phone: clean(&row.phone),
        date_of_birth: parse_date(row.date_of_birth.as_deref()),
        country: clean(&row.country),
        city: clean(&row.city),
        address: clean(&row.address),
        postal_code: clean(&row.postal_code),
        loyalty_points: parse_integer(row.loyalty_points.as_deref()).unwrap_or(0),
        is_active: parse_boolean(row.is_active.as_deref()).unwrap_or(true),
    }
}
