//! Product batch processing

use super::{clean, split_valid, BatchOutcome, EntityProcessor};
use crate::coerce::{is_blank, parse_boolean, parse_decimal, parse_integer};
use crate::error::IngestResult;
use crate::resolve::ReferenceResolver;
use crate::rows::ProductRow;
use crate::store::{ProductRecord, Store};
use crate::upsert::BatchUpserter;
use crate::validate::validate_product;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use futures::FutureExt;

pub struct ProductProcessor<'a, S: Store> {
    store: &'a S,
    resolver: ReferenceResolver<'a>,
    upserter: BatchUpserter,
    row_offset: u64,
}

impl<'a, S: Store> ProductProcessor<'a, S> {
    pub fn new(store: &'a S, chunk_size: usize) -> Self {
        Self {
            store,
            resolver: ReferenceResolver::new(store),
            upserter: BatchUpserter::new(chunk_size),
            row_offset: 0,
        }
    }

    /// A product may name a category by code; an unknown code leaves
    /// category_id NULL rather than failing the row
    async fn category_id(&mut self, row: &ProductRow) -> Result<Option<i64>, sqlx::Error> {
        match row.category_code.as_deref() {
            Some(code) if !is_blank(Some(code)) => self.resolver.category_id(code).await,
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl<S: Store> EntityProcessor<ProductRow> for ProductProcessor<'_, S> {
    async fn process_batch(&mut self, rows: &[ProductRow]) -> IngestResult<BatchOutcome> {
        let (valid, invalid) = split_valid(rows, &mut self.row_offset, validate_product);

        let mut records = Vec::with_capacity(valid.len());
        for row in valid {
            let category_id = self.category_id(row).await?;
            records.push(to_record(row, category_id));
        }

        let store = self.store;
        let outcome = self
            .upserter
            .execute(&records, |chunk| {
                async move { store.upsert_products(chunk).await }.boxed()
            })
            .await;

        Ok(BatchOutcome {
            processed: outcome.affected,
            failed: invalid + outcome.failed,
        })
    }
}

fn to_record(row: &ProductRow, category_id: Option<i64>) -> ProductRecord {
    ProductRecord {
        product_code: row.product_code.as_deref().unwrap_or_default().trim().to_owned(),
        product_name: row.product_name.as_deref().unwrap_or_default().trim().to_owned(),
        description: clean(&row.description),
        category_id,
        unit_price: parse_decimal(row.unit_price.as_deref()).unwrap_or_else(|| BigDecimal::from(0)),
        stock_quantity: parse_integer(row.stock_quantity.as_deref()).unwrap_or(0),
        weight_kg: parse_decimal(row.weight_kg.as_deref()),
        brand: clean(&row.brand),
        sku: clean(&row.sku),
        is_active: parse_boolean(row.is_active.as_deref()).unwrap_or(true),
    }
}
