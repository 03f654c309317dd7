//! Order batch processing
//!
//! Order files are flat: each row carries the order header plus one
//! line item, and rows sharing an order number form one order. The
//! header is taken from the group's first row; later rows only
//! contribute items. Counters are per row, so a group of three rows
//! where one product is unknown reports two processed and one failed.

use super::{clean, split_valid, BatchOutcome, EntityProcessor};
use crate::coerce::{is_blank, parse_datetime, parse_decimal, parse_integer};
use crate::error::IngestResult;
use crate::resolve::ReferenceResolver;
use crate::rows::OrderRow;
use crate::store::{OrderHeader, OrderItemRecord, Store};
use crate::validate::validate_order;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use tracing::{error, warn};

pub struct OrderProcessor<'a, S: Store> {
    store: &'a S,
    resolver: ReferenceResolver<'a>,
    row_offset: u64,
}

impl<'a, S: Store> OrderProcessor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            resolver: ReferenceResolver::new(store),
            row_offset: 0,
        }
    }

    async fn process_group(
        &mut self,
        order_number: &str,
        group: &[&OrderRow],
    ) -> IngestResult<BatchOutcome> {
        let first = group[0];
        let customer_code = first.customer_code.as_deref().unwrap_or_default();

        let customer_id = match self.resolver.customer_id(customer_code).await? {
            Some(id) => id,
            None => {
                warn!(
                    customer_code,
                    order_number, "customer not found, skipping order"
                );
                return Ok(BatchOutcome {
                    processed: 0,
                    failed: group.len() as u64,
                });
            }
        };

        let header = build_header(order_number, customer_id, first);
        let order_id = match self.store.upsert_order(&header).await {
            Ok(id) => id,
            Err(err) => {
                error!(order_number, error = %err, "order upsert failed");
                return Ok(BatchOutcome {
                    processed: 0,
                    failed: group.len() as u64,
                });
            }
        };

        let mut outcome = BatchOutcome::default();
        for (idx, row) in group.iter().enumerate() {
            let product_code = row.product_code.as_deref().unwrap_or_default();
            let product_id = match self.resolver.product_id(product_code).await? {
                Some(id) => id,
                None => {
                    warn!(product_code, order_number, "product not found, skipping item");
                    outcome.failed += 1;
                    continue;
                }
            };
            let item = build_item(order_id, product_id, row);
            match self.store.insert_order_item(&item).await {
                Ok(()) => outcome.processed += 1,
                Err(err) => {
                    error!(order_number, error = %err, "item insert failed, abandoning order group");
                    outcome.failed += (group.len() - idx) as u64;
                    break;
                }
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl<S: Store> EntityProcessor<OrderRow> for OrderProcessor<'_, S> {
    async fn process_batch(&mut self, rows: &[OrderRow]) -> IngestResult<BatchOutcome> {
        let (valid, invalid) = split_valid(rows, &mut self.row_offset, validate_order);

        let mut total = BatchOutcome {
            processed: 0,
            failed: invalid,
        };
        for (order_number, group) in group_by_order(&valid) {
            let outcome = self.process_group(&order_number, &group).await?;
            total.processed += outcome.processed;
            total.failed += outcome.failed;
        }
        Ok(total)
    }
}

/// Group rows by trimmed order number, preserving first-seen order
fn group_by_order<'r>(rows: &[&'r OrderRow]) -> Vec<(String, Vec<&'r OrderRow>)> {
    let mut groups: Vec<(String, Vec<&'r OrderRow>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for &row in rows {
        let key = row.order_number.as_deref().unwrap_or_default().trim().to_owned();
        match index.get(&key) {
            Some(&pos) => groups[pos].1.push(row),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![row]));
            }
        }
    }
    groups
}

fn build_header(order_number: &str, customer_id: i64, row: &OrderRow) -> OrderHeader {
    let status = match row.status.as_deref() {
        Some(s) if !is_blank(Some(s)) => s.trim().to_uppercase(),
        _ => "PENDING".to_owned(),
    };
    let currency = match row.currency.as_deref() {
        Some(c) if !is_blank(Some(c)) => c.trim().to_uppercase(),
        _ => "USD".to_owned(),
    };
    OrderHeader {
        order_number: order_number.to_owned(),
        customer_id,
        status,
        total_amount: money(row.total_amount.as_deref()),
        discount_amount: money(row.discount_amount.as_deref()),
        tax_amount: money(row.tax_amount.as_deref()),
        shipping_amount: money(row.shipping_amount.as_deref()),
        currency,
        shipping_address: clean(&row.shipping_address),
        notes: clean(&row.notes),
        ordered_at: parse_datetime(row.ordered_at.as_deref())
            .unwrap_or_else(|| Utc::now().naive_utc()),
        shipped_at: parse_datetime(row.shipped_at.as_deref()),
        delivered_at: parse_datetime(row.delivered_at.as_deref()),
    }
}

fn build_item(order_id: i64, product_id: i64, row: &OrderRow) -> OrderItemRecord {
    let quantity = match parse_integer(row.quantity.as_deref()) {
        Some(q) if q > 0 => q,
        _ => 1,
    };
    OrderItemRecord {
        order_id,
        product_id,
        quantity,
        unit_price: money(row.unit_price.as_deref()),
        discount: money(row.item_discount.as_deref()),
    }
}

fn money(value: Option<&str>) -> BigDecimal {
    parse_decimal(value).unwrap_or_else(|| BigDecimal::from(0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::entities::testing::FakeStore;
    use crate::resolve::RefEntity;
    use std::str::FromStr;

    fn row(order: &str, customer: &str, product: &str) -> OrderRow {
        OrderRow {
            order_number: Some(order.into()),
            customer_code: Some(customer.into()),
            product_code: Some(product.into()),
            quantity: Some("2".into()),
            unit_price: Some("9.99".into()),
            ..Default::default()
        }
    }

    fn store_with_refs() -> FakeStore {
        FakeStore::with_ids(&[
            (RefEntity::Customer, "C1", 1),
            (RefEntity::Customer, "C2", 2),
            (RefEntity::Product, "P1", 10),
            (RefEntity::Product, "P2", 20),
        ])
    }

    #[tokio::test]
    async fn test_group_header_from_first_row() {
        let store = store_with_refs();
        let mut processor = OrderProcessor::new(&store);

        let mut first = row("ORD-1", "C1", "P1");
        first.total_amount = Some("100.00".into());
        first.status = Some("shipped".into());
        let mut second = row("ORD-1", "C1", "P2");
        second.total_amount = Some("999.99".into());
        second.status = Some("pending".into());

        let outcome = processor.process_batch(&[first, second]).await.unwrap();
        assert_eq!(outcome, BatchOutcome { processed: 2, failed: 0 });

        let orders = store.orders.lock().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, "SHIPPED");
        assert_eq!(
            orders[0].total_amount,
            BigDecimal::from_str("100.00").unwrap()
        );
        assert_eq!(orders[0].currency, "USD");

        let items = store.items.lock().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.order_id == items[0].order_id));
    }

    #[tokio::test]
    async fn test_unknown_customer_fails_whole_group() {
        let store = store_with_refs();
        let mut processor = OrderProcessor::new(&store);

        let batch = vec![
            row("ORD-1", "GHOST", "P1"),
            row("ORD-1", "GHOST", "P2"),
            row("ORD-2", "C1", "P1"),
        ];
        let outcome = processor.process_batch(&batch).await.unwrap();

        assert_eq!(outcome, BatchOutcome { processed: 1, failed: 2 });
        assert_eq!(store.orders.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_product_fails_single_row() {
        let store = store_with_refs();
        let mut processor = OrderProcessor::new(&store);

        let batch = vec![row("ORD-1", "C1", "P1"), row("ORD-1", "C1", "MISSING")];
        let outcome = processor.process_batch(&batch).await.unwrap();

        assert_eq!(outcome, BatchOutcome { processed: 1, failed: 1 });
        assert_eq!(store.items.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_header_upsert_error_fails_group() {
        let mut store = store_with_refs();
        store.failing_orders = vec!["ORD-1".to_owned()];
        let mut processor = OrderProcessor::new(&store);

        let batch = vec![row("ORD-1", "C1", "P1"), row("ORD-1", "C1", "P2")];
        let outcome = processor.process_batch(&batch).await.unwrap();
        assert_eq!(outcome, BatchOutcome { processed: 0, failed: 2 });
    }

    #[tokio::test]
    async fn test_item_insert_error_fails_rest_of_group() {
        let mut store = store_with_refs();
        store.failing_items = vec![10];
        let mut processor = OrderProcessor::new(&store);

        // P2 inserts fine; the P1 failure abandons the remaining row
        let batch = vec![
            row("ORD-1", "C1", "P2"),
            row("ORD-1", "C1", "P1"),
            row("ORD-1", "C1", "P2"),
        ];
        let outcome = processor.process_batch(&batch).await.unwrap();
        assert_eq!(outcome, BatchOutcome { processed: 1, failed: 2 });
    }

    #[tokio::test]
    async fn test_defaults_and_quantity_fallback() {
        let store = store_with_refs();
        let mut processor = OrderProcessor::new(&store);

        let mut order = row("ORD-1", "C1", "P1");
        order.quantity = Some("3".into());
        order.ordered_at = Some("2024-01-05".into());
        processor.process_batch(&[order]).await.unwrap();

        let orders = store.orders.lock().unwrap();
        assert_eq!(orders[0].status, "PENDING");
        assert_eq!(orders[0].currency, "USD");
        assert_eq!(orders[0].total_amount, BigDecimal::from(0));
        assert_eq!(
            orders[0].ordered_at,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(store.items.lock().unwrap()[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_validation_failures_counted_per_row() {
        let store = store_with_refs();
        let mut processor = OrderProcessor::new(&store);

        let mut bad = row("ORD-1", "C1", "P1");
        bad.quantity = Some("-1".into());
        let batch = vec![bad, row("ORD-2", "C2", "P2")];
        let outcome = processor.process_batch(&batch).await.unwrap();
        assert_eq!(outcome, BatchOutcome { processed: 1, failed: 1 });
    }
}
