//! Per-row field validation
//!
//! Pure functions from a decoded row plus its 1-based row number to a
//! list of human-readable error strings. An empty list means the row
//! may proceed to upsert; a failing row is skipped, never aborting the
//! batch. Row numbers come from a running counter that spans all
//! batches of one job, so errors can be matched back to source lines.

use crate::coerce::{is_blank, parse_date, parse_decimal};
use crate::rows::{CustomerRow, OrderRow, ProductRow};
use bigdecimal::BigDecimal;
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9+_.-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email regex")
});

/// CSV columns a customer file must declare
pub const CUSTOMER_REQUIRED_COLUMNS: &[&str] = &["customerCode", "firstName", "lastName", "email"];

/// CSV columns a product file must declare
pub const PRODUCT_REQUIRED_COLUMNS: &[&str] = &["productCode", "productName", "unitPrice"];

/// CSV columns an order file must declare
pub const ORDER_REQUIRED_COLUMNS: &[&str] =
    &["orderNumber", "customerCode", "productCode", "quantity", "unitPrice"];

pub fn validate_customer(row: &CustomerRow, row_number: u64) -> Vec<String> {
    let mut errors = Vec::new();

    if is_blank(row.customer_code.as_deref()) {
        errors.push(format!("Row {row_number}: customerCode is required"));
    }
    if is_blank(row.first_name.as_deref()) {
        errors.push(format!("Row {row_number}: firstName is required"));
    }
    if is_blank(row.last_name.as_deref()) {
        errors.push(format!("Row {row_number}: lastName is required"));
    }
    match row.email.as_deref() {
        None => errors.push(format!("Row {row_number}: email is required")),
        Some(email) if email.trim().is_empty() => {
            errors.push(format!("Row {row_number}: email is required"));
        }
        Some(email) if !EMAIL_RE.is_match(email.trim()) => {
            errors.push(format!("Row {row_number}: invalid email format '{email}'"));
        }
        Some(_) => {}
    }
    if !is_blank(row.loyalty_points.as_deref()) && !is_integer(row.loyalty_points.as_deref()) {
        errors.push(format!("Row {row_number}: loyaltyPoints must be a valid integer"));
    }
    if !is_blank(row.date_of_birth.as_deref()) && parse_date(row.date_of_birth.as_deref()).is_none()
    {
        let raw = row.date_of_birth.as_deref().unwrap_or_default();
        errors.push(format!("Row {row_number}: invalid dateOfBirth format '{raw}'"));
    }

    errors
}

pub fn validate_product(row: &ProductRow, row_number: u64) -> Vec<String> {
    let mut errors = Vec::new();

    if is_blank(row.product_code.as_deref()) {
        errors.push(format!("Row {row_number}: productCode is required"));
    }
    if is_blank(row.product_name.as_deref()) {
        errors.push(format!("Row {row_number}: productName is required"));
    }
    if is_blank(row.unit_price.as_deref()) {
        errors.push(format!("Row {row_number}: unitPrice is required"));
    } else if !is_non_negative_decimal(row.unit_price.as_deref()) {
        errors.push(format!("Row {row_number}: unitPrice must be a positive decimal value"));
    }
    if !is_blank(row.stock_quantity.as_deref())
        && !is_non_negative_integer(row.stock_quantity.as_deref())
    {
        errors.push(format!("Row {row_number}: stockQuantity must be a non-negative integer"));
    }
    if !is_blank(row.weight_kg.as_deref()) && !is_non_negative_decimal(row.weight_kg.as_deref()) {
        errors.push(format!("Row {row_number}: weightKg must be a positive decimal"));
    }

    errors
}

pub fn validate_order(row: &OrderRow, row_number: u64) -> Vec<String> {
    let mut errors = Vec::new();

    if is_blank(row.order_number.as_deref()) {
        errors.push(format!("Row {row_number}: orderNumber is required"));
    }
    if is_blank(row.customer_code.as_deref()) {
        errors.push(format!("Row {row_number}: customerCode is required"));
    }
    if is_blank(row.product_code.as_deref()) {
        errors.push(format!("Row {row_number}: productCode is required"));
    }
    if is_blank(row.quantity.as_deref()) {
        errors.push(format!("Row {row_number}: quantity is required"));
    } else if !is_positive_integer(row.quantity.as_deref()) {
        errors.push(format!("Row {row_number}: quantity must be a positive integer"));
    }
    if is_blank(row.unit_price.as_deref()) {
        errors.push(format!("Row {row_number}: unitPrice is required"));
    } else if !is_non_negative_decimal(row.unit_price.as_deref()) {
        errors.push(format!("Row {row_number}: unitPrice must be positive"));
    }

    errors
}

fn is_integer(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().parse::<i32>().is_ok())
}

fn is_non_negative_integer(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().parse::<i32>().is_ok_and(|n| n >= 0))
}

fn is_positive_integer(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().parse::<i32>().is_ok_and(|n| n > 0))
}

fn is_non_negative_decimal(value: Option<&str>) -> bool {
    parse_decimal(value).is_some_and(|d| d >= BigDecimal::from(0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn valid_customer() -> CustomerRow {
        CustomerRow {
            customer_code: Some("C001".into()),
            first_name: Some("John".into()),
            last_name: Some("Doe".into()),
            email: Some("john@example.com".into()),
            ..Default::default()
        }
    }

    fn valid_product() -> ProductRow {
        ProductRow {
            product_code: Some("P001".into()),
            product_name: Some("Widget".into()),
            unit_price: Some("19.99".into()),
            ..Default::default()
        }
    }

    fn valid_order() -> OrderRow {
        OrderRow {
            order_number: Some("ORD-1".into()),
            customer_code: Some("C001".into()),
            product_code: Some("P001".into()),
            quantity: Some("2".into()),
            unit_price: Some("9.50".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_rows_produce_no_errors() {
        assert!(validate_customer(&valid_customer(), 1).is_empty());
        assert!(validate_product(&valid_product(), 1).is_empty());
        assert!(validate_order(&valid_order(), 1).is_empty());
    }

    #[test]
    fn test_customer_required_fields() {
        let row = CustomerRow::default();
        let errors = validate_customer(&row, 7);
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().all(|e| e.starts_with("Row 7:")));
        assert!(errors.iter().any(|e| e.contains("customerCode")));
        assert!(errors.iter().any(|e| e.contains("email is required")));
    }

    #[test]
    fn test_customer_email_format() {
        let mut row = valid_customer();
        row.email = Some("not-an-email".into());
        let errors = validate_customer(&row, 3);
        assert_eq!(errors, vec!["Row 3: invalid email format 'not-an-email'"]);

        row.email = Some(" spaced@example.com ".into());
        assert!(validate_customer(&row, 3).is_empty());
    }

    #[test]
    fn test_customer_optional_fields() {
        let mut row = valid_customer();
        row.loyalty_points = Some("abc".into());
        row.date_of_birth = Some("31-31-2024".into());
        let errors = validate_customer(&row, 2);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("loyaltyPoints"));
        assert!(errors[1].contains("dateOfBirth"));

        // Blank optionals are fine
        row.loyalty_points = Some("  ".into());
        row.date_of_birth = None;
        assert!(validate_customer(&row, 2).is_empty());
    }

    #[test]
    fn test_product_unit_price() {
        let mut row = valid_product();
        row.unit_price = None;
        assert_eq!(validate_product(&row, 1), vec!["Row 1: unitPrice is required"]);

        row.unit_price = Some("-1.00".into());
        assert_eq!(
            validate_product(&row, 1),
            vec!["Row 1: unitPrice must be a positive decimal value"]
        );

        row.unit_price = Some("0".into());
        assert!(validate_product(&row, 1).is_empty());
    }

    #[test]
    fn test_product_optional_numerics() {
        let mut row = valid_product();
        row.stock_quantity = Some("-5".into());
        row.weight_kg = Some("heavy".into());
        let errors = validate_product(&row, 4);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("stockQuantity"));
        assert!(errors[1].contains("weightKg"));
    }

    #[test]
    fn test_order_quantity_must_be_positive() {
        let mut row = valid_order();
        row.quantity = Some("0".into());
        assert_eq!(
            validate_order(&row, 9),
            vec!["Row 9: quantity must be a positive integer"]
        );

        row.quantity = Some("1.5".into());
        assert_eq!(
            validate_order(&row, 9),
            vec!["Row 9: quantity must be a positive integer"]
        );

        row.quantity = None;
        assert_eq!(validate_order(&row, 9), vec!["Row 9: quantity is required"]);
    }

    #[test]
    fn test_order_collects_all_errors() {
        let errors = validate_order(&OrderRow::default(), 1);
        assert_eq!(errors.len(), 5);
    }
}
