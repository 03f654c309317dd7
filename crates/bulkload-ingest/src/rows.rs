//! Flat row shapes for uploaded records
//!
//! One struct per entity, mirroring the source columns/keys. Every
//! field is an optional string: typing happens later, in validation
//! and coercion, which keeps the decoders format-agnostic.

use serde::Deserialize;

/// Flat customer row as decoded from CSV or JSON
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomerRow {
    #[serde(rename = "customerCode")]
    pub customer_code: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "dateOfBirth")]
    pub date_of_birth: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "postalCode")]
    pub postal_code: Option<String>,
    #[serde(rename = "loyaltyPoints")]
    pub loyalty_points: Option<String>,
    #[serde(rename = "isActive")]
    pub is_active: Option<String>,
}

/// Flat product row as decoded from CSV or JSON
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductRow {
    #[serde(rename = "productCode")]
    pub product_code: Option<String>,
    #[serde(rename = "productName")]
    pub product_name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "categoryCode")]
    pub category_code: Option<String>,
    #[serde(rename = "unitPrice")]
    pub unit_price: Option<String>,
    #[serde(rename = "stockQuantity")]
    pub stock_quantity: Option<String>,
    #[serde(rename = "weightKg")]
    pub weight_kg: Option<String>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    #[serde(rename = "isActive")]
    pub is_active: Option<String>,
}

/// Flat order row as decoded from CSV or JSON
///
/// One row carries an order header plus one line item; several rows
/// sharing an order number describe one multi-item order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderRow {
    // Order header fields
    #[serde(rename = "orderNumber")]
    pub order_number: Option<String>,
    #[serde(rename = "customerCode")]
    pub customer_code: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "totalAmount")]
    pub total_amount: Option<String>,
    #[serde(rename = "discountAmount")]
    pub discount_amount: Option<String>,
    #[serde(rename = "taxAmount")]
    pub tax_amount: Option<String>,
    #[serde(rename = "shippingAmount")]
    pub shipping_amount: Option<String>,
    pub currency: Option<String>,
    #[serde(rename = "shippingAddress")]
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    #[serde(rename = "orderedAt")]
    pub ordered_at: Option<String>,
    #[serde(rename = "shippedAt")]
    pub shipped_at: Option<String>,
    #[serde(rename = "deliveredAt")]
    pub delivered_at: Option<String>,

    // Line item fields (one row = one order item)
    #[serde(rename = "productCode")]
    pub product_code: Option<String>,
    pub quantity: Option<String>,
    #[serde(rename = "unitPrice")]
    pub unit_price: Option<String>,
    #[serde(rename = "itemDiscount")]
    pub item_discount: Option<String>,
}
