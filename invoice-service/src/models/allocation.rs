//! Ledger allocation model for invoice-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user-entered share of an invoice's tax-exclusive subtotal, booked
/// against a ledger account.
///
/// `item_indices` is derived state: indices into the invoice's
/// deduplicated item array, recomputed by the reconciler whenever that
/// array changes. `sort_order` materializes creation order, which the
/// reconciler depends on.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Allocation {
    pub allocation_id: Uuid,
    pub invoice_id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub account_code: String,
    pub label: Option<String>,
    pub amount: Decimal,
    pub item_indices: Vec<i32>,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Input for replacing an invoice's allocation set.
#[derive(Debug, Clone)]
pub struct ReplaceAllocation {
    pub account_code: String,
    pub label: Option<String>,
    pub amount: Decimal,
}
