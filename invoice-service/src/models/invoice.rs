//! Invoice model for invoice-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::ExtractedLineItem;

/// Invoice lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Extracted,
    Reconciled,
    Booked,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Extracted => "extracted",
            InvoiceStatus::Reconciled => "reconciled",
            InvoiceStatus::Booked => "booked",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "reconciled" => InvoiceStatus::Reconciled,
            "booked" => InvoiceStatus::Booked,
            _ => InvoiceStatus::Extracted,
        }
    }
}

/// Extraction payload stored with the invoice, exactly as the OCR
/// pipeline produced it (items replaced in full when deduplicated).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedInvoice {
    pub items: Vec<ExtractedLineItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_name: Option<String>,
}

/// Invoice row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub organization_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub status: String,
    pub extracted_data: Json<ExtractedInvoice>,
    pub subtotal: Decimal,
    pub total_amount: Decimal,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
