use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Allocation, ExtractedInvoice, Invoice};
use crate::services::dedup::DuplicateItem;

/// Explicit organization scope for reads. Organization identity is
/// always a request parameter, never ambient state.
#[derive(Debug, Deserialize)]
pub struct OrgScope {
    pub organization_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct IngestInvoiceRequest {
    pub organization_id: Uuid,
    pub extracted_data: ExtractedInvoice,
}

#[derive(Debug, Serialize)]
pub struct IngestInvoiceResponse {
    pub invoice: InvoiceResponse,
    pub removed_duplicates: Vec<DuplicateItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub invoice_id: Uuid,
    pub organization_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub status: String,
    pub extracted_data: ExtractedInvoice,
    pub subtotal: Decimal,
    pub total_amount: Decimal,
    pub created_utc: String,
    pub updated_utc: String,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            invoice_id: invoice.invoice_id,
            organization_id: invoice.organization_id,
            supplier_id: invoice.supplier_id,
            status: invoice.status,
            extracted_data: invoice.extracted_data.0,
            subtotal: invoice.subtotal,
            total_amount: invoice.total_amount,
            created_utc: invoice.created_utc.to_rfc3339(),
            updated_utc: invoice.updated_utc.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AllocationInput {
    #[validate(length(min = 1, message = "Account code is required"))]
    pub account_code: String,
    pub label: Option<String>,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceAllocationsRequest {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub allocations: Vec<AllocationInput>,
}

#[derive(Debug, Serialize)]
pub struct AllocationResponse {
    pub allocation_id: Uuid,
    pub account_code: String,
    pub label: Option<String>,
    pub amount: Decimal,
    pub item_indices: Vec<i32>,
}

impl From<Allocation> for AllocationResponse {
    fn from(allocation: Allocation) -> Self {
        Self {
            allocation_id: allocation.allocation_id,
            account_code: allocation.account_code,
            label: allocation.label,
            amount: allocation.amount,
            item_indices: allocation.item_indices,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub organization_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub invoice: InvoiceResponse,
    pub allocations: Vec<AllocationResponse>,
    pub removed_duplicates: Vec<DuplicateItem>,
}
