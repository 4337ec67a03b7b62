use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    AllocationResponse, IngestInvoiceRequest, IngestInvoiceResponse, InvoiceResponse, OrgScope,
    ReconcileRequest, ReconcileResponse, ReplaceAllocationsRequest,
};
use crate::models::ReplaceAllocation;
use crate::services::amounts::items_subtotal;
use crate::services::dedup::dedupe_items;
use crate::services::metrics::{INVOICES_INGESTED_TOTAL, SUPPLIERS_RESOLVED_TOTAL};
use crate::services::supplier::SupplierResolver;
use crate::startup::AppState;

/// Ingest one extraction payload. Duplicate lines are dropped up front
/// and the supplier name, when present, is resolved to a canonical
/// supplier.
pub async fn ingest_invoice(
    State(state): State<AppState>,
    Json(req): Json<IngestInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.organization_id.is_nil() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "organization_id is required"
        )));
    }

    let outcome = dedupe_items(&req.extracted_data.items);

    let supplier_id = match req.extracted_data.supplier_name.as_deref() {
        Some(name) if !name.trim().is_empty() => {
            let resolver = SupplierResolver::new(
                state.db.clone(),
                state.config.supplier.fuzzy_scan_limit,
            );
            let resolution = resolver.resolve(req.organization_id, name).await?;
            SUPPLIERS_RESOLVED_TOTAL
                .with_label_values(&[resolution.method.as_str()])
                .inc();
            Some(resolution.supplier.supplier_id)
        }
        _ => None,
    };

    let subtotal = items_subtotal(&outcome.unique_items).round_dp(2);
    let total_amount = req.extracted_data.total_amount.unwrap_or(subtotal);

    let mut extracted = req.extracted_data;
    extracted.items = outcome.unique_items;
    extracted.subtotal = Some(subtotal);

    let invoice = state
        .db
        .create_invoice(
            req.organization_id,
            supplier_id,
            &extracted,
            subtotal,
            total_amount,
        )
        .await?;

    INVOICES_INGESTED_TOTAL.inc();

    Ok((
        StatusCode::CREATED,
        Json(IngestInvoiceResponse {
            invoice: InvoiceResponse::from(invoice),
            removed_duplicates: outcome.duplicates,
            supplier_id,
        }),
    ))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Query(scope): Query<OrgScope>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .db
        .get_invoice(scope.organization_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id)))?;

    Ok(Json(InvoiceResponse::from(invoice)))
}

/// Replace the invoice's allocation set. Item indices are cleared; a
/// reconcile pass recomputes them.
pub async fn replace_allocations(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<ReplaceAllocationsRequest>,
) -> Result<impl IntoResponse, AppError> {
    for allocation in &req.allocations {
        allocation.validate()?;
        if allocation.amount.is_sign_negative() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Allocation amount must not be negative"
            )));
        }
    }

    let inputs: Vec<ReplaceAllocation> = req
        .allocations
        .into_iter()
        .map(|a| ReplaceAllocation {
            account_code: a.account_code,
            label: a.label,
            amount: a.amount,
        })
        .collect();

    let allocations = state
        .db
        .replace_allocations(req.organization_id, invoice_id, req.user_id, &inputs)
        .await?;

    Ok(Json(
        allocations
            .into_iter()
            .map(AllocationResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Deduplicate the invoice's line items and redistribute item indices
/// across its allocations.
pub async fn reconcile_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<ReconcileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .db
        .reconcile_invoice(req.organization_id, invoice_id)
        .await?;

    Ok(Json(ReconcileResponse {
        invoice: InvoiceResponse::from(outcome.invoice),
        allocations: outcome
            .allocations
            .into_iter()
            .map(AllocationResponse::from)
            .collect(),
        removed_duplicates: outcome.duplicates,
    }))
}
