use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{OrgScope, ResolveSupplierRequest, ResolveSupplierResponse, SupplierResponse};
use crate::services::metrics::SUPPLIERS_RESOLVED_TOTAL;
use crate::services::supplier::SupplierResolver;
use crate::startup::AppState;

/// Resolve a free-text supplier name to a canonical supplier, creating
/// one pending validation when nothing matches.
pub async fn resolve_supplier(
    State(state): State<AppState>,
    Json(req): Json<ResolveSupplierRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let resolver = SupplierResolver::new(
        state.db.clone(),
        state.config.supplier.fuzzy_scan_limit,
    );
    let resolution = resolver.resolve(req.organization_id, &req.name).await?;

    SUPPLIERS_RESOLVED_TOTAL
        .with_label_values(&[resolution.method.as_str()])
        .inc();

    Ok(Json(ResolveSupplierResponse {
        supplier: SupplierResponse::from(resolution.supplier),
        method: resolution.method,
    }))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
    Query(scope): Query<OrgScope>,
) -> Result<impl IntoResponse, AppError> {
    let supplier = state
        .db
        .get_supplier(scope.organization_id, supplier_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Supplier {} not found", supplier_id))
        })?;

    Ok(Json(SupplierResponse::from(supplier)))
}
