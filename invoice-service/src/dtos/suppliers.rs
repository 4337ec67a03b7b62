use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::Supplier;
use crate::services::supplier::ResolutionMethod;

#[derive(Debug, Deserialize, Validate)]
pub struct ResolveSupplierRequest {
    pub organization_id: Uuid,
    #[validate(length(min = 1, message = "Supplier name is required"))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SupplierResponse {
    pub supplier_id: Uuid,
    pub organization_id: Uuid,
    pub code: String,
    pub display_name: String,
    pub normalized_key: String,
    pub validation_status: String,
    pub is_active: bool,
}

impl From<Supplier> for SupplierResponse {
    fn from(supplier: Supplier) -> Self {
        Self {
            supplier_id: supplier.supplier_id,
            organization_id: supplier.organization_id,
            code: supplier.code,
            display_name: supplier.display_name,
            normalized_key: supplier.normalized_key,
            validation_status: supplier.validation_status,
            is_active: supplier.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResolveSupplierResponse {
    pub supplier: SupplierResponse,
    pub method: ResolutionMethod,
}
