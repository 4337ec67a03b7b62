//! Supplier model for invoice-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Supplier validation state. New suppliers created by the resolver are
/// pending until a human validates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Validated,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::Validated => "validated",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "validated" => ValidationStatus::Validated,
            _ => ValidationStatus::Pending,
        }
    }
}

/// Canonical supplier record, one per organization and normalized key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Supplier {
    pub supplier_id: Uuid,
    pub organization_id: Uuid,
    pub code: String,
    pub display_name: String,
    pub normalized_key: String,
    pub validation_status: String,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a supplier pending validation.
#[derive(Debug, Clone)]
pub struct NewSupplier {
    pub organization_id: Uuid,
    pub display_name: String,
    pub normalized_key: String,
}
