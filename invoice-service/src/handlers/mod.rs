//! HTTP handlers for invoice-service.

mod health;
mod invoices;
mod suppliers;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use invoices::{get_invoice, ingest_invoice, reconcile_invoice, replace_allocations};
pub use suppliers::{get_supplier, resolve_supplier};
