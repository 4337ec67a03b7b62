//! Services module for invoice-service.

pub mod allocation;
pub mod amounts;
pub mod database;
pub mod dedup;
pub mod metrics;
pub mod supplier;

pub use database::{Database, ReconcileOutcome};
pub use metrics::{get_metrics, init_metrics};
