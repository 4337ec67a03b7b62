//! Request/response DTOs for invoice-service.

mod invoices;
mod suppliers;

pub use invoices::{
    AllocationInput, AllocationResponse, IngestInvoiceRequest, IngestInvoiceResponse,
    InvoiceResponse, OrgScope, ReconcileRequest, ReconcileResponse, ReplaceAllocationsRequest,
};
pub use suppliers::{ResolveSupplierRequest, ResolveSupplierResponse, SupplierResponse};
