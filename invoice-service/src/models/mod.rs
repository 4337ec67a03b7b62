//! Domain models for invoice-service.

mod allocation;
mod invoice;
mod line_item;
mod supplier;

pub use allocation::{Allocation, ReplaceAllocation};
pub use invoice::{ExtractedInvoice, Invoice, InvoiceStatus};
pub use line_item::{ExtractedLineItem, TaxBasis};
pub use supplier::{NewSupplier, Supplier, ValidationStatus};
