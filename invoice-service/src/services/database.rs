//! Database service for invoice-service.

use crate::models::{
    Allocation, ExtractedInvoice, Invoice, InvoiceStatus, NewSupplier, ReplaceAllocation,
    Supplier, ValidationStatus,
};
use crate::services::allocation::reallocate_items;
use crate::services::amounts::items_subtotal;
use crate::services::dedup::{dedupe_items, DuplicateItem};
use crate::services::metrics::{DB_QUERY_DURATION, DUPLICATES_REMOVED_TOTAL, RECONCILIATIONS_TOTAL};
use crate::services::supplier::{InsertOutcome, SupplierStore};
use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Result of reconciling one invoice: the rewritten invoice, its
/// allocations with recomputed indices, and the duplicates removed.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub invoice: Invoice,
    pub allocations: Vec<Allocation>,
    pub duplicates: Vec<DuplicateItem>,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoice-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Store an ingested extraction payload as a new invoice.
    #[instrument(skip(self, extracted), fields(organization_id = %organization_id))]
    pub async fn create_invoice(
        &self,
        organization_id: Uuid,
        supplier_id: Option<Uuid>,
        extracted: &ExtractedInvoice,
        subtotal: Decimal,
        total_amount: Decimal,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (invoice_id, organization_id, supplier_id, status, extracted_data, subtotal, total_amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING invoice_id, organization_id, supplier_id, status, extracted_data, subtotal, total_amount, created_utc, updated_utc
            "#,
        )
        .bind(invoice_id)
        .bind(organization_id)
        .bind(supplier_id)
        .bind(InvoiceStatus::Extracted.as_str())
        .bind(Json(extracted))
        .bind(subtotal)
        .bind(total_amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        timer.observe_duration();

        info!(invoice_id = %invoice.invoice_id, "Invoice created");

        Ok(invoice)
    }

    /// Get an invoice by ID within an organization.
    #[instrument(skip(self), fields(organization_id = %organization_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        organization_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, organization_id, supplier_id, status, extracted_data, subtotal, total_amount, created_utc, updated_utc
            FROM invoices
            WHERE organization_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    // -------------------------------------------------------------------------
    // Allocation Operations
    // -------------------------------------------------------------------------

    /// List an invoice's allocations in creation order.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn list_allocations(&self, invoice_id: Uuid) -> Result<Vec<Allocation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_allocations"])
            .start_timer();

        let allocations = sqlx::query_as::<_, Allocation>(
            r#"
            SELECT allocation_id, invoice_id, organization_id, user_id, account_code, label, amount, item_indices, sort_order, created_utc
            FROM allocations
            WHERE invoice_id = $1
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list allocations: {}", e))
        })?;

        timer.observe_duration();

        Ok(allocations)
    }

    /// Replace an invoice's allocation set in one transaction. Item
    /// indices start empty; the reconciler fills them.
    #[instrument(skip(self, inputs), fields(organization_id = %organization_id, invoice_id = %invoice_id))]
    pub async fn replace_allocations(
        &self,
        organization_id: Uuid,
        invoice_id: Uuid,
        user_id: Uuid,
        inputs: &[ReplaceAllocation],
    ) -> Result<Vec<Allocation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["replace_allocations"])
            .start_timer();

        let exists = sqlx::query_scalar::<_, Uuid>(
            "SELECT invoice_id FROM invoices WHERE organization_id = $1 AND invoice_id = $2",
        )
        .bind(organization_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to check invoice: {}", e)))?;

        if exists.is_none() {
            timer.observe_duration();
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Invoice {} not found",
                invoice_id
            )));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin: {}", e)))?;

        sqlx::query("DELETE FROM allocations WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to clear allocations: {}", e))
            })?;

        let mut allocations = Vec::with_capacity(inputs.len());
        for (position, input) in inputs.iter().enumerate() {
            let allocation = sqlx::query_as::<_, Allocation>(
                r#"
                INSERT INTO allocations (allocation_id, invoice_id, organization_id, user_id, account_code, label, amount, item_indices, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, '{}', $8)
                RETURNING allocation_id, invoice_id, organization_id, user_id, account_code, label, amount, item_indices, sort_order, created_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(organization_id)
            .bind(user_id)
            .bind(&input.account_code)
            .bind(&input.label)
            .bind(input.amount)
            .bind(position as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert allocation: {}", e))
            })?;
            allocations.push(allocation);
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice_id,
            count = allocations.len(),
            "Allocations replaced"
        );

        Ok(allocations)
    }

    // -------------------------------------------------------------------------
    // Reconciliation
    // -------------------------------------------------------------------------

    /// Deduplicate an invoice's line items and redistribute item indices
    /// across its allocations, persisting both in one transaction.
    ///
    /// With no allocations the dedup result is still persisted and the
    /// index redistribution is a no-op.
    #[instrument(skip(self), fields(organization_id = %organization_id, invoice_id = %invoice_id))]
    pub async fn reconcile_invoice(
        &self,
        organization_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<ReconcileOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reconcile_invoice"])
            .start_timer();

        let invoice = self
            .get_invoice(organization_id, invoice_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id))
            })?;
        let allocations = self.list_allocations(invoice_id).await?;

        // Fail fast before any write; negative targets make the
        // proportional shares meaningless.
        if let Some(bad) = allocations.iter().find(|a| a.amount.is_sign_negative()) {
            timer.observe_duration();
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Allocation {} has a negative amount",
                bad.allocation_id
            )));
        }

        let outcome = dedupe_items(&invoice.extracted_data.items);
        let subtotal = items_subtotal(&outcome.unique_items).round_dp(2);
        let amounts: Vec<Decimal> = allocations.iter().map(|a| a.amount).collect();
        let index_sets = reallocate_items(&outcome.unique_items, &amounts);

        let mut extracted = invoice.extracted_data.0.clone();
        extracted.items = outcome.unique_items;
        extracted.subtotal = Some(subtotal);

        let status = if allocations.is_empty() {
            InvoiceStatus::from_string(&invoice.status)
        } else {
            InvoiceStatus::Reconciled
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin: {}", e)))?;

        let updated_invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET extracted_data = $3, subtotal = $4, status = $5, updated_utc = now()
            WHERE organization_id = $1 AND invoice_id = $2
            RETURNING invoice_id, organization_id, supplier_id, status, extracted_data, subtotal, total_amount, created_utc, updated_utc
            "#,
        )
        .bind(organization_id)
        .bind(invoice_id)
        .bind(Json(&extracted))
        .bind(subtotal)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        let mut updated_allocations = Vec::with_capacity(allocations.len());
        for (allocation, indices) in allocations.iter().zip(index_sets.iter()) {
            let item_indices: Vec<i32> = indices.iter().map(|&i| i as i32).collect();
            let updated = sqlx::query_as::<_, Allocation>(
                r#"
                UPDATE allocations
                SET item_indices = $2
                WHERE allocation_id = $1
                RETURNING allocation_id, invoice_id, organization_id, user_id, account_code, label, amount, item_indices, sort_order, created_utc
                "#,
            )
            .bind(allocation.allocation_id)
            .bind(&item_indices)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update allocation: {}", e))
            })?;
            updated_allocations.push(updated);
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        DUPLICATES_REMOVED_TOTAL.inc_by(outcome.duplicates.len() as u64);
        let result = if allocations.is_empty() {
            "no_allocations"
        } else {
            "reconciled"
        };
        RECONCILIATIONS_TOTAL.with_label_values(&[result]).inc();

        info!(
            invoice_id = %invoice_id,
            duplicates_removed = outcome.duplicates.len(),
            allocations = updated_allocations.len(),
            "Invoice reconciled"
        );

        Ok(ReconcileOutcome {
            invoice: updated_invoice,
            allocations: updated_allocations,
            duplicates: outcome.duplicates,
        })
    }

    // -------------------------------------------------------------------------
    // Supplier Operations
    // -------------------------------------------------------------------------

    /// Get a supplier by ID within an organization.
    #[instrument(skip(self), fields(organization_id = %organization_id, supplier_id = %supplier_id))]
    pub async fn get_supplier(
        &self,
        organization_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<Supplier>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_supplier"])
            .start_timer();

        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            SELECT supplier_id, organization_id, code, display_name, normalized_key, validation_status, is_active, created_utc
            FROM suppliers
            WHERE organization_id = $1 AND supplier_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(supplier_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get supplier: {}", e)))?;

        timer.observe_duration();

        Ok(supplier)
    }
}

#[async_trait]
impl SupplierStore for Database {
    async fn find_by_normalized_key(
        &self,
        organization_id: Uuid,
        key: &str,
    ) -> Result<Option<Supplier>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_supplier_by_key"])
            .start_timer();

        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            SELECT supplier_id, organization_id, code, display_name, normalized_key, validation_status, is_active, created_utc
            FROM suppliers
            WHERE organization_id = $1 AND normalized_key = $2
            "#,
        )
        .bind(organization_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find supplier: {}", e)))?;

        timer.observe_duration();

        Ok(supplier)
    }

    async fn find_by_alias(
        &self,
        organization_id: Uuid,
        alias_key: &str,
    ) -> Result<Option<Supplier>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_supplier_by_alias"])
            .start_timer();

        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            SELECT s.supplier_id, s.organization_id, s.code, s.display_name, s.normalized_key, s.validation_status, s.is_active, s.created_utc
            FROM suppliers s
            JOIN supplier_aliases a ON a.supplier_id = s.supplier_id
            WHERE a.organization_id = $1 AND a.alias_key = $2
            "#,
        )
        .bind(organization_id)
        .bind(alias_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to find supplier alias: {}", e))
        })?;

        timer.observe_duration();

        Ok(supplier)
    }

    async fn list_validated(
        &self,
        organization_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Supplier>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_validated_suppliers"])
            .start_timer();

        let suppliers = sqlx::query_as::<_, Supplier>(
            r#"
            SELECT supplier_id, organization_id, code, display_name, normalized_key, validation_status, is_active, created_utc
            FROM suppliers
            WHERE organization_id = $1 AND validation_status = $2
            ORDER BY created_utc
            LIMIT $3
            "#,
        )
        .bind(organization_id)
        .bind(ValidationStatus::Validated.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list suppliers: {}", e))
        })?;

        timer.observe_duration();

        Ok(suppliers)
    }

    async fn insert_alias(
        &self,
        organization_id: Uuid,
        supplier_id: Uuid,
        alias_key: &str,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_supplier_alias"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO supplier_aliases (supplier_id, organization_id, alias_key)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, alias_key) DO NOTHING
            "#,
        )
        .bind(supplier_id)
        .bind(organization_id)
        .bind(alias_key)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert alias: {}", e)))?;

        timer.observe_duration();

        Ok(())
    }

    async fn insert_supplier(
        &self,
        supplier: &NewSupplier,
        code: &str,
    ) -> Result<InsertOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_supplier"])
            .start_timer();

        // Key conflicts are suppressed by the arbiter, so any unique
        // violation that still surfaces is the code constraint.
        let result = sqlx::query_as::<_, Supplier>(
            r#"
            INSERT INTO suppliers (supplier_id, organization_id, code, display_name, normalized_key, validation_status, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT ON CONSTRAINT suppliers_org_key_unique DO NOTHING
            RETURNING supplier_id, organization_id, code, display_name, normalized_key, validation_status, is_active, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(supplier.organization_id)
        .bind(code)
        .bind(&supplier.display_name)
        .bind(&supplier.normalized_key)
        .bind(ValidationStatus::Pending.as_str())
        .bind(false)
        .fetch_optional(&self.pool)
        .await;

        timer.observe_duration();

        match result {
            Ok(Some(supplier)) => Ok(InsertOutcome::Inserted(supplier)),
            Ok(None) => Ok(InsertOutcome::KeyConflict),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(InsertOutcome::CodeConflict)
            }
            Err(e) => Err(AppError::DatabaseError(anyhow::anyhow!(
                "Failed to insert supplier: {}",
                e
            ))),
        }
    }
}
