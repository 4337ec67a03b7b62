//! Supplier normalization and resolution tests for invoice-service.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use invoice_service::models::{NewSupplier, Supplier, ValidationStatus};
use invoice_service::services::supplier::{
    code_base, normalize_supplier_name, token_set_similarity, InsertOutcome, ResolutionMethod,
    SupplierResolver, SupplierStore, FUZZY_MATCH_THRESHOLD,
};
use service_core::error::AppError;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// In-memory store
// ----------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    suppliers: Vec<Supplier>,
    aliases: Vec<(String, Uuid)>,
    /// When set, the next insert loses the key race to this row.
    race_winner: Option<Supplier>,
}

/// Shared-state in-memory store; clones observe the same data, so tests
/// keep a handle for inspection while the resolver owns another.
#[derive(Default, Clone)]
struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    fn with_supplier(self, supplier: Supplier) -> Self {
        self.state.lock().unwrap().suppliers.push(supplier);
        self
    }

    fn alias_keys(&self) -> HashSet<String> {
        self.state
            .lock()
            .unwrap()
            .aliases
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

fn supplier(org: Uuid, key: &str, code: &str, status: ValidationStatus) -> Supplier {
    Supplier {
        supplier_id: Uuid::new_v4(),
        organization_id: org,
        code: code.to_string(),
        display_name: key.to_string(),
        normalized_key: key.to_string(),
        validation_status: status.as_str().to_string(),
        is_active: status == ValidationStatus::Validated,
        created_utc: Utc::now(),
    }
}

#[async_trait]
impl SupplierStore for MemoryStore {
    async fn find_by_normalized_key(
        &self,
        organization_id: Uuid,
        key: &str,
    ) -> Result<Option<Supplier>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .suppliers
            .iter()
            .find(|s| s.organization_id == organization_id && s.normalized_key == key)
            .cloned())
    }

    async fn find_by_alias(
        &self,
        organization_id: Uuid,
        alias_key: &str,
    ) -> Result<Option<Supplier>, AppError> {
        let state = self.state.lock().unwrap();
        let supplier_id = state
            .aliases
            .iter()
            .find(|(key, _)| key == alias_key)
            .map(|(_, id)| *id);
        Ok(supplier_id.and_then(|id| {
            state
                .suppliers
                .iter()
                .find(|s| s.organization_id == organization_id && s.supplier_id == id)
                .cloned()
        }))
    }

    async fn list_validated(
        &self,
        organization_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Supplier>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .suppliers
            .iter()
            .filter(|s| {
                s.organization_id == organization_id
                    && s.validation_status == ValidationStatus::Validated.as_str()
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn insert_alias(
        &self,
        _organization_id: Uuid,
        supplier_id: Uuid,
        alias_key: &str,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if !state.aliases.iter().any(|(key, _)| key == alias_key) {
            state.aliases.push((alias_key.to_string(), supplier_id));
        }
        Ok(())
    }

    async fn insert_supplier(
        &self,
        new_supplier: &NewSupplier,
        code: &str,
    ) -> Result<InsertOutcome, AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(winner) = state.race_winner.take() {
            state.suppliers.push(winner);
            return Ok(InsertOutcome::KeyConflict);
        }
        if state.suppliers.iter().any(|s| {
            s.organization_id == new_supplier.organization_id
                && s.normalized_key == new_supplier.normalized_key
        }) {
            return Ok(InsertOutcome::KeyConflict);
        }
        if state
            .suppliers
            .iter()
            .any(|s| s.organization_id == new_supplier.organization_id && s.code == code)
        {
            return Ok(InsertOutcome::CodeConflict);
        }
        let created = Supplier {
            supplier_id: Uuid::new_v4(),
            organization_id: new_supplier.organization_id,
            code: code.to_string(),
            display_name: new_supplier.display_name.clone(),
            normalized_key: new_supplier.normalized_key.clone(),
            validation_status: ValidationStatus::Pending.as_str().to_string(),
            is_active: false,
            created_utc: Utc::now(),
        };
        state.suppliers.push(created.clone());
        Ok(InsertOutcome::Inserted(created))
    }
}

// ----------------------------------------------------------------------------
// Normalization and similarity
// ----------------------------------------------------------------------------

#[test]
fn normalization_is_stable_across_name_variants() {
    let variants = [
        "Boucherie Martin",
        "BOUCHERIE   MARTIN",
        "Boucherie-Martin SARL",
        "boucherie martín",
    ];
    for variant in variants {
        assert_eq!(normalize_supplier_name(variant), "boucherie martin");
    }
}

#[test]
fn similarity_boundary_at_exactly_80_percent() {
    // |A| = 2, |B| = 3, intersection = 2: 2*2 / 5 = 0.80 exactly.
    let a = "boucherie martin";
    let b = "boucherie martin fils";
    assert_eq!(token_set_similarity(a, b), 0.80);
    assert!(token_set_similarity(a, b) >= FUZZY_MATCH_THRESHOLD);

    // |A| = 4, |B| = 4, intersection = 3: 6 / 8 = 0.75, under the bar.
    let a = "boucherie martin freres paris";
    let b = "boucherie martin freres lyon";
    assert!(token_set_similarity(a, b) < FUZZY_MATCH_THRESHOLD);
}

#[test]
fn code_base_derivation() {
    assert_eq!(code_base("boucherie martin"), "BOUCHE");
    assert_eq!(code_base("abc def"), "ABCDEF");
    assert_eq!(code_base("io"), "IOXX");
}

// ----------------------------------------------------------------------------
// Resolution order
// ----------------------------------------------------------------------------

#[tokio::test]
async fn exact_key_match_wins_first() {
    let org = Uuid::new_v4();
    let store = MemoryStore::default().with_supplier(supplier(
        org,
        "boucherie martin",
        "BOUCHE-001",
        ValidationStatus::Pending,
    ));
    let resolver = SupplierResolver::new(store.clone(), 500);

    let resolution = resolver.resolve(org, "Boucherie MARTIN sarl").await.unwrap();

    assert_eq!(resolution.method, ResolutionMethod::Exact);
    assert_eq!(resolution.supplier.normalized_key, "boucherie martin");
}

#[tokio::test]
async fn alias_match_wins_over_fuzzy() {
    let org = Uuid::new_v4();
    let canonical = supplier(org, "boucherie martin", "BOUCHE-001", ValidationStatus::Validated);
    let canonical_id = canonical.supplier_id;
    let store = MemoryStore::default().with_supplier(canonical);
    store
        .insert_alias(org, canonical_id, "martin viandes")
        .await
        .unwrap();
    let resolver = SupplierResolver::new(store.clone(), 500);

    let resolution = resolver.resolve(org, "Martin Viandes").await.unwrap();

    assert_eq!(resolution.method, ResolutionMethod::Alias);
    assert_eq!(resolution.supplier.supplier_id, canonical_id);
}

#[tokio::test]
async fn fuzzy_match_at_threshold_persists_alias() {
    let org = Uuid::new_v4();
    let store = MemoryStore::default().with_supplier(supplier(
        org,
        "boucherie martin fils",
        "BOUCHE-001",
        ValidationStatus::Validated,
    ));
    let resolver = SupplierResolver::new(store.clone(), 500);

    // "boucherie martin" vs "boucherie martin fils" is exactly 0.80.
    let resolution = resolver.resolve(org, "Boucherie Martin").await.unwrap();
    assert_eq!(resolution.method, ResolutionMethod::Fuzzy);
    assert!(store.alias_keys().contains("boucherie martin"));

    // Self-reinforcing: the same variant now resolves through the alias.
    let resolution = resolver.resolve(org, "Boucherie Martin").await.unwrap();
    assert_eq!(resolution.method, ResolutionMethod::Alias);
}

#[tokio::test]
async fn pending_suppliers_are_not_fuzzy_candidates() {
    let org = Uuid::new_v4();
    let store = MemoryStore::default().with_supplier(supplier(
        org,
        "boucherie martin fils",
        "BOUCHE-001",
        ValidationStatus::Pending,
    ));
    let resolver = SupplierResolver::new(store.clone(), 500);

    let resolution = resolver.resolve(org, "Boucherie Martin").await.unwrap();

    assert_eq!(resolution.method, ResolutionMethod::Created);
}

#[tokio::test]
async fn below_threshold_creates_a_pending_supplier() {
    let org = Uuid::new_v4();
    let store = MemoryStore::default().with_supplier(supplier(
        org,
        "boucherie martin freres lyon",
        "BOUCHE-001",
        ValidationStatus::Validated,
    ));
    let resolver = SupplierResolver::new(store.clone(), 500);

    let resolution = resolver
        .resolve(org, "Boucherie Martin Frères Paris")
        .await
        .unwrap();

    assert_eq!(resolution.method, ResolutionMethod::Created);
    assert_eq!(
        resolution.supplier.validation_status,
        ValidationStatus::Pending.as_str()
    );
    assert!(!resolution.supplier.is_active);
    // The normalized key becomes the first alias.
    assert!(store.alias_keys().contains("boucherie martin freres paris"));
}

#[tokio::test]
async fn code_collision_probes_the_next_sequence() {
    let org = Uuid::new_v4();
    // Occupies BOUCHE-001 under a different key.
    let store = MemoryStore::default().with_supplier(supplier(
        org,
        "boucherie dupont",
        "BOUCHE-001",
        ValidationStatus::Validated,
    ));
    let resolver = SupplierResolver::new(store.clone(), 500);

    let resolution = resolver.resolve(org, "Boucherie Martin").await.unwrap();

    assert_eq!(resolution.method, ResolutionMethod::Created);
    assert_eq!(resolution.supplier.code, "BOUCHE-002");
}

#[tokio::test]
async fn lost_insert_race_rereads_the_winner() {
    let org = Uuid::new_v4();
    let winner = supplier(org, "boucherie martin", "BOUCHE-001", ValidationStatus::Pending);
    let winner_id = winner.supplier_id;
    let store = MemoryStore::default();
    store.state.lock().unwrap().race_winner = Some(winner);
    let resolver = SupplierResolver::new(store.clone(), 500);

    let resolution = resolver.resolve(org, "Boucherie Martin").await.unwrap();

    assert_eq!(resolution.supplier.supplier_id, winner_id);
    assert_eq!(resolution.method, ResolutionMethod::Exact);
}

#[tokio::test]
async fn nil_organization_is_rejected() {
    let store = MemoryStore::default();
    let resolver = SupplierResolver::new(store.clone(), 500);

    let err = resolver
        .resolve(Uuid::nil(), "Boucherie Martin")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn blank_name_is_rejected() {
    let store = MemoryStore::default();
    let resolver = SupplierResolver::new(store.clone(), 500);

    let err = resolver.resolve(Uuid::new_v4(), "SARL").await.unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn exhausted_code_space_is_a_conflict() {
    let org = Uuid::new_v4();
    let store = MemoryStore::default();
    {
        let mut state = store.state.lock().unwrap();
        for sequence in 1..=1000 {
            state.suppliers.push(supplier(
                org,
                &format!("occupant {}", sequence),
                &format!("BOUCHE-{:03}", sequence),
                ValidationStatus::Pending,
            ));
        }
    }
    let resolver = SupplierResolver::new(store.clone(), 500);

    let err = resolver.resolve(org, "Boucherie Martin").await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
}
