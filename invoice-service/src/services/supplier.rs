//! Supplier name normalization and resolution.
//!
//! Extracted supplier names arrive as free text ("S.A.R.L. Boucherie
//! Martín", "boucherie MARTIN"). Resolution maps each variant to one
//! canonical supplier per organization: exact normalized-key match, then
//! the alias table, then a fuzzy token-set match against validated
//! suppliers, and only then a new supplier pending human validation.

use std::collections::HashSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use service_core::error::AppError;
use thiserror::Error;
use tracing::{info, instrument};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::models::{NewSupplier, Supplier};

/// Similarity floor for accepting a fuzzy supplier match.
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.80;

/// Cap on code probing before supplier creation gives up.
const MAX_CODE_ATTEMPTS: u32 = 1000;

/// Legal-form and filler tokens that carry no supplier identity.
const STOPWORDS: &[&str] = &[
    "sas",
    "sasu",
    "sarl",
    "sa",
    "eurl",
    "spa",
    "ltd",
    "inc",
    "societe",
    "maison",
    "ste",
    "ets",
    "etablissement",
    "les",
    "des",
    "du",
    "de",
    "la",
    "le",
    "l",
];

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Reduce a free-text supplier name to its canonical matching key:
/// strip diacritics, lowercase, squash non-alphanumeric runs to single
/// spaces, drop legal-form tokens, collapse whitespace.
pub fn normalize_supplier_name(name: &str) -> String {
    let stripped: String = name.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let lowered = stripped.to_lowercase();
    let spaced = NON_ALNUM.replace_all(&lowered, " ");
    spaced
        .split_whitespace()
        .filter(|token| !STOPWORDS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tokens that participate in fuzzy matching: words longer than two
/// characters.
fn match_tokens(key: &str) -> HashSet<&str> {
    key.split_whitespace().filter(|t| t.len() > 2).collect()
}

/// Dice coefficient over the two keys' token sets:
/// `2*|A∩B| / (|A|+|B|)`, zero when both sets are empty.
pub fn token_set_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = match_tokens(a);
    let tokens_b = match_tokens(b);
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    (2.0 * intersection as f64) / ((tokens_a.len() + tokens_b.len()) as f64)
}

/// Derive the code base for a new supplier: alphanumerics of the
/// normalized key, uppercased, at most six characters, padded to four
/// with 'X' for very short names.
pub fn code_base(normalized_key: &str) -> String {
    let mut base: String = normalized_key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(6)
        .collect();
    while base.len() < 4 {
        base.push('X');
    }
    base
}

/// Supplier engine failures with a dedicated HTTP mapping.
#[derive(Debug, Error)]
pub enum SupplierError {
    #[error("supplier cannot be created outside an organization scope")]
    MissingOrganization,
    #[error("no free supplier code after {attempts} candidates for base {base}")]
    CodeGenerationExhausted { base: String, attempts: u32 },
}

impl From<SupplierError> for AppError {
    fn from(err: SupplierError) -> Self {
        let conflict = matches!(err, SupplierError::CodeGenerationExhausted { .. });
        if conflict {
            AppError::Conflict(anyhow::Error::new(err))
        } else {
            AppError::BadRequest(anyhow::Error::new(err))
        }
    }
}

/// How a resolution was satisfied, for callers and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Exact,
    Alias,
    Fuzzy,
    Created,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::Exact => "exact",
            ResolutionMethod::Alias => "alias",
            ResolutionMethod::Fuzzy => "fuzzy",
            ResolutionMethod::Created => "created",
        }
    }
}

/// A resolved supplier and how it was found.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub supplier: Supplier,
    pub method: ResolutionMethod,
}

/// Outcome of an atomic supplier insert.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(Supplier),
    /// The normalized key is already taken; the winner is canonical and
    /// must be re-read.
    KeyConflict,
    /// The probed code is taken; retry with the next sequence number.
    CodeConflict,
}

/// Persistence seam for supplier resolution.
#[async_trait]
pub trait SupplierStore: Send + Sync {
    async fn find_by_normalized_key(
        &self,
        organization_id: Uuid,
        key: &str,
    ) -> Result<Option<Supplier>, AppError>;

    async fn find_by_alias(
        &self,
        organization_id: Uuid,
        alias_key: &str,
    ) -> Result<Option<Supplier>, AppError>;

    /// Validated suppliers for the organization, capped at `limit`.
    async fn list_validated(
        &self,
        organization_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Supplier>, AppError>;

    /// Insert the alias unless it already exists.
    async fn insert_alias(
        &self,
        organization_id: Uuid,
        supplier_id: Uuid,
        alias_key: &str,
    ) -> Result<(), AppError>;

    /// Insert the supplier with the given code. Key conflicts are
    /// reported, never raised, so callers can re-read the winning row.
    async fn insert_supplier(
        &self,
        supplier: &NewSupplier,
        code: &str,
    ) -> Result<InsertOutcome, AppError>;
}

/// Resolve-or-create engine over a [`SupplierStore`].
pub struct SupplierResolver<S> {
    store: S,
    fuzzy_scan_limit: i64,
}

impl<S: SupplierStore> SupplierResolver<S> {
    pub fn new(store: S, fuzzy_scan_limit: i64) -> Self {
        Self {
            store,
            fuzzy_scan_limit,
        }
    }

    /// Resolve a free-text supplier name within an organization,
    /// creating a pending supplier when nothing matches.
    #[instrument(skip(self, display_name), fields(organization_id = %organization_id))]
    pub async fn resolve(
        &self,
        organization_id: Uuid,
        display_name: &str,
    ) -> Result<Resolution, AppError> {
        if organization_id.is_nil() {
            return Err(SupplierError::MissingOrganization.into());
        }

        let key = normalize_supplier_name(display_name);
        if key.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "supplier name is empty after normalization"
            )));
        }

        if let Some(supplier) = self
            .store
            .find_by_normalized_key(organization_id, &key)
            .await?
        {
            return Ok(Resolution {
                supplier,
                method: ResolutionMethod::Exact,
            });
        }

        if let Some(supplier) = self.store.find_by_alias(organization_id, &key).await? {
            return Ok(Resolution {
                supplier,
                method: ResolutionMethod::Alias,
            });
        }

        // Fuzzy pass over validated suppliers only. An accepted match
        // persists the alias so the next resolution of this variant is an
        // exact alias hit.
        let candidates = self
            .store
            .list_validated(organization_id, self.fuzzy_scan_limit)
            .await?;
        let mut best: Option<(f64, Supplier)> = None;
        for candidate in candidates {
            let score = token_set_similarity(&key, &candidate.normalized_key);
            if score >= FUZZY_MATCH_THRESHOLD
                && best.as_ref().map_or(true, |(current, _)| score > *current)
            {
                best = Some((score, candidate));
            }
        }
        if let Some((score, supplier)) = best {
            info!(
                supplier_id = %supplier.supplier_id,
                score,
                "Fuzzy supplier match accepted"
            );
            self.store
                .insert_alias(organization_id, supplier.supplier_id, &key)
                .await?;
            return Ok(Resolution {
                supplier,
                method: ResolutionMethod::Fuzzy,
            });
        }

        self.create_pending(organization_id, display_name, &key).await
    }

    async fn create_pending(
        &self,
        organization_id: Uuid,
        display_name: &str,
        key: &str,
    ) -> Result<Resolution, AppError> {
        let new_supplier = NewSupplier {
            organization_id,
            display_name: display_name.trim().to_string(),
            normalized_key: key.to_string(),
        };
        let base = code_base(key);

        for sequence in 1..=MAX_CODE_ATTEMPTS {
            let code = format!("{}-{:03}", base, sequence);
            match self.store.insert_supplier(&new_supplier, &code).await? {
                InsertOutcome::Inserted(supplier) => {
                    self.store
                        .insert_alias(organization_id, supplier.supplier_id, key)
                        .await?;
                    info!(
                        supplier_id = %supplier.supplier_id,
                        code = %supplier.code,
                        "Created supplier pending validation"
                    );
                    return Ok(Resolution {
                        supplier,
                        method: ResolutionMethod::Created,
                    });
                }
                InsertOutcome::KeyConflict => {
                    // Lost an insert race on the normalized key; the
                    // winner is canonical.
                    let supplier = self
                        .store
                        .find_by_normalized_key(organization_id, key)
                        .await?
                        .ok_or_else(|| {
                            AppError::DatabaseError(anyhow::anyhow!(
                                "supplier vanished after key conflict"
                            ))
                        })?;
                    return Ok(Resolution {
                        supplier,
                        method: ResolutionMethod::Exact,
                    });
                }
                InsertOutcome::CodeConflict => continue,
            }
        }

        Err(SupplierError::CodeGenerationExhausted {
            base,
            attempts: MAX_CODE_ATTEMPTS,
        }
        .into())
    }
}
