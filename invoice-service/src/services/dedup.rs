//! Duplicate line-item detection.
//!
//! OCR re-reads of wrapped rows and repeated table headers register the
//! same physical line more than once. Duplicates are detected on a
//! content fingerprint; `reference` stays out of the key because supplier
//! product codes carry inconsistent prefixes and whitespace for what is
//! otherwise the identical line, which under-detects duplicates.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::models::ExtractedLineItem;

/// A removed duplicate: where it sat in the original array and which kept
/// item it repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DuplicateItem {
    pub index: usize,
    pub duplicate_of: usize,
}

/// Result of a dedup pass. First occurrences keep their order and
/// content.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub unique_items: Vec<ExtractedLineItem>,
    pub duplicates: Vec<DuplicateItem>,
}

fn normalize_description(description: &str) -> String {
    description
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn fingerprint(item: &ExtractedLineItem) -> String {
    let unit_price = item.unit_price.unwrap_or(Decimal::ZERO);
    let quantity = item.quantity.unwrap_or(Decimal::ONE);
    let total_price = item.total_price.unwrap_or(Decimal::ZERO);
    format!(
        "{}|{:.2}|{:.3}|{:.2}",
        normalize_description(&item.description),
        unit_price,
        quantity,
        total_price
    )
}

/// A line with no description and no reference carries no identity and
/// must never be merged with another such line.
fn lacks_identity(item: &ExtractedLineItem) -> bool {
    normalize_description(&item.description).is_empty()
        && item
            .reference
            .as_deref()
            .map_or(true, |r| r.trim().is_empty())
}

/// Single left-to-right scan; the first occurrence of a fingerprint wins.
/// Never fails: worst case the outcome carries zero duplicates.
pub fn dedupe_items(items: &[ExtractedLineItem]) -> DedupOutcome {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut unique_items = Vec::with_capacity(items.len());
    let mut duplicates = Vec::new();

    for (index, item) in items.iter().enumerate() {
        if lacks_identity(item) {
            unique_items.push(item.clone());
            continue;
        }

        let key = fingerprint(item);
        match seen.get(&key) {
            Some(&duplicate_of) => {
                debug!(index, duplicate_of, "Dropping duplicate line item");
                duplicates.push(DuplicateItem {
                    index,
                    duplicate_of,
                });
            }
            None => {
                seen.insert(key, index);
                unique_items.push(item.clone());
            }
        }
    }

    DedupOutcome {
        unique_items,
        duplicates,
    }
}
