//! Extracted line item model.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How a line's `total_price` relates to tax.
///
/// The extractor emits a nullable boolean `isTaxExclusive`. Absent and
/// null both mean the basis is unknown, in which case totals fall back to
/// `unit_price * quantity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaxBasis {
    Exclusive,
    Inclusive,
    #[default]
    Unknown,
}

impl TaxBasis {
    pub fn is_unknown(&self) -> bool {
        matches!(self, TaxBasis::Unknown)
    }
}

impl Serialize for TaxBasis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TaxBasis::Exclusive => serializer.serialize_bool(true),
            TaxBasis::Inclusive => serializer.serialize_bool(false),
            TaxBasis::Unknown => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for TaxBasis {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<bool>::deserialize(deserializer)? {
            Some(true) => TaxBasis::Exclusive,
            Some(false) => TaxBasis::Inclusive,
            None => TaxBasis::Unknown,
        })
    }
}

/// One OCR-extracted invoice line, as produced by the extraction pipeline.
///
/// Every numeric field can be missing; extraction gaps are data, not
/// errors. Stored immutably except for full-array replacement when
/// duplicates are removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedLineItem {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<Decimal>,
    #[serde(rename = "isTaxExclusive", skip_serializing_if = "TaxBasis::is_unknown")]
    pub tax_basis: TaxBasis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tax_basis_round_trips_through_nullable_bool() {
        let json = r#"{"description":"Tomates","isTaxExclusive":false}"#;
        let item: ExtractedLineItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.tax_basis, TaxBasis::Inclusive);

        let json = r#"{"description":"Tomates","isTaxExclusive":true}"#;
        let item: ExtractedLineItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.tax_basis, TaxBasis::Exclusive);

        let json = r#"{"description":"Tomates","isTaxExclusive":null}"#;
        let item: ExtractedLineItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.tax_basis, TaxBasis::Unknown);

        let json = r#"{"description":"Tomates"}"#;
        let item: ExtractedLineItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.tax_basis, TaxBasis::Unknown);
    }

    #[test]
    fn unknown_basis_is_omitted_on_output() {
        let item = ExtractedLineItem {
            description: "Tomates".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("isTaxExclusive"));
    }
}
