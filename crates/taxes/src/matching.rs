//! Equality rules used to decide whether two taxes are the same.
//!
//! Names and type tags compare trimmed and case-folded; rates compare exactly.
//! A rate change at the source yields a distinct tax.

use crate::model::{SourceType, Tax, TaxRate, TaxType};

fn folded_eq(a: &str, b: &str) -> bool {
    a.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .eq(b.trim().chars().flat_map(char::to_lowercase))
}

pub fn is_same_type(a: &TaxType, b: &TaxType) -> bool {
    folded_eq(a.as_str(), b.as_str())
}

pub fn is_same_name(a: &str, b: &str) -> bool {
    folded_eq(a, b)
}

/// Whether a freshly fetched rate is the tax already saved as `db_tax`.
pub fn is_same_tax(db_tax: &Tax, rate: &TaxRate) -> bool {
    is_same_type(&db_tax.tax_type, &rate.tax_type)
        && db_tax.rate == rate.rate
        && is_same_name(&db_tax.name, &rate.name)
}

pub fn is_same_tax_rate(a: &TaxRate, b: &TaxRate) -> bool {
    is_same_type(&a.tax_type, &b.tax_type) && a.rate == b.rate && is_same_name(&a.name, &b.name)
}

/// Whether two saved taxes describe the same tax under the same parent.
pub fn is_same_saved_tax(a: &Tax, b: &Tax) -> bool {
    is_same_type(&a.tax_type, &b.tax_type)
        && a.rate == b.rate
        && is_same_name(&a.name, &b.name)
        && a.parent_id == b.parent_id
}

pub fn is_avalara(provider: &str) -> bool {
    folded_eq(provider, SourceType::Avalara.as_str())
}
