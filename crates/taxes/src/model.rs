//! Tax entity model: persisted taxes, candidate rates and their tags.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taxrecon_core::{DomainError, DomainResult, RetailerId, TaxId};

use crate::matching;

/// Jurisdiction level of a tax.
///
/// Providers are not consistent about casing or surrounding whitespace, so the tag
/// is kept as received and compared with [`matching::is_same_type`]. `PartialEq`
/// follows the same rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxType(Cow<'static, str>);

impl TaxType {
    pub const STATE: TaxType = TaxType(Cow::Borrowed("state"));
    pub const CITY: TaxType = TaxType(Cow::Borrowed("city"));
    pub const COUNTY: TaxType = TaxType(Cow::Borrowed("county"));
    /// Usually a district tax.
    pub const SPECIAL: TaxType = TaxType(Cow::Borrowed("special"));

    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// State taxes sit at the top of the US jurisdiction hierarchy.
    pub fn is_state(&self) -> bool {
        matching::is_same_type(self, &Self::STATE)
    }
}

impl PartialEq for TaxType {
    fn eq(&self, other: &Self) -> bool {
        matching::is_same_type(self, other)
    }
}

impl From<&str> for TaxType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl core::fmt::Display for TaxType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate provider a tax was found with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Avalara,
    Taxjar,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Avalara => "avalara",
            SourceType::Taxjar => "taxjar",
        }
    }

    /// Resolve a provider name as it arrives from a caller (`" AvaLara "` is fine).
    pub fn parse(provider: &str) -> DomainResult<Self> {
        if matching::is_avalara(provider) {
            Ok(SourceType::Avalara)
        } else if matching::is_same_name(provider, SourceType::Taxjar.as_str()) {
            Ok(SourceType::Taxjar)
        } else {
            Err(DomainError::unknown_provider(provider.trim()))
        }
    }
}

impl core::fmt::Display for SourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tax associated to a retailer, as saved by the tax store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    /// Store row id; `None` until persisted.
    pub id: Option<TaxId>,
    pub retailer_id: RetailerId,
    pub name: String,
    /// Cross-system key. Used for matching and as the target of `parent_id`.
    pub vend_tax_id: String,
    #[serde(rename = "source_id")]
    pub source: SourceType,
    /// Fractional rate (`0.0625` for 6.25%).
    pub rate: f64,
    /// `vend_tax_id` of the parent tax. Empty for top-level (state) taxes.
    pub parent_id: String,
    #[serde(rename = "type")]
    pub tax_type: TaxType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Tax {
    pub fn new(
        retailer_id: RetailerId,
        source: SourceType,
        tax_type: TaxType,
        name: impl Into<String>,
        rate: f64,
    ) -> Self {
        Self {
            id: None,
            retailer_id,
            name: name.into(),
            vend_tax_id: String::new(),
            source,
            rate,
            parent_id: String::new(),
            tax_type,
            updated_at: None,
        }
    }

    pub fn with_vend_tax_id(mut self, vend_tax_id: impl Into<String>) -> Self {
        self.vend_tax_id = vend_tax_id.into();
        self
    }

    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// No parent recorded; by convention this is a state tax.
    pub fn is_parentless(&self) -> bool {
        self.parent_id.is_empty()
    }
}

/// A single tax rate returned by a provider for an address.
///
/// Carries no stable identity until reconciled against the retailer's taxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRate {
    #[serde(default)]
    pub vend_tax_id: String,
    pub rate: f64,
    pub name: String,
    #[serde(rename = "type")]
    pub tax_type: TaxType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_id: String,
}

impl TaxRate {
    pub fn new(tax_type: TaxType, name: impl Into<String>, rate: f64) -> Self {
        Self {
            vend_tax_id: String::new(),
            rate,
            name: name.into(),
            tax_type,
            parent_id: String::new(),
        }
    }

    pub fn is_identified(&self) -> bool {
        !self.vend_tax_id.is_empty()
    }

    /// Build the persisted form of this rate for `retailer_id`.
    pub fn to_tax(&self, retailer_id: RetailerId, source: SourceType) -> Tax {
        Tax::new(retailer_id, source, self.tax_type.clone(), self.name.clone(), self.rate)
            .with_vend_tax_id(self.vend_tax_id.clone())
            .with_parent_id(self.parent_id.clone())
    }
}
