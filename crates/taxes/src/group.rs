//! Tax groups: the rates applicable to one address lookup.

use serde::{Deserialize, Serialize};

use crate::matching::{is_same_tax_rate, is_same_type};
use crate::model::{TaxRate, TaxType};

/// Group of tax rates returned for a single address.
///
/// `total_rate` is always the sum of the rates; an incoming total is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTaxGroup")]
pub struct TaxGroup {
    total_rate: f64,
    /// Correlates the lookup with the later confirmation that the taxes were accepted.
    request_id: String,
    pub(crate) rates: Vec<TaxRate>,
}

#[derive(Deserialize)]
struct RawTaxGroup {
    #[serde(default)]
    request_id: String,
    #[serde(default)]
    rates: Vec<TaxRate>,
}

impl From<RawTaxGroup> for TaxGroup {
    fn from(raw: RawTaxGroup) -> Self {
        let mut group: TaxGroup = raw.rates.into_iter().collect();
        group.request_id = raw.request_id;
        group
    }
}

impl TaxGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn total_rate(&self) -> f64 {
        self.total_rate
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn set_request_id(&mut self, request_id: impl Into<String>) {
        self.request_id = request_id.into();
    }

    pub fn rates(&self) -> &[TaxRate] {
        &self.rates
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Append a rate. Duplicates are not suppressed here.
    pub fn add_tax_rate(&mut self, rate: TaxRate) {
        self.total_rate += rate.rate;
        self.rates.push(rate);
    }

    /// All rates of type `tax_type`, in group order.
    pub fn taxes_by_type(&self, tax_type: &TaxType) -> Vec<&TaxRate> {
        self.rates
            .iter()
            .filter(|rate| is_same_type(&rate.tax_type, tax_type))
            .collect()
    }

    pub fn contains_tax_rate(&self, rate: &TaxRate) -> bool {
        self.rates.iter().any(|r| is_same_tax_rate(r, rate))
    }

    /// Exact key match on `vend_tax_id`; an empty id is never contained.
    pub fn contains_parent_id(&self, parent_id: &str) -> bool {
        if parent_id.is_empty() {
            return false;
        }
        self.rates.iter().any(|r| r.vend_tax_id == parent_id)
    }

    /// Parent for the sub-state rates of this group.
    ///
    /// For US addresses that is the state tax, once it has been identified.
    pub fn elect_parent_id(&self) -> &str {
        self.rates
            .iter()
            .find(|r| r.is_identified() && r.tax_type.is_state())
            .map(|r| r.vend_tax_id.as_str())
            .unwrap_or("")
    }
}

impl FromIterator<TaxRate> for TaxGroup {
    fn from_iter<I: IntoIterator<Item = TaxRate>>(iter: I) -> Self {
        let mut group = TaxGroup::new();
        for rate in iter {
            group.add_tax_rate(rate);
        }
        group
    }
}

/// [`TaxGroup::elect_parent_id`] for a group that may be missing.
pub fn elect_parent_id(group: Option<&TaxGroup>) -> &str {
    group.map(TaxGroup::elect_parent_id).unwrap_or("")
}
