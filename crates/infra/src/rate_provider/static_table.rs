use std::collections::HashMap;

use tracing::debug;

use taxrecon_taxes::{AddressQuery, SourceType, TaxGroup, TaxRate};

use super::{ProviderError, RateProvider};

/// Fixed zipcode → rates table, for tests/dev.
#[derive(Debug, Clone, Default)]
pub struct StaticRateProvider {
    table: HashMap<(SourceType, String), Vec<TaxRate>>,
}

impl StaticRateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rates `source` reports for `zipcode`. Repeated rates are dropped.
    pub fn with_rates(
        mut self,
        source: SourceType,
        zipcode: impl Into<String>,
        rates: impl IntoIterator<Item = TaxRate>,
    ) -> Self {
        let zipcode = zipcode.into().trim().to_string();
        let mut group = TaxGroup::new();
        for rate in rates {
            if !group.contains_tax_rate(&rate) {
                group.add_tax_rate(rate);
            }
        }
        self.table.insert((source, zipcode), group.rates().to_vec());
        self
    }
}

impl RateProvider for StaticRateProvider {
    fn rates_for_address(
        &self,
        source: SourceType,
        address: &AddressQuery,
    ) -> Result<TaxGroup, ProviderError> {
        let zipcode = address.zipcode.trim();
        let rates = self
            .table
            .get(&(source, zipcode.to_string()))
            .ok_or_else(|| ProviderError::NoRates {
                provider: source,
                zipcode: zipcode.to_string(),
            })?;

        debug!(%source, zipcode, rates = rates.len(), "static rates served");
        Ok(rates.iter().cloned().collect())
    }
}
