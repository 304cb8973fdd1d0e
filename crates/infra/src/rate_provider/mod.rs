//! Rate provider boundary: address in, candidate tax group out.

pub mod static_table;

use std::sync::Arc;

use thiserror::Error;

use taxrecon_taxes::{AddressQuery, SourceType, TaxGroup};

pub use static_table::StaticRateProvider;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{provider} has no rates for zipcode {zipcode}")]
    NoRates { provider: SourceType, zipcode: String },

    #[error("{provider} request failed: {message}")]
    Unavailable { provider: SourceType, message: String },
}

/// Source of tax rates for an address (Avalara, TaxJar, ...).
///
/// Returned groups carry no `vend_tax_id`s; identity is the reconciler's job.
pub trait RateProvider: Send + Sync {
    fn rates_for_address(
        &self,
        source: SourceType,
        address: &AddressQuery,
    ) -> Result<TaxGroup, ProviderError>;
}

impl<P> RateProvider for Arc<P>
where
    P: RateProvider + ?Sized,
{
    fn rates_for_address(
        &self,
        source: SourceType,
        address: &AddressQuery,
    ) -> Result<TaxGroup, ProviderError> {
        (**self).rates_for_address(source, address)
    }
}
