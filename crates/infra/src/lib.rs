//! Infrastructure layer: the tax store and rate provider boundaries, plus
//! in-memory adapters for tests/dev.

pub mod rate_provider;
pub mod tax_store;


pub use rate_provider::{ProviderError, RateProvider, StaticRateProvider};
pub use tax_store::{InMemoryTaxStore, StoreError, TaxStore};
