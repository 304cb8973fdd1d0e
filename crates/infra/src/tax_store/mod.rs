//! Retailer-scoped tax record storage.
//!
//! The reconciler only reads from this boundary; writes happen after a lookup has
//! been reconciled.

pub mod in_memory;

use std::sync::Arc;

use thiserror::Error;

use taxrecon_core::RetailerId;
use taxrecon_taxes::Tax;

pub use in_memory::InMemoryTaxStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("tax store unavailable: {0}")]
    Unavailable(String),

    #[error("retailer isolation violation: expected {expected}, found {found}")]
    RetailerMismatch {
        expected: RetailerId,
        found: RetailerId,
    },

    #[error("tax store lock poisoned")]
    Poisoned,
}

/// Persisted taxes, keyed by retailer.
pub trait TaxStore: Send + Sync {
    /// Every tax saved for `retailer_id`, in insertion order.
    fn list_taxes(&self, retailer_id: RetailerId) -> Result<Vec<Tax>, StoreError>;

    /// Taxes with no parent. Ideally only state taxes have an empty `parent_id`.
    fn list_parentless_taxes(&self, retailer_id: RetailerId) -> Result<Vec<Tax>, StoreError> {
        let mut taxes = self.list_taxes(retailer_id)?;
        taxes.retain(Tax::is_parentless);
        Ok(taxes)
    }

    /// Upsert by `vend_tax_id`.
    ///
    /// A tax with an empty `vend_tax_id` resolves to an existing row of the same
    /// type, rate, name and `parent_id` when there is one; otherwise it is inserted
    /// and receives a `vend_tax_id`. The check and the insert happen atomically, so
    /// concurrent saves of the same new tax yield a single row. Returns the stored
    /// rows in the order given.
    fn save_taxes(&self, retailer_id: RetailerId, taxes: &[Tax]) -> Result<Vec<Tax>, StoreError>;
}

impl<S> TaxStore for Arc<S>
where
    S: TaxStore + ?Sized,
{
    fn list_taxes(&self, retailer_id: RetailerId) -> Result<Vec<Tax>, StoreError> {
        (**self).list_taxes(retailer_id)
    }

    fn list_parentless_taxes(&self, retailer_id: RetailerId) -> Result<Vec<Tax>, StoreError> {
        (**self).list_parentless_taxes(retailer_id)
    }

    fn save_taxes(&self, retailer_id: RetailerId, taxes: &[Tax]) -> Result<Vec<Tax>, StoreError> {
        (**self).save_taxes(retailer_id, taxes)
    }
}
