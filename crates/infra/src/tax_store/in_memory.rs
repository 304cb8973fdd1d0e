use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use taxrecon_core::RetailerId;
use taxrecon_taxes::{Tax, is_same_saved_tax};

use super::{StoreError, TaxStore};

/// In-memory tax store.
///
/// Intended for tests/dev. Mints `vend_tax_id`s itself where a real deployment would
/// receive them from the retail platform.
#[derive(Debug, Default)]
pub struct InMemoryTaxStore {
    taxes: RwLock<HashMap<RetailerId, Vec<Tax>>>,
}

impl InMemoryTaxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with already-persisted rows (kept as given).
    pub fn with_taxes(taxes: impl IntoIterator<Item = Tax>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.taxes.write() {
            for tax in taxes {
                map.entry(tax.retailer_id).or_default().push(tax);
            }
        }
        store
    }
}

impl TaxStore for InMemoryTaxStore {
    fn list_taxes(&self, retailer_id: RetailerId) -> Result<Vec<Tax>, StoreError> {
        let map = self.taxes.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(&retailer_id).cloned().unwrap_or_default())
    }

    fn save_taxes(&self, retailer_id: RetailerId, taxes: &[Tax]) -> Result<Vec<Tax>, StoreError> {
        if let Some(foreign) = taxes.iter().find(|t| t.retailer_id != retailer_id) {
            return Err(StoreError::RetailerMismatch {
                expected: retailer_id,
                found: foreign.retailer_id,
            });
        }

        let mut map = self.taxes.write().map_err(|_| StoreError::Poisoned)?;
        let rows = map.entry(retailer_id).or_default();
        let now = Utc::now();
        let mut saved = Vec::with_capacity(taxes.len());

        for tax in taxes {
            if tax.vend_tax_id.is_empty() {
                if let Some(row) = rows.iter().find(|row| is_same_saved_tax(row, tax)) {
                    saved.push(row.clone());
                    continue;
                }
            }

            let existing = if tax.vend_tax_id.is_empty() {
                None
            } else {
                rows.iter_mut().find(|row| row.vend_tax_id == tax.vend_tax_id)
            };

            let row = match existing {
                Some(row) => {
                    row.name = tax.name.clone();
                    row.source = tax.source;
                    row.rate = tax.rate;
                    row.parent_id = tax.parent_id.clone();
                    row.tax_type = tax.tax_type.clone();
                    row.updated_at = Some(now);
                    row.clone()
                }
                None => {
                    let mut row = tax.clone();
                    row.id = Some(row.id.unwrap_or_default());
                    if row.vend_tax_id.is_empty() {
                        row.vend_tax_id = Uuid::now_v7().to_string();
                    }
                    row.updated_at = Some(now);
                    rows.push(row.clone());
                    row
                }
            };
            saved.push(row);
        }

        Ok(saved)
    }
}
