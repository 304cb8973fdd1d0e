//! Sales-tax domain module.
//!
//! This crate contains the tax entity model and the reconciliation rules that map
//! freshly fetched tax rates onto a retailer's persisted taxes, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod address;
pub mod group;
pub mod matching;
pub mod model;
pub mod reconcile;

pub use address::AddressQuery;
pub use group::{TaxGroup, elect_parent_id};
pub use matching::{is_avalara, is_same_name, is_same_saved_tax, is_same_tax, is_same_tax_rate, is_same_type};
pub use model::{SourceType, Tax, TaxRate, TaxType};
pub use reconcile::{ReconcileOutcome, reconcile_in_place, reconcile_taxes};
