//! Tax group lookup: fetch rates for an address, reconcile them with the retailer's
//! persisted taxes, and optionally persist the new ones.
//!
//! Collaborators are injected; nothing here reaches for global state.

pub mod config;
pub mod error;
pub mod service;

pub use config::LookupConfig;
pub use error::{ErrorKind, ErrorResponse, LookupError};
pub use service::TaxService;
