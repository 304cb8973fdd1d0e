//! `taxrecon-core` — shared domain primitives.
//!
//! This crate contains **pure domain** building blocks (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{RetailerId, TaxId};
