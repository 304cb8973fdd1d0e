//! Address lookups handed to a rate provider.

use serde::{Deserialize, Serialize};

use taxrecon_core::{DomainError, DomainResult};

/// Where to look up taxes. Only `zipcode` is mandatory; other fields may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressQuery {
    pub provider: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub zipcode: String,
    pub street: String,
}

impl AddressQuery {
    pub fn for_zipcode(zipcode: impl Into<String>) -> Self {
        Self {
            zipcode: zipcode.into(),
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.zipcode.trim().is_empty() {
            return Err(DomainError::validation("zipcode", "no zipcode informed"));
        }
        Ok(())
    }
}
