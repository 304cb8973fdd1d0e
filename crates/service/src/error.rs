//! Lookup failures and the error body handed back to callers.
//!
//! Every failure is classified once, where it happens, into a [`LookupError`] that
//! already knows its status, user code and field errors.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use taxrecon_core::DomainError;
use taxrecon_infra::{ProviderError, StoreError};

/// Generic message for failures whose details must stay in the logs.
pub const PRIVATE_ERROR_MESSAGE: &str = "an internal error occurred";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad or missing address input. Raised before any provider call.
    Validation,
    /// The provider knows no rates for the address.
    NoRates,
    /// The provider failed; reconciliation never ran.
    Provider,
    /// Reading or writing persisted taxes failed.
    Store,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LookupError {
    pub kind: ErrorKind,
    pub http_status: u16,
    /// Stable code shown to callers; `None` for private errors.
    pub user_code: Option<u32>,
    pub field_errors: BTreeMap<String, String>,
    pub message: String,
    /// Full detail for the logs. May contain data unfit for a response body.
    pub loggable_message: String,
}

/// Error payload as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl LookupError {
    fn new(kind: ErrorKind, http_status: u16, user_code: Option<u32>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            http_status,
            user_code,
            field_errors: BTreeMap::new(),
            loggable_message: message.clone(),
            message,
        }
    }

    fn with_field(mut self, field: impl Into<String>, problem: impl Into<String>) -> Self {
        self.field_errors.insert(field.into(), problem.into());
        self
    }

    fn with_loggable(mut self, loggable: impl Into<String>) -> Self {
        self.loggable_message = loggable.into();
        self
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status)
    }

    pub fn to_response(&self) -> ErrorResponse {
        match self.kind {
            ErrorKind::Validation | ErrorKind::NoRates => ErrorResponse {
                error: self.message.clone(),
                code: self.user_code,
                fields: self.field_errors.clone(),
            },
            ErrorKind::Provider | ErrorKind::Store => ErrorResponse {
                error: PRIVATE_ERROR_MESSAGE.to_string(),
                code: None,
                fields: BTreeMap::new(),
            },
        }
    }

    /// Emit the loggable detail: `warn` for caller mistakes, `error` otherwise.
    pub fn log(&self) {
        if self.is_client_error() {
            warn!(kind = ?self.kind, status = self.http_status, message = %self.loggable_message, "tax lookup rejected");
        } else {
            error!(kind = ?self.kind, status = self.http_status, message = %self.loggable_message, "tax lookup failed");
        }
    }
}

impl From<DomainError> for LookupError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation { field, message } => {
                LookupError::new(ErrorKind::Validation, 400, Some(1001), message.clone())
                    .with_field(field, message)
            }
            DomainError::UnknownProvider(name) => LookupError::new(
                ErrorKind::Validation,
                400,
                Some(1002),
                "provider must be one of: avalara, taxjar",
            )
            .with_field("provider", format!("unknown provider {name:?}")),
            // Raised when callers parse a `RetailerId` or `TaxId` from request input.
            DomainError::InvalidId(msg) => {
                LookupError::new(ErrorKind::Validation, 400, Some(1003), "invalid identifier")
                    .with_loggable(msg)
            }
        }
    }
}

impl From<ProviderError> for LookupError {
    fn from(value: ProviderError) -> Self {
        match &value {
            ProviderError::NoRates { .. } => {
                LookupError::new(ErrorKind::NoRates, 404, Some(2001), value.to_string())
            }
            ProviderError::Unavailable { .. } => {
                LookupError::new(ErrorKind::Provider, 502, None, PRIVATE_ERROR_MESSAGE)
                    .with_loggable(value.to_string())
            }
        }
    }
}

impl From<StoreError> for LookupError {
    fn from(value: StoreError) -> Self {
        LookupError::new(ErrorKind::Store, 500, None, PRIVATE_ERROR_MESSAGE).with_loggable(value.to_string())
    }
}
