//! Address lookup orchestration.
//!
//! ```text
//! AddressQuery
//!   ↓
//! 1. Validate (zipcode mandatory, provider known)
//!   ↓
//! 2. RateProvider → TaxGroup (no ids)
//!   ↓
//! 3. TaxStore (read) → reconcile
//!   ↓
//! 4. Persist unmatched rates (optional), state taxes first
//! ```

use tracing::{debug, info, instrument};
use uuid::Uuid;

use taxrecon_core::RetailerId;
use taxrecon_infra::{RateProvider, TaxStore};
use taxrecon_taxes::{AddressQuery, ReconcileOutcome, SourceType, Tax, TaxGroup, reconcile_in_place};

use crate::config::LookupConfig;
use crate::error::LookupError;

/// Counters of one lookup, as logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LookupSummary {
    /// Rates that matched no persisted tax before anything was saved.
    new_taxes: usize,
    /// Result of the last reconcile.
    outcome: ReconcileOutcome,
}

/// Tax lookup service with its store and provider injected.
#[derive(Debug, Clone)]
pub struct TaxService<S, P> {
    store: S,
    provider: P,
    config: LookupConfig,
}

impl<S, P> TaxService<S, P>
where
    S: TaxStore,
    P: RateProvider,
{
    pub fn new(store: S, provider: P, config: LookupConfig) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Build a service configured from the environment.
    ///
    /// Installing the subscriber is left to the process, e.g.
    /// `taxrecon_observability::init_with(svc.config().log_format)`.
    pub fn from_env(store: S, provider: P) -> Self {
        Self::new(store, provider, LookupConfig::from_env())
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rates for `query`, with identifiers reused from `retailer_id`'s taxes.
    ///
    /// Failures are logged here before being returned.
    #[instrument(skip_all, fields(retailer_id = %retailer_id, zipcode = %query.zipcode))]
    pub fn taxes_for_address(
        &self,
        retailer_id: RetailerId,
        query: &AddressQuery,
    ) -> Result<TaxGroup, LookupError> {
        self.lookup(retailer_id, query)
            .map(|(group, _)| group)
            .inspect_err(LookupError::log)
    }

    fn lookup(
        &self,
        retailer_id: RetailerId,
        query: &AddressQuery,
    ) -> Result<(TaxGroup, LookupSummary), LookupError> {
        query.validate()?;
        let source = self.resolve_source(&query.provider)?;

        let mut group = self.provider.rates_for_address(source, query)?;
        if group.request_id().is_empty() {
            group.set_request_id(Uuid::now_v7().to_string());
        }

        let persisted = self.store.list_taxes(retailer_id)?;
        let mut outcome = reconcile_in_place(&persisted, &mut group);
        let new_taxes = outcome.unmatched;

        if self.config.persist_new_taxes && outcome.unmatched > 0 {
            outcome = self.persist_new_taxes(retailer_id, source, &mut group, outcome)?;
        }

        info!(
            request_id = group.request_id(),
            %source,
            rates = group.len(),
            matched = outcome.matched,
            new = new_taxes,
            unmatched = outcome.unmatched,
            ambiguous = outcome.ambiguous,
            parent_id = group.elect_parent_id(),
            "tax group reconciled"
        );

        Ok((group, LookupSummary { new_taxes, outcome }))
    }

    fn resolve_source(&self, provider: &str) -> Result<SourceType, LookupError> {
        if provider.trim().is_empty() {
            return Ok(self.config.default_provider);
        }
        Ok(SourceType::parse(provider)?)
    }

    /// Save rates that matched nothing and reconcile again so they carry ids.
    ///
    /// State rates go first: once they have an id, the sub-state rates are saved with
    /// it as their parent.
    fn persist_new_taxes(
        &self,
        retailer_id: RetailerId,
        source: SourceType,
        group: &mut TaxGroup,
        mut outcome: ReconcileOutcome,
    ) -> Result<ReconcileOutcome, LookupError> {
        for state_phase in [true, false] {
            let fresh: Vec<Tax> = group
                .rates()
                .iter()
                .filter(|r| !r.is_identified() && r.tax_type.is_state() == state_phase)
                .map(|r| r.to_tax(retailer_id, source))
                .collect();
            if fresh.is_empty() {
                continue;
            }

            let saved = self.store.save_taxes(retailer_id, &fresh)?;
            debug!(saved = saved.len(), state_phase, "new taxes persisted");

            let persisted = self.store.list_taxes(retailer_id)?;
            outcome = reconcile_in_place(&persisted, group);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxrecon_infra::{InMemoryTaxStore, StaticRateProvider};
    use taxrecon_taxes::{TaxRate, TaxType};

    fn service(config: LookupConfig) -> TaxService<InMemoryTaxStore, StaticRateProvider> {
        let provider = StaticRateProvider::new().with_rates(
            SourceType::Avalara,
            "90401",
            [
                TaxRate::new(TaxType::STATE, "CALIFORNIA", 0.0625),
                TaxRate::new(TaxType::CITY, "SANTA MONICA", 0.005),
            ],
        );
        TaxService::new(InMemoryTaxStore::new(), provider, config)
    }

    #[test]
    fn empty_provider_uses_configured_default() {
        let svc = service(LookupConfig::default());
        assert_eq!(svc.resolve_source("  ").unwrap(), SourceType::Avalara);
        assert_eq!(svc.resolve_source("TaxJar").unwrap(), SourceType::Taxjar);
        assert!(svc.resolve_source("vertex").is_err());
    }

    #[test]
    fn persisted_sub_state_taxes_point_at_the_state_tax() {
        let svc = service(LookupConfig::default());
        let retailer = RetailerId::new();

        let group = svc
            .taxes_for_address(retailer, &AddressQuery::for_zipcode("90401"))
            .unwrap();

        let rows = svc.store().list_taxes(retailer).unwrap();
        assert_eq!(rows.len(), 2);
        let state = rows.iter().find(|t| t.tax_type.is_state()).unwrap();
        let city = rows.iter().find(|t| !t.tax_type.is_state()).unwrap();
        assert!(state.is_parentless());
        assert_eq!(city.parent_id, state.vend_tax_id);
        assert_eq!(group.elect_parent_id(), state.vend_tax_id);
    }

    #[test]
    fn new_taxes_are_counted_before_they_are_saved() {
        let svc = service(LookupConfig::default());
        let retailer = RetailerId::new();
        let query = AddressQuery::for_zipcode("90401");

        let (_, first) = svc.lookup(retailer, &query).unwrap();
        assert_eq!(first.new_taxes, 2);
        assert_eq!(first.outcome.matched, 2);
        assert_eq!(first.outcome.unmatched, 0);

        let (_, second) = svc.lookup(retailer, &query).unwrap();
        assert_eq!(second.new_taxes, 0);
        assert_eq!(second.outcome.matched, 2);
    }

    #[test]
    fn nothing_is_saved_when_persistence_is_off() {
        let svc = service(LookupConfig {
            persist_new_taxes: false,
            ..LookupConfig::default()
        });
        let retailer = RetailerId::new();

        let group = svc
            .taxes_for_address(retailer, &AddressQuery::for_zipcode("90401"))
            .unwrap();

        assert!(group.rates().iter().all(|r| !r.is_identified()));
        assert!(svc.store().list_taxes(retailer).unwrap().is_empty());
    }
}
