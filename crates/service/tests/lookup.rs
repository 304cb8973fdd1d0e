use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, Utc};

use taxrecon_core::RetailerId;
use taxrecon_infra::{
    InMemoryTaxStore, ProviderError, RateProvider, StaticRateProvider, StoreError, TaxStore,
};
use taxrecon_service::{ErrorKind, LookupConfig, LookupError, TaxService};
use taxrecon_taxes::{AddressQuery, SourceType, Tax, TaxGroup, TaxRate, TaxType};

const SANTA_MONICA: &str = "90401";

fn santa_monica_rates() -> Vec<TaxRate> {
    vec![
        TaxRate::new(TaxType::STATE, "CALIFORNIA", 0.0625),
        TaxRate::new(TaxType::CITY, "SANTA MONICA", 0.005),
        TaxRate::new(TaxType::COUNTY, "LOS ANGELES", 0.0025),
        TaxRate::new(TaxType::SPECIAL, "SP", 0.0015),
        TaxRate::new(TaxType::SPECIAL, "SL", 0.01),
    ]
}

fn provider() -> StaticRateProvider {
    StaticRateProvider::new()
        .with_rates(SourceType::Avalara, SANTA_MONICA, santa_monica_rates())
        .with_rates(SourceType::Taxjar, SANTA_MONICA, santa_monica_rates())
}

fn read_only() -> LookupConfig {
    LookupConfig {
        persist_new_taxes: false,
        ..LookupConfig::default()
    }
}

fn only<'a>(group: &'a TaxGroup, tax_type: &TaxType) -> &'a TaxRate {
    let found = group.taxes_by_type(tax_type);
    assert_eq!(found.len(), 1);
    found[0]
}

/// Provider that is always down.
struct DownProvider;

impl RateProvider for DownProvider {
    fn rates_for_address(&self, source: SourceType, _: &AddressQuery) -> Result<TaxGroup, ProviderError> {
        Err(ProviderError::Unavailable {
            provider: source,
            message: "connection refused".to_string(),
        })
    }
}

/// Store that can be read but not written.
struct ReadOnlyStore(InMemoryTaxStore);

impl TaxStore for ReadOnlyStore {
    fn list_taxes(&self, retailer_id: RetailerId) -> Result<Vec<Tax>, StoreError> {
        self.0.list_taxes(retailer_id)
    }

    fn save_taxes(&self, _: RetailerId, _: &[Tax]) -> Result<Vec<Tax>, StoreError> {
        Err(StoreError::Unavailable("read-only replica".to_string()))
    }
}

/// Store whose first two reads meet before returning, so both callers see the
/// same empty history.
struct RacingStore {
    inner: InMemoryTaxStore,
    reads: AtomicUsize,
    gate: Barrier,
}

impl TaxStore for RacingStore {
    fn list_taxes(&self, retailer_id: RetailerId) -> Result<Vec<Tax>, StoreError> {
        let taxes = self.inner.list_taxes(retailer_id)?;
        if self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
            self.gate.wait();
        }
        Ok(taxes)
    }

    fn save_taxes(&self, retailer_id: RetailerId, taxes: &[Tax]) -> Result<Vec<Tax>, StoreError> {
        self.inner.save_taxes(retailer_id, taxes)
    }
}

#[test]
fn end_to_end_reuses_state_and_city_and_elects_parent() {
    let retailer = RetailerId::new();
    let store = InMemoryTaxStore::with_taxes([
        Tax::new(retailer, SourceType::Avalara, TaxType::STATE, "CALIFORNIA", 0.0625).with_vend_tax_id("S1"),
        Tax::new(retailer, SourceType::Avalara, TaxType::CITY, "SANTA MONICA", 0.005)
            .with_vend_tax_id("C1")
            .with_parent_id("S1"),
    ]);
    let svc = TaxService::new(store, provider(), read_only());

    let group = svc
        .taxes_for_address(retailer, &AddressQuery::for_zipcode(SANTA_MONICA))
        .unwrap();

    assert_eq!(group.len(), 5);
    assert!(!group.request_id().is_empty());
    assert_eq!(only(&group, &TaxType::STATE).vend_tax_id, "S1");

    let city = only(&group, &TaxType::CITY);
    assert_eq!(city.vend_tax_id, "C1");
    assert_eq!(city.parent_id, "S1");

    let county = only(&group, &TaxType::COUNTY);
    assert!(county.vend_tax_id.is_empty());
    assert_eq!(county.parent_id, "S1");

    for special in group.taxes_by_type(&TaxType::SPECIAL) {
        assert!(special.vend_tax_id.is_empty());
        assert_eq!(special.parent_id, "S1");
    }
}

#[test]
fn first_lookup_without_history_mints_nothing_when_read_only() {
    let svc = TaxService::new(InMemoryTaxStore::new(), provider(), read_only());

    let group = svc
        .taxes_for_address(RetailerId::new(), &AddressQuery::for_zipcode(SANTA_MONICA))
        .unwrap();

    assert_eq!(group.len(), 5);
    assert!(group.rates().iter().all(|r| r.vend_tax_id.is_empty()));
    assert_eq!(group.elect_parent_id(), "");
}

#[test]
fn repeated_lookups_do_not_duplicate_taxes() {
    let store = Arc::new(InMemoryTaxStore::new());
    let svc = TaxService::new(store.clone(), provider(), LookupConfig::default());
    let retailer = RetailerId::new();
    let query = AddressQuery::for_zipcode(SANTA_MONICA);

    let first = svc.taxes_for_address(retailer, &query).unwrap();
    assert!(first.rates().iter().all(|r| r.is_identified()));
    assert_eq!(store.list_taxes(retailer).unwrap().len(), 5);

    let second = svc.taxes_for_address(retailer, &query).unwrap();
    assert_eq!(store.list_taxes(retailer).unwrap().len(), 5);
    assert_ne!(first.request_id(), second.request_id());

    for rate in first.rates() {
        let again = second
            .rates()
            .iter()
            .find(|r| r.name == rate.name && r.tax_type == rate.tax_type)
            .unwrap();
        assert_eq!(again.vend_tax_id, rate.vend_tax_id);
        assert_eq!(again.parent_id, rate.parent_id);
    }

    let state_id = only(&second, &TaxType::STATE).vend_tax_id.clone();
    assert_eq!(store.list_parentless_taxes(retailer).unwrap().len(), 1);
    for rate in second.rates().iter().filter(|r| !r.tax_type.is_state()) {
        assert_eq!(rate.parent_id, state_id);
    }
}

#[test]
fn rate_change_at_the_source_is_a_new_tax() {
    let retailer = RetailerId::new();
    let store = InMemoryTaxStore::with_taxes([Tax::new(
        retailer,
        SourceType::Avalara,
        TaxType::STATE,
        "CALIFORNIA",
        0.06,
    )
    .with_vend_tax_id("S-OLD")]);
    let svc = TaxService::new(store, provider(), read_only());

    let group = svc
        .taxes_for_address(retailer, &AddressQuery::for_zipcode(SANTA_MONICA))
        .unwrap();

    assert!(only(&group, &TaxType::STATE).vend_tax_id.is_empty());
}

#[test]
fn duplicated_persisted_state_tax_prefers_latest() {
    let retailer = RetailerId::new();
    let now = Utc::now();
    let store = InMemoryTaxStore::with_taxes([
        Tax::new(retailer, SourceType::Avalara, TaxType::STATE, "California", 0.0625)
            .with_vend_tax_id("S-2019")
            .with_updated_at(now - Duration::days(365)),
        Tax::new(retailer, SourceType::Avalara, TaxType::new("STATE"), "CALIFORNIA ", 0.0625)
            .with_vend_tax_id("S-2024")
            .with_updated_at(now),
    ]);
    let svc = TaxService::new(store, provider(), read_only());

    let group = svc
        .taxes_for_address(retailer, &AddressQuery::for_zipcode(SANTA_MONICA))
        .unwrap();

    assert_eq!(only(&group, &TaxType::STATE).vend_tax_id, "S-2024");
    assert_eq!(only(&group, &TaxType::COUNTY).parent_id, "S-2024");
}

#[test]
fn explicit_provider_is_honoured() {
    let svc = TaxService::new(
        InMemoryTaxStore::new(),
        StaticRateProvider::new().with_rates(SourceType::Taxjar, SANTA_MONICA, santa_monica_rates()),
        read_only(),
    );
    let retailer = RetailerId::new();

    let default_err = svc
        .taxes_for_address(retailer, &AddressQuery::for_zipcode(SANTA_MONICA))
        .unwrap_err();
    assert_eq!(default_err.kind, ErrorKind::NoRates);

    let group = svc
        .taxes_for_address(
            retailer,
            &AddressQuery::for_zipcode(SANTA_MONICA).with_provider(" TAXJAR "),
        )
        .unwrap();
    assert_eq!(group.len(), 5);
}

#[test]
fn missing_zipcode_is_rejected_before_the_provider() {
    let svc = TaxService::new(InMemoryTaxStore::new(), DownProvider, read_only());

    let err = svc
        .taxes_for_address(RetailerId::new(), &AddressQuery::for_zipcode(""))
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.http_status, 400);
    assert!(err.field_errors.contains_key("zipcode"));
}

#[test]
fn unknown_provider_is_a_field_error() {
    let svc = TaxService::new(InMemoryTaxStore::new(), provider(), read_only());

    let err = svc
        .taxes_for_address(
            RetailerId::new(),
            &AddressQuery::for_zipcode(SANTA_MONICA).with_provider("vertex"),
        )
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Validation);
    let body = serde_json::to_value(err.to_response()).unwrap();
    assert_eq!(body["code"], 1002);
    assert!(body["fields"]["provider"].as_str().unwrap().contains("vertex"));
}

#[test]
fn provider_outage_is_opaque_to_callers() {
    let svc = TaxService::new(InMemoryTaxStore::new(), DownProvider, read_only());

    let err: LookupError = svc
        .taxes_for_address(RetailerId::new(), &AddressQuery::for_zipcode(SANTA_MONICA))
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Provider);
    assert_eq!(err.http_status, 502);
    assert!(err.loggable_message.contains("connection refused"));
    assert!(!err.to_response().error.contains("connection refused"));
}

#[test]
fn write_failure_surfaces_as_store_error() {
    let svc = TaxService::new(
        ReadOnlyStore(InMemoryTaxStore::new()),
        provider(),
        LookupConfig::default(),
    );

    let err = svc
        .taxes_for_address(RetailerId::new(), &AddressQuery::for_zipcode(SANTA_MONICA))
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Store);
    assert_eq!(err.http_status, 500);
    assert!(err.to_response().code.is_none());
}

#[test]
fn reconciled_group_serializes_for_callers() {
    let retailer = RetailerId::new();
    let store = InMemoryTaxStore::with_taxes([Tax::new(
        retailer,
        SourceType::Avalara,
        TaxType::STATE,
        "CALIFORNIA",
        0.0625,
    )
    .with_vend_tax_id("S1")]);
    let svc = TaxService::new(store, provider(), read_only());

    let group = svc
        .taxes_for_address(retailer, &AddressQuery::for_zipcode(SANTA_MONICA))
        .unwrap();
    let body = serde_json::to_value(&group).unwrap();

    assert!((body["total_rate"].as_f64().unwrap() - 0.0815).abs() < 1e-9);
    assert_eq!(body["rates"].as_array().unwrap().len(), 5);
    assert_eq!(body["rates"][0]["vend_tax_id"], "S1");
    assert_eq!(body["rates"][0]["type"], "state");
    assert!(body["rates"][0].get("parent_id").is_none());
    assert_eq!(body["rates"][1]["parent_id"], "S1");
}

#[test]
fn service_from_env_is_usable() {
    let svc = TaxService::from_env(InMemoryTaxStore::new(), provider());

    let group = svc
        .taxes_for_address(
            RetailerId::new(),
            &AddressQuery::for_zipcode(SANTA_MONICA).with_provider("avalara"),
        )
        .unwrap();

    assert_eq!(group.len(), 5);
}

#[test]
fn concurrent_first_lookups_share_one_state_tax() {
    let store = Arc::new(RacingStore {
        inner: InMemoryTaxStore::new(),
        reads: AtomicUsize::new(0),
        gate: Barrier::new(2),
    });
    let svc = Arc::new(TaxService::new(
        store.clone(),
        StaticRateProvider::new().with_rates(
            SourceType::Avalara,
            SANTA_MONICA,
            [
                TaxRate::new(TaxType::STATE, "CALIFORNIA", 0.0625),
                TaxRate::new(TaxType::CITY, "SANTA MONICA", 0.005),
            ],
        ),
        LookupConfig::default(),
    ));
    let retailer = RetailerId::new();

    let groups: Vec<TaxGroup> = thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let svc = Arc::clone(&svc);
                s.spawn(move || {
                    svc.taxes_for_address(retailer, &AddressQuery::for_zipcode(SANTA_MONICA))
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let rows = store.list_taxes(retailer).unwrap();
    assert_eq!(rows.len(), 2);

    let state_id = &only(&groups[0], &TaxType::STATE).vend_tax_id;
    assert!(!state_id.is_empty());
    assert_eq!(&only(&groups[1], &TaxType::STATE).vend_tax_id, state_id);
    for group in &groups {
        assert_eq!(&only(group, &TaxType::CITY).parent_id, state_id);
    }
}
