//! Reconciliation of freshly fetched tax rates against a retailer's persisted taxes.
//!
//! ## Passes
//!
//! ```text
//! TaxGroup (from provider, no ids)
//!   ↓
//! 1. State rates   ← persisted taxes with no parent
//!   ↓
//! 2. Other rates   ← all persisted taxes (copies the matched parent)
//!   ↓
//! 3. Elect parent  → sub-state rates still without a parent
//! ```
//!
//! A rate that matches nothing keeps an empty `vend_tax_id` and will be stored as a
//! new tax. Rates are never added or removed, and nothing here can fail.
//!
//! When several persisted taxes match one rate, the most recently updated one wins
//! and the remaining ties fall back to iteration order. Each such case is logged
//! and counted in [`ReconcileOutcome::ambiguous`].

use tracing::{debug, warn};

use crate::group::TaxGroup;
use crate::matching::is_same_tax;
use crate::model::{Tax, TaxRate};

/// What a reconciliation pass did to a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Rates that reuse a persisted `vend_tax_id`.
    pub matched: usize,
    /// Rates left without an identifier.
    pub unmatched: usize,
    /// Matches where more than one persisted tax qualified.
    pub ambiguous: usize,
    /// Sub-state rates that received the elected parent.
    pub parents_elected: usize,
}

/// Reconcile `group` against `persisted` and hand it back.
pub fn reconcile_taxes(persisted: &[Tax], mut group: TaxGroup) -> TaxGroup {
    reconcile_in_place(persisted, &mut group);
    group
}

pub fn reconcile_in_place(persisted: &[Tax], group: &mut TaxGroup) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    let parentless: Vec<&Tax> = persisted.iter().filter(|t| t.is_parentless()).collect();
    let all: Vec<&Tax> = persisted.iter().collect();

    for rate in group.rates.iter_mut().filter(|r| r.tax_type.is_state()) {
        if let Some(tax) = pick_match(&parentless, rate, &mut outcome) {
            rate.vend_tax_id = tax.vend_tax_id.clone();
        }
    }

    for rate in group.rates.iter_mut().filter(|r| !r.tax_type.is_state()) {
        if let Some(tax) = pick_match(&all, rate, &mut outcome) {
            rate.vend_tax_id = tax.vend_tax_id.clone();
            if !tax.parent_id.is_empty() {
                rate.parent_id = tax.parent_id.clone();
            }
        }
    }

    outcome.parents_elected = assign_elected_parent(group);

    for rate in group.rates() {
        if rate.is_identified() {
            outcome.matched += 1;
        } else {
            outcome.unmatched += 1;
        }
        if !rate.parent_id.is_empty() && !group.contains_parent_id(&rate.parent_id) {
            debug!(
                name = %rate.name,
                parent_id = %rate.parent_id,
                "parent tax is not part of this group"
            );
        }
    }

    outcome
}

/// Pick the persisted tax that `rate` corresponds to, if any.
fn pick_match<'a>(
    candidates: &[&'a Tax],
    rate: &TaxRate,
    outcome: &mut ReconcileOutcome,
) -> Option<&'a Tax> {
    let mut chosen: Option<&'a Tax> = None;
    let mut hits = 0usize;

    for &tax in candidates.iter().filter(|t| is_same_tax(t, rate)) {
        hits += 1;
        chosen = match chosen {
            Some(current) if tax.updated_at <= current.updated_at => Some(current),
            _ => Some(tax),
        };
    }

    if hits > 1 {
        outcome.ambiguous += 1;
        warn!(
            name = %rate.name,
            tax_type = %rate.tax_type,
            rate = rate.rate,
            candidates = hits,
            chosen = chosen.map(|t| t.vend_tax_id.as_str()).unwrap_or(""),
            "several persisted taxes match one rate"
        );
    }

    chosen
}

fn assign_elected_parent(group: &mut TaxGroup) -> usize {
    let elected = group.elect_parent_id().to_owned();
    if elected.is_empty() {
        return 0;
    }

    let mut assigned = 0;
    for rate in group
        .rates
        .iter_mut()
        .filter(|r| !r.tax_type.is_state() && r.parent_id.is_empty())
    {
        rate.parent_id = elected.clone();
        assigned += 1;
    }
    assigned
}
