//! Aggregation of the events published for a round into one market-wide shock
//! and a per-bond idiosyncratic shock map.
//!
//! Only events whose `round` equals the round being published contribute; how
//! earlier rounds carry forward is the round controller's `ShockPolicy`.

use std::collections::HashMap;

use tracing::debug;

use crate::engine::types::{Bond, EventKind, MarketEvent};

/// The shocks active for a single published round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundShocks {
    pub market_bps: f64,
    pub idiosyncratic_bps: HashMap<String, f64>,
    /// Set when a MIXED event asks the round controller to widen spreads.
    pub widen_spreads: bool,
}

/// Lowest-spread bond wins MIXED favor; ties break on bond_id so the outcome
/// never depends on input order.
pub fn lowest_spread_bond(bonds: &[Bond]) -> Option<&Bond> {
    bonds.iter().min_by(|a, b| {
        a.credit_spread_bps
            .total_cmp(&b.credit_spread_bps)
            .then_with(|| a.bond_id.cmp(&b.bond_id))
    })
}

pub fn highest_spread_bond(bonds: &[Bond]) -> Option<&Bond> {
    bonds.iter().max_by(|a, b| {
        a.credit_spread_bps
            .total_cmp(&b.credit_spread_bps)
            .then_with(|| b.bond_id.cmp(&a.bond_id))
    })
}

/// Sum up every event published for `round` against the current bond set.
pub fn aggregate_round(events: &[MarketEvent], round: u32, bonds: &[Bond]) -> RoundShocks {
    let mut shocks = RoundShocks::default();
    for event in events.iter().filter(|e| e.round == round) {
        match &event.kind {
            EventKind::Market { rate_shock_bps } => {
                shocks.market_bps += rate_shock_bps;
            }
            EventKind::Idiosyncratic {
                target_bond_id,
                impact_bps,
            } => {
                *shocks
                    .idiosyncratic_bps
                    .entry(target_bond_id.clone())
                    .or_default() += impact_bps;
            }
            EventKind::Mixed {
                favored_bps,
                penalized_bps,
            } => {
                let favored = lowest_spread_bond(bonds).map(|b| b.bond_id.clone());
                for bond in bonds {
                    let bps = if Some(&bond.bond_id) == favored.as_ref() {
                        *favored_bps
                    } else {
                        *penalized_bps
                    };
                    *shocks
                        .idiosyncratic_bps
                        .entry(bond.bond_id.clone())
                        .or_default() += bps;
                }
                shocks.widen_spreads = true;
            }
        }
    }
    debug!(
        round,
        market_bps = shocks.market_bps,
        targets = shocks.idiosyncratic_bps.len(),
        widen = shocks.widen_spreads,
        "aggregated round shocks"
    );
    shocks
}

/// Deterministic 3-event template: MARKET in round 1, IDIOS against the
/// highest-spread bond in round 2, MIXED in round 3. Convenience only; any
/// caller may supply its own event list instead.
pub fn propose_events(
    bonds: &[Bond],
    market_bps: f64,
    idiosyncratic_bps: f64,
    favored_bps: f64,
    penalized_bps: f64,
) -> Vec<MarketEvent> {
    let mut events = vec![MarketEvent {
        round: 1,
        kind: EventKind::Market {
            rate_shock_bps: market_bps,
        },
        description: format!("Curve shift of {market_bps:+} bps"),
    }];
    if let Some(target) = highest_spread_bond(bonds) {
        events.push(MarketEvent {
            round: 2,
            kind: EventKind::Idiosyncratic {
                target_bond_id: target.bond_id.clone(),
                impact_bps: idiosyncratic_bps,
            },
            description: format!("Credit news on {}: {idiosyncratic_bps:+} bps", target.bond_id),
        });
    }
    events.push(MarketEvent {
        round: 3,
        kind: EventKind::Mixed {
            favored_bps,
            penalized_bps,
        },
        description: format!(
            "Flight to quality: {favored_bps:+} bps best credit, {penalized_bps:+} bps rest"
        ),
    });
    events
}
