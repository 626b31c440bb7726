//! Pure replay of the order log into positions, cash, and fees, and
//! mark-to-market portfolio valuation.
//!
//! `GameState` keeps an incremental balance table for O(1) reads; this module
//! is the ground truth that table is tested against.

use std::collections::HashMap;

use serde::Serialize;

use crate::engine::types::{Order, Quote, Side};

/// Result of replaying an order log. Safe to compute repeatedly; never raises
/// on teams or bonds it has not seen before.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerView {
    pub cash: HashMap<String, f64>,
    pub positions: HashMap<(String, String), f64>,
    pub fees: HashMap<String, f64>,
}

impl LedgerView {
    pub fn cash_of(&self, team_id: &str) -> f64 {
        self.cash.get(team_id).copied().unwrap_or(0.0)
    }

    pub fn position_of(&self, team_id: &str, bond_id: &str) -> f64 {
        self.positions
            .get(&(team_id.to_string(), bond_id.to_string()))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Fold the order log. BUY spends `notional + fees` and adds quantity; SELL
/// receives `notional - fees` and removes quantity. `teams` seeds rows for
/// teams that placed no orders; teams appearing only in the log are included
/// too.
pub fn positions_and_cash(orders: &[Order], teams: &[String], initial_cash: f64) -> LedgerView {
    let mut view = LedgerView::default();
    for team in teams {
        view.cash.entry(team.clone()).or_insert(initial_cash);
        view.fees.entry(team.clone()).or_insert(0.0);
    }
    for order in orders {
        let cash = view
            .cash
            .entry(order.team_id.clone())
            .or_insert(initial_cash);
        let notional = order.notional();
        match order.side {
            Side::Buy => *cash -= notional + order.fees,
            Side::Sell => *cash += notional - order.fees,
        }
        *view.fees.entry(order.team_id.clone()).or_insert(0.0) += order.fees;
        let qty = match order.side {
            Side::Buy => order.qty,
            Side::Sell => -order.qty,
        };
        *view
            .positions
            .entry((order.team_id.clone(), order.bond_id.clone()))
            .or_insert(0.0) += qty;
    }
    view
}

/// One leaderboard row, before ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioRow {
    pub team_id: String,
    pub value: f64,
    pub cash: f64,
}

/// Mark every team's positions to current mids. A bond without a quote has
/// simply not been priced yet and contributes zero; that is a valuation gap,
/// not an error.
pub fn portfolio_value(
    teams: &[String],
    quotes: &HashMap<String, Quote>,
    orders: &[Order],
    initial_cash: f64,
) -> Vec<PortfolioRow> {
    let ledger = positions_and_cash(orders, teams, initial_cash);
    let mut rows: Vec<PortfolioRow> = ledger
        .cash
        .iter()
        .map(|(team_id, cash)| {
            let marked: f64 = ledger
                .positions
                .iter()
                .filter(|((t, _), _)| t == team_id)
                .map(|((_, bond_id), qty)| {
                    quotes.get(bond_id).map(|q| qty * q.mid).unwrap_or(0.0)
                })
                .sum();
            PortfolioRow {
                team_id: team_id.clone(),
                value: cash + marked,
                cash: *cash,
            }
        })
        .collect();
    // Stable output shape regardless of map iteration order.
    rows.sort_by(|a, b| a.team_id.cmp(&b.team_id));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn order(team: &str, bond: &str, side: Side, qty: f64, px: f64, fees: f64) -> Order {
        Order {
            team_id: team.into(),
            bond_id: bond.into(),
            side,
            qty,
            price_exec: px,
            fees,
            round: 1,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn buy_then_sell_roundtrip() {
        let orders = vec![
            order("alpha", "B1", Side::Buy, 10.0, 990.0, 9.9),
            order("alpha", "B1", Side::Sell, 4.0, 980.0, 3.92),
        ];
        let view = positions_and_cash(&orders, &["alpha".into()], 100_000.0);
        let expected_cash = 100_000.0 - (10.0 * 990.0 + 9.9) + (4.0 * 980.0 - 3.92);
        assert!((view.cash_of("alpha") - expected_cash).abs() < 1e-9);
        assert!((view.position_of("alpha", "B1") - 6.0).abs() < 1e-12);
        assert!((view.fees["alpha"] - 13.82).abs() < 1e-9);
    }

    #[test]
    fn team_with_no_orders_defaults_to_initial_cash() {
        let view = positions_and_cash(&[], &["idle".into()], 100_000.0);
        assert_eq!(view.cash_of("idle"), 100_000.0);
        assert_eq!(view.position_of("idle", "B1"), 0.0);
        // Unknown keys are zero, not an error.
        assert_eq!(view.cash_of("nobody"), 0.0);
    }

    #[test]
    fn team_seen_only_in_log_is_included() {
        let orders = vec![order("ghost", "B1", Side::Buy, 1.0, 100.0, 0.1)];
        let view = positions_and_cash(&orders, &[], 100_000.0);
        assert!((view.cash_of("ghost") - (100_000.0 - 100.1)).abs() < 1e-9);
    }

    #[test]
    fn unquoted_bond_contributes_zero_to_value() {
        let orders = vec![order("alpha", "B9", Side::Buy, 5.0, 100.0, 0.5)];
        let mut quotes = HashMap::new();
        quotes.insert(
            "B1".to_string(),
            Quote { mid: 1000.0, bid: 998.0, ask: 1002.0 },
        );
        let rows = portfolio_value(&["alpha".into()], &quotes, &orders, 100_000.0);
        assert_eq!(rows.len(), 1);
        // Cash moved, but the B9 position marks to nothing.
        assert!((rows[0].value - (100_000.0 - 500.5)).abs() < 1e-9);
    }

    #[test]
    fn one_row_per_team_even_without_orders() {
        let quotes = HashMap::new();
        let rows = portfolio_value(
            &["a".into(), "b".into(), "c".into()],
            &quotes,
            &[],
            100_000.0,
        );
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.value == 100_000.0));
    }

    proptest! {
        #[test]
        fn replay_is_idempotent(
            qtys in proptest::collection::vec(1.0_f64..50.0, 0..20),
        ) {
            let orders: Vec<Order> = qtys
                .iter()
                .enumerate()
                .map(|(i, q)| {
                    let side = if i % 3 == 0 { Side::Sell } else { Side::Buy };
                    order(if i % 2 == 0 { "a" } else { "b" }, "B1", side, *q, 1000.0, q * 0.1)
                })
                .collect();
            let teams = vec!["a".to_string(), "b".to_string()];
            let first = positions_and_cash(&orders, &teams, 100_000.0);
            let second = positions_and_cash(&orders, &teams, 100_000.0);
            prop_assert_eq!(first, second);
        }
    }
}
