//! Discounted-cash-flow pricing and quote construction.
//!
//! Everything in this module is a pure function over finite numeric inputs.
//! Accrued interest and day-count conventions are deliberately ignored; the
//! model is flat per-period discounting only.

use tracing::trace;

use crate::engine::types::{Bond, Quote};

/// Effective annual yield for a bond: base rate plus credit spread plus the
/// market-wide and bond-specific shocks active for the round, all in bps.
pub fn effective_yield(
    base_rate: f64,
    credit_spread_bps: f64,
    market_shock_bps: f64,
    idiosyncratic_shock_bps: f64,
) -> f64 {
    base_rate
        + credit_spread_bps / 10_000.0
        + market_shock_bps / 10_000.0
        + idiosyncratic_shock_bps / 10_000.0
}

/// Maturity left on the bond after `rounds_elapsed` rounds, clamped at zero.
pub fn remaining_maturity(
    years_to_maturity: f64,
    rounds_elapsed: u32,
    round_fraction_years: f64,
) -> f64 {
    (years_to_maturity - rounds_elapsed as f64 * round_fraction_years).max(0.0)
}

/// Theoretical mid price by DCF with a per-period effective yield.
///
/// A matured bond (remaining maturity <= 0) prices at face value. A bond with
/// `payments_per_year == 0` also prices at face value, matching the reference
/// behavior; the scenario loader rejects such rows upstream so this path is a
/// backstop.
pub fn price_mid(
    bond: &Bond,
    effective_annual_yield: f64,
    round_fraction_years: f64,
    rounds_elapsed: u32,
) -> f64 {
    if bond.payments_per_year == 0 {
        return bond.face_value;
    }
    let t = remaining_maturity(bond.years_to_maturity, rounds_elapsed, round_fraction_years);
    if t <= 0.0 {
        trace!(bond_id = %bond.bond_id, "bond matured, pricing at face");
        return bond.face_value;
    }
    let freq = bond.payments_per_year as f64;
    // At least one remaining payment while the bond is alive.
    let n = ((t * freq).ceil() as u32).max(1);
    let i = effective_annual_yield / freq;
    let coupon = bond.face_value * bond.annual_coupon_rate / freq;

    let mut pv_coupons = 0.0;
    for k in 1..=n {
        pv_coupons += coupon / (1.0 + i).powi(k as i32);
    }
    let pv_principal = bond.face_value / (1.0 + i).powi(n as i32);
    pv_coupons + pv_principal
}

/// Bid/ask around a mid price. Spread policy (liquidity widening etc.) is the
/// caller's business; this only applies the bps it is given.
pub fn quote_from_mid(mid: f64, bid_spread_bps: f64, ask_spread_bps: f64) -> Quote {
    Quote {
        mid,
        bid: mid * (1.0 - bid_spread_bps / 10_000.0),
        ask: mid * (1.0 + ask_spread_bps / 10_000.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_bond() -> Bond {
        Bond {
            bond_id: "B1".into(),
            name: "Bono Soberano".into(),
            face_value: 1000.0,
            annual_coupon_rate: 0.06,
            payments_per_year: 2,
            years_to_maturity: 3.0,
            credit_spread_bps: 80.0,
            callable: false,
            call_price: None,
        }
    }

    #[test]
    fn matured_bond_prices_at_face() {
        let mut bond = sample_bond();
        bond.years_to_maturity = 1.0;
        // 4 rounds of a quarter each consume the whole maturity.
        let px = price_mid(&bond, 0.05, 0.25, 4);
        assert_eq!(px, 1000.0);
        // And well past maturity too.
        let px = price_mid(&bond, 0.05, 0.25, 10);
        assert_eq!(px, 1000.0);
    }

    #[test]
    fn zero_frequency_prices_at_face() {
        let mut bond = sample_bond();
        bond.payments_per_year = 0;
        assert_eq!(price_mid(&bond, 0.05, 0.25, 0), 1000.0);
    }

    #[test]
    fn reference_scenario_b1() {
        // Face 1000, 6% semiannual, 3y, spread 80bps, base rate 0, no shocks:
        // i = 0.008/2 = 0.004 per period, 6 periods of 30 plus principal.
        let bond = sample_bond();
        let ytm = effective_yield(0.0, 80.0, 0.0, 0.0);
        assert!((ytm - 0.008).abs() < 1e-12);

        let px = price_mid(&bond, ytm, 0.25, 0);

        let i = 0.004_f64;
        let mut expected = 0.0;
        for k in 1..=6 {
            expected += 30.0 / (1.0 + i).powi(k);
        }
        expected += 1000.0 / (1.0 + i).powi(6);
        assert!((px - expected).abs() < 1e-9, "px={px} expected={expected}");
    }

    #[test]
    fn market_shock_raises_yield_and_lowers_price() {
        let bond = sample_bond();
        let y0 = effective_yield(0.0, bond.credit_spread_bps, 0.0, 0.0);
        let y1 = effective_yield(0.0, bond.credit_spread_bps, 50.0, 0.0);
        assert!((y1 - y0 - 0.0050).abs() < 1e-12);

        let p0 = price_mid(&bond, y0, 0.25, 1);
        let p1 = price_mid(&bond, y1, 0.25, 1);
        assert!(p1 < p0, "price must fall when yield rises: {p1} !< {p0}");
    }

    #[test]
    fn remaining_maturity_clamps_at_zero() {
        assert_eq!(remaining_maturity(1.0, 2, 0.25), 0.5);
        assert_eq!(remaining_maturity(1.0, 8, 0.25), 0.0);
        assert_eq!(remaining_maturity(0.0, 0, 0.25), 0.0);
    }

    #[test]
    fn short_maturity_still_has_one_payment() {
        let mut bond = sample_bond();
        bond.years_to_maturity = 0.1; // less than one coupon period
        let px = price_mid(&bond, 0.008, 0.25, 0);
        // One coupon of 30 and the principal, discounted one period.
        let expected = (30.0 + 1000.0) / 1.004_f64;
        assert!((px - expected).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn bid_never_exceeds_mid_never_exceeds_ask(
            mid in 1.0_f64..100_000.0,
            bid_bp in 0.0_f64..500.0,
            ask_bp in 0.0_f64..500.0,
        ) {
            let q = quote_from_mid(mid, bid_bp, ask_bp);
            prop_assert!(q.bid <= q.mid);
            prop_assert!(q.mid <= q.ask);
        }

        #[test]
        fn dcf_price_is_positive_and_finite(
            coupon in 0.0_f64..0.15,
            ytm in 0.0_f64..0.20,
            maturity in 0.0_f64..10.0,
            freq in 1u32..12,
        ) {
            let bond = Bond {
                payments_per_year: freq,
                annual_coupon_rate: coupon,
                years_to_maturity: maturity,
                ..sample_bond()
            };
            let px = price_mid(&bond, ytm, 0.25, 0);
            prop_assert!(px.is_finite());
            prop_assert!(px > 0.0);
        }
    }
}
