use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

// Bond terms as loaded for the session. Immutable afterwards; remaining
// maturity at round r is derived, never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    pub bond_id: String,
    pub name: String,
    pub face_value: f64,
    pub annual_coupon_rate: f64,
    pub payments_per_year: u32,
    pub years_to_maturity: f64,
    pub credit_spread_bps: f64,
    pub callable: bool,
    pub call_price: Option<f64>,
}

/// A yield shock published in a specific round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub round: u32,
    pub kind: EventKind,
    pub description: String,
}

/// Shock parameters are first-class typed fields, never recovered from the
/// description text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// Shifts the whole curve.
    Market { rate_shock_bps: f64 },
    /// Hits a single bond.
    Idiosyncratic {
        target_bond_id: String,
        impact_bps: f64,
    },
    /// Favors the lowest-spread bond, penalizes the rest, and widens the
    /// round's bid/ask spreads. The target is resolved against the current
    /// bond set at publish time.
    Mixed { favored_bps: f64, penalized_bps: f64 },
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Market { .. } => "MARKET",
            EventKind::Idiosyncratic { .. } => "IDIOS",
            EventKind::Mixed { .. } => "MIXED",
        }
    }
}

/// Published prices for one bond in the current round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub mid: f64,
    pub bid: f64,
    pub ask: f64,
}

/// Immutable execution record. The ledger is always a fold over these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub team_id: String,
    pub bond_id: String,
    pub side: Side,
    pub qty: f64,
    pub price_exec: f64,
    pub fees: f64,
    pub round: u32,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    pub fn notional(&self) -> f64 {
        self.qty * self.price_exec
    }
}

/// Whether a published round's shocks stack on top of earlier rounds or stand
/// alone. The reference behavior is ambiguous here, so it is an explicit knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShockPolicy {
    Cumulative,
    PerRound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Years of maturity consumed per round (0.25 = one quarter).
    pub round_fraction_years: f64,
    pub bid_spread_bps: f64,
    pub ask_spread_bps: f64,
    /// Commission charged on every execution, in bps of notional.
    pub fee_bps: f64,
    pub initial_cash: f64,
    pub base_rate: f64,
    /// Extra bid/ask widening applied only in rounds with a MIXED event.
    pub mixed_spread_widen_bps: f64,
    pub shock_policy: ShockPolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_fraction_years: 0.25,
            bid_spread_bps: 20.0,
            ask_spread_bps: 20.0,
            fee_bps: 10.0,
            initial_cash: 100_000.0,
            base_rate: 0.0,
            mixed_spread_widen_bps: 10.0,
            shock_policy: ShockPolicy::Cumulative,
        }
    }
}

impl GameConfig {
    /// Defaults overridden by environment variables (BONDX_*), same loading
    /// style as the rest of the binary config.
    pub fn from_env() -> Self {
        fn num(key: &str, default: f64) -> f64 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        }
        let d = Self::default();
        let shock_policy = match std::env::var("BONDX_SHOCK_POLICY")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "per_round" | "perround" => ShockPolicy::PerRound,
            "cumulative" => ShockPolicy::Cumulative,
            _ => d.shock_policy,
        };
        Self {
            round_fraction_years: num("BONDX_ROUND_FRACTION_YEARS", d.round_fraction_years),
            bid_spread_bps: num("BONDX_BID_BPS", d.bid_spread_bps),
            ask_spread_bps: num("BONDX_ASK_BPS", d.ask_spread_bps),
            fee_bps: num("BONDX_FEE_BPS", d.fee_bps),
            initial_cash: num("BONDX_INITIAL_CASH", d.initial_cash),
            base_rate: num("BONDX_BASE_RATE", d.base_rate),
            mixed_spread_widen_bps: num("BONDX_MIXED_WIDEN_BPS", d.mixed_spread_widen_bps),
            shock_policy,
        }
    }
}

/// Round-sequencing violations. Reported, never fatal; game state is left
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("trading cannot be enabled before the first round is published")]
    TradingBeforeFirstRound,
    #[error("event configured for invalid round {round} (rounds start at 1)")]
    InvalidEventRound { round: u32 },
}

/// Order rejections, with the specific reason reported to the submitter.
/// No state mutation occurs on rejection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradeRejected {
    #[error("quantity must be positive")]
    InvalidQuantity,
    #[error("trading is disabled")]
    TradingDisabled,
    #[error("unknown bond: {0}")]
    UnknownBond(String),
    #[error("no price available for {0}")]
    NoQuote(String),
    #[error("insufficient cash: need {needed:.2}, have {available:.2}")]
    InsufficientCash { needed: f64, available: f64 },
    #[error("insufficient position: need {needed}, have {available}")]
    InsufficientPosition { needed: f64, available: f64 },
}
