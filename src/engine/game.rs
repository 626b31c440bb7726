//! The game itself: round state machine, quote publication, order execution,
//! and the incremental balance table.
//!
//! All state lives in an explicit `GameState`; nothing ambient. Mutating
//! operations are all-or-nothing: every check runs before the first write.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use itertools::Itertools;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::engine::events::{self, RoundShocks};
use crate::engine::ledger::{self, LedgerView, PortfolioRow};
use crate::engine::pricing;
use crate::engine::types::{
    Bond, GameConfig, MarketEvent, Order, Quote, SequenceError, ShockPolicy, Side, TradeRejected,
};

/// Single-writer handle. Hold the lock for the whole of any mutating call so
/// two advances or two submissions against the same team cannot interleave.
pub type SharedGame = Arc<Mutex<GameState>>;

/// Outcome of an `advance` call. Advancing a finished game is a no-op, not an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Published { round: u32, quoted: usize },
    AlreadyComplete,
}

/// Per-team running totals, committed atomically with each order append.
/// Replaying the order log must always reproduce this table (tested).
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub cash: f64,
    pub fees_paid: f64,
    pub positions: HashMap<String, f64>,
}

impl Balance {
    fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            fees_paid: 0.0,
            positions: HashMap::new(),
        }
    }

    pub fn position(&self, bond_id: &str) -> f64 {
        self.positions.get(bond_id).copied().unwrap_or(0.0)
    }
}

/// Shock state carried across rounds according to the configured policy.
#[derive(Debug, Clone, Default)]
struct ShockState {
    market_bps: f64,
    idiosyncratic_bps: HashMap<String, f64>,
}

#[derive(Debug)]
pub struct GameState {
    config: GameConfig,
    bonds: Vec<Bond>,
    events: Vec<MarketEvent>,
    total_rounds: u32,
    current_round: u32,
    trading_enabled: bool,
    quotes: HashMap<String, Quote>,
    orders: Vec<Order>,
    balances: HashMap<String, Balance>,
    shocks: ShockState,
}

impl GameState {
    /// Round 0: no prices, trading disabled. Events may come in any order but
    /// must all name rounds >= 1; the last configured round is the game's N.
    #[instrument(skip_all, fields(bonds = bonds.len(), events = events.len()))]
    pub fn new(
        config: GameConfig,
        bonds: Vec<Bond>,
        mut events: Vec<MarketEvent>,
    ) -> Result<Self, SequenceError> {
        if let Some(bad) = events.iter().find(|e| e.round == 0) {
            return Err(SequenceError::InvalidEventRound { round: bad.round });
        }
        events.sort_by_key(|e| e.round);
        let total_rounds = events.iter().map(|e| e.round).max().unwrap_or(0);
        info!(total_rounds, "game created");
        Ok(Self {
            config,
            bonds,
            events,
            total_rounds,
            current_round: 0,
            trading_enabled: false,
            quotes: HashMap::new(),
            orders: Vec::new(),
            balances: HashMap::new(),
            shocks: ShockState::default(),
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn trading_enabled(&self) -> bool {
        self.trading_enabled
    }

    /// Current round's published quotes. Fully replaced on every advance.
    pub fn quotes(&self) -> &HashMap<String, Quote> {
        &self.quotes
    }

    /// Append-only execution log.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Events published so far, in round order.
    pub fn published_events(&self) -> impl Iterator<Item = &MarketEvent> {
        let round = self.current_round;
        self.events.iter().filter(move |e| e.round <= round)
    }

    pub fn teams(&self) -> Vec<String> {
        self.balances.keys().cloned().sorted().collect()
    }

    /// Seat a team with the starting cash. Idempotent.
    pub fn register_team(&mut self, team_id: &str) {
        let initial_cash = self.config.initial_cash;
        self.balances
            .entry(team_id.to_string())
            .or_insert_with(|| {
                info!(team_id, initial_cash, "team registered");
                Balance::new(initial_cash)
            });
    }

    pub fn balance(&self, team_id: &str) -> Option<&Balance> {
        self.balances.get(team_id)
    }

    /// Publish the next round: aggregate its events, fold them into the
    /// carried shock state, and reprice every bond. No-op once all configured
    /// events are out.
    #[instrument(skip(self), fields(round = self.current_round))]
    pub fn advance(&mut self) -> AdvanceOutcome {
        if self.current_round >= self.total_rounds {
            warn!(round = self.current_round, "advance requested but game is already complete");
            return AdvanceOutcome::AlreadyComplete;
        }
        let next = self.current_round + 1;
        let round_shocks = events::aggregate_round(&self.events, next, &self.bonds);
        self.apply_shock_policy(&round_shocks);

        let widen = if round_shocks.widen_spreads {
            self.config.mixed_spread_widen_bps
        } else {
            0.0
        };
        let mut quotes = HashMap::with_capacity(self.bonds.len());
        for bond in &self.bonds {
            let ytm = pricing::effective_yield(
                self.config.base_rate,
                bond.credit_spread_bps,
                self.shocks.market_bps,
                self.shocks
                    .idiosyncratic_bps
                    .get(&bond.bond_id)
                    .copied()
                    .unwrap_or(0.0),
            );
            let mid = pricing::price_mid(bond, ytm, self.config.round_fraction_years, next);
            let quote = pricing::quote_from_mid(
                mid,
                self.config.bid_spread_bps + widen,
                self.config.ask_spread_bps + widen,
            );
            debug!(bond_id = %bond.bond_id, ytm, mid, bid = quote.bid, ask = quote.ask, "priced");
            quotes.insert(bond.bond_id.clone(), quote);
        }

        // Commit point: every computation above succeeded.
        let quoted = quotes.len();
        self.quotes = quotes;
        self.current_round = next;
        self.trading_enabled = true;
        info!(round = next, quoted, "round published");
        AdvanceOutcome::Published { round: next, quoted }
    }

    fn apply_shock_policy(&mut self, round_shocks: &RoundShocks) {
        match self.config.shock_policy {
            ShockPolicy::Cumulative => {
                self.shocks.market_bps += round_shocks.market_bps;
                for (bond_id, bps) in &round_shocks.idiosyncratic_bps {
                    *self
                        .shocks
                        .idiosyncratic_bps
                        .entry(bond_id.clone())
                        .or_default() += bps;
                }
            }
            ShockPolicy::PerRound => {
                self.shocks.market_bps = round_shocks.market_bps;
                self.shocks.idiosyncratic_bps = round_shocks.idiosyncratic_bps.clone();
            }
        }
    }

    /// Moderator override. Trading can be paused any time but can never be
    /// opened while the game is still in round 0.
    pub fn set_trading(&mut self, enabled: bool) -> Result<(), SequenceError> {
        if enabled && self.current_round == 0 {
            return Err(SequenceError::TradingBeforeFirstRound);
        }
        self.trading_enabled = enabled;
        info!(enabled, "trading toggled");
        Ok(())
    }

    /// Validate and execute a trade against the submitting team's derived
    /// cash/position. On success the order is appended and the team's balance
    /// committed in the same critical section; on rejection nothing changes.
    #[instrument(skip(self))]
    pub fn submit_order(
        &mut self,
        team_id: &str,
        bond_id: &str,
        side: Side,
        qty: f64,
    ) -> Result<&Order, TradeRejected> {
        if !self.trading_enabled {
            return Err(TradeRejected::TradingDisabled);
        }
        if !(qty > 0.0 && qty.is_finite()) {
            return Err(TradeRejected::InvalidQuantity);
        }
        if !self.bonds.iter().any(|b| b.bond_id == bond_id) {
            return Err(TradeRejected::UnknownBond(bond_id.to_string()));
        }
        let quote = self
            .quotes
            .get(bond_id)
            .copied()
            .ok_or_else(|| TradeRejected::NoQuote(bond_id.to_string()))?;

        // BUY lifts the ask, SELL hits the bid.
        let price_exec = match side {
            Side::Buy => quote.ask,
            Side::Sell => quote.bid,
        };
        let notional = qty * price_exec;
        let fees = notional * self.config.fee_bps / 10_000.0;

        // Check against derived state without touching it; an unseated team
        // must not be registered by a rejected order.
        let initial_cash = self.config.initial_cash;
        let (cash, held) = match self.balances.get(team_id) {
            Some(b) => (b.cash, b.position(bond_id)),
            None => (initial_cash, 0.0),
        };
        match side {
            Side::Buy => {
                let needed = notional + fees;
                if cash < needed {
                    warn!(team_id, needed, available = cash, "buy rejected");
                    return Err(TradeRejected::InsufficientCash {
                        needed,
                        available: cash,
                    });
                }
            }
            Side::Sell => {
                if held < qty {
                    warn!(team_id, needed = qty, available = held, "sell rejected");
                    return Err(TradeRejected::InsufficientPosition {
                        needed: qty,
                        available: held,
                    });
                }
            }
        }

        // All checks passed; commit balance and log together.
        let balance = self
            .balances
            .entry(team_id.to_string())
            .or_insert_with(|| Balance::new(initial_cash));
        match side {
            Side::Buy => {
                balance.cash -= notional + fees;
                *balance.positions.entry(bond_id.to_string()).or_default() += qty;
            }
            Side::Sell => {
                balance.cash += notional - fees;
                *balance.positions.entry(bond_id.to_string()).or_default() -= qty;
            }
        }
        balance.fees_paid += fees;
        let order = Order {
            team_id: team_id.to_string(),
            bond_id: bond_id.to_string(),
            side,
            qty,
            price_exec,
            fees,
            round: self.current_round,
            timestamp: Utc::now(),
        };
        info!(team_id, bond_id, %side, qty, price_exec, fees, "order executed");
        self.orders.push(order);
        Ok(self.orders.last().expect("order just pushed"))
    }

    /// Ground-truth replay of the order log. `balances` must always agree
    /// with this.
    pub fn replay_ledger(&self) -> LedgerView {
        ledger::positions_and_cash(&self.orders, &self.teams(), self.config.initial_cash)
    }

    /// Ranked leaderboard over all registered teams, marked to the current
    /// round's mids.
    pub fn leaderboard(&self) -> Vec<PortfolioRow> {
        let rows = ledger::portfolio_value(
            &self.teams(),
            &self.quotes,
            &self.orders,
            self.config.initial_cash,
        );
        crate::engine::leaderboard::rank(rows)
    }
}
