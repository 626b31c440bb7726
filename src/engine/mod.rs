// Engine module entrypoint
pub mod types;       // bonds, events, orders, quotes, config, error enums
pub mod pricing;     // DCF mid price, bid/ask, effective yield
pub mod events;      // per-round shock aggregation and event proposal
pub mod game;        // round state machine, order execution, balances
pub mod ledger;      // pure replay fold and portfolio valuation
pub mod leaderboard; // ranked rows

pub use game::{AdvanceOutcome, GameState, SharedGame};
pub use types::*;
