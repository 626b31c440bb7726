// Persistence module entrypoint
pub mod csv_log; // plain-row CSV sinks for orders and published quotes

use std::collections::HashMap;

use thiserror::Error;

use crate::engine::types::{Order, Quote};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Append-only receiver of execution records. The engine never reads back
/// through a sink; the in-memory order log stays authoritative.
pub trait OrderSink {
    fn append_order(&mut self, order: &Order) -> PersistResult<()>;
}

/// Receiver of the current round's published quote set. Each publication
/// replaces the previous one, mirroring how the engine holds quotes.
pub trait QuoteSink {
    fn publish_quotes(&mut self, round: u32, quotes: &HashMap<String, Quote>) -> PersistResult<()>;
}
