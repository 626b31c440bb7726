//! CSV-file implementations of the order/quote sinks. These are plain row
//! dumps for the spreadsheet side of the game; no read path exists.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::Serialize;
use tracing::info;

use crate::engine::types::{Order, Quote};
use crate::persist::{OrderSink, PersistResult, QuoteSink};

#[derive(Debug, Serialize)]
struct OrderRow<'a> {
    team_id: &'a str,
    bond_id: &'a str,
    side: String,
    qty: f64,
    price_exec: f64,
    fees: f64,
    round: u32,
    timestamp: String,
}

/// Appends one row per executed order. The header is written once, when the
/// file is created.
#[derive(Debug)]
pub struct CsvOrderLog {
    path: PathBuf,
}

impl CsvOrderLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OrderSink for CsvOrderLog {
    fn append_order(&mut self, order: &Order) -> PersistResult<()> {
        let fresh = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(fresh)
            .from_writer(file);
        writer.serialize(OrderRow {
            team_id: &order.team_id,
            bond_id: &order.bond_id,
            side: order.side.to_string(),
            qty: order.qty,
            price_exec: order.price_exec,
            fees: order.fees,
            round: order.round,
            timestamp: order.timestamp.to_rfc3339(),
        })?;
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct QuoteRow<'a> {
    round: u32,
    bond_id: &'a str,
    mid: f64,
    bid: f64,
    ask: f64,
}

/// Rewrites the whole sheet on every publication: the file always shows
/// exactly the current round's quotes.
#[derive(Debug)]
pub struct CsvQuoteSheet {
    path: PathBuf,
}

impl CsvQuoteSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QuoteSink for CsvQuoteSheet {
    fn publish_quotes(&mut self, round: u32, quotes: &HashMap<String, Quote>) -> PersistResult<()> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        for bond_id in quotes.keys().sorted() {
            let q = &quotes[bond_id];
            writer.serialize(QuoteRow {
                round,
                bond_id: bond_id.as_str(),
                mid: q.mid,
                bid: q.bid,
                ask: q.ask,
            })?;
        }
        writer.flush()?;
        info!(round, rows = quotes.len(), path = %self.path.display(), "quotes written");
        Ok(())
    }
}
