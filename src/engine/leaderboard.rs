//! Ranking of portfolio rows.

use ordered_float::OrderedFloat;

use crate::engine::ledger::PortfolioRow;

/// Sort by portfolio value descending; ties break on team_id ascending so two
/// teams with the same value always come out in the same order. An empty
/// input ranks to an empty output.
pub fn rank(mut rows: Vec<PortfolioRow>) -> Vec<PortfolioRow> {
    rows.sort_by(|a, b| {
        OrderedFloat(b.value)
            .cmp(&OrderedFloat(a.value))
            .then_with(|| a.team_id.cmp(&b.team_id))
    });
    rows
}
